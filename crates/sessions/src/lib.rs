//! Server-side HTTP sessions.
//!
//! Binds an opaque client identifier (carried in a cookie) to a mutable
//! key/value bag held in server memory with sliding expiration.  The
//! [`SessionManager`] resolves the identifier from each inbound request,
//! validates or mints it, and hands out [`Session`] handles that read and
//! write through to a [`Store`].

pub mod generator;
pub mod id;
pub mod listener;
pub mod manager;
pub mod memory;
pub mod session;
pub mod store;
pub mod transfer;

pub use generator::{random_key, HmacGenerator, IdGenerator};
pub use id::SessionId;
pub use listener::{AfterCreatedListener, BeforeReleaseListener};
pub use manager::SessionManager;
pub use memory::MemoryStore;
pub use session::Session;
pub use store::Store;
pub use transfer::{CookieTransfer, SetCookie, Transfer, TransferError};
