/// Shared error type used across all httpsession crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    /// The session identifier carrier on the inbound request could not be read.
    #[error("transfer: {0}")]
    Transfer(String),
}

pub type Result<T> = std::result::Result<T, Error>;
