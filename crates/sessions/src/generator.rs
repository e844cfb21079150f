//! Session identifier issuance and validation.

use std::time::Duration;

use hmac::{Hmac, Mac};
use http::request::Parts;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::id::SessionId;

type HmacSha256 = Hmac<Sha256>;

/// Random nonce plus big-endian unix-nanos timestamp.
const PAYLOAD_LEN: usize = 16 + 8;
const MAC_LEN: usize = 32;

/// Mints identifiers for new sessions and decides whether a presented
/// identifier can be trusted.
pub trait IdGenerator: Send + Sync {
    fn is_valid(&self, id: &SessionId) -> bool;

    /// Mint a fresh identifier for the client that sent `request`.
    fn generate(&self, request: &Parts) -> SessionId;
}

/// Issues identifiers signed with HMAC-SHA256 so forged or mangled values can
/// be rejected without a store lookup.
///
/// Layout: `hex(nonce ‖ timestamp) ‖ hex(mac)`, 112 hex characters.
///
/// Without a max age an identifier stays valid for as long as the key does,
/// so a cookie replayed after logout is accepted again (with an empty
/// session).  [`HmacGenerator::with_max_age`] bounds that window by the
/// issue timestamp.
pub struct HmacGenerator {
    key: Vec<u8>,
    max_age: Option<Duration>,
}

impl HmacGenerator {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            max_age: None,
        }
    }

    /// Reject identifiers issued more than `max_age` ago.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Generator with a fresh random key.  Identifiers it issues do not
    /// survive a process restart.
    pub fn random() -> Self {
        Self::new(random_key(32))
    }

    fn mac(&self, payload: &[u8]) -> [u8; MAC_LEN] {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .expect("HMAC accepts any key length");
        mac.update(payload);
        let mut out = [0u8; MAC_LEN];
        out.copy_from_slice(&mac.finalize().into_bytes());
        out
    }

    fn sign(&self, payload: &[u8; PAYLOAD_LEN]) -> SessionId {
        let mac = self.mac(payload);
        SessionId::new(format!("{}{}", hex::encode(payload), hex::encode(mac)))
    }

    fn within_max_age(&self, payload: &[u8]) -> bool {
        let Some(max_age) = self.max_age else {
            return true;
        };
        let mut stamp = [0u8; 8];
        stamp.copy_from_slice(&payload[16..PAYLOAD_LEN]);
        let issued = i64::from_be_bytes(stamp);
        let now = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let max_nanos = i64::try_from(max_age.as_nanos()).unwrap_or(i64::MAX);
        now.saturating_sub(issued) <= max_nanos
    }
}

impl IdGenerator for HmacGenerator {
    fn is_valid(&self, id: &SessionId) -> bool {
        let raw = id.as_str();
        if raw.len() != 2 * (PAYLOAD_LEN + MAC_LEN) {
            return false;
        }
        let Ok(bytes) = hex::decode(raw) else {
            return false;
        };
        let (payload, provided) = bytes.split_at(PAYLOAD_LEN);
        let expected = self.mac(payload);
        bool::from(expected.as_slice().ct_eq(provided)) && self.within_max_age(payload)
    }

    fn generate(&self, request: &Parts) -> SessionId {
        let mut payload = [0u8; PAYLOAD_LEN];
        rand::thread_rng().fill_bytes(&mut payload[..16]);
        let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        payload[16..].copy_from_slice(&nanos.to_be_bytes());

        let id = self.sign(&payload);

        tracing::debug!(
            session_id = %id.redacted(),
            path = %request.uri.path(),
            "minted session id"
        );
        id
    }
}

/// `len` cryptographically random bytes, for signing keys.
pub fn random_key(len: usize) -> Vec<u8> {
    let mut key = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts() -> Parts {
        http::Request::builder()
            .uri("/login")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn generated_ids_validate() {
        let gen = HmacGenerator::new(b"secret".to_vec());
        let id = gen.generate(&parts());
        assert_eq!(id.as_str().len(), 112);
        assert!(gen.is_valid(&id));
    }

    #[test]
    fn ids_are_unique() {
        let gen = HmacGenerator::random();
        let a = gen.generate(&parts());
        let b = gen.generate(&parts());
        assert_ne!(a, b);
    }

    #[test]
    fn other_key_rejects() {
        let a = HmacGenerator::new(b"key-a".to_vec());
        let b = HmacGenerator::new(b"key-b".to_vec());
        let id = a.generate(&parts());
        assert!(!b.is_valid(&id));
    }

    #[test]
    fn tampered_or_malformed_ids_reject() {
        let gen = HmacGenerator::new(b"secret".to_vec());
        let id = gen.generate(&parts());

        let mut tampered = id.as_str().to_owned();
        let flipped = if tampered.starts_with('0') { "1" } else { "0" };
        tampered.replace_range(0..1, flipped);
        assert!(!gen.is_valid(&SessionId::new(tampered)));

        assert!(!gen.is_valid(&SessionId::from("")));
        assert!(!gen.is_valid(&SessionId::from("not-hex")));
        assert!(!gen.is_valid(&SessionId::new("z".repeat(112))));
    }

    fn issued_ago(gen: &HmacGenerator, ago: chrono::Duration) -> SessionId {
        let mut payload = [7u8; PAYLOAD_LEN];
        let nanos = (chrono::Utc::now() - ago).timestamp_nanos_opt().unwrap();
        payload[16..].copy_from_slice(&nanos.to_be_bytes());
        gen.sign(&payload)
    }

    #[test]
    fn ids_without_max_age_never_expire() {
        let gen = HmacGenerator::new(b"secret".to_vec());
        assert!(gen.is_valid(&issued_ago(&gen, chrono::Duration::days(30))));
    }

    #[test]
    fn max_age_rejects_old_ids() {
        let gen = HmacGenerator::new(b"secret".to_vec()).with_max_age(Duration::from_secs(3600));
        assert!(gen.is_valid(&issued_ago(&gen, chrono::Duration::minutes(10))));
        assert!(!gen.is_valid(&issued_ago(&gen, chrono::Duration::hours(2))));
        assert!(gen.is_valid(&gen.generate(&parts())));
    }
}
