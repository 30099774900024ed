//! HMAC-SHA256 signing and verification for provider traffic.
//!
//! Two message layouts are in use:
//!
//! - **Header signature**: `"{timestamp}\n{nonce}\n{body}\n"`, signature sent
//!   in a header and bounded by a replay window.
//! - **Parameter signature**: key-sorted `k=v` pairs joined by `&`, skipping
//!   `sign`, `sign_type` and empty values; signature sent as the `sign` param.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::GatewayError;

/// Maximum allowed age for a signed notification (5 minutes).
pub const MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for notifications from the future (1 minute).
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parameters excluded from the parameter signature.
const UNSIGNED_PARAMS: [&str; 2] = ["sign", "sign_type"];

/// Keyed HMAC-SHA256 signer.
#[derive(Clone)]
pub struct HmacSigner {
    secret: SecretString,
}

impl std::fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSigner").finish_non_exhaustive()
    }
}

impl HmacSigner {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Lowercase hex HMAC of `message`.
    pub fn sign(&self, message: &[u8]) -> String {
        hex::encode(self.mac(message))
    }

    /// Constant-time check of a hex signature against `message`.
    pub fn verify(&self, message: &[u8], signature_hex: &str) -> bool {
        let Ok(provided) = hex::decode(signature_hex.trim()) else {
            return false;
        };
        let expected = self.mac(message);
        if expected.len() != provided.len() {
            return false;
        }
        expected.ct_eq(&provided).into()
    }

    fn mac(&self, message: &[u8]) -> Vec<u8> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Builds the header-signature message.
pub fn header_message(timestamp: i64, nonce: &str, body: &[u8]) -> Vec<u8> {
    let mut message = format!("{}\n{}\n", timestamp, nonce).into_bytes();
    message.extend_from_slice(body);
    message.push(b'\n');
    message
}

/// Rejects timestamps outside the replay window around `now_secs`.
///
/// # Errors
///
/// Returns `SignatureInvalid` if the notification is too old or too far in
/// the future.
pub fn check_replay_window(timestamp: i64, now_secs: i64) -> Result<(), GatewayError> {
    let age = now_secs - timestamp;
    if age > MAX_EVENT_AGE_SECS {
        return Err(GatewayError::SignatureInvalid(format!(
            "timestamp is {}s old",
            age
        )));
    }
    if age < -MAX_CLOCK_SKEW_SECS {
        return Err(GatewayError::SignatureInvalid(
            "timestamp is in the future".to_string(),
        ));
    }
    Ok(())
}

/// Builds the canonical parameter string that is signed.
pub fn canonical_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .filter(|(k, v)| !UNSIGNED_PARAMS.contains(&k.as_str()) && !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> HmacSigner {
        HmacSigner::new(SecretString::new("merchant-secret".to_string()))
    }

    // ══════════════════════════════════════════════════════════════
    // HmacSigner
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn signature_verifies_for_same_message() {
        let s = signer();
        let sig = s.sign(b"hello");
        assert!(s.verify(b"hello", &sig));
    }

    #[test]
    fn signature_fails_for_tampered_message() {
        let s = signer();
        let sig = s.sign(b"hello");
        assert!(!s.verify(b"hellO", &sig));
    }

    #[test]
    fn signature_fails_for_other_secret() {
        let other = HmacSigner::new(SecretString::new("other".to_string()));
        let sig = other.sign(b"hello");
        assert!(!signer().verify(b"hello", &sig));
    }

    #[test]
    fn non_hex_signature_is_rejected() {
        assert!(!signer().verify(b"hello", "not-hex"));
        assert!(!signer().verify(b"hello", "abcd"));
    }

    // ══════════════════════════════════════════════════════════════
    // Message layouts
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn header_message_joins_parts_with_newlines() {
        let message = header_message(1700000000, "n1", b"{}");
        assert_eq!(message, b"1700000000\nn1\n{}\n".to_vec());
    }

    #[test]
    fn canonical_params_sorts_and_skips_sign_fields() {
        let mut params = BTreeMap::new();
        params.insert("trade_status".to_string(), "TRADE_SUCCESS".to_string());
        params.insert("out_trade_no".to_string(), "VIP-0001".to_string());
        params.insert("sign".to_string(), "abc".to_string());
        params.insert("sign_type".to_string(), "HMAC-SHA256".to_string());
        params.insert("memo".to_string(), String::new());

        assert_eq!(
            canonical_params(&params),
            "out_trade_no=VIP-0001&trade_status=TRADE_SUCCESS"
        );
    }

    // ══════════════════════════════════════════════════════════════
    // Replay window
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn fresh_timestamp_is_accepted() {
        assert!(check_replay_window(1000, 1010).is_ok());
    }

    #[test]
    fn old_timestamp_is_rejected() {
        assert!(check_replay_window(1000, 1000 + MAX_EVENT_AGE_SECS + 1).is_err());
    }

    #[test]
    fn future_timestamp_beyond_skew_is_rejected() {
        assert!(check_replay_window(1000 + MAX_CLOCK_SKEW_SECS + 1, 1000).is_err());
        assert!(check_replay_window(1000 + MAX_CLOCK_SKEW_SECS, 1000).is_ok());
    }
}
