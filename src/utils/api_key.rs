use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const KEY_CONTEXT: &[u8] = b"email-assistant/integration-api-key";

fn tag(key: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(KEY_CONTEXT).ok()?;
    mac.update(key.as_bytes());
    Some(mac)
}

/// Compares a presented API key against the configured one without leaking
/// timing information about where they differ.
pub fn api_key_matches(presented: &str, expected: &str) -> bool {
    if expected.is_empty() {
        return false;
    }
    match (tag(presented), tag(expected)) {
        (Some(presented), Some(expected)) => {
            let expected_tag = expected.finalize().into_bytes();
            presented.verify_slice(&expected_tag).is_ok()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_the_exact_key() {
        assert!(api_key_matches("s3cret-key", "s3cret-key"));
        assert!(!api_key_matches("s3cret-ke", "s3cret-key"));
        assert!(!api_key_matches("S3CRET-KEY", "s3cret-key"));
        assert!(!api_key_matches("", "s3cret-key"));
    }

    #[test]
    fn empty_configured_key_never_matches() {
        assert!(!api_key_matches("", ""));
    }
}
