//! Webhook signature verification.
//!
//! All comparisons are constant-time. A verification failure at the HTTP
//! layer returns 401 and records `webhook_signature_invalid`.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use secureyeoman_crypto::{SigningKey, constant_time_eq};

fn hmac_sha256(secret: &str, body: &[u8]) -> Option<[u8; 32]> {
    // HMAC accepts any key length; the SigningKey floor exists for the
    // audit chain, so pad short webhook secrets deterministically.
    let mut material = secret.as_bytes().to_vec();
    if material.len() < SigningKey::MIN_LEN {
        material.resize(SigningKey::MIN_LEN, 0);
    }
    SigningKey::new(material)
        .ok()
        .map(|key| *key.sign(body).as_bytes())
}

/// GitHub `X-Hub-Signature-256`: `sha256=<hex HMAC-SHA256 of the body>`.
#[must_use]
pub fn verify_github_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Some(hex_part) = header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(expected) = hex::decode(hex_part) else {
        return false;
    };
    let Some(computed) = hmac_sha256(secret, body) else {
        return false;
    };
    constant_time_eq(&computed, &expected)
}

/// Line `X-Line-Signature`: base64 HMAC-SHA256 of the body.
#[must_use]
pub fn verify_line_signature(secret: &str, body: &[u8], header: &str) -> bool {
    let Ok(expected) = BASE64.decode(header) else {
        return false;
    };
    let Some(computed) = hmac_sha256(secret, body) else {
        return false;
    };
    constant_time_eq(&computed, &expected)
}

/// GitLab `X-Gitlab-Token`: plain shared secret.
#[must_use]
pub fn verify_gitlab_token(secret: &str, header: &str) -> bool {
    constant_time_eq(secret.as_bytes(), header.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "webhook-secret";
    const BODY: &[u8] = br#"{"action": "opened"}"#;

    fn github_header() -> String {
        let mac = hmac_sha256(SECRET, BODY).unwrap();
        format!("sha256={}", hex::encode(mac))
    }

    #[test]
    fn test_github_valid() {
        assert!(verify_github_signature(SECRET, BODY, &github_header()));
    }

    #[test]
    fn test_github_wrong_secret() {
        assert!(!verify_github_signature("other", BODY, &github_header()));
    }

    #[test]
    fn test_github_tampered_body() {
        assert!(!verify_github_signature(SECRET, b"{}", &github_header()));
    }

    #[test]
    fn test_github_malformed_header() {
        assert!(!verify_github_signature(SECRET, BODY, "md5=abcd"));
        assert!(!verify_github_signature(SECRET, BODY, "sha256=zzzz"));
        assert!(!verify_github_signature(SECRET, BODY, ""));
    }

    #[test]
    fn test_line_valid() {
        let mac = hmac_sha256(SECRET, BODY).unwrap();
        let header = BASE64.encode(mac);
        assert!(verify_line_signature(SECRET, BODY, &header));
        assert!(!verify_line_signature(SECRET, b"{}", &header));
        assert!(!verify_line_signature(SECRET, BODY, "not-base64!!"));
    }

    #[test]
    fn test_gitlab_token() {
        assert!(verify_gitlab_token("tok", "tok"));
        assert!(!verify_gitlab_token("tok", "tok2"));
        assert!(!verify_gitlab_token("tok", ""));
    }
}
