/*
 * Responsibility
 * - Per-request CSP nonce (fresh OS randomness, never reused, no I/O wait)
 * - Content-Security-Policy value embedding the nonce
 */
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

const NONCE_BYTES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CspNonce(String);

impl CspNonce {
    /// 128 bits from the OS RNG, base64 encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        if let Err(err) = getrandom::fill(&mut bytes) {
            // uuid v4 draws from the same OS source; used only if the direct call fails.
            tracing::warn!(error = %err, "getrandom failed; falling back to uuid v4 for csp nonce");
            bytes = *uuid::Uuid::new_v4().as_bytes();
        }
        Self(STANDARD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// CSP for server-rendered pages: scripts and styles only with this nonce.
    pub fn content_security_policy(&self) -> String {
        let n = &self.0;
        [
            "default-src 'self'".to_string(),
            format!("script-src 'self' 'nonce-{n}' 'strict-dynamic'"),
            format!("style-src 'self' 'nonce-{n}'"),
            "img-src 'self' blob: data:".to_string(),
            "font-src 'self'".to_string(),
            "object-src 'none'".to_string(),
            "base-uri 'self'".to_string(),
            "form-action 'self'".to_string(),
            "frame-ancestors 'none'".to_string(),
            "upgrade-insecure-requests".to_string(),
        ]
        .join("; ")
    }
}

impl fmt::Display for CspNonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
