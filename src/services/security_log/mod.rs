/*
 * Responsibility
 * - Build structured security log entries (one JSON object per event)
 * - Emit them to a swappable sink without ever affecting the request path
 *
 * Observational only: nothing here returns an error to the caller or
 * influences the authorization decision.
 */
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub mod sink;

pub use sink::{MemorySink, NonBlockingSink, SecuritySink, SinkError, StderrSink, TracingSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEvent {
    /// Authenticated, but the role requirement was not met.
    UnauthorizedAccess,
    AuthenticationFailure,
    InvalidToken,
    ExpiredToken,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempted_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SecurityMetadata {
    pub fn reason(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// Request facts captured for a log entry. IP is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub path: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_request(path: &str, headers: &HeaderMap) -> Self {
        Self {
            path: path.to_string(),
            ip: client_ip(headers),
            user_agent: headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

/// First `X-Forwarded-For` hop, then `X-Real-IP`.
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').map(str::trim).find(|s| !s.is_empty()));

    forwarded
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string)
}

/// Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: SecurityEvent,
    pub path: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub metadata: SecurityMetadata,
}

impl SecurityLogEntry {
    pub fn new(
        event: SecurityEvent,
        request: &RequestMeta,
        metadata: SecurityMetadata,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            event,
            path: request.path.clone(),
            ip: request.ip.clone(),
            user_agent: request.user_agent.clone(),
            metadata,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Clone)]
pub struct SecurityLogger {
    sink: Arc<dyn SecuritySink>,
}

impl std::fmt::Debug for SecurityLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityLogger").finish_non_exhaustive()
    }
}

impl SecurityLogger {
    pub fn new(sink: Arc<dyn SecuritySink>) -> Self {
        Self { sink }
    }

    /// Build + emit. Sink errors and sink panics are swallowed.
    pub fn record(&self, event: SecurityEvent, request: &RequestMeta, metadata: SecurityMetadata) {
        let entry = SecurityLogEntry::new(event, request, metadata, Utc::now());

        match panic::catch_unwind(AssertUnwindSafe(|| self.sink.emit(&entry))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::debug!(error = %err, event = ?entry.event, "security log entry dropped");
            }
            Err(_) => {
                tracing::debug!(event = ?entry.event, "security log sink panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    struct FailingSink;

    impl SecuritySink for FailingSink {
        fn emit(&self, _entry: &SecurityLogEntry) -> Result<(), SinkError> {
            Err(SinkError::Closed)
        }
    }

    struct PanickingSink;

    impl SecuritySink for PanickingSink {
        fn emit(&self, _entry: &SecurityLogEntry) -> Result<(), SinkError> {
            panic!("sink exploded")
        }
    }

    fn meta() -> RequestMeta {
        RequestMeta {
            path: "/admin/users".into(),
            ip: Some("203.0.113.9".into()),
            user_agent: Some("curl/8".into()),
        }
    }

    #[test]
    fn records_into_sink() {
        let sink = Arc::new(MemorySink::default());
        let logger = SecurityLogger::new(sink.clone());
        logger.record(
            SecurityEvent::UnauthorizedAccess,
            &meta(),
            SecurityMetadata {
                attempted_role: Some("USER".into()),
                required_role: Some("ADMIN".into()),
                ..Default::default()
            },
        );

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, SecurityEvent::UnauthorizedAccess);
        assert_eq!(entries[0].path, "/admin/users");
        assert_eq!(entries[0].metadata.required_role.as_deref(), Some("ADMIN"));
    }

    #[test]
    fn sink_failures_never_escape() {
        SecurityLogger::new(Arc::new(FailingSink)).record(
            SecurityEvent::AuthenticationFailure,
            &meta(),
            SecurityMetadata::default(),
        );
        SecurityLogger::new(Arc::new(PanickingSink)).record(
            SecurityEvent::InvalidToken,
            &meta(),
            SecurityMetadata::default(),
        );
    }

    #[test]
    fn serializes_as_single_json_object() {
        let ts = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let entry = SecurityLogEntry::new(
            SecurityEvent::ExpiredToken,
            &meta(),
            SecurityMetadata::reason("token expired"),
            ts,
        );
        let json = entry.to_json().unwrap();
        assert!(!json.contains('\n'));

        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["event"], "EXPIRED_TOKEN");
        assert_eq!(v["path"], "/admin/users");
        assert_eq!(v["ip"], "203.0.113.9");
        assert_eq!(v["userAgent"], "curl/8");
        assert_eq!(v["metadata"]["reason"], "token expired");
        assert!(v["metadata"].get("userId").is_none());
        assert_eq!(v["timestamp"], "2026-03-01T12:00:00Z");
    }

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let mut h = HeaderMap::new();
        assert_eq!(client_ip(&h), None);

        h.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(client_ip(&h).as_deref(), Some("10.0.0.2"));

        h.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 198.51.100.7 , 10.0.0.1"),
        );
        assert_eq!(client_ip(&h).as_deref(), Some("198.51.100.7"));
    }
}
