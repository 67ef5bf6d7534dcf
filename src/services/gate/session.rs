/*
 * Responsibility
 * - Read authentication material (edge: cookies / client: auth-state snapshot)
 * - Judge it: authenticated? expired (with safety buffer)? which role?
 * - Never mutate credentials; missing or malformed data fails closed
 */
use std::sync::Arc;

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::services::auth::access_jwt::TokenVerifier;
use crate::services::gate::role::Role;

/// Default safety buffer: tokens expiring within this window are treated as expired.
pub const DEFAULT_EXPIRY_BUFFER_SECONDS: i64 = 5 * 60;

pub fn default_expiry_buffer() -> Duration {
    Duration::seconds(DEFAULT_EXPIRY_BUFFER_SECONDS)
}

/// Authentication material as read from a cookie store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub role: Option<Role>,
}

/// Why a request was judged unauthenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFailure {
    MissingToken,
    MissingExpiry,
    MalformedExpiry,
    Expired,
    InvalidToken,
}

/// Evaluation result. Derived fresh per request, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthDecision {
    pub is_authenticated: bool,
    pub is_token_expired: bool,
    pub role: Option<Role>,
    pub roles: Vec<Role>,
    pub user_id: Option<String>,
    pub failure: Option<AuthFailure>,
}

impl AuthDecision {
    pub fn anonymous(failure: AuthFailure) -> Self {
        let is_token_expired = matches!(
            failure,
            AuthFailure::MissingExpiry | AuthFailure::MalformedExpiry | AuthFailure::Expired
        );
        Self {
            is_authenticated: false,
            is_token_expired,
            role: None,
            roles: Vec::new(),
            user_id: None,
            failure: Some(failure),
        }
    }

    pub fn authenticated(roles: Vec<Role>, user_id: Option<String>) -> Self {
        Self {
            is_authenticated: true,
            is_token_expired: false,
            role: roles.first().copied(),
            roles,
            user_id,
            failure: None,
        }
    }

    /// Authenticated with a token that is still usable.
    pub fn has_valid_session(&self) -> bool {
        self.is_authenticated && !self.is_token_expired
    }
}

/// `now >= expires_at - buffer`. An unrepresentable deadline counts as expired.
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>, buffer: Duration) -> bool {
    expires_at
        .checked_sub_signed(buffer)
        .is_none_or(|deadline| now >= deadline)
}

/// Parse the expiry cookie: integer epoch milliseconds or RFC 3339.
pub fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ms) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Read-only view over a request's cookies.
pub trait CookieSource {
    fn cookie(&self, name: &str) -> Option<&str>;
}

/// Cookies parsed from every `Cookie` header of a request. First occurrence wins.
#[derive(Debug, Default)]
pub struct RequestCookies<'a> {
    pairs: Vec<(&'a str, &'a str)>,
}

impl<'a> RequestCookies<'a> {
    pub fn from_headers(headers: &'a HeaderMap) -> Self {
        let pairs = headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|s| s.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.split_once('=')?;
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                Some((name.trim(), value))
            })
            .collect();
        Self { pairs }
    }
}

impl CookieSource for RequestCookies<'_> {
    fn cookie(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }
}

impl CookieSource for std::collections::HashMap<String, String> {
    fn cookie(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieNames {
    pub token: String,
    pub expires_at: String,
    pub role: String,
}

impl Default for CookieNames {
    fn default() -> Self {
        Self {
            token: "auth-token".to_string(),
            expires_at: "auth-expires-at".to_string(),
            role: "auth-role".to_string(),
        }
    }
}

/// Edge evaluator: cookie store -> AuthDecision.
#[derive(Debug, Clone)]
pub struct SessionEvaluator {
    cookies: CookieNames,
    buffer: Duration,
    verifier: Option<Arc<TokenVerifier>>,
}

impl SessionEvaluator {
    pub fn new(cookies: CookieNames, buffer: Duration) -> Self {
        Self {
            cookies,
            buffer,
            verifier: None,
        }
    }

    /// Take roles from the verified token instead of the role cookie.
    pub fn with_verifier(mut self, verifier: Arc<TokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Extract the raw token material, without judging expiry.
    pub fn read_token(&self, cookies: &impl CookieSource) -> Result<AuthToken, AuthFailure> {
        let token = cookies
            .cookie(&self.cookies.token)
            .filter(|t| !t.is_empty())
            .ok_or(AuthFailure::MissingToken)?;

        let raw_expiry = cookies
            .cookie(&self.cookies.expires_at)
            .ok_or(AuthFailure::MissingExpiry)?;
        let expires_at = parse_expiry(raw_expiry).ok_or(AuthFailure::MalformedExpiry)?;

        let role = cookies
            .cookie(&self.cookies.role)
            .and_then(|r| r.parse::<Role>().ok());

        Ok(AuthToken {
            token: token.to_string(),
            expires_at,
            role,
        })
    }

    pub fn evaluate(&self, cookies: &impl CookieSource, now: DateTime<Utc>) -> AuthDecision {
        let token = match self.read_token(cookies) {
            Ok(t) => t,
            Err(failure) => return AuthDecision::anonymous(failure),
        };

        if is_expired(token.expires_at, now, self.buffer) {
            return AuthDecision::anonymous(AuthFailure::Expired);
        }

        match &self.verifier {
            Some(verifier) => match verifier.verify_verified(&token.token) {
                Ok(verified) => {
                    AuthDecision::authenticated(verified.roles, Some(verified.user_id.to_string()))
                }
                Err(err) => {
                    tracing::debug!(error = %err, "session token verification failed");
                    AuthDecision::anonymous(AuthFailure::InvalidToken)
                }
            },
            None => AuthDecision::authenticated(token.role.into_iter().collect(), None),
        }
    }
}

/// Client-side auth state as exposed by the hydration-aware store.
pub trait ClientAuthState {
    fn is_authenticated_flag(&self) -> bool;
    fn token(&self) -> Option<&str>;
    fn is_token_expired(&self, now: DateTime<Utc>) -> bool;
    fn has_identity(&self) -> bool;
    fn roles(&self) -> Vec<Role>;
    fn user_id(&self) -> Option<String>;
}

/// Client evaluator: flag AND unexpired token AND identity. Flags alone are not trusted.
pub fn evaluate_client(state: &impl ClientAuthState, now: DateTime<Utc>) -> AuthDecision {
    if state.token().is_none_or(str::is_empty) {
        return AuthDecision::anonymous(AuthFailure::MissingToken);
    }
    if state.is_token_expired(now) {
        return AuthDecision::anonymous(AuthFailure::Expired);
    }
    if !state.is_authenticated_flag() || !state.has_identity() {
        return AuthDecision::anonymous(AuthFailure::InvalidToken);
    }
    AuthDecision::authenticated(state.roles(), state.user_id())
}
