/*
 * Responsibility
 * - Build the three redirect targets (login / home / forbidden)
 * - Every destination and embedded returnUrl goes through the return-URL validator
 * - 307 so that non-GET requests keep their method
 */
use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use url::form_urlencoded;

use crate::services::gate::return_url;

pub const RETURN_URL_PARAM: &str = "returnUrl";
pub const REDIRECT_STATUS: StatusCode = StatusCode::TEMPORARY_REDIRECT;

// Non-ASCII is always escaped; `%` stays so already-encoded targets pass unchanged.
const LOCATION_ESCAPE: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'<').add(b'>');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    location: String,
}

impl Redirect {
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        // Locations are built from validated, ASCII-escaped input; "/" is unreachable in practice.
        let location =
            HeaderValue::from_str(&self.location).unwrap_or_else(|_| HeaderValue::from_static("/"));
        (REDIRECT_STATUS, [(header::LOCATION, location)]).into_response()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectBuilder {
    login_url: String,
    home_url: String,
    forbidden_url: String,
}

impl RedirectBuilder {
    pub fn new(
        login_url: impl Into<String>,
        home_url: impl Into<String>,
        forbidden_url: impl Into<String>,
    ) -> Self {
        Self {
            login_url: login_url.into(),
            home_url: home_url.into(),
            forbidden_url: forbidden_url.into(),
        }
    }

    /// Login URL with the current location (sanitized) as `returnUrl`.
    pub fn to_login(&self, current_path: &str, current_query: Option<&str>) -> Redirect {
        let current = current_location(current_path, current_query);
        let target = return_url::sanitize(&current, &self.home_url);

        let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
        let sep = if self.login_url.contains('?') { '&' } else { '?' };

        Redirect {
            location: format!("{}{}{}={}", self.login_url, sep, RETURN_URL_PARAM, encoded),
        }
    }

    /// Post-login destination: the candidate when safe, otherwise the home URL.
    pub fn to_home(&self, candidate: Option<&str>) -> Redirect {
        let target = return_url::sanitize_opt(candidate, &self.home_url);
        Redirect {
            location: utf8_percent_encode(target, LOCATION_ESCAPE).to_string(),
        }
    }

    /// No returnUrl: there is nothing to come back to.
    pub fn to_forbidden(&self) -> Redirect {
        Redirect {
            location: self.forbidden_url.clone(),
        }
    }
}

/// `path` or `path?query` (empty query dropped).
pub fn current_location(path: &str, query: Option<&str>) -> String {
    match query.filter(|q| !q.is_empty()) {
        Some(q) => format!("{path}?{q}"),
        None => path.to_string(),
    }
}

/// First `returnUrl` value in a raw query string, percent-decoded.
pub fn return_url_from_query(query: Option<&str>) -> Option<String> {
    let query = query?;
    form_urlencoded::parse(query.as_bytes())
        .find(|(k, _)| k == RETURN_URL_PARAM)
        .map(|(_, v)| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> RedirectBuilder {
        RedirectBuilder::new("/login", "/", "/403")
    }

    #[test]
    fn login_redirect_embeds_encoded_path() {
        let r = builder().to_login("/admin/users", None);
        assert_eq!(r.location(), "/login?returnUrl=%2Fadmin%2Fusers");
    }

    #[test]
    fn login_redirect_keeps_query() {
        let r = builder().to_login("/dashboard", Some("tab=plans&week=3"));
        assert_eq!(
            r.location(),
            "/login?returnUrl=%2Fdashboard%3Ftab%3Dplans%26week%3D3"
        );
        assert_eq!(
            return_url_from_query(r.location().split_once('?').map(|(_, q)| q)).as_deref(),
            Some("/dashboard?tab=plans&week=3")
        );
    }

    #[test]
    fn login_redirect_drops_unsafe_current_location() {
        let r = builder().to_login("//evil.example/x", None);
        assert_eq!(r.location(), "/login?returnUrl=%2F");
    }

    #[test]
    fn login_url_with_existing_query() {
        let b = RedirectBuilder::new("/login?source=gate", "/", "/403");
        assert_eq!(
            b.to_login("/profile", Some("")).location(),
            "/login?source=gate&returnUrl=%2Fprofile"
        );
    }

    #[test]
    fn home_redirect_validates_candidate() {
        let b = builder();
        assert_eq!(b.to_home(Some("/recipes/7")).location(), "/recipes/7");
        assert_eq!(b.to_home(Some("https://evil.example")).location(), "/");
        assert_eq!(b.to_home(Some("//evil.example")).location(), "/");
        assert_eq!(b.to_home(None).location(), "/");
        assert_eq!(b.to_home(Some("/café")).location(), "/caf%C3%A9");
        assert_eq!(b.to_home(Some("/meal plans")).location(), "/meal%20plans");
        assert_eq!(b.to_home(Some("/a%20b")).location(), "/a%20b");
    }

    #[test]
    fn forbidden_redirect_has_no_return_url() {
        assert_eq!(builder().to_forbidden().location(), "/403");
    }

    #[test]
    fn redirect_response_is_307() {
        let resp = builder().to_forbidden().into_response();
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/403");
    }

    #[test]
    fn reads_return_url_from_query() {
        assert_eq!(
            return_url_from_query(Some("returnUrl=%2Fsettings%3Fa%3D1&x=2")).as_deref(),
            Some("/settings?a=1")
        );
        assert_eq!(return_url_from_query(Some("x=2")), None);
        assert_eq!(return_url_from_query(None), None);
    }
}
