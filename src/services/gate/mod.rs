/*
 * Responsibility
 * - Authorization decision engine: classify -> evaluate -> decide -> redirect/log
 * - HTTP-agnostic: the middleware only feeds path/query/headers and executes the outcome
 * - No state across requests besides immutable configuration
 */
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};

pub mod decision;
pub mod factory;
pub mod redirect;
pub mod return_url;
pub mod role;
pub mod route;
pub mod session;

pub use decision::{Action, decide};
pub use factory::build_gate;
pub use redirect::{Redirect, RedirectBuilder};
pub use role::{Role, RoleRequirement};
pub use route::{RouteCategory, RouteTable};
pub use session::{AuthDecision, AuthFailure, SessionEvaluator};

use crate::services::security_log::{RequestMeta, SecurityEvent, SecurityLogger, SecurityMetadata};
use session::RequestCookies;

/// Result of gating one request.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    pub category: RouteCategory,
    /// `None` for excluded routes: credentials are not even read.
    pub auth: Option<AuthDecision>,
    pub action: Action,
    pub redirect: Option<Redirect>,
}

#[derive(Debug, Clone)]
pub struct Gate {
    routes: RouteTable,
    evaluator: SessionEvaluator,
    redirects: RedirectBuilder,
    admin: RoleRequirement,
    logger: SecurityLogger,
}

impl Gate {
    pub fn new(
        routes: RouteTable,
        evaluator: SessionEvaluator,
        redirects: RedirectBuilder,
        logger: SecurityLogger,
    ) -> Self {
        Self {
            routes,
            evaluator,
            redirects,
            admin: RoleRequirement::admin(),
            logger,
        }
    }

    pub fn check(
        &self,
        path: &str,
        query: Option<&str>,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> GateOutcome {
        let category = self.routes.classify(path);

        if category == RouteCategory::Excluded {
            return GateOutcome {
                category,
                auth: None,
                action: Action::PassThrough,
                redirect: None,
            };
        }

        let auth = self
            .evaluator
            .evaluate(&RequestCookies::from_headers(headers), now);
        let action = decide(category, &auth, &self.admin);

        let redirect = match action {
            Action::PassThrough => None,
            Action::RedirectToLogin => {
                self.log_authentication_failure(category, &auth, path, headers);
                Some(self.redirects.to_login(path, query))
            }
            Action::RedirectToHome => {
                let candidate = redirect::return_url_from_query(query);
                Some(self.redirects.to_home(candidate.as_deref()))
            }
            Action::RedirectToForbidden => {
                self.log_unauthorized(&auth, path, headers);
                Some(self.redirects.to_forbidden())
            }
        };

        if let Some(r) = &redirect {
            tracing::debug!(%path, %category, location = r.location(), "gate redirect");
        }

        GateOutcome {
            category,
            auth: Some(auth),
            action,
            redirect,
        }
    }

    fn required_roles(&self) -> String {
        self.admin
            .roles
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    fn log_unauthorized(&self, auth: &AuthDecision, path: &str, headers: &HeaderMap) {
        let attempted = if auth.roles.is_empty() {
            "NONE".to_string()
        } else {
            auth.roles
                .iter()
                .map(Role::as_str)
                .collect::<Vec<_>>()
                .join(",")
        };

        self.logger.record(
            SecurityEvent::UnauthorizedAccess,
            &RequestMeta::from_request(path, headers),
            SecurityMetadata {
                attempted_role: Some(attempted),
                required_role: Some(self.required_roles()),
                user_id: auth.user_id.clone(),
                reason: Some("insufficient role for admin route".to_string()),
            },
        );
    }

    fn log_authentication_failure(
        &self,
        category: RouteCategory,
        auth: &AuthDecision,
        path: &str,
        headers: &HeaderMap,
    ) {
        let (event, reason) = match auth.failure {
            Some(AuthFailure::Expired) => (SecurityEvent::ExpiredToken, "token expired"),
            Some(AuthFailure::MalformedExpiry) => {
                (SecurityEvent::InvalidToken, "malformed expiry timestamp")
            }
            Some(AuthFailure::InvalidToken) => {
                (SecurityEvent::InvalidToken, "token verification failed")
            }
            Some(AuthFailure::MissingExpiry) => {
                (SecurityEvent::AuthenticationFailure, "missing expiry timestamp")
            }
            Some(AuthFailure::MissingToken) | None => {
                (SecurityEvent::AuthenticationFailure, "missing token")
            }
        };

        let required_role = (category == RouteCategory::Admin).then(|| self.required_roles());

        self.logger.record(
            event,
            &RequestMeta::from_request(path, headers),
            SecurityMetadata {
                required_role,
                user_id: auth.user_id.clone(),
                ..SecurityMetadata::reason(reason)
            },
        );
    }
}
