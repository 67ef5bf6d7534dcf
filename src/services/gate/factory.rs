/// Factory: build the `Gate` from application `Config`.
use std::sync::Arc;

use chrono::Duration;
use thiserror::Error;

use crate::config::GateSettings;
use crate::services::auth::TokenVerifier;
use crate::services::gate::route::{RouteTable, RouteTableError};
use crate::services::gate::{Gate, RedirectBuilder, SessionEvaluator};
use crate::services::security_log::SecurityLogger;

#[derive(Debug, Error)]
pub enum GateBuildError {
    #[error("invalid route table: {0}")]
    Routes(#[from] RouteTableError),
    #[error("invalid token verification settings: {0}")]
    Verifier(String),
    #[error("expiry buffer out of range: {0}s")]
    ExpiryBuffer(i64),
}

pub fn build_gate(settings: &GateSettings, logger: SecurityLogger) -> Result<Gate, GateBuildError> {
    let routes = RouteTable::new(&settings.routes)?;

    let buffer = Duration::try_seconds(settings.expiry_buffer_seconds)
        .filter(|b| *b >= Duration::zero())
        .ok_or(GateBuildError::ExpiryBuffer(settings.expiry_buffer_seconds))?;
    let mut evaluator = SessionEvaluator::new(settings.cookies.clone(), buffer);

    match &settings.token_verification {
        Some(tv) => {
            let verifier = TokenVerifier::new(
                &tv.public_key_pem,
                &tv.issuer,
                &tv.audience,
                tv.leeway_seconds,
            )
            .map_err(GateBuildError::Verifier)?;
            evaluator = evaluator.with_verifier(Arc::new(verifier));
        }
        None => {
            tracing::warn!(
                role_cookie = %settings.cookies.role,
                "token verification disabled: role cookie is trusted without integrity check"
            );
        }
    }

    let redirects = RedirectBuilder::new(
        settings.login_url.clone(),
        settings.home_url.clone(),
        settings.forbidden_url.clone(),
    );

    Ok(Gate::new(routes, evaluator, redirects, logger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, TokenVerification};
    use crate::services::auth::access_jwt::test_keys;
    use crate::services::security_log::MemorySink;

    fn settings() -> GateSettings {
        Config::from_lookup(|_| None).unwrap().gate
    }

    fn logger() -> SecurityLogger {
        SecurityLogger::new(Arc::new(MemorySink::default()))
    }

    #[test]
    fn builds_from_default_settings() {
        assert!(build_gate(&settings(), logger()).is_ok());
    }

    #[test]
    fn overlapping_routes_fail() {
        let mut s = settings();
        s.routes.protected.push("/login".to_string());
        assert!(matches!(
            build_gate(&s, logger()),
            Err(GateBuildError::Routes(RouteTableError::Overlap { .. }))
        ));
    }

    #[test]
    fn out_of_range_buffer_fails() {
        let mut s = settings();
        s.expiry_buffer_seconds = i64::MAX;
        assert!(matches!(
            build_gate(&s, logger()),
            Err(GateBuildError::ExpiryBuffer(i64::MAX))
        ));
    }

    #[test]
    fn bad_key_fails_and_good_key_builds() {
        let mut s = settings();
        s.token_verification = Some(TokenVerification {
            public_key_pem: "not a pem".into(),
            issuer: "iss".into(),
            audience: "aud".into(),
            leeway_seconds: 0,
        });
        assert!(matches!(
            build_gate(&s, logger()),
            Err(GateBuildError::Verifier(_))
        ));

        if let Some(tv) = s.token_verification.as_mut() {
            tv.public_key_pem = test_keys::PUBLIC_PEM.to_string();
        }
        assert!(build_gate(&s, logger()).is_ok());
    }
}
