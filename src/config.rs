/*
 * Responsibility
 * - Load settings from the environment (.env supported): listen address, route tables,
 *   redirect targets, cookie names, expiry buffer, token verification, security log sink
 * - Validate values (missing / invalid => startup fails)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::gate::return_url;
use crate::services::gate::route::RouteSets;
use crate::services::gate::session::{CookieNames, DEFAULT_EXPIRY_BUFFER_SECONDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Tracing,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityLogSettings {
    pub sink: SinkKind,
    pub queue_capacity: usize,
}

/// Signed-token verification. When absent, the role cookie is trusted as-is.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenVerification {
    pub public_key_pem: String,
    pub issuer: String,
    pub audience: String,
    pub leeway_seconds: u64,
}

impl fmt::Debug for TokenVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerification")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSettings {
    pub routes: RouteSets,
    pub login_url: String,
    pub home_url: String,
    pub forbidden_url: String,
    pub cookies: CookieNames,
    pub expiry_buffer_seconds: i64,
    pub token_verification: Option<TokenVerification>,
}

/// Transport limits applied by `middleware::http`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub body_limit_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            body_limit_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub gate: GateSettings,
    pub security_log: SecurityLogSettings,
    pub http: HttpSettings,
}

const DEFAULT_EXCLUDED: &str =
    "/_next/*,/static/*,/favicon.ico,/robots.txt,/health,/metrics,/api/*";
const DEFAULT_PUBLIC: &str = "/,/about,/privacy,/terms,/403,/recipes/*";
const DEFAULT_AUTH: &str = "/login,/register,/forgot-password,/reset-password";
const DEFAULT_ADMIN: &str = "/admin/*";
const DEFAULT_PROTECTED: &str =
    "/dashboard/*,/profile/*,/settings/*,/meal-plans/*,/my-recipes/*";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (environment in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port: u16 = match get("PORT") {
            Some(v) => v.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(get("APP_ENV"));

        let list = |key: &str, default: &str| -> Vec<String> {
            get(key)
                .unwrap_or_else(|| default.to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        };

        let routes = RouteSets {
            excluded: list("GATE_EXCLUDED_ROUTES", DEFAULT_EXCLUDED),
            public: list("GATE_PUBLIC_ROUTES", DEFAULT_PUBLIC),
            auth: list("GATE_AUTH_ROUTES", DEFAULT_AUTH),
            admin: list("GATE_ADMIN_ROUTES", DEFAULT_ADMIN),
            protected: list("GATE_PROTECTED_ROUTES", DEFAULT_PROTECTED),
        };

        // Redirect targets are themselves subject to the return-URL rules.
        let safe_url = |key: &'static str, default: &str| -> Result<String, ConfigError> {
            let v = get(key).unwrap_or_else(|| default.to_string());
            if return_url::is_safe(&v) {
                Ok(v)
            } else {
                Err(ConfigError::Invalid(key))
            }
        };

        let login_url = safe_url("GATE_LOGIN_URL", "/login")?;
        let home_url = safe_url("GATE_HOME_URL", "/")?;
        let forbidden_url = safe_url("GATE_FORBIDDEN_URL", "/403")?;

        let defaults = CookieNames::default();
        let cookies = CookieNames {
            token: get("GATE_TOKEN_COOKIE").unwrap_or(defaults.token),
            expires_at: get("GATE_EXPIRES_COOKIE").unwrap_or(defaults.expires_at),
            role: get("GATE_ROLE_COOKIE").unwrap_or(defaults.role),
        };

        let expiry_buffer_seconds = match get("GATE_EXPIRY_BUFFER_SECONDS") {
            Some(v) => v
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|s| *s >= 0 && chrono::Duration::try_seconds(*s).is_some())
                .ok_or(ConfigError::Invalid("GATE_EXPIRY_BUFFER_SECONDS"))?,
            None => DEFAULT_EXPIRY_BUFFER_SECONDS,
        };

        let token_verification = match get("GATE_TOKEN_PUBLIC_KEY_PEM") {
            Some(pem) => Some(TokenVerification {
                public_key_pem: pem.replace("\\n", "\n"),
                issuer: get("GATE_TOKEN_ISSUER").ok_or(ConfigError::Missing("GATE_TOKEN_ISSUER"))?,
                audience: get("GATE_TOKEN_AUDIENCE")
                    .ok_or(ConfigError::Missing("GATE_TOKEN_AUDIENCE"))?,
                leeway_seconds: get("GATE_TOKEN_LEEWAY_SECONDS")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0),
            }),
            None => None,
        };

        let sink = match get("SECURITY_LOG_SINK")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("tracing") => SinkKind::Tracing,
            Some("stderr") => SinkKind::Stderr,
            Some(_) => return Err(ConfigError::Invalid("SECURITY_LOG_SINK")),
        };

        let queue_capacity = get("SECURITY_LOG_QUEUE")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1024);

        let http_defaults = HttpSettings::default();
        let http = HttpSettings {
            timeout: match get("HTTP_TIMEOUT_SECONDS") {
                Some(v) => v
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|s| *s > 0)
                    .map(Duration::from_secs)
                    .ok_or(ConfigError::Invalid("HTTP_TIMEOUT_SECONDS"))?,
                None => http_defaults.timeout,
            },
            body_limit_bytes: match get("HTTP_BODY_LIMIT_BYTES") {
                Some(v) => v
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| ConfigError::Invalid("HTTP_BODY_LIMIT_BYTES"))?,
                None => http_defaults.body_limit_bytes,
            },
        };

        Ok(Self {
            addr,
            app_env,
            gate: GateSettings {
                routes,
                login_url,
                home_url,
                forbidden_url,
                cookies,
                expiry_buffer_seconds,
                token_verification,
            },
            security_log: SecurityLogSettings {
                sink,
                queue_capacity,
            },
            http,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = load(&[]).unwrap();
        assert_eq!(c.addr.port(), 3000);
        assert_eq!(c.app_env, AppEnv::Development);
        assert_eq!(c.gate.login_url, "/login");
        assert_eq!(c.gate.home_url, "/");
        assert_eq!(c.gate.forbidden_url, "/403");
        assert_eq!(c.gate.expiry_buffer_seconds, 300);
        assert_eq!(c.gate.cookies, CookieNames::default());
        assert_eq!(c.gate.routes.admin, vec!["/admin/*".to_string()]);
        assert!(c.gate.token_verification.is_none());
        assert_eq!(c.security_log.sink, SinkKind::Tracing);
        assert_eq!(c.security_log.queue_capacity, 1024);
        assert_eq!(c.http, HttpSettings::default());
    }

    #[test]
    fn overrides() {
        let c = load(&[
            ("PORT", "8080"),
            ("APP_ENV", "PROD"),
            ("GATE_ADMIN_ROUTES", " /admin/* , /ops/* "),
            ("GATE_LOGIN_URL", "/signin"),
            ("GATE_ROLE_COOKIE", "role"),
            ("GATE_EXPIRY_BUFFER_SECONDS", "60"),
            ("SECURITY_LOG_SINK", "stderr"),
        ])
        .unwrap();
        assert_eq!(c.addr.port(), 8080);
        assert!(c.app_env.is_production());
        assert_eq!(c.gate.routes.admin, vec!["/admin/*", "/ops/*"]);
        assert_eq!(c.gate.login_url, "/signin");
        assert_eq!(c.gate.cookies.role, "role");
        assert_eq!(c.gate.expiry_buffer_seconds, 60);
        assert_eq!(c.security_log.sink, SinkKind::Stderr);
    }

    #[test]
    fn rejects_unsafe_redirect_targets() {
        assert_eq!(
            load(&[("GATE_HOME_URL", "https://evil.example")]).unwrap_err(),
            ConfigError::Invalid("GATE_HOME_URL")
        );
        assert_eq!(
            load(&[("GATE_FORBIDDEN_URL", "//evil")]).unwrap_err(),
            ConfigError::Invalid("GATE_FORBIDDEN_URL")
        );
    }

    #[test]
    fn rejects_bad_numbers_and_sinks() {
        assert_eq!(
            load(&[("PORT", "http")]).unwrap_err(),
            ConfigError::Invalid("PORT")
        );
        assert_eq!(
            load(&[("GATE_EXPIRY_BUFFER_SECONDS", "-5")]).unwrap_err(),
            ConfigError::Invalid("GATE_EXPIRY_BUFFER_SECONDS")
        );
        let too_large = (i64::MAX / 1000 + 1).to_string();
        assert_eq!(
            load(&[("GATE_EXPIRY_BUFFER_SECONDS", too_large.as_str())]).unwrap_err(),
            ConfigError::Invalid("GATE_EXPIRY_BUFFER_SECONDS")
        );
        assert_eq!(
            load(&[("SECURITY_LOG_SINK", "kafka")]).unwrap_err(),
            ConfigError::Invalid("SECURITY_LOG_SINK")
        );
        assert_eq!(
            load(&[("HTTP_TIMEOUT_SECONDS", "0")]).unwrap_err(),
            ConfigError::Invalid("HTTP_TIMEOUT_SECONDS")
        );
    }

    #[test]
    fn token_verification_requires_issuer_and_audience() {
        assert_eq!(
            load(&[("GATE_TOKEN_PUBLIC_KEY_PEM", "pem")]).unwrap_err(),
            ConfigError::Missing("GATE_TOKEN_ISSUER")
        );
        let c = load(&[
            ("GATE_TOKEN_PUBLIC_KEY_PEM", "line1\\nline2"),
            ("GATE_TOKEN_ISSUER", "https://id.example"),
            ("GATE_TOKEN_AUDIENCE", "route-gate"),
        ])
        .unwrap();
        let tv = c.gate.token_verification.unwrap();
        assert_eq!(tv.public_key_pem, "line1\nline2");
        assert_eq!(tv.leeway_seconds, 0);
    }
}
