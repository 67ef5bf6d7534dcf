use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::{error::Error as StdError, fmt};
use uuid::Uuid;

use crate::services::gate::role::Role;

// Errors returned by token verification + strict claim validation.
#[derive(Debug)]
pub enum AccessJwtError {
    Jwt(jsonwebtoken::errors::Error),
    EmptyClaim(&'static str),
    InvalidSubUuid,
}

impl fmt::Display for AccessJwtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jwt(e) => write!(f, "jwt verification failed: {}", e),
            Self::EmptyClaim(name) => write!(f, "empty '{}' claim", name),
            Self::InvalidSubUuid => write!(f, "invalid 'sub' (expected UUID)"),
        }
    }
}

impl StdError for AccessJwtError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Jwt(e) => Some(e),
            _ => None,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AccessJwtError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        Self::Jwt(e)
    }
}

/// Claims read from the session token cookie.
///
/// NOTE:
/// - The identity service may declare either a single `role` or a `roles` array.
/// - `aud` / `iss` are checked by `Validation`; we only keep what the gate consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionTokenClaims {
    pub sub: String,
    pub exp: u64,

    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

/// Verified token data the gate actually uses.
///
/// - `sub` is a UUID by convention of the identity service
/// - roles outside the closed enumeration are dropped, never guessed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSessionToken {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
}

/// EdDSA (Ed25519) session-token verifier.
///
/// When configured, the role is taken from signed claims and the
/// plain role cookie is ignored.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        f.debug_struct("TokenVerifier")
            .field("validation", &self.validation)
            .finish()
    }
}

impl TokenVerifier {
    pub fn new(
        public_key_pem: &str,
        issuer: &str,
        audience: &str,
        leeway_seconds: u64,
    ) -> Result<Self, String> {
        let decoding_key = DecodingKey::from_ed_pem(public_key_pem.as_bytes())
            .map_err(|e| format!("invalid ed25519 public key pem: {}", e))?;

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.leeway = leeway_seconds;

        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Signature + `exp` + `iss` + `aud` (jsonwebtoken), then non-empty `sub`.
    pub fn verify_strict(&self, token: &str) -> Result<SessionTokenClaims, AccessJwtError> {
        let data = jsonwebtoken::decode::<SessionTokenClaims>(
            token,
            &self.decoding_key,
            &self.validation,
        )?;
        let claims = data.claims;

        if claims.sub.trim().is_empty() {
            return Err(AccessJwtError::EmptyClaim("sub"));
        }
        if claims.exp == 0 {
            return Err(AccessJwtError::EmptyClaim("exp"));
        }

        Ok(claims)
    }

    /// Verify, then convert claims into the gate's types.
    pub fn verify_verified(&self, token: &str) -> Result<VerifiedSessionToken, AccessJwtError> {
        let claims = self.verify_strict(token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AccessJwtError::InvalidSubUuid)?;

        let roles = claims
            .role
            .iter()
            .chain(claims.roles.iter().flatten())
            .filter_map(|r| r.parse::<Role>().ok())
            .fold(Vec::new(), |mut acc, r| {
                if !acc.contains(&r) {
                    acc.push(r);
                }
                acc
            });

        Ok(VerifiedSessionToken { user_id, roles })
    }
}


#[cfg(test)]
mod tests {
    use super::test_keys::*;
    use super::*;
    use serde_json::json;

    const SUB: &str = "5f0c6f4e-8a51-4b5e-9d8e-0c2b1f7f2a10";

    fn verifier(pem: &str) -> TokenVerifier {
        TokenVerifier::new(pem, "https://id.example", "route-gate", 0).unwrap()
    }

    fn claims(extra: serde_json::Value) -> serde_json::Value {
        let mut base = json!({
            "iss": "https://id.example",
            "aud": "route-gate",
            "sub": SUB,
            "exp": chrono::Utc::now().timestamp() + 3600,
        });
        if let (Some(b), Some(e)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in e {
                b.insert(k.clone(), v.clone());
            }
        }
        base
    }

    #[test]
    fn verifies_role_claim() {
        let token = sign(&claims(json!({ "role": "admin" })));
        let verified = verifier(PUBLIC_PEM).verify_verified(&token).unwrap();
        assert_eq!(verified.user_id, Uuid::parse_str(SUB).unwrap());
        assert_eq!(verified.roles, vec![Role::Admin]);
    }

    #[test]
    fn merges_roles_array_and_drops_unknown() {
        let token = sign(&claims(json!({ "role": "USER", "roles": ["admin", "user", "owner"] })));
        let verified = verifier(PUBLIC_PEM).verify_verified(&token).unwrap();
        assert_eq!(verified.roles, vec![Role::User, Role::Admin]);
    }

    #[test]
    fn rejects_foreign_signature() {
        let token = sign(&claims(json!({ "role": "admin" })));
        let err = verifier(OTHER_PUBLIC_PEM).verify_verified(&token).unwrap_err();
        assert!(matches!(err, AccessJwtError::Jwt(_)));
    }

    #[test]
    fn rejects_wrong_audience_and_expired() {
        let token = sign(&claims(json!({ "aud": "someone-else" })));
        assert!(verifier(PUBLIC_PEM).verify_verified(&token).is_err());

        let token = sign(&claims(json!({ "exp": chrono::Utc::now().timestamp() - 60 })));
        assert!(verifier(PUBLIC_PEM).verify_verified(&token).is_err());
    }

    #[test]
    fn rejects_non_uuid_subject() {
        let token = sign(&claims(json!({ "sub": "alice" })));
        let err = verifier(PUBLIC_PEM).verify_verified(&token).unwrap_err();
        assert!(matches!(err, AccessJwtError::InvalidSubUuid));
    }

    #[test]
    fn rejects_garbage() {
        assert!(verifier(PUBLIC_PEM).verify_verified("not-a-jwt").is_err());
    }
}
