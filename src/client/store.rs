/*
 * Responsibility
 * - Client-side auth state as an explicit, hydration-aware, read-only snapshot
 * - A single writer (AuthStore) that notifies subscribers only on real changes
 *
 * Guards never read ambient globals: they receive a watch::Receiver<AuthSnapshot>.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::services::gate::role::Role;
use crate::services::gate::session::{ClientAuthState, default_expiry_buffer, is_expired};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Snapshot of the client auth store.
///
/// `user` and `auth_user` are two identity slots filled by different login flows;
/// either one counts as "identity present".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSnapshot {
    #[serde(default)]
    pub is_authenticated: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user: Option<UserIdentity>,
    #[serde(default)]
    pub auth_user: Option<UserIdentity>,
    #[serde(default)]
    pub has_hydrated: bool,
}

impl AuthSnapshot {
    fn identity(&self) -> Option<&UserIdentity> {
        self.user.as_ref().or(self.auth_user.as_ref())
    }
}

impl ClientAuthState for AuthSnapshot {
    fn is_authenticated_flag(&self) -> bool {
        self.is_authenticated
    }

    fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    // No expiry info => expired.
    fn is_token_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => is_expired(exp, now, default_expiry_buffer()),
            None => true,
        }
    }

    fn has_identity(&self) -> bool {
        self.identity().is_some()
    }

    fn roles(&self) -> Vec<Role> {
        let mut roles = Vec::new();
        for id in [self.user.as_ref(), self.auth_user.as_ref()].into_iter().flatten() {
            if let Some(r) = id.role.as_deref().and_then(|r| r.parse::<Role>().ok()) {
                if !roles.contains(&r) {
                    roles.push(r);
                }
            }
        }
        roles
    }

    fn user_id(&self) -> Option<String> {
        self.identity().map(|u| u.id.clone())
    }
}

/// Single writer for the client auth state.
#[derive(Debug)]
pub struct AuthStore {
    tx: watch::Sender<AuthSnapshot>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStore {
    /// Starts un-hydrated: guards render loading until `hydrate` runs.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(AuthSnapshot::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        self.tx.borrow().clone()
    }

    /// Finish bootstrap with the persisted state.
    pub fn hydrate(&self, mut persisted: AuthSnapshot) {
        persisted.has_hydrated = true;
        self.tx.send_replace(persisted);
    }

    /// Bootstrap from a persisted JSON blob. Unreadable state hydrates as logged out.
    pub fn hydrate_from_json(&self, raw: &str) -> Result<(), serde_json::Error> {
        match serde_json::from_str::<AuthSnapshot>(raw) {
            Ok(snapshot) => {
                self.hydrate(snapshot);
                Ok(())
            }
            Err(err) => {
                self.hydrate(AuthSnapshot::default());
                Err(err)
            }
        }
    }

    /// Mutate and notify subscribers only if something changed.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut AuthSnapshot),
    {
        self.tx.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        });
    }

    pub fn logout(&self) {
        self.update(|s| {
            let hydrated = s.has_hydrated;
            *s = AuthSnapshot {
                has_hydrated: hydrated,
                ..Default::default()
            };
        });
    }
}
