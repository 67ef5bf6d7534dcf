/*
 * Responsibility
 * - Closed role enumeration (ADMIN / USER)
 * - Role sufficiency checks (ANY / ALL strategies)
 */
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {:?}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    // Case-insensitive; surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("ADMIN") {
            Ok(Role::Admin)
        } else if trimmed.eq_ignore_ascii_case("USER") {
            Ok(Role::User)
        } else {
            Err(UnknownRole(s.to_string()))
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchStrategy {
    /// At least one required role present.
    #[default]
    Any,
    /// Every required role present.
    All,
}

/// Roles a route demands, and how to combine them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRequirement {
    pub roles: Vec<Role>,
    pub strategy: MatchStrategy,
}

impl RoleRequirement {
    pub fn any(roles: impl Into<Vec<Role>>) -> Self {
        Self {
            roles: roles.into(),
            strategy: MatchStrategy::Any,
        }
    }

    pub fn all(roles: impl Into<Vec<Role>>) -> Self {
        Self {
            roles: roles.into(),
            strategy: MatchStrategy::All,
        }
    }

    /// Requirement enforced on admin routes.
    pub fn admin() -> Self {
        Self::any([Role::Admin])
    }

    pub fn is_met_by(&self, user_roles: &[Role]) -> bool {
        is_sufficient(user_roles, &self.roles, self.strategy)
    }
}

pub fn has_role(user_role: Option<Role>, required: Role) -> bool {
    user_role == Some(required)
}

/// Raw-string variant of `has_role`: case-insensitive match of the declared role.
pub fn has_role_str(user_role: Option<&str>, required: Role) -> bool {
    let parsed = user_role.and_then(|r| r.parse::<Role>().ok());
    has_role(parsed, required)
}

/// An empty requirement is always met, regardless of strategy.
pub fn is_sufficient(user_roles: &[Role], required: &[Role], strategy: MatchStrategy) -> bool {
    if required.is_empty() {
        return true;
    }
    match strategy {
        MatchStrategy::Any => required.iter().any(|r| user_roles.contains(r)),
        MatchStrategy::All => required.iter().all(|r| user_roles.contains(r)),
    }
}
