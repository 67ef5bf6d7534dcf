/*
 * Responsibility
 * - Route category definitions (Excluded / Public / Auth / Admin / Protected / Unknown)
 * - Path pattern parsing (exact or segment prefix)
 * - Route table construction + overlap validation (configuration errors fail startup)
 * - classify(path): total, deterministic, side-effect free
 * - Paths are matched in canonical form (decoded, `.`/`..` resolved, repeated
 *   slashes collapsed, lowercase) so encoded variants land in the same category
 */
use std::borrow::Cow;
use std::fmt;

use percent_encoding::percent_decode_str;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteCategory {
    Excluded,
    Public,
    Auth,
    Admin,
    Protected,
    Unknown,
}

impl fmt::Display for RouteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteCategory::Excluded => "excluded",
            RouteCategory::Public => "public",
            RouteCategory::Auth => "auth",
            RouteCategory::Admin => "admin",
            RouteCategory::Protected => "protected",
            RouteCategory::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("route pattern must start with '/': {0:?}")]
    NotRooted(String),
    #[error("route pattern contains a wildcard outside a trailing '/*': {0:?}")]
    MisplacedWildcard(String),
    #[error("route pattern cannot be decoded: {0:?}")]
    Undecodable(String),
    #[error("route pattern {pattern:?} is listed as both {first} and {second}")]
    Overlap {
        pattern: String,
        first: RouteCategory,
        second: RouteCategory,
    },
}

/// A single configured path pattern.
///
/// - `Exact("/login")` matches only `/login`
/// - `Prefix("/admin")` (written `/admin/*`) matches `/admin` and `/admin/...`,
///   never `/administrator`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePattern {
    Exact(String),
    Prefix(String),
}

impl RoutePattern {
    pub fn parse(raw: &str) -> Result<Self, RouteTableError> {
        let raw = raw.trim();
        if !raw.starts_with('/') {
            return Err(RouteTableError::NotRooted(raw.to_string()));
        }

        let (base, is_prefix) = match raw.strip_suffix("/*") {
            Some(base) => (base, true),
            None => (raw, false),
        };

        if base.contains('*') {
            return Err(RouteTableError::MisplacedWildcard(raw.to_string()));
        }

        // `/*` collapses to a prefix over the root, which matches everything.
        let base = if base.is_empty() {
            "/".to_string()
        } else {
            canonical_path(base).ok_or_else(|| RouteTableError::Undecodable(raw.to_string()))?
        };

        Ok(if is_prefix {
            RoutePattern::Prefix(base)
        } else {
            RoutePattern::Exact(base)
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            RoutePattern::Exact(p) => path == p.as_str(),
            RoutePattern::Prefix(p) => prefix_matches(p, path),
        }
    }

    fn overlaps(&self, other: &RoutePattern) -> bool {
        match (self, other) {
            (RoutePattern::Exact(a), RoutePattern::Exact(b)) => a == b,
            (RoutePattern::Exact(a), RoutePattern::Prefix(b))
            | (RoutePattern::Prefix(b), RoutePattern::Exact(a)) => prefix_matches(b, a),
            (RoutePattern::Prefix(a), RoutePattern::Prefix(b)) => {
                prefix_matches(a, b) || prefix_matches(b, a)
            }
        }
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutePattern::Exact(p) => f.write_str(p),
            RoutePattern::Prefix(p) if p == "/" => f.write_str("/*"),
            RoutePattern::Prefix(p) => write!(f, "{p}/*"),
        }
    }
}

fn prefix_matches(prefix: &str, path: &str) -> bool {
    if prefix == "/" {
        return path.starts_with('/');
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

const MAX_DECODE_ROUNDS: usize = 3;

/// Canonical form of a request path, or `None` when it cannot be decoded
/// (invalid UTF-8, control characters, not rooted, still encoded after
/// `MAX_DECODE_ROUNDS`).
///
/// `/%61dmin//users/./` and `/ADMIN%2Fusers` both become `/admin/users`.
/// `\` counts as a separator and `..` never climbs above the root.
pub fn canonical_path(raw: &str) -> Option<String> {
    let mut decoded: Cow<'_, str> = Cow::Borrowed(raw);
    let mut rounds = 0;
    while decoded.contains('%') {
        if rounds == MAX_DECODE_ROUNDS {
            return None;
        }
        let next = percent_decode_str(&decoded).decode_utf8().ok()?.into_owned();
        if next == decoded {
            break;
        }
        decoded = Cow::Owned(next);
        rounds += 1;
    }

    if !decoded.starts_with(['/', '\\']) || decoded.chars().any(char::is_control) {
        return None;
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }

    Some(format!("/{}", segments.join("/")).to_lowercase())
}

/// Raw pattern lists, one per configured category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSets {
    pub excluded: Vec<String>,
    pub public: Vec<String>,
    pub auth: Vec<String>,
    pub admin: Vec<String>,
    pub protected: Vec<String>,
}

/// Immutable, validated route table. Built once at startup and shared.
#[derive(Debug, Clone)]
pub struct RouteTable {
    // Evaluation order is the order of this vector.
    sets: Vec<(RouteCategory, Vec<RoutePattern>)>,
}

impl RouteTable {
    pub fn new(sets: &RouteSets) -> Result<Self, RouteTableError> {
        let parse_all = |raw: &[String]| -> Result<Vec<RoutePattern>, RouteTableError> {
            raw.iter()
                .filter(|s| !s.trim().is_empty())
                .map(|s| RoutePattern::parse(s))
                .collect()
        };

        let table = Self {
            sets: vec![
                (RouteCategory::Excluded, parse_all(&sets.excluded)?),
                (RouteCategory::Public, parse_all(&sets.public)?),
                (RouteCategory::Auth, parse_all(&sets.auth)?),
                (RouteCategory::Admin, parse_all(&sets.admin)?),
                (RouteCategory::Protected, parse_all(&sets.protected)?),
            ],
        };
        table.check_disjoint()?;
        Ok(table)
    }

    // Excluded may shadow anything (precedence handles it); the other four must be disjoint.
    fn check_disjoint(&self) -> Result<(), RouteTableError> {
        let guarded: Vec<&(RouteCategory, Vec<RoutePattern>)> = self
            .sets
            .iter()
            .filter(|(c, _)| *c != RouteCategory::Excluded)
            .collect();

        for (i, (first, patterns)) in guarded.iter().enumerate() {
            for (second, others) in guarded.iter().skip(i + 1) {
                for p in patterns.iter() {
                    if let Some(o) = others.iter().find(|o| p.overlaps(o)) {
                        let pattern = if p == o {
                            p.to_string()
                        } else {
                            format!("{p} ~ {o}")
                        };
                        return Err(RouteTableError::Overlap {
                            pattern,
                            first: *first,
                            second: *second,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Map a request path to exactly one category, matching its canonical form.
    /// Unmatched and undecodable paths are `Unknown`.
    pub fn classify(&self, path: &str) -> RouteCategory {
        let Some(path) = canonical_path(path) else {
            return RouteCategory::Unknown;
        };
        self.sets
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|p| p.matches(&path)))
            .map(|(category, _)| *category)
            .unwrap_or(RouteCategory::Unknown)
    }
}
