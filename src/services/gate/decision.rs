/*
 * Responsibility
 * - The single authorization rule set: (category, auth decision, role requirement) -> Action
 * - Shared by the edge middleware and the client guards so the two cannot drift
 * - Pure: no I/O, no clock, no logging
 */
use crate::services::gate::role::RoleRequirement;
use crate::services::gate::route::RouteCategory;
use crate::services::gate::session::AuthDecision;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    PassThrough,
    /// Unauthenticated on a gated route. Carries a return URL.
    RedirectToLogin,
    /// Valid session on an auth-only page (login, register, ...).
    RedirectToHome,
    /// Authenticated, but the role requirement is not met. Logged.
    RedirectToForbidden,
}

/// Transition table, first match wins. `Unknown` is handled like `Protected` (fail closed).
pub fn decide(category: RouteCategory, auth: &AuthDecision, admin: &RoleRequirement) -> Action {
    match category {
        RouteCategory::Excluded | RouteCategory::Public => Action::PassThrough,

        RouteCategory::Auth => {
            if auth.has_valid_session() {
                Action::RedirectToHome
            } else {
                Action::PassThrough
            }
        }

        RouteCategory::Admin => {
            if !auth.has_valid_session() {
                Action::RedirectToLogin
            } else if !admin.is_met_by(&auth.roles) {
                Action::RedirectToForbidden
            } else {
                Action::PassThrough
            }
        }

        RouteCategory::Protected | RouteCategory::Unknown => {
            if auth.has_valid_session() {
                Action::PassThrough
            } else {
                Action::RedirectToLogin
            }
        }
    }
}
