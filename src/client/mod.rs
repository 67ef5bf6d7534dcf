/*
 * Responsibility
 * - Client-side (post-hydration) counterpart of the edge gate
 * - Hydration-aware auth store + route guards sharing the edge decision table
 */
pub mod guard;
pub mod store;

pub use guard::{GuardView, Location, Navigator, RouteGuard};
pub use store::{AuthSnapshot, AuthStore, UserIdentity};
