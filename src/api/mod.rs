/*
 * Responsibility
 * - Page-facing surface behind the gate: routes, handlers, extractors
 */
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
