//! Edge authorization gate for a server-rendered web application.
//!
//! Every request is classified against configured route sets, its session
//! cookies are evaluated with an expiry safety buffer, and the outcome is a
//! pass-through or a 307 redirect (login with `returnUrl`, home, or forbidden).
//! The same decision table drives the client-side guards in [`client`].

pub mod api;
pub mod app;
pub mod client;
pub mod config;
pub mod middleware;
pub mod services;
pub mod state;
