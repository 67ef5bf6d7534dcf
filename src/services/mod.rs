/*
 * Responsibility
 * - Framework-light domain logic used by middleware and client guards
 */
pub mod auth;
pub mod gate;
pub mod nonce;
pub mod security_log;
