/*
 * Responsibility
 * - middleware public interface
 * - order (outer -> inner): security_headers::apply_static, http,
 *   security_headers::apply, gate
 */
pub mod gate;
pub mod http;
pub mod security_headers;
