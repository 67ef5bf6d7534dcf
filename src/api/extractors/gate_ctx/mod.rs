/*!
 * Gate context extractor
 *
 * Responsibility:
 * - Hand the gate's verdict for this request (GateCtx) to handlers
 * - axum-specific code lives in core; the type lives in types
 *
 * Public API:
 * - GateCtx
 * - GateCtxExtractor
 */

mod core;
mod types;

pub use core::GateCtxExtractor;
pub use types::GateCtx;
