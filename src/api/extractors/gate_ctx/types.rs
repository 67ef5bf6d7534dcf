/*
 * Responsibility
 * - What a handler sees of the gate: route category + session evaluation
 * - Inserted by the gate middleware on pass-through; absent for excluded paths
 */
use crate::services::gate::{AuthDecision, RouteCategory};

#[derive(Debug, Clone)]
pub struct GateCtx {
    pub category: RouteCategory,
    pub auth: AuthDecision,
}
