/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 * - Cheap to clone: the gate is immutable after startup and sits behind an Arc
 */
use std::sync::Arc;

use crate::services::gate::Gate;

#[derive(Clone, Debug)]
pub struct AppState {
    pub gate: Arc<Gate>,
}

impl AppState {
    pub fn new(gate: Arc<Gate>) -> Self {
        Self { gate }
    }
}
