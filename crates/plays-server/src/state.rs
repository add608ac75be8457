use std::sync::Arc;

use plays_engine::Engine;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
}

impl AppState {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}
