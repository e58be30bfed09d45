use std::sync::Arc;

use common::prelude::Hub;

/// Shared state for the write surface.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
}

impl AppState {
    pub fn new(hub: Hub) -> Self {
        Self { hub: Arc::new(hub) }
    }
}
