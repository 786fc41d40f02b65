use std::sync::Arc;

use bmd_core::{BackendFactory, Backends, Identity};

#[derive(Clone)]
pub struct AppState {
    pub backends: Arc<dyn BackendFactory>,
}

impl AppState {
    pub fn new(backends: Arc<dyn BackendFactory>) -> Self {
        Self { backends }
    }

    /// Collaborators bound to the caller's credentials, built for this request only.
    pub fn connect(&self, identity: &Identity) -> Backends {
        self.backends.connect(identity)
    }
}
