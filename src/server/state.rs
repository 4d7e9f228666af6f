use std::sync::Arc;
use std::time::Instant;

use crate::auth::JwtValidator;
use crate::backend::{create_broadcast_backend, BackendResult, BroadcastBackend};
use crate::composer::ComposerService;
use crate::config::Settings;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub composer: Arc<ComposerService>,
    pub start_time: Instant,
}

impl AppState {
    /// Build state with the backend selected by `settings.backend.kind`
    pub fn new(settings: Settings) -> BackendResult<Self> {
        let backend = create_broadcast_backend(&settings.backend)?;
        Ok(Self::with_backend(settings, backend))
    }

    pub fn with_backend(settings: Settings, backend: Arc<dyn BroadcastBackend>) -> Self {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));
        let composer = Arc::new(ComposerService::new(backend, settings.composer.clone()));

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            composer,
            start_time: Instant::now(),
        }
    }
}
