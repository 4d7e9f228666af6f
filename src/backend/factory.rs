//! Backend factory

use std::sync::Arc;

use crate::config::BackendConfig;

use super::backend::{BackendResult, BroadcastBackend};
use super::http_backend::HttpBackend;
use super::memory_backend::MemoryBackend;

/// Create a backend based on configuration.
///
/// - `"memory"`: a `MemoryBackend` seeded with sample data
/// - `"http"` (default): an `HttpBackend` against `base_url`
pub fn create_broadcast_backend(config: &BackendConfig) -> BackendResult<Arc<dyn BroadcastBackend>> {
    match config.kind.as_str() {
        "memory" => {
            tracing::info!(backend = "memory", "Creating memory broadcast backend");
            Ok(Arc::new(MemoryBackend::with_sample_data()))
        }
        other => {
            if other != "http" {
                tracing::warn!(kind = %other, "Unknown backend kind, falling back to http");
            }
            tracing::info!(
                backend = "http",
                base_url = %config.base_url,
                read_timeout_ms = config.read_timeout_ms,
                create_timeout_ms = config.create_timeout_ms,
                "Creating HTTP broadcast backend"
            );
            Ok(Arc::new(HttpBackend::new(config)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selects_backend() {
        let memory = create_broadcast_backend(&BackendConfig {
            kind: "memory".to_string(),
            ..BackendConfig::default()
        })
        .unwrap();
        assert_eq!(memory.backend_type(), "memory");

        let http = create_broadcast_backend(&BackendConfig::default()).unwrap();
        assert_eq!(http.backend_type(), "http");
    }
}
