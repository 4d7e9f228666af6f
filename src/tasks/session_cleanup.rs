use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::composer::ComposerService;
use crate::config::ComposerConfig;

/// Background task that expires idle composer sessions
pub struct SessionCleanupTask {
    config: ComposerConfig,
    composer: Arc<ComposerService>,
    shutdown: broadcast::Receiver<()>,
}

impl SessionCleanupTask {
    pub fn new(
        config: ComposerConfig,
        composer: Arc<ComposerService>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            composer,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let cleanup_interval = Duration::from_secs(self.config.cleanup_interval_seconds.max(1));
        let mut cleanup_timer = tokio::time::interval(cleanup_interval);

        // Skip immediate first tick
        cleanup_timer.tick().await;

        tracing::info!(
            cleanup_interval_secs = self.config.cleanup_interval_seconds,
            idle_timeout_secs = self.config.idle_timeout_seconds,
            "Session cleanup task started"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("Session cleanup task received shutdown signal");
                    break;
                }
                _ = cleanup_timer.tick() => {
                    let removed = self.composer.cleanup_idle();
                    if removed > 0 {
                        tracing::info!(
                            removed,
                            remaining = self.composer.session_count(),
                            "Expired idle composer sessions"
                        );
                    }
                }
            }
        }

        tracing::info!("Session cleanup task stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AdminSession;
    use crate::backend::MemoryBackend;

    #[tokio::test]
    async fn test_task_expires_sessions_and_stops_on_shutdown() {
        let config = ComposerConfig {
            idle_timeout_seconds: 0,
            cleanup_interval_seconds: 1,
            ..ComposerConfig::default()
        };
        let composer = Arc::new(ComposerService::new(
            Arc::new(MemoryBackend::new()),
            config.clone(),
        ));
        composer.create(&AdminSession::new("admin-1", vec![], "token"));

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(SessionCleanupTask::new(config, composer.clone(), shutdown_rx).run());

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(composer.session_count(), 0);

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
