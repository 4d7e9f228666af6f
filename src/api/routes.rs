use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::server::AppState;

use super::composer::{
    acknowledge, confirm, create_composer, discard_composer, get_composer, list_products,
    next_step, previous_step, refresh_audience_count, submit, update_draft,
};
use super::health::health;
use super::metrics::prometheus_metrics;
use super::tools::{cta_check, spam_check, validate_draft};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                // Stateless checks
                .route("/broadcasts/spam-check", post(spam_check))
                .route("/broadcasts/cta-check", post(cta_check))
                .route("/broadcasts/validate", post(validate_draft))
                // Composer sessions
                .route("/composer", post(create_composer))
                .route("/composer/{id}", get(get_composer).delete(discard_composer))
                .route("/composer/{id}/draft", patch(update_draft))
                .route("/composer/{id}/next", post(next_step))
                .route("/composer/{id}/previous", post(previous_step))
                .route("/composer/{id}/audience-count", post(refresh_audience_count))
                .route("/composer/{id}/products", get(list_products))
                .route("/composer/{id}/submit", post(submit))
                .route("/composer/{id}/acknowledge", post(acknowledge))
                .route("/composer/{id}/confirm", post(confirm)),
        )
}
