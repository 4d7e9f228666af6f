//! API layer - HTTP endpoint handlers organized by domain.

mod composer;
mod health;
mod metrics;
mod routes;
mod tools;

pub use composer::{
    acknowledge, confirm, create_composer, discard_composer, get_composer, list_products,
    next_step, previous_step, refresh_audience_count, submit, update_draft,
};
pub use health::health;
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
pub use tools::{cta_check, spam_check, validate_draft};
