//! Backend trait and shared types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::AdminSession;
use crate::broadcast::{AudienceCount, AudienceQuery, BroadcastPayload, BroadcastReceipt};

/// Errors returned by backend calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Request timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx response; `message` is the server's own message when it sent one
    #[error("Rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Invalid backend configuration: {0}")]
    Config(String),
}

impl BackendError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout)
    }

    /// Whether an idempotent read may be attempted again
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::Timeout | BackendError::Transport(_) => true,
            BackendError::Rejected { status, .. } => *status >= 500 || *status == 429,
            BackendError::Decode(_) | BackendError::Config(_) => false,
        }
    }

    /// Message safe to show to the admin
    pub fn user_message(&self) -> String {
        match self {
            BackendError::Timeout => "The broadcast service did not respond in time".to_string(),
            BackendError::Transport(_) => "Broadcast service unavailable".to_string(),
            BackendError::Rejected { message, .. } => message.clone(),
            BackendError::Decode(_) => "Unexpected response from the broadcast service".to_string(),
            BackendError::Config(_) => "Broadcast service is misconfigured".to_string(),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Backend call kinds, used for metrics labels and test fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    AudienceCount,
    Products,
    CreateBroadcast,
}

impl BackendOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendOperation::AudienceCount => "audience_count",
            BackendOperation::Products => "products",
            BackendOperation::CreateBroadcast => "create_broadcast",
        }
    }
}

/// Product lookup for attaching items to a buyer broadcast
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Only products approved within this many days
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_within_days: Option<u32>,
}

/// Product as returned by the products-for-broadcast lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastProduct {
    pub id: String,
    pub title: String,
    /// Price in kobo
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
}

/// Operations the composer needs from the Carryofy backend.
///
/// Every call is made on behalf of an authenticated admin whose token is
/// forwarded as the bearer credential.
#[async_trait]
pub trait BroadcastBackend: Send + Sync {
    /// Backend identifier for logs and metrics
    fn backend_type(&self) -> &'static str;

    /// Resolve the head-count for the given roles and filters
    async fn audience_count(
        &self,
        session: &AdminSession,
        query: &AudienceQuery,
    ) -> BackendResult<AudienceCount>;

    /// Products eligible for attaching to a broadcast
    async fn products_for_broadcast(
        &self,
        session: &AdminSession,
        query: &ProductQuery,
    ) -> BackendResult<Vec<BroadcastProduct>>;

    /// Create (send or schedule) a broadcast.
    ///
    /// Never retried automatically. `idempotency_key` is stable across a
    /// user-initiated retry of the same confirmation.
    async fn create_broadcast(
        &self,
        session: &AdminSession,
        payload: &BroadcastPayload,
        idempotency_key: Uuid,
    ) -> BackendResult<BroadcastReceipt>;
}
