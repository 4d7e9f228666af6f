//! Backend implementation over the Carryofy REST API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AdminSession;
use crate::broadcast::{AudienceCount, AudienceQuery, AudienceRole, BroadcastPayload, BroadcastReceipt};
use crate::config::BackendConfig;
use crate::metrics::BackendMetrics;

use super::backend::{
    BackendError, BackendOperation, BackendResult, BroadcastBackend, BroadcastProduct,
    ProductQuery,
};
use super::backoff::RetryPolicy;

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Products come back either as a bare array or wrapped in `{ "data": [...] }`
#[derive(Deserialize)]
#[serde(untagged)]
enum ProductsResponse {
    List(Vec<BroadcastProduct>),
    Envelope { data: Vec<BroadcastProduct> },
}

impl ProductsResponse {
    fn into_products(self) -> Vec<BroadcastProduct> {
        match self {
            ProductsResponse::List(products) => products,
            ProductsResponse::Envelope { data } => data,
        }
    }
}

/// Server message in an error body: `{ message: "..." | ["..."] }` or
/// `{ error: "..." | { message: "..." } }`
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorMessage {
    Single(String),
    Many(Vec<String>),
    Nested { message: String },
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<ErrorMessage>,
    error: Option<ErrorMessage>,
}

impl ErrorMessage {
    fn into_text(self) -> String {
        match self {
            ErrorMessage::Single(message) | ErrorMessage::Nested { message } => message,
            ErrorMessage::Many(messages) => messages.join("; "),
        }
    }
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
    read_timeout: Duration,
    create_timeout: Duration,
    retry: RetryPolicy,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> BackendResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("carryofy-broadcast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            create_timeout: Duration::from_millis(config.create_timeout_ms),
            retry: RetryPolicy::from_config(config),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_audience_count(
        &self,
        session: &AdminSession,
        query: &AudienceQuery,
    ) -> BackendResult<AudienceCount> {
        let mut params = vec![("roles", query.roles_param())];
        if !query.filters.is_empty() {
            let filters = serde_json::to_string(&query.filters)
                .map_err(|e| BackendError::Decode(e.to_string()))?;
            params.push(("filters", filters));
        }

        let request = self
            .client
            .get(self.url("/admin/broadcasts/audience-count"))
            .query(&params)
            .timeout(self.read_timeout);

        let mut count: AudienceCount = self
            .send(BackendOperation::AudienceCount, session, request)
            .await?;

        if count.total == 0 {
            count.total = AudienceRole::ALL
                .iter()
                .filter_map(|role| count.for_role(*role))
                .sum();
        }
        Ok(count)
    }

    async fn fetch_products(
        &self,
        session: &AdminSession,
        query: &ProductQuery,
    ) -> BackendResult<Vec<BroadcastProduct>> {
        let request = self
            .client
            .get(self.url("/admin/broadcasts/products"))
            .query(query)
            .timeout(self.read_timeout);

        let response: ProductsResponse = self.send(BackendOperation::Products, session, request).await?;
        Ok(response.into_products())
    }

    /// Authenticate, send, record metrics and decode a JSON body
    async fn send<T: DeserializeOwned>(
        &self,
        operation: BackendOperation,
        session: &AdminSession,
        request: RequestBuilder,
    ) -> BackendResult<T> {
        let start = Instant::now();
        let result = self.execute(session, request).await;
        let elapsed = start.elapsed();

        BackendMetrics::record_request(
            self.backend_type(),
            operation.as_str(),
            elapsed.as_secs_f64(),
            result.is_ok(),
        );

        match &result {
            Ok(_) => tracing::debug!(
                operation = operation.as_str(),
                latency_ms = elapsed.as_millis() as u64,
                "Backend call succeeded"
            ),
            Err(e) => tracing::warn!(
                operation = operation.as_str(),
                latency_ms = elapsed.as_millis() as u64,
                error = %e,
                "Backend call failed"
            ),
        }

        result
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        session: &AdminSession,
        request: RequestBuilder,
    ) -> BackendResult<T> {
        let response = request.bearer_auth(session.bearer_token()).send().await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::Decode(e.to_string())
            }
        })
    }
}

/// Turn a non-2xx response into an error carrying the server's message
async fn rejection(response: Response) -> BackendError {
    let status = response.status();
    let fallback = status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string();

    let message = match response.text().await {
        Ok(text) => extract_error_message(&text).unwrap_or(fallback),
        Err(_) => fallback,
    };

    BackendError::Rejected {
        status: status.as_u16(),
        message,
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    [parsed.message, parsed.error]
        .into_iter()
        .flatten()
        .map(ErrorMessage::into_text)
        .find(|m| !m.trim().is_empty())
}

#[async_trait]
impl BroadcastBackend for HttpBackend {
    fn backend_type(&self) -> &'static str {
        "http"
    }

    async fn audience_count(
        &self,
        session: &AdminSession,
        query: &AudienceQuery,
    ) -> BackendResult<AudienceCount> {
        self.retry
            .run(BackendOperation::AudienceCount.as_str(), move || {
                self.fetch_audience_count(session, query)
            })
            .await
    }

    async fn products_for_broadcast(
        &self,
        session: &AdminSession,
        query: &ProductQuery,
    ) -> BackendResult<Vec<BroadcastProduct>> {
        self.retry
            .run(BackendOperation::Products.as_str(), move || {
                self.fetch_products(session, query)
            })
            .await
    }

    async fn create_broadcast(
        &self,
        session: &AdminSession,
        payload: &BroadcastPayload,
        idempotency_key: Uuid,
    ) -> BackendResult<BroadcastReceipt> {
        let request = self
            .client
            .post(self.url("/admin/broadcasts"))
            .header(IDEMPOTENCY_KEY_HEADER, idempotency_key.to_string())
            .json(payload)
            .timeout(self.create_timeout);

        self.send(BackendOperation::CreateBroadcast, session, request)
            .await
    }
}
