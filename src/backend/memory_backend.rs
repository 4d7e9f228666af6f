//! In-memory backend for local development and tests.
//!
//! Audience counts and products are configured up front. Created broadcasts
//! are recorded and deduplicated by idempotency key, so a retried create
//! returns the original receipt.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::AdminSession;
use crate::broadcast::{
    AudienceCount, AudienceQuery, AudienceRole, BroadcastPayload, BroadcastReceipt,
    BroadcastStatus,
};
use crate::metrics::BackendMetrics;

use super::backend::{
    BackendError, BackendOperation, BackendResult, BroadcastBackend, BroadcastProduct,
    ProductQuery,
};

/// A broadcast accepted by the memory backend
#[derive(Debug, Clone)]
pub struct RecordedBroadcast {
    pub payload: BroadcastPayload,
    pub idempotency_key: Uuid,
    pub created_by: String,
    pub receipt: BroadcastReceipt,
}

#[derive(Default)]
pub struct MemoryBackend {
    counts: DashMap<AudienceRole, u64>,
    products: RwLock<Vec<BroadcastProduct>>,
    /// Keyed by idempotency key
    broadcasts: DashMap<Uuid, RecordedBroadcast>,
    /// Errors returned by the next calls of an operation, in order
    failures: DashMap<BackendOperation, VecDeque<BackendError>>,
    calls: DashMap<BackendOperation, u64>,
    delay_ms: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend seeded with plausible counts and a few products
    pub fn with_sample_data() -> Self {
        let mut backend = Self::new();
        backend.set_count(AudienceRole::Buyer, 12_480);
        backend.set_count(AudienceRole::Seller, 1_325);
        backend.set_count(AudienceRole::Rider, 412);
        backend.products.get_mut().extend([
            sample_product("prod-rice-50kg", "Long grain rice (50kg)", 6_850_000, "Grains"),
            sample_product("prod-palm-oil-25l", "Red palm oil (25L)", 3_200_000, "Oils"),
            sample_product("prod-yam-tuber", "Abuja yam tubers (bundle of 10)", 1_800_000, "Tubers"),
        ]);
        backend
    }

    pub fn set_count(&self, role: AudienceRole, count: u64) {
        self.counts.insert(role, count);
    }

    pub async fn add_product(&self, product: BroadcastProduct) {
        self.products.write().await.push(product);
    }

    /// Make the next call of `operation` fail with `error`
    pub fn fail_next(&self, operation: BackendOperation, error: BackendError) {
        self.failures.entry(operation).or_default().push_back(error);
    }

    /// Delay every call, to hold requests in flight
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn call_count(&self, operation: BackendOperation) -> u64 {
        self.calls.get(&operation).map(|c| *c).unwrap_or(0)
    }

    pub fn broadcasts(&self) -> Vec<RecordedBroadcast> {
        self.broadcasts.iter().map(|entry| entry.value().clone()).collect()
    }

    async fn enter(&self, operation: BackendOperation) -> BackendResult<()> {
        *self.calls.entry(operation).or_insert(0) += 1;

        let delay_ms = self.delay_ms.load(Ordering::SeqCst);
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        let failure = self
            .failures
            .get_mut(&operation)
            .and_then(|mut queue| queue.pop_front());
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn record(&self, operation: BackendOperation, start: Instant, ok: bool) {
        BackendMetrics::record_request(
            self.backend_type(),
            operation.as_str(),
            start.elapsed().as_secs_f64(),
            ok,
        );
    }
}

fn sample_product(id: &str, title: &str, price: i64, category: &str) -> BroadcastProduct {
    BroadcastProduct {
        id: id.to_string(),
        title: title.to_string(),
        price,
        images: vec![],
        category_name: Some(category.to_string()),
        quantity: Some(100),
    }
}

#[async_trait]
impl BroadcastBackend for MemoryBackend {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn audience_count(
        &self,
        _session: &AdminSession,
        query: &AudienceQuery,
    ) -> BackendResult<AudienceCount> {
        let start = Instant::now();
        let entered = self.enter(BackendOperation::AudienceCount).await;
        self.record(BackendOperation::AudienceCount, start, entered.is_ok());
        entered?;

        let mut count = AudienceCount::default();
        for role in &query.roles {
            let n = self.counts.get(role).map(|c| *c).unwrap_or(0);
            count.set(*role, n);
            count.total += n;
        }
        Ok(count)
    }

    async fn products_for_broadcast(
        &self,
        _session: &AdminSession,
        query: &ProductQuery,
    ) -> BackendResult<Vec<BroadcastProduct>> {
        let start = Instant::now();
        let entered = self.enter(BackendOperation::Products).await;
        self.record(BackendOperation::Products, start, entered.is_ok());
        entered?;

        let limit = query.limit.map_or(usize::MAX, |l| l as usize);
        let products = self.products.read().await;
        Ok(products
            .iter()
            .filter(|p| match &query.category {
                Some(category) => p
                    .category_name
                    .as_deref()
                    .is_some_and(|name| name.eq_ignore_ascii_case(category)),
                None => true,
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_broadcast(
        &self,
        session: &AdminSession,
        payload: &BroadcastPayload,
        idempotency_key: Uuid,
    ) -> BackendResult<BroadcastReceipt> {
        let start = Instant::now();
        let entered = self.enter(BackendOperation::CreateBroadcast).await;
        self.record(BackendOperation::CreateBroadcast, start, entered.is_ok());
        entered?;

        if let Some(existing) = self.broadcasts.get(&idempotency_key) {
            tracing::debug!(%idempotency_key, "Duplicate create, returning original receipt");
            return Ok(existing.receipt.clone());
        }

        let status = if payload.scheduling.send_now {
            BroadcastStatus::Sent
        } else {
            BroadcastStatus::Scheduled
        };
        let details = json!({
            "id": Uuid::new_v4().to_string(),
            "audience": payload.audience,
            "scheduledFor": payload.scheduling.scheduled_for,
        });
        let receipt = BroadcastReceipt {
            status,
            details: details.as_object().cloned().unwrap_or_default(),
        };

        self.broadcasts.insert(
            idempotency_key,
            RecordedBroadcast {
                payload: payload.clone(),
                idempotency_key,
                created_by: session.user_id().to_string(),
                receipt: receipt.clone(),
            },
        );

        Ok(receipt)
    }
}
