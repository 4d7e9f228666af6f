//! Session store and the operations the HTTP layer exposes.
//!
//! A session's mutex is never held across a backend call. Calls that need
//! the backend take what they need under the lock, release it, await the
//! backend, then re-lock to apply the result.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::auth::AdminSession;
use crate::backend::{BackendError, BroadcastBackend, BroadcastProduct, ProductQuery};
use crate::broadcast::{
    AudienceQuery, BroadcastReceipt, BroadcastStatus, DraftUpdate, SendTicket, WizardError,
};
use crate::config::ComposerConfig;
use crate::metrics::{BroadcastMetrics, ComposerMetrics};

use super::session::{ComposerSession, ComposerSnapshot};

#[derive(Debug, Error)]
pub enum ComposerError {
    #[error("Composer session {0} not found")]
    NotFound(Uuid),

    #[error("Composer session belongs to another admin")]
    NotOwner,

    #[error(transparent)]
    Wizard(#[from] WizardError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Broadcast send was interrupted")]
    Interrupted,
}

pub type ComposerResult<T> = Result<T, ComposerError>;

/// Result of a successful confirmation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOutcome {
    pub receipt: BroadcastReceipt,
    /// The session after reset, ready for a new broadcast
    pub session: ComposerSnapshot,
}

pub struct ComposerService {
    sessions: DashMap<Uuid, Arc<Mutex<ComposerSession>>>,
    backend: Arc<dyn BroadcastBackend>,
    config: ComposerConfig,
}

impl ComposerService {
    pub fn new(backend: Arc<dyn BroadcastBackend>, config: ComposerConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            backend,
            config,
        }
    }

    pub fn backend(&self) -> &Arc<dyn BroadcastBackend> {
        &self.backend
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn create(&self, admin: &AdminSession) -> ComposerSnapshot {
        let session = ComposerSession::new(admin.user_id());
        let id = session.id;
        let snapshot = session.snapshot(Utc::now());

        self.sessions.insert(id, Arc::new(Mutex::new(session)));
        ComposerMetrics::set_active_sessions(self.sessions.len());

        tracing::info!(session_id = %id, user_id = %admin.user_id(), "Composer session created");
        snapshot
    }

    pub async fn snapshot(&self, admin: &AdminSession, id: Uuid) -> ComposerResult<ComposerSnapshot> {
        let entry = self.lookup(id)?;
        let session = Self::lock_owned(&entry, admin).await?;
        Ok(session.snapshot(Utc::now()))
    }

    /// Drop the session and its draft (the admin navigated away)
    pub async fn discard(&self, admin: &AdminSession, id: Uuid) -> ComposerResult<()> {
        let entry = self.lookup(id)?;
        {
            let session = Self::lock_owned(&entry, admin).await?;
            if session.is_sending() {
                return Err(WizardError::SendInFlight.into());
            }
        }

        self.sessions.remove(&id);
        ComposerMetrics::set_active_sessions(self.sessions.len());
        tracing::info!(session_id = %id, "Composer session discarded");
        Ok(())
    }

    /// Apply a partial draft update. A change of audience or filters
    /// invalidates the count and requests a fresh one.
    pub async fn update_draft(
        &self,
        admin: &AdminSession,
        id: Uuid,
        update: DraftUpdate,
    ) -> ComposerResult<ComposerSnapshot> {
        let entry = self.lookup(id)?;
        let audience_changed = {
            let mut session = Self::lock_owned(&entry, admin).await?;
            let changed = session.wizard.update_draft(update)?;
            if changed {
                session.audience_count.invalidate();
            }
            changed
        };

        if audience_changed {
            return self.refresh_audience_count(admin, id).await;
        }
        self.snapshot(admin, id).await
    }

    pub async fn next(&self, admin: &AdminSession, id: Uuid) -> ComposerResult<ComposerSnapshot> {
        let entry = self.lookup(id)?;
        let mut session = Self::lock_owned(&entry, admin).await?;
        let now = Utc::now();

        let result = session.wizard.next(now);
        ComposerMetrics::record_transition("next", result.is_ok());
        let step = result?;

        tracing::debug!(session_id = %id, step = %step, "Wizard advanced");
        Ok(session.snapshot(now))
    }

    pub async fn previous(&self, admin: &AdminSession, id: Uuid) -> ComposerResult<ComposerSnapshot> {
        let entry = self.lookup(id)?;
        let mut session = Self::lock_owned(&entry, admin).await?;

        let result = session.wizard.previous();
        ComposerMetrics::record_transition("previous", result.is_ok());
        let step = result?;

        tracing::debug!(session_id = %id, step = %step, "Wizard moved back");
        Ok(session.snapshot(Utc::now()))
    }

    /// Ask the backend for the live audience count.
    ///
    /// Last request wins: a response that arrives after a newer request or
    /// a filter change is dropped. Failures leave the count unavailable
    /// without failing the call.
    pub async fn refresh_audience_count(
        &self,
        admin: &AdminSession,
        id: Uuid,
    ) -> ComposerResult<ComposerSnapshot> {
        let entry = self.lookup(id)?;
        let ticket = {
            let mut session = Self::lock_owned(&entry, admin).await?;
            let draft = session.wizard.draft();
            if draft.audience.is_empty() {
                session.audience_count.invalidate();
                return Ok(session.snapshot(Utc::now()));
            }
            let query = AudienceQuery::new(&draft.audience, &draft.audience_filters);
            session.audience_count.begin(query)
        };

        let result = self
            .backend
            .audience_count(admin, &ticket.query)
            .await
            .map_err(|e| {
                tracing::warn!(session_id = %id, error = %e, "Audience count unavailable");
                e.user_message()
            });

        let mut session = entry.lock().await;
        if !session.audience_count.complete(ticket, result) {
            ComposerMetrics::record_stale_count();
            tracing::debug!(session_id = %id, "Discarded stale audience count");
        }
        Ok(session.snapshot(Utc::now()))
    }

    /// Products the admin can attach to the draft
    pub async fn products(
        &self,
        admin: &AdminSession,
        id: Uuid,
        mut query: ProductQuery,
    ) -> ComposerResult<Vec<BroadcastProduct>> {
        let entry = self.lookup(id)?;
        {
            let session = Self::lock_owned(&entry, admin).await?;
            if query.approved_within_days.is_none() {
                query.approved_within_days = session.wizard.draft().auto_attach_days;
            }
        }
        query.limit.get_or_insert(self.config.default_product_limit);

        Ok(self.backend.products_for_broadcast(admin, &query).await?)
    }

    /// Validate the full draft and open the review gate
    pub async fn submit(&self, admin: &AdminSession, id: Uuid) -> ComposerResult<ComposerSnapshot> {
        let entry = self.lookup(id)?;
        let mut session = Self::lock_owned(&entry, admin).await?;
        let now = Utc::now();

        let count = session.audience_count.count().cloned();
        let result = session
            .wizard
            .submit(now, count.as_ref(), self.config.email_cost_per_message_kobo)
            .map(|_| ());
        ComposerMetrics::record_validation(result.is_ok());
        result?;

        tracing::info!(session_id = %id, "Broadcast submitted for review");
        Ok(session.snapshot(now))
    }

    pub async fn acknowledge(
        &self,
        admin: &AdminSession,
        id: Uuid,
        acknowledged: bool,
    ) -> ComposerResult<ComposerSnapshot> {
        let entry = self.lookup(id)?;
        let mut session = Self::lock_owned(&entry, admin).await?;
        session.wizard.acknowledge(acknowledged)?;
        Ok(session.snapshot(Utc::now()))
    }

    /// Send the reviewed broadcast. Exactly one create call is made per
    /// confirmation; a concurrent confirmation is rejected while it runs.
    ///
    /// The create call and the state update run on their own task, so a
    /// dropped request still settles the gate.
    pub async fn confirm(
        &self,
        admin: &AdminSession,
        id: Uuid,
        internal_note: Option<String>,
    ) -> ComposerResult<ConfirmOutcome> {
        let entry = self.lookup(id)?;
        let ticket = {
            let mut session = Self::lock_owned(&entry, admin).await?;
            session.wizard.begin_send(internal_note)?
        };

        tracing::info!(
            session_id = %id,
            idempotency_key = %ticket.idempotency_key,
            audience = ?ticket.payload.audience,
            "Sending broadcast"
        );

        let send = tokio::spawn(send_and_apply(
            self.backend.clone(),
            admin.clone(),
            entry.clone(),
            id,
            ticket,
        ));

        match send.await {
            Ok(outcome) => outcome,
            Err(e) => {
                BroadcastMetrics::record_failed();
                tracing::error!(session_id = %id, error = %e, "Broadcast send task aborted");

                let mut session = entry.lock().await;
                if session.is_sending() {
                    session.wizard.fail_send("Send was interrupted");
                }
                Err(ComposerError::Interrupted)
            }
        }
    }

    /// Remove sessions idle longer than the configured timeout. Sessions that
    /// are locked or mid-send are kept.
    pub fn cleanup_idle(&self) -> usize {
        let now = Utc::now();
        let timeout = self.config.idle_timeout_seconds;
        let mut removed = 0;

        self.sessions.retain(|id, session| match session.try_lock() {
            Ok(guard) if !guard.is_sending() && guard.is_idle(now, timeout) => {
                tracing::debug!(session_id = %id, "Expiring idle composer session");
                removed += 1;
                false
            }
            _ => true,
        });

        if removed > 0 {
            ComposerMetrics::record_expired(removed as u64);
        }
        ComposerMetrics::set_active_sessions(self.sessions.len());
        removed
    }

    fn lookup(&self, id: Uuid) -> ComposerResult<Arc<Mutex<ComposerSession>>> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(ComposerError::NotFound(id))
    }

    async fn lock_owned<'a>(
        entry: &'a Mutex<ComposerSession>,
        admin: &AdminSession,
    ) -> ComposerResult<MutexGuard<'a, ComposerSession>> {
        let mut session = entry.lock().await;
        if session.owner_id() != admin.user_id() {
            return Err(ComposerError::NotOwner);
        }
        session.touch();
        Ok(session)
    }
}

async fn send_and_apply(
    backend: Arc<dyn BroadcastBackend>,
    admin: AdminSession,
    entry: Arc<Mutex<ComposerSession>>,
    id: Uuid,
    ticket: SendTicket,
) -> ComposerResult<ConfirmOutcome> {
    let result = backend
        .create_broadcast(&admin, &ticket.payload, ticket.idempotency_key)
        .await;

    let mut session = entry.lock().await;
    session.touch();
    match result {
        Ok(receipt) => {
            match receipt.status {
                BroadcastStatus::Sent => BroadcastMetrics::record_sent(),
                BroadcastStatus::Scheduled => BroadcastMetrics::record_scheduled(),
            }
            tracing::info!(
                session_id = %id,
                broadcast_id = ?receipt.id(),
                status = ?receipt.status,
                "Broadcast accepted"
            );

            session.finish_send(receipt.clone());
            Ok(ConfirmOutcome {
                receipt,
                session: session.snapshot(Utc::now()),
            })
        }
        Err(e) => {
            BroadcastMetrics::record_failed();
            tracing::error!(session_id = %id, error = %e, "Broadcast send failed");

            session.wizard.fail_send(e.user_message());
            Err(e.into())
        }
    }
}
