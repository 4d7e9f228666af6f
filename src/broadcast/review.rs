//! Review/confirmation gate.
//!
//! A gate is opened once the full draft validates. It renders a summary of
//! what is about to be sent and only releases the payload after an explicit
//! acknowledgment. While a send is in flight the gate refuses a second one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::audience::{AudienceCount, AudienceRole};
use super::types::{BroadcastPayload, BroadcastType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("Confirm that you have reviewed the broadcast before sending")]
    NotAcknowledged,

    #[error("This broadcast is already being sent")]
    AlreadySending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// Waiting for acknowledgment and confirmation
    Open,
    /// Create call in flight
    Sending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRecipients {
    pub role: AudienceRole,
    /// `None` when the audience count is unavailable
    pub count: Option<u64>,
}

/// Non-reversible summary shown before sending
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub broadcast_type: BroadcastType,
    pub type_label: String,
    pub recipients: Vec<RoleRecipients>,
    pub total_recipients: Option<u64>,
    pub channels: Vec<String>,
    pub estimated_email_cost_kobo: Option<u64>,
    pub estimated_email_cost: Option<String>,
    pub subject: Option<String>,
    pub attached_products: usize,
    pub auto_attach_days: Option<u32>,
    pub send_now: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub users_per_minute: Option<i64>,
    pub warnings: Vec<String>,
}

impl ReviewSummary {
    /// Build a summary for `payload`.
    ///
    /// Email cost is `total recipients x email_cost_per_message_kobo` and is
    /// unknown while the audience count is unavailable.
    pub fn build(
        payload: &BroadcastPayload,
        count: Option<&AudienceCount>,
        warnings: Vec<String>,
        email_cost_per_message_kobo: u64,
    ) -> Self {
        let recipients = payload
            .audience
            .iter()
            .map(|role| RoleRecipients {
                role: *role,
                count: count.and_then(|c| c.for_role(*role)),
            })
            .collect();
        let total_recipients = count.map(|c| c.total);

        let estimated_email_cost_kobo = if payload.channels.email {
            total_recipients.map(|total| total.saturating_mul(email_cost_per_message_kobo))
        } else {
            Some(0)
        };

        Self {
            broadcast_type: payload.broadcast_type,
            type_label: payload.broadcast_type.label().to_string(),
            recipients,
            total_recipients,
            channels: payload.channels.labels(),
            estimated_email_cost_kobo,
            estimated_email_cost: estimated_email_cost_kobo.map(format_naira),
            subject: payload.subject.clone(),
            attached_products: payload.product_ids.len(),
            auto_attach_days: payload.auto_attach_days,
            send_now: payload.scheduling.send_now,
            scheduled_for: payload.scheduling.scheduled_for,
            timezone: payload.scheduling.timezone.clone(),
            users_per_minute: payload.rate_limit.users_per_minute,
            warnings,
        }
    }
}

/// Format an amount in kobo as Naira, e.g. `₦1,250.50`
pub fn format_naira(kobo: u64) -> String {
    let naira = (kobo / 100).to_string();
    let mut grouped = String::with_capacity(naira.len() + naira.len() / 3);
    for (i, digit) in naira.chars().enumerate() {
        if i > 0 && (naira.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    format!("₦{}.{:02}", grouped, kobo % 100)
}

/// Everything needed to perform one create call
#[derive(Debug, Clone)]
pub struct SendTicket {
    pub payload: BroadcastPayload,
    pub idempotency_key: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewGate {
    #[serde(skip)]
    payload: BroadcastPayload,
    summary: ReviewSummary,
    acknowledged: bool,
    state: GateState,
    /// Stable for the lifetime of the gate so a retry after failure reuses it
    idempotency_key: Uuid,
    last_error: Option<String>,
    opened_at: DateTime<Utc>,
}

impl ReviewGate {
    pub fn open(payload: BroadcastPayload, summary: ReviewSummary) -> Self {
        Self {
            payload,
            summary,
            acknowledged: false,
            state: GateState::Open,
            idempotency_key: Uuid::new_v4(),
            last_error: None,
            opened_at: Utc::now(),
        }
    }

    pub fn payload(&self) -> &BroadcastPayload {
        &self.payload
    }

    pub fn summary(&self) -> &ReviewSummary {
        &self.summary
    }

    pub fn refresh_summary(&mut self, summary: ReviewSummary) {
        self.summary = summary;
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_sending(&self) -> bool {
        self.state == GateState::Sending
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged
    }

    pub fn idempotency_key(&self) -> Uuid {
        self.idempotency_key
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn acknowledge(&mut self, acknowledged: bool) -> Result<(), ReviewError> {
        if self.is_sending() {
            return Err(ReviewError::AlreadySending);
        }
        self.acknowledged = acknowledged;
        Ok(())
    }

    /// Move to `Sending` and hand out the payload for the create call.
    pub fn begin_send(&mut self, internal_note: Option<String>) -> Result<SendTicket, ReviewError> {
        if self.is_sending() {
            return Err(ReviewError::AlreadySending);
        }
        if !self.acknowledged {
            return Err(ReviewError::NotAcknowledged);
        }

        if let Some(note) = internal_note {
            let note = note.trim();
            self.payload.internal_note = (!note.is_empty()).then(|| note.to_string());
        }

        self.state = GateState::Sending;
        self.last_error = None;

        Ok(SendTicket {
            payload: self.payload.clone(),
            idempotency_key: self.idempotency_key,
        })
    }

    /// Reopen after a failed create call, keeping the draft and key for retry.
    pub fn fail_send(&mut self, message: impl Into<String>) {
        self.state = GateState::Open;
        self.last_error = Some(message.into());
    }
}
