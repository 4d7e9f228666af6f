use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::broadcast::{
    AudienceCountState, AudienceCountTracker, BroadcastDraft, BroadcastReceipt, BroadcastWizard,
    ReviewGate, ValidationReport, WizardStep,
};

/// State of one composition workflow
#[derive(Debug)]
pub struct ComposerSession {
    pub id: Uuid,
    owner_id: String,
    pub wizard: BroadcastWizard,
    pub audience_count: AudienceCountTracker,
    last_receipt: Option<BroadcastReceipt>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl ComposerSession {
    pub fn new(owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            wizard: BroadcastWizard::new(),
            audience_count: AudienceCountTracker::new(),
            last_receipt: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn is_idle(&self, now: DateTime<Utc>, idle_timeout_seconds: u64) -> bool {
        let timeout = i64::try_from(idle_timeout_seconds).unwrap_or(i64::MAX);
        now.signed_duration_since(self.last_activity).num_seconds() >= timeout
    }

    pub fn is_sending(&self) -> bool {
        self.wizard.is_sending()
    }

    /// Record a successful send and start over with an empty draft
    pub fn finish_send(&mut self, receipt: BroadcastReceipt) {
        self.wizard.complete_send();
        self.audience_count.invalidate();
        self.last_receipt = Some(receipt);
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> ComposerSnapshot {
        let step = self.wizard.step();
        ComposerSnapshot {
            id: self.id,
            step,
            step_number: step.number(),
            step_title: step.title(),
            draft: self.wizard.draft().clone(),
            validation: self.wizard.current_report(now),
            audience_count: self.audience_count.state().clone(),
            review: self.wizard.gate().cloned(),
            sending: self.is_sending(),
            last_receipt: self.last_receipt.clone(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}

/// Serializable view of a session returned by every composer endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComposerSnapshot {
    pub id: Uuid,
    pub step: WizardStep,
    pub step_number: u8,
    pub step_title: &'static str,
    pub draft: BroadcastDraft,
    /// Validation of the current step
    pub validation: ValidationReport,
    pub audience_count: AudienceCountState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewGate>,
    pub sending: bool,
    /// Receipt of the last successful send from this session
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_receipt: Option<BroadcastReceipt>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}
