//! Five-step composer state machine.
//!
//! `Audience -> Targeting -> Channels -> Message -> Review`, linear with no
//! skipping. Forward moves are gated on the current step's validation;
//! backward moves never are.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::audience::AudienceCount;
use super::review::{ReviewError, ReviewGate, ReviewSummary, SendTicket};
use super::types::{BroadcastDraft, DraftUpdate};
use super::validation::{validate_broadcast_payload, validate_step, ValidationReport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    Audience,
    Targeting,
    Channels,
    Message,
    Review,
}

impl WizardStep {
    /// 1-based position shown in the UI
    pub fn number(&self) -> u8 {
        match self {
            WizardStep::Audience => 1,
            WizardStep::Targeting => 2,
            WizardStep::Channels => 3,
            WizardStep::Message => 4,
            WizardStep::Review => 5,
        }
    }

    pub fn next(&self) -> Option<WizardStep> {
        match self {
            WizardStep::Audience => Some(WizardStep::Targeting),
            WizardStep::Targeting => Some(WizardStep::Channels),
            WizardStep::Channels => Some(WizardStep::Message),
            WizardStep::Message => Some(WizardStep::Review),
            WizardStep::Review => None,
        }
    }

    pub fn previous(&self) -> Option<WizardStep> {
        match self {
            WizardStep::Audience => None,
            WizardStep::Targeting => Some(WizardStep::Audience),
            WizardStep::Channels => Some(WizardStep::Targeting),
            WizardStep::Message => Some(WizardStep::Channels),
            WizardStep::Review => Some(WizardStep::Message),
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::Audience => "Audience",
            WizardStep::Targeting => "Targeting",
            WizardStep::Channels => "Channels",
            WizardStep::Message => "Message",
            WizardStep::Review => "Review",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title(), self.number())
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    /// The step's validation failed; the message is its first error
    #[error("{}", .report.first_error().unwrap_or("Step is incomplete"))]
    StepIncomplete {
        step: WizardStep,
        report: ValidationReport,
    },

    #[error("Already on the final step; submit the broadcast for review")]
    AtFinalStep,

    #[error("Broadcasts can only be submitted from the review step (currently on {0})")]
    NotOnReview(WizardStep),

    #[error("The broadcast is being sent; wait for it to finish")]
    SendInFlight,

    #[error("Submit the broadcast for review first")]
    NoReviewOpen,

    #[error(transparent)]
    Review(#[from] ReviewError),
}

/// Owns the draft for one composition session
#[derive(Debug, Default)]
pub struct BroadcastWizard {
    step: WizardStep,
    draft: BroadcastDraft,
    gate: Option<ReviewGate>,
}

impl BroadcastWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn draft(&self) -> &BroadcastDraft {
        &self.draft
    }

    pub fn gate(&self) -> Option<&ReviewGate> {
        self.gate.as_ref()
    }

    pub fn is_sending(&self) -> bool {
        self.gate.as_ref().is_some_and(ReviewGate::is_sending)
    }

    /// Validation of the current step, as shown next to the form
    pub fn current_report(&self, now: DateTime<Utc>) -> ValidationReport {
        validate_step(self.step, &self.draft, now)
    }

    /// Apply a partial update. Any open review gate is closed since its
    /// summary no longer matches. Returns true if audience or filters changed.
    pub fn update_draft(&mut self, update: DraftUpdate) -> Result<bool, WizardError> {
        self.ensure_not_sending()?;
        self.gate = None;
        Ok(self.draft.apply(update))
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> Result<WizardStep, WizardError> {
        let next = self.step.next().ok_or(WizardError::AtFinalStep)?;

        let report = validate_step(self.step, &self.draft, now);
        if !report.valid {
            return Err(WizardError::StepIncomplete {
                step: self.step,
                report,
            });
        }

        self.step = next;
        Ok(next)
    }

    /// Step back. Always allowed except while a send is in flight.
    pub fn previous(&mut self) -> Result<WizardStep, WizardError> {
        self.ensure_not_sending()?;
        if let Some(previous) = self.step.previous() {
            self.step = previous;
        }
        self.gate = None;
        Ok(self.step)
    }

    /// Run the full validator and open the review gate.
    ///
    /// Resubmitting an unchanged draft keeps the existing gate so its
    /// acknowledgment and idempotency key survive.
    pub fn submit(
        &mut self,
        now: DateTime<Utc>,
        count: Option<&AudienceCount>,
        email_cost_per_message_kobo: u64,
    ) -> Result<&ReviewGate, WizardError> {
        self.ensure_not_sending()?;
        if self.step != WizardStep::Review {
            return Err(WizardError::NotOnReview(self.step));
        }

        let report = validate_broadcast_payload(&self.draft, now);
        if !report.valid {
            return Err(WizardError::StepIncomplete {
                step: WizardStep::Review,
                report,
            });
        }

        let payload = self
            .draft
            .to_payload()
            .ok_or_else(|| WizardError::StepIncomplete {
                step: WizardStep::Review,
                report: report.clone(),
            })?;
        let summary = ReviewSummary::build(&payload, count, report.warnings, email_cost_per_message_kobo);

        let unchanged = self
            .gate
            .as_ref()
            .is_some_and(|gate| gate.payload() == &payload);
        if unchanged {
            if let Some(gate) = self.gate.as_mut() {
                gate.refresh_summary(summary);
            }
        } else {
            self.gate = Some(ReviewGate::open(payload, summary));
        }

        self.gate.as_ref().ok_or(WizardError::NoReviewOpen)
    }

    pub fn acknowledge(&mut self, acknowledged: bool) -> Result<(), WizardError> {
        let gate = self.gate.as_mut().ok_or(WizardError::NoReviewOpen)?;
        gate.acknowledge(acknowledged)?;
        Ok(())
    }

    pub fn begin_send(&mut self, internal_note: Option<String>) -> Result<SendTicket, WizardError> {
        let gate = self.gate.as_mut().ok_or(WizardError::NoReviewOpen)?;
        let ticket = gate.begin_send(internal_note)?;
        self.draft.internal_note = ticket.payload.internal_note.clone();
        Ok(ticket)
    }

    pub fn fail_send(&mut self, message: impl Into<String>) {
        if let Some(gate) = self.gate.as_mut() {
            gate.fail_send(message);
        }
    }

    /// Terminal transition after a confirmed send
    pub fn complete_send(&mut self) {
        self.reset();
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn ensure_not_sending(&self) -> Result<(), WizardError> {
        if self.is_sending() {
            Err(WizardError::SendInFlight)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::audience::AudienceRole;
    use crate::broadcast::types::{BroadcastType, Channels};
    use crate::broadcast::validation::{AUDIENCE_REQUIRED, BODY_REQUIRED, TYPE_REQUIRED};

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn step_one() -> DraftUpdate {
        DraftUpdate {
            broadcast_type: Some(Some(BroadcastType::SystemUpdate)),
            audience: Some([AudienceRole::Rider].into_iter().collect()),
            ..Default::default()
        }
    }

    fn complete_wizard() -> BroadcastWizard {
        let mut wizard = BroadcastWizard::new();
        wizard.update_draft(step_one()).unwrap();
        wizard
            .update_draft(DraftUpdate {
                channels: Some(Channels {
                    email: false,
                    in_app: true,
                }),
                body: Some("App update rolling out tonight".to_string()),
                ..Default::default()
            })
            .unwrap();
        for _ in 0..4 {
            wizard.next(now()).unwrap();
        }
        wizard
    }

    #[test]
    fn test_next_blocked_on_invalid_step() {
        let mut wizard = BroadcastWizard::new();

        let err = wizard.next(now()).unwrap_err();
        match err {
            WizardError::StepIncomplete { step, report } => {
                assert_eq!(step, WizardStep::Audience);
                assert_eq!(report.errors, vec![TYPE_REQUIRED, AUDIENCE_REQUIRED]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(wizard.step(), WizardStep::Audience);
    }

    #[test]
    fn test_high_spam_subject_blocks_channels_step() {
        let mut wizard = BroadcastWizard::new();
        wizard.update_draft(step_one()).unwrap();
        wizard
            .update_draft(DraftUpdate {
                channels: Some(Channels {
                    email: true,
                    in_app: false,
                }),
                subject: Some("FREE MONEY!!! ACT NOW!!!".to_string()),
                ..Default::default()
            })
            .unwrap();
        wizard.next(now()).unwrap();
        wizard.next(now()).unwrap();
        assert_eq!(wizard.step(), WizardStep::Channels);

        match wizard.next(now()).unwrap_err() {
            WizardError::StepIncomplete { step, report } => {
                assert_eq!(step, WizardStep::Channels);
                assert!(report.errors[0].starts_with("Subject line has a high spam risk"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(wizard.step(), WizardStep::Channels);

        // A calmer subject lets the wizard move on
        wizard
            .update_draft(DraftUpdate {
                subject: Some("New arrivals this week".to_string()),
                ..Default::default()
            })
            .unwrap();
        wizard.next(now()).unwrap();
        assert_eq!(wizard.step(), WizardStep::Message);
    }

    #[test]
    fn test_step_error_message_is_first_error() {
        let mut wizard = BroadcastWizard::new();
        let err = wizard.next(now()).unwrap_err();
        assert_eq!(err.to_string(), TYPE_REQUIRED);
    }

    #[test]
    fn test_previous_always_allowed() {
        let mut wizard = BroadcastWizard::new();
        assert_eq!(wizard.previous().unwrap(), WizardStep::Audience);

        wizard.update_draft(step_one()).unwrap();
        wizard.next(now()).unwrap();
        wizard.next(now()).unwrap();
        assert_eq!(wizard.step(), WizardStep::Channels);

        // Channels step is invalid (nothing selected) but going back is fine
        wizard
            .update_draft(DraftUpdate {
                audience: Some(Default::default()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(wizard.previous().unwrap(), WizardStep::Targeting);
        assert_eq!(wizard.previous().unwrap(), WizardStep::Audience);
    }

    #[test]
    fn test_message_step_requires_body() {
        let mut wizard = BroadcastWizard::new();
        wizard.update_draft(step_one()).unwrap();
        wizard
            .update_draft(DraftUpdate {
                channels: Some(Channels {
                    email: false,
                    in_app: true,
                }),
                ..Default::default()
            })
            .unwrap();
        for _ in 0..3 {
            wizard.next(now()).unwrap();
        }
        assert_eq!(wizard.step(), WizardStep::Message);

        let err = wizard.next(now()).unwrap_err();
        assert_eq!(err.to_string(), BODY_REQUIRED);
    }

    #[test]
    fn test_submit_only_from_review() {
        let mut wizard = BroadcastWizard::new();
        assert!(matches!(
            wizard.submit(now(), None, 50),
            Err(WizardError::NotOnReview(WizardStep::Audience))
        ));
        assert!(matches!(wizard.next(now()), Err(WizardError::StepIncomplete { .. })));
    }

    #[test]
    fn test_submit_opens_gate_and_send_resets() {
        let mut wizard = complete_wizard();
        assert_eq!(wizard.step(), WizardStep::Review);
        assert!(matches!(wizard.next(now()), Err(WizardError::AtFinalStep)));

        wizard.submit(now(), None, 50).unwrap();
        wizard.acknowledge(true).unwrap();
        let ticket = wizard.begin_send(None).unwrap();
        assert_eq!(ticket.payload.audience, vec![AudienceRole::Rider]);

        assert!(matches!(
            wizard.update_draft(DraftUpdate::default()),
            Err(WizardError::SendInFlight)
        ));
        assert!(matches!(wizard.previous(), Err(WizardError::SendInFlight)));

        wizard.complete_send();
        assert_eq!(wizard.step(), WizardStep::Audience);
        assert_eq!(wizard.draft(), &BroadcastDraft::default());
        assert!(wizard.gate().is_none());
    }

    #[test]
    fn test_failed_send_keeps_draft_and_gate() {
        let mut wizard = complete_wizard();
        wizard.submit(now(), None, 50).unwrap();
        wizard.acknowledge(true).unwrap();
        let key = wizard.begin_send(None).unwrap().idempotency_key;

        wizard.fail_send("upstream rejected");
        assert_eq!(wizard.step(), WizardStep::Review);
        assert_eq!(wizard.gate().unwrap().last_error(), Some("upstream rejected"));

        // Resubmitting the same draft keeps the same gate
        wizard.submit(now(), None, 50).unwrap();
        assert_eq!(wizard.gate().unwrap().idempotency_key(), key);
        assert!(wizard.gate().unwrap().is_acknowledged());
    }

    #[test]
    fn test_draft_change_closes_gate() {
        let mut wizard = complete_wizard();
        wizard.submit(now(), None, 50).unwrap();

        wizard
            .update_draft(DraftUpdate {
                body: Some("Revised text".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(wizard.gate().is_none());
        assert!(matches!(wizard.acknowledge(true), Err(WizardError::NoReviewOpen)));
    }

    #[test]
    fn test_submit_failure_stays_on_review() {
        let mut wizard = complete_wizard();
        wizard
            .update_draft(DraftUpdate {
                body: Some("   ".to_string()),
                ..Default::default()
            })
            .unwrap();

        let err = wizard.submit(now(), None, 50).unwrap_err();
        assert_eq!(err.to_string(), BODY_REQUIRED);
        assert_eq!(wizard.step(), WizardStep::Review);
    }
}
