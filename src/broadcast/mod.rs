//! Broadcast composition domain.
//!
//! - `types`: draft, partial updates and the create-broadcast payload
//! - `audience`: roles, per-role filters and the live head-count tracker
//! - `validation`: spam-risk, CTA matching and payload validation rules
//! - `wizard`: the five-step composer state machine
//! - `review`: the confirmation gate in front of the send

pub mod audience;
pub mod review;
pub mod types;
pub mod validation;
pub mod wizard;

pub use audience::{
    AudienceCount, AudienceCountState, AudienceCountTracker, AudienceFilters, AudienceQuery,
    AudienceRole, BuyerFilters, CountTicket, RiderFilters, RoleFilter, SellerFilters,
};
pub use review::{format_naira, GateState, ReviewError, ReviewGate, ReviewSummary, SendTicket};
pub use types::{
    BroadcastDraft, BroadcastPayload, BroadcastReceipt, BroadcastStatus, BroadcastType, Channels,
    DraftUpdate, RateLimit, ResolvedMessage, RoleMessage, Scheduling,
};
pub use validation::{
    check_spam_risk, validate_broadcast_payload, validate_cta_link, validate_step, SpamCheck,
    SpamRisk, ValidationReport,
};
pub use wizard::{BroadcastWizard, WizardError, WizardStep};
