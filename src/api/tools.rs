//! Stateless validation endpoints used by the form as the admin types.

use std::collections::BTreeSet;

use axum::{extract::Query, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::AdminSession;
use crate::broadcast::{
    check_spam_risk, validate_broadcast_payload, validate_cta_link, validate_step, AudienceRole,
    BroadcastDraft, SpamCheck, ValidationReport, WizardStep,
};
use crate::metrics::ComposerMetrics;

#[derive(Debug, Deserialize)]
pub struct SpamCheckRequest {
    pub subject: String,
}

#[derive(Debug, Deserialize)]
pub struct CtaCheckRequest {
    pub link: String,
    #[serde(default)]
    pub audience: BTreeSet<AudienceRole>,
}

#[derive(Debug, Serialize)]
pub struct CtaCheckResponse {
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ValidateParams {
    /// Validate only the fields this step owns
    pub step: Option<WizardStep>,
}

/// POST /api/v1/broadcasts/spam-check
#[tracing::instrument(name = "http.spam_check", skip_all, fields(user_id = %admin.user_id()))]
pub async fn spam_check(admin: AdminSession, Json(request): Json<SpamCheckRequest>) -> Json<SpamCheck> {
    Json(check_spam_risk(&request.subject))
}

/// POST /api/v1/broadcasts/cta-check
#[tracing::instrument(name = "http.cta_check", skip_all, fields(user_id = %admin.user_id()))]
pub async fn cta_check(
    admin: AdminSession,
    Json(request): Json<CtaCheckRequest>,
) -> Json<CtaCheckResponse> {
    let roles: Vec<AudienceRole> = request.audience.into_iter().collect();
    Json(CtaCheckResponse {
        warning: validate_cta_link(&request.link, &roles),
    })
}

/// POST /api/v1/broadcasts/validate
#[tracing::instrument(name = "http.validate_draft", skip_all, fields(user_id = %admin.user_id()))]
pub async fn validate_draft(
    admin: AdminSession,
    Query(params): Query<ValidateParams>,
    Json(draft): Json<BroadcastDraft>,
) -> Json<ValidationReport> {
    let now = Utc::now();
    let report = match params.step {
        Some(step) => validate_step(step, &draft, now),
        None => validate_broadcast_payload(&draft, now),
    };
    ComposerMetrics::record_validation(report.valid);
    Json(report)
}
