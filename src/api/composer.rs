//! Composer session endpoints.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AdminSession;
use crate::backend::{BroadcastProduct, ProductQuery};
use crate::broadcast::DraftUpdate;
use crate::composer::{ComposerSnapshot, ConfirmOutcome};
use crate::error::{AppError, Result};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct AcknowledgeRequest {
    pub acknowledged: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub internal_note: Option<String>,
}

/// POST /api/v1/composer - Start a new composition
#[tracing::instrument(name = "http.create_composer", skip_all, fields(user_id = %admin.user_id()))]
pub async fn create_composer(
    State(state): State<AppState>,
    admin: AdminSession,
) -> (StatusCode, Json<ComposerSnapshot>) {
    (StatusCode::CREATED, Json(state.composer.create(&admin)))
}

/// GET /api/v1/composer/{id}
#[tracing::instrument(name = "http.get_composer", skip(state, admin))]
pub async fn get_composer(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<ComposerSnapshot>> {
    Ok(Json(state.composer.snapshot(&admin, id).await?))
}

/// DELETE /api/v1/composer/{id} - Discard the draft
#[tracing::instrument(name = "http.discard_composer", skip(state, admin))]
pub async fn discard_composer(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    state.composer.discard(&admin, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /api/v1/composer/{id}/draft
#[tracing::instrument(name = "http.update_draft", skip(state, admin, update))]
pub async fn update_draft(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
    Json(update): Json<DraftUpdate>,
) -> Result<Json<ComposerSnapshot>> {
    Ok(Json(state.composer.update_draft(&admin, id, update).await?))
}

/// POST /api/v1/composer/{id}/next
#[tracing::instrument(name = "http.next_step", skip(state, admin))]
pub async fn next_step(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<ComposerSnapshot>> {
    Ok(Json(state.composer.next(&admin, id).await?))
}

/// POST /api/v1/composer/{id}/previous
#[tracing::instrument(name = "http.previous_step", skip(state, admin))]
pub async fn previous_step(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<ComposerSnapshot>> {
    Ok(Json(state.composer.previous(&admin, id).await?))
}

/// POST /api/v1/composer/{id}/audience-count
#[tracing::instrument(name = "http.audience_count", skip(state, admin))]
pub async fn refresh_audience_count(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<ComposerSnapshot>> {
    Ok(Json(state.composer.refresh_audience_count(&admin, id).await?))
}

/// GET /api/v1/composer/{id}/products
#[tracing::instrument(name = "http.products", skip(state, admin))]
pub async fn list_products(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<BroadcastProduct>>> {
    Ok(Json(state.composer.products(&admin, id, query).await?))
}

/// POST /api/v1/composer/{id}/submit - Validate and open the review
#[tracing::instrument(name = "http.submit", skip(state, admin))]
pub async fn submit(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
) -> Result<Json<ComposerSnapshot>> {
    Ok(Json(state.composer.submit(&admin, id).await?))
}

/// POST /api/v1/composer/{id}/acknowledge
#[tracing::instrument(name = "http.acknowledge", skip(state, admin, request))]
pub async fn acknowledge(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
    Json(request): Json<AcknowledgeRequest>,
) -> Result<Json<ComposerSnapshot>> {
    Ok(Json(
        state
            .composer
            .acknowledge(&admin, id, request.acknowledged)
            .await?,
    ))
}

/// POST /api/v1/composer/{id}/confirm - Send the broadcast
///
/// The body is optional; an empty body confirms without an internal note.
#[tracing::instrument(name = "http.confirm", skip(state, admin, body))]
pub async fn confirm(
    State(state): State<AppState>,
    admin: AdminSession,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<ConfirmOutcome>> {
    let request: ConfirmRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ConfirmRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Invalid confirm request: {}", e)))?
    };
    Ok(Json(
        state
            .composer
            .confirm(&admin, id, request.internal_note)
            .await?,
    ))
}
