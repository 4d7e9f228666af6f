use std::fmt;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::error::AppError;
use crate::server::AppState;

use super::Claims;

/// Authenticated admin for the duration of one request.
///
/// Built from the validated bearer token and passed by reference into every
/// backend call, which forwards the same token.
#[derive(Clone)]
pub struct AdminSession {
    user_id: String,
    roles: Vec<String>,
    token: String,
}

impl AdminSession {
    pub fn new(user_id: impl Into<String>, roles: Vec<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles,
            token: token.into(),
        }
    }

    pub fn from_claims(claims: Claims, token: impl Into<String>) -> Self {
        Self::new(claims.sub, claims.roles, token)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn bearer_token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for AdminSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminSession")
            .field("user_id", &self.user_id)
            .field("roles", &self.roles)
            .field("token", &"[redacted]")
            .finish()
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)
            .ok_or_else(|| AppError::Auth("Missing bearer token".to_string()))?;

        let claims = state.jwt_validator.validate_admin(token)?;
        tracing::debug!(user_id = %claims.sub, "Admin session authenticated");

        Ok(AdminSession::from_claims(claims, token))
    }
}
