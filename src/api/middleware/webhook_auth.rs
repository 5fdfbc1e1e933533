use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};

use crate::{
    api::state::AppState,
    auth::secrets_match,
    config::DeploymentEnvironment,
    error::AppError,
};

pub const WEBHOOK_TOKEN_HEADER: &str = "asaas-access-token";

/// Rejects webhook calls whose shared-secret header does not match the
/// configured token. Runs before the body is parsed.
pub async fn require_webhook_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let configured = state.settings.gateway.webhook_token.as_deref();
    let environment = state.settings.server.environment;

    if !webhook_token_valid(configured, environment, request.headers()) {
        tracing::warn!("Rejected webhook with missing or invalid token");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

pub fn webhook_token_valid(
    configured: Option<&str>,
    environment: DeploymentEnvironment,
    headers: &HeaderMap,
) -> bool {
    let provided = headers
        .get(WEBHOOK_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    match configured.filter(|token| !token.is_empty()) {
        Some(expected) => provided.is_some_and(|provided| secrets_match(expected, provided)),
        None if environment.is_production() => false,
        None => {
            tracing::warn!("No webhook token configured, accepting unauthenticated webhook");
            true
        }
    }
}
