use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::{
    api::state::AppState,
    error::AppError,
};

/// The authenticated student, inserted into request extensions.
#[derive(Debug, Clone, Copy)]
pub struct CurrentStudent {
    pub student_id: Uuid,
}

/// Resolves the portal session from the `session` cookie or a bearer token.
pub async fn require_student(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = jar
        .get("session")
        .map(|cookie| cookie.value().to_string())
        .or_else(|| bearer_token(&request))
        .ok_or(AppError::Unauthorized)?;

    let session = state.service_context.session_store
        .find_by_token(&token)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let student = state.service_context.student_repo
        .find_by_id(session.student_id)
        .await?
        .filter(|student| student.is_active)
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(CurrentStudent { student_id: student.id });

    Ok(next.run(request).await)
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
