use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentStudent, state::AppState},
    domain::{Notification, NotificationKind},
    error::Result,
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    id: Uuid,
    #[serde(rename = "type")]
    kind: NotificationKind,
    title: String,
    message: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationDto {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            title: n.title,
            message: n.message,
            metadata: n.metadata,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    success: bool,
    notifications: Vec<NotificationDto>,
}

pub async fn list(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentStudent>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let notifications = state.service_context.notification_service
        .list_for_student(current.student_id, params.limit)
        .await?;

    Ok(Json(ListResponse {
        success: true,
        notifications: notifications.into_iter().map(Into::into).collect(),
    }))
}
