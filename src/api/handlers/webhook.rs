use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use std::time::Duration;

use crate::{api::state::AppState, domain::WebhookPayload};

/// Always sent with 200. `success` only tells monitoring whether a
/// transition was applied; the gateway must not treat it as a retry hint.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    success: bool,
}

pub async fn asaas(State(state): State<AppState>, body: Bytes) -> Json<WebhookAck> {
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!(
                body = %String::from_utf8_lossy(&body),
                "Malformed webhook payload: {}",
                e
            );
            return Json(WebhookAck { success: false });
        }
    };

    let event = payload.event.clone();
    tracing::info!(event = %event, "Received gateway webhook");

    // Spawned so a slow store write keeps running after we answer the gateway.
    let reconciler = state.service_context.webhook_reconciler.clone();
    let task = tokio::spawn(async move { reconciler.handle(payload).await });

    let deadline = Duration::from_millis(state.settings.webhook.processing_timeout_ms);
    let success = match tokio::time::timeout(deadline, task).await {
        Ok(Ok(applied)) => applied,
        Ok(Err(e)) => {
            tracing::error!(event = %event, "Webhook processing task failed: {}", e);
            false
        }
        Err(_) => {
            tracing::warn!(
                event = %event,
                "Webhook processing exceeded {:?}, finishing in background",
                deadline
            );
            false
        }
    };

    Json(WebhookAck { success })
}
