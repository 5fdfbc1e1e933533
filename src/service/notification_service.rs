use std::sync::Arc;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::{
    domain::{Charge, Notification, NotificationKind},
    error::Result,
    repository::NotificationRepository,
};

/// Student-facing payment notifications. Delivery is best-effort: a failed
/// insert is logged and never fails the operation that triggered it.
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>) -> Self {
        Self { repo }
    }

    pub async fn notify_charge(&self, charge: &Charge, kind: NotificationKind) {
        let notification = Notification {
            id: Uuid::new_v4(),
            student_id: charge.student_id,
            kind,
            title: kind.title().to_string(),
            message: kind.message(charge.amount_cents),
            metadata: json!({
                "paymentId": charge.id,
                "amountCents": charge.amount_cents,
                "dueDate": charge.due_date,
            }),
            created_at: Utc::now(),
        };

        if let Err(e) = self.repo.create(notification).await {
            tracing::warn!(
                charge_id = %charge.id,
                kind = kind.as_str(),
                "Failed to record notification: {}",
                e
            );
        }
    }

    pub async fn list_for_student(&self, student_id: Uuid, limit: i64) -> Result<Vec<Notification>> {
        self.repo.list_by_student(student_id, limit.clamp(1, 100)).await
    }
}
