use std::sync::Arc;
use chrono::Utc;
use uuid::Uuid;

use crate::{
    domain::{ChargeStatus, GatewayEvent, GatewayPayment, NotificationKind, WebhookPayload},
    error::Result,
    repository::ChargeRepository,
    service::notification_service::NotificationService,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied { charge_id: Uuid, status: ChargeStatus },
    /// The charge already had the target status.
    Duplicate,
    /// No local charge carries this external id.
    UnknownCharge,
    /// The event name has no mapped transition.
    Ignored,
}

impl ReconcileOutcome {
    pub fn applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied { .. })
    }
}

/// Applies gateway notifications to the charge store.
///
/// Deliveries are at-least-once and may arrive out of order. A delivery whose
/// target status is already stored is a no-op. Different targets resolve
/// last-writer-wins, and `paid_at` is written at most once.
pub struct WebhookReconciler {
    charges: Arc<dyn ChargeRepository>,
    notifications: Arc<NotificationService>,
}

impl WebhookReconciler {
    pub fn new(charges: Arc<dyn ChargeRepository>, notifications: Arc<NotificationService>) -> Self {
        Self { charges, notifications }
    }

    /// Entry point for the HTTP layer. Never fails: storage errors are logged
    /// together with the full payload so the event can be replayed by hand.
    pub async fn handle(&self, payload: WebhookPayload) -> bool {
        let Some(payment) = payload.payment.as_ref() else {
            tracing::debug!(event = %payload.event, "Webhook without payment object, ignoring");
            return false;
        };

        let event = GatewayEvent::from_name(&payload.event);
        match self.process_webhook(&event, payment).await {
            Ok(outcome) => outcome.applied(),
            Err(e) => {
                tracing::error!(
                    event = %payload.event,
                    external_charge_id = %payment.id,
                    payload = %serde_json::to_string(&payload).unwrap_or_default(),
                    "Failed to persist webhook transition, manual replay required: {}",
                    e
                );
                false
            }
        }
    }

    pub async fn process_webhook(
        &self,
        event: &GatewayEvent,
        payment: &GatewayPayment,
    ) -> Result<ReconcileOutcome> {
        let Some(charge) = self.charges.find_by_external_id(&payment.id).await? else {
            tracing::warn!(
                external_charge_id = %payment.id,
                ?event,
                "Webhook for unknown charge, skipping"
            );
            return Ok(ReconcileOutcome::UnknownCharge);
        };

        let Some(target) = event.target_status() else {
            tracing::debug!(charge_id = %charge.id, ?event, "Unhandled webhook event");
            return Ok(ReconcileOutcome::Ignored);
        };

        if charge.status == target {
            tracing::debug!(charge_id = %charge.id, status = %target, "Duplicate webhook delivery");
            return Ok(ReconcileOutcome::Duplicate);
        }

        let paid_at = if target.is_paid() {
            Some(payment.reported_paid_at().unwrap_or_else(Utc::now))
        } else {
            None
        };

        // A concurrent delivery may have written the same target since the
        // lookup; the conditional update reports that as no change.
        if !self.charges.apply_transition(&payment.id, target, paid_at).await? {
            tracing::debug!(charge_id = %charge.id, status = %target, "Transition already applied concurrently");
            return Ok(ReconcileOutcome::Duplicate);
        }

        tracing::info!(
            charge_id = %charge.id,
            external_charge_id = %payment.id,
            from = %charge.status,
            to = %target,
            "Charge status updated"
        );

        if target.is_paid() && !charge.status.is_paid() {
            self.notifications.notify_charge(&charge, NotificationKind::PaymentConfirmed).await;
        } else if target == ChargeStatus::Overdue {
            self.notifications.notify_charge(&charge, NotificationKind::PaymentOverdue).await;
        }

        Ok(ReconcileOutcome::Applied {
            charge_id: charge.id,
            status: target,
        })
    }
}
