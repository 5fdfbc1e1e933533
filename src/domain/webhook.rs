use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ChargeStatus;

/// Body of an incoming gateway notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    #[serde(default)]
    pub payment: Option<GatewayPayment>,
}

/// The gateway's view of a charge as carried by a webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayPayment {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub billing_type: Option<String>,
    #[serde(default)]
    pub confirmed_date: Option<String>,
    #[serde(default)]
    pub payment_date: Option<String>,
    #[serde(default)]
    pub external_reference: Option<String>,
}

impl GatewayPayment {
    /// Settlement time reported by the gateway: `paymentDate` first, then `confirmedDate`.
    pub fn reported_paid_at(&self) -> Option<DateTime<Utc>> {
        self.payment_date
            .as_deref()
            .and_then(parse_gateway_timestamp)
            .or_else(|| self.confirmed_date.as_deref().and_then(parse_gateway_timestamp))
    }
}

/// Gateway event names this service reacts to. Anything else is carried
/// through as `Unrecognized` and never causes a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    PaymentConfirmed,
    PaymentReceived,
    PaymentOverdue,
    PaymentDeleted,
    PaymentRefunded,
    Unrecognized(String),
}

impl GatewayEvent {
    pub fn from_name(name: &str) -> Self {
        match name {
            "PAYMENT_CONFIRMED" => GatewayEvent::PaymentConfirmed,
            "PAYMENT_RECEIVED" => GatewayEvent::PaymentReceived,
            "PAYMENT_OVERDUE" => GatewayEvent::PaymentOverdue,
            "PAYMENT_DELETED" => GatewayEvent::PaymentDeleted,
            "PAYMENT_REFUNDED" => GatewayEvent::PaymentRefunded,
            other => GatewayEvent::Unrecognized(other.to_string()),
        }
    }

    pub fn target_status(&self) -> Option<ChargeStatus> {
        match self {
            GatewayEvent::PaymentConfirmed => Some(ChargeStatus::Confirmed),
            GatewayEvent::PaymentReceived => Some(ChargeStatus::Received),
            GatewayEvent::PaymentOverdue => Some(ChargeStatus::Overdue),
            GatewayEvent::PaymentDeleted => Some(ChargeStatus::Deleted),
            GatewayEvent::PaymentRefunded => Some(ChargeStatus::Refunded),
            GatewayEvent::Unrecognized(_) => None,
        }
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (assumed UTC) or a bare `YYYY-MM-DD`.
pub fn parse_gateway_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
