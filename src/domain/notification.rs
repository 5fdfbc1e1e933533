use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::from_cents;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub student_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    PaymentDue,
    PaymentConfirmed,
    PaymentOverdue,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PaymentDue => "PAYMENT_DUE",
            NotificationKind::PaymentConfirmed => "PAYMENT_CONFIRMED",
            NotificationKind::PaymentOverdue => "PAYMENT_OVERDUE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PAYMENT_DUE" => Some(NotificationKind::PaymentDue),
            "PAYMENT_CONFIRMED" => Some(NotificationKind::PaymentConfirmed),
            "PAYMENT_OVERDUE" => Some(NotificationKind::PaymentOverdue),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::PaymentDue => "New charge available",
            NotificationKind::PaymentConfirmed => "Payment confirmed",
            NotificationKind::PaymentOverdue => "Payment overdue",
        }
    }

    pub fn message(&self, amount_cents: i64) -> String {
        let amount = from_cents(amount_cents);
        match self {
            NotificationKind::PaymentDue => {
                format!("You have a new charge of R$ {:.2} ready to be paid.", amount)
            }
            NotificationKind::PaymentConfirmed => {
                format!("Your payment of R$ {:.2} was confirmed. Thank you!", amount)
            }
            NotificationKind::PaymentOverdue => {
                format!("Your charge of R$ {:.2} is overdue. Please settle it.", amount)
            }
        }
    }
}
