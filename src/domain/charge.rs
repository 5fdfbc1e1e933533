use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single PIX payment request mirrored against a gateway-hosted charge.
///
/// Only `status`, `paid_at` and the PIX cache fields change after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Charge {
    pub id: Uuid,
    pub student_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub description: String,
    pub external_charge_id: String,
    pub invoice_url: Option<String>,
    pub status: ChargeStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub pix_code: Option<String>,
    pub qr_code_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Charge {
    pub fn is_owned_by(&self, student_id: Uuid) -> bool {
        self.student_id == student_id
    }

    pub fn cached_pix(&self) -> Option<PixQrCode> {
        match (&self.pix_code, &self.qr_code_image) {
            (Some(pix_code), Some(qr_code_image)) => Some(PixQrCode {
                pix_code: pix_code.clone(),
                qr_code_image: qr_code_image.clone(),
            }),
            _ => None,
        }
    }
}

/// Mirrors the gateway's payment status vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeStatus {
    Pending,
    Confirmed,
    Received,
    Overdue,
    Refunded,
    Deleted,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Pending => "PENDING",
            ChargeStatus::Confirmed => "CONFIRMED",
            ChargeStatus::Received => "RECEIVED",
            ChargeStatus::Overdue => "OVERDUE",
            ChargeStatus::Refunded => "REFUNDED",
            ChargeStatus::Deleted => "DELETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ChargeStatus::Pending),
            "CONFIRMED" => Some(ChargeStatus::Confirmed),
            "RECEIVED" => Some(ChargeStatus::Received),
            "OVERDUE" => Some(ChargeStatus::Overdue),
            "REFUNDED" => Some(ChargeStatus::Refunded),
            "DELETED" => Some(ChargeStatus::Deleted),
            _ => None,
        }
    }

    /// Statuses that stamp `paid_at` the first time they are entered.
    pub fn is_paid(&self) -> bool {
        matches!(self, ChargeStatus::Confirmed | ChargeStatus::Received)
    }

    /// Statuses for which the student can still pay via PIX.
    pub fn is_payable(&self) -> bool {
        matches!(self, ChargeStatus::Pending | ChargeStatus::Overdue)
    }
}

impl std::fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixQrCode {
    pub pix_code: String,
    pub qr_code_image: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChargeStatusView {
    pub status: ChargeStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<&Charge> for ChargeStatusView {
    fn from(charge: &Charge) -> Self {
        Self {
            status: charge.status,
            paid_at: charge.paid_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChargeFilter {
    pub status: Option<ChargeStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for ChargeFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: 10,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChargePage {
    pub items: Vec<Charge>,
    pub total: i64,
}

/// Converts a decimal currency value into integer cents.
pub fn to_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}
