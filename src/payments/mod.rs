use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::PixQrCode;

pub mod asaas_client;

pub use asaas_client::AsaasGateway;

/// Outbound contract with the payment provider.
///
/// Implementations translate every transport or provider failure into a
/// [`GatewayError`]; raw HTTP errors never reach callers.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Registers a customer and returns the gateway's customer id.
    async fn create_customer(&self, customer: &GatewayCustomer) -> Result<String, GatewayError>;

    /// Creates a PIX charge. The PIX code is included when the provider
    /// could produce it right away.
    async fn create_charge(&self, request: &GatewayChargeRequest) -> Result<GatewayCharge, GatewayError>;

    async fn fetch_pix_qr_code(&self, external_charge_id: &str) -> Result<PixQrCode, GatewayError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCustomer {
    pub name: String,
    pub email: String,
    pub cpf: Option<String>,
    pub external_reference: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayChargeRequest {
    pub customer_id: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub description: String,
    /// Local charge id, echoed back by the provider.
    pub external_reference: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GatewayCharge {
    pub external_charge_id: String,
    pub invoice_url: Option<String>,
    pub pix: Option<PixQrCode>,
}

#[derive(Debug, Error)]
#[error("gateway call `{operation}` failed: {cause}")]
pub struct GatewayError {
    pub operation: &'static str,
    #[source]
    pub cause: GatewayFailure,
}

impl GatewayError {
    pub fn new(operation: &'static str, cause: GatewayFailure) -> Self {
        Self { operation, cause }
    }
}

#[derive(Debug, Error)]
pub enum GatewayFailure {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response: {0}")]
    Decode(String),
}

impl GatewayFailure {
    /// Failures worth another attempt on an idempotent request.
    pub fn is_transient(&self) -> bool {
        match self {
            GatewayFailure::Timeout | GatewayFailure::Transport(_) => true,
            GatewayFailure::Status { status, .. } => *status >= 500,
            GatewayFailure::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for GatewayFailure {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayFailure::Timeout
        } else if err.is_decode() {
            GatewayFailure::Decode(err.to_string())
        } else {
            GatewayFailure::Transport(err.to_string())
        }
    }
}

/// Renders the provider's base64 PNG as a data URL the portal can embed directly.
pub fn qr_code_data_url(encoded_image: &str) -> String {
    if encoded_image.starts_with("data:") {
        encoded_image.to_string()
    } else {
        format!("data:image/png;base64,{}", encoded_image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_timeouts_transport_and_5xx_are_transient() {
        assert!(GatewayFailure::Timeout.is_transient());
        assert!(GatewayFailure::Transport("reset".into()).is_transient());
        assert!(GatewayFailure::Status { status: 503, body: String::new() }.is_transient());
        assert!(!GatewayFailure::Status { status: 400, body: String::new() }.is_transient());
        assert!(!GatewayFailure::Decode("eof".into()).is_transient());
    }

    #[test]
    fn data_url_is_not_double_prefixed() {
        assert_eq!(qr_code_data_url("iVBOR"), "data:image/png;base64,iVBOR");
        assert_eq!(
            qr_code_data_url("data:image/png;base64,iVBOR"),
            "data:image/png;base64,iVBOR"
        );
    }
}
