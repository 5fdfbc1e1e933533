use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

use crate::{
    config::GatewayConfig,
    domain::{from_cents, PixQrCode},
    error::{AppError, Result},
    payments::{
        qr_code_data_url, GatewayCharge, GatewayChargeRequest, GatewayCustomer, GatewayError,
        GatewayFailure, PaymentGateway,
    },
};

const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// HTTP client for the Asaas v3 API.
pub struct AsaasGateway {
    client: Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateCustomerBody<'a> {
    name: &'a str,
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpf_cnpj: Option<&'a str>,
    external_reference: &'a str,
}

#[derive(Deserialize)]
struct CustomerResponse {
    id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentBody<'a> {
    customer: &'a str,
    billing_type: &'static str,
    value: f64,
    due_date: String,
    description: &'a str,
    external_reference: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentResponse {
    id: String,
    #[serde(default)]
    invoice_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PixQrCodeResponse {
    payload: String,
    encoded_image: String,
}

impl AsaasGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("academy-billing/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build gateway client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("access_token", &self.api_key)
    }

    async fn execute<T: DeserializeOwned>(
        request: RequestBuilder,
    ) -> std::result::Result<T, GatewayFailure> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayFailure::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json::<T>().await?)
    }

    /// GETs are idempotent, so transient failures are retried.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> std::result::Result<T, GatewayError> {
        let mut attempt = 0;
        loop {
            let request = self.authorized(self.client.get(self.url(path)));
            match Self::execute(request).await {
                Ok(value) => return Ok(value),
                Err(failure) if failure.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        operation,
                        attempt,
                        "Gateway request failed, retrying: {}",
                        failure
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(failure) => return Err(GatewayError::new(operation, failure)),
            }
        }
    }

    /// POSTs create remote state and are attempted exactly once.
    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> std::result::Result<T, GatewayError> {
        let request = self.authorized(self.client.post(self.url(path))).json(body);
        Self::execute(request)
            .await
            .map_err(|failure| GatewayError::new(operation, failure))
    }
}

#[async_trait]
impl PaymentGateway for AsaasGateway {
    async fn create_customer(
        &self,
        customer: &GatewayCustomer,
    ) -> std::result::Result<String, GatewayError> {
        let body = CreateCustomerBody {
            name: &customer.name,
            email: &customer.email,
            cpf_cnpj: customer.cpf.as_deref(),
            external_reference: &customer.external_reference,
        };
        let created: CustomerResponse = self.post_json("create_customer", "/customers", &body).await?;
        tracing::info!(customer_id = %created.id, "Created gateway customer");
        Ok(created.id)
    }

    async fn create_charge(
        &self,
        request: &GatewayChargeRequest,
    ) -> std::result::Result<GatewayCharge, GatewayError> {
        let body = CreatePaymentBody {
            customer: &request.customer_id,
            billing_type: "PIX",
            value: from_cents(request.amount_cents),
            due_date: request.due_date.format("%Y-%m-%d").to_string(),
            description: &request.description,
            external_reference: &request.external_reference,
        };
        let created: PaymentResponse = self.post_json("create_charge", "/payments", &body).await?;

        // The charge exists remotely at this point; a missing QR code is
        // filled in later on demand rather than failing the creation.
        let pix = match self.fetch_pix_qr_code(&created.id).await {
            Ok(pix) => Some(pix),
            Err(e) => {
                tracing::warn!(
                    external_charge_id = %created.id,
                    "PIX QR code not available at creation: {}",
                    e
                );
                None
            }
        };

        Ok(GatewayCharge {
            external_charge_id: created.id,
            invoice_url: created.invoice_url,
            pix,
        })
    }

    async fn fetch_pix_qr_code(
        &self,
        external_charge_id: &str,
    ) -> std::result::Result<PixQrCode, GatewayError> {
        let path = format!("/payments/{}/pixQrCode", external_charge_id);
        let pix: PixQrCodeResponse = self.get_json("fetch_pix_qr_code", &path).await?;
        Ok(PixQrCode {
            pix_code: pix.payload,
            qr_code_image: qr_code_data_url(&pix.encoded_image),
        })
    }
}
