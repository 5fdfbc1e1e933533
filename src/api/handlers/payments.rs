use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{middleware::auth::CurrentStudent, state::AppState},
    domain::{from_cents, parse_gateway_timestamp, to_cents, Charge, ChargeFilter, ChargeStatus},
    error::{AppError, Result},
    service::CreateChargeRequest,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChargeDto {
    subscription_id: Option<String>,
    amount: f64,
    due_date: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChargeResponse {
    success: bool,
    payment_id: Uuid,
    pix_code: Option<String>,
    qr_code_url: Option<String>,
    invoice_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeDto {
    id: Uuid,
    subscription_id: Option<Uuid>,
    amount: f64,
    status: ChargeStatus,
    due_date: NaiveDate,
    paid_date: Option<DateTime<Utc>>,
    description: String,
    pix_code: Option<String>,
    invoice_url: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<Charge> for ChargeDto {
    fn from(charge: Charge) -> Self {
        Self {
            id: charge.id,
            subscription_id: charge.subscription_id,
            amount: from_cents(charge.amount_cents),
            status: charge.status,
            due_date: charge.due_date,
            paid_date: charge.paid_at,
            description: charge.description,
            pix_code: charge.pix_code,
            invoice_url: charge.invoice_url,
            created_at: charge.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChargeDetailResponse {
    success: bool,
    payment: ChargeDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    success: bool,
    status: ChargeStatus,
    paid_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeResponse {
    success: bool,
    pix_code: String,
    qr_code_image: String,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    status: Option<String>,
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    success: bool,
    payments: Vec<ChargeDto>,
    total: i64,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentStudent>,
    payload: std::result::Result<Json<CreateChargeDto>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateChargeResponse>)> {
    let Json(dto) = payload.map_err(|rejection| AppError::Validation(rejection.body_text()))?;

    let amount_cents = amount_to_cents(dto.amount)?;

    let subscription_id = dto.subscription_id
        .as_deref()
        .map(|raw| {
            Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Subscription not found".to_string()))
        })
        .transpose()?;

    let due_date = dto.due_date.as_deref().map(parse_due_date).transpose()?;

    tracing::info!(student_id = %current.student_id, amount = dto.amount, "Creating PIX charge");

    let charge = state.service_context.charge_service
        .create_charge(CreateChargeRequest {
            student_id: current.student_id,
            subscription_id,
            amount_cents,
            due_date,
            description: dto.description,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateChargeResponse {
            success: true,
            payment_id: charge.id,
            pix_code: charge.pix_code,
            qr_code_url: charge.qr_code_image,
            invoice_url: charge.invoice_url,
        }),
    ))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentStudent>,
    Path(id): Path<String>,
) -> Result<Json<ChargeDetailResponse>> {
    let charge = state.service_context.charge_service
        .get_charge(parse_charge_id(&id)?, current.student_id)
        .await?;

    Ok(Json(ChargeDetailResponse {
        success: true,
        payment: charge.into(),
    }))
}

pub async fn status(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentStudent>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>> {
    let view = state.service_context.charge_service
        .get_charge_status(parse_charge_id(&id)?, current.student_id)
        .await?;

    Ok(Json(StatusResponse {
        success: true,
        status: view.status,
        paid_date: view.paid_at,
    }))
}

pub async fn qr_code(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentStudent>,
    Path(id): Path<String>,
) -> Result<Json<QrCodeResponse>> {
    let pix = state.service_context.charge_service
        .get_pix_qr_code(parse_charge_id(&id)?, current.student_id)
        .await?;

    Ok(Json(QrCodeResponse {
        success: true,
        pix_code: pix.pix_code,
        qr_code_image: pix.qr_code_image,
    }))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentStudent>,
    Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>> {
    let status = params.status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| {
            ChargeStatus::parse(s)
                .ok_or_else(|| AppError::Validation(format!("Unknown status filter: {}", s)))
        })
        .transpose()?;

    let page = state.service_context.charge_service
        .list_charges(
            current.student_id,
            ChargeFilter {
                status,
                limit: params.limit,
                offset: params.offset,
            },
        )
        .await?;

    Ok(Json(ListResponse {
        success: true,
        payments: page.items.into_iter().map(Into::into).collect(),
        total: page.total,
    }))
}

/// Largest amount, in reais, a single charge may request.
pub const MAX_CHARGE_AMOUNT: f64 = 1_000_000.0;

// Sign is checked by the service; this only guards the float conversion.
fn amount_to_cents(amount: f64) -> Result<i64> {
    if !amount.is_finite() {
        return Err(AppError::Validation("Amount must be a number".to_string()));
    }
    if amount > MAX_CHARGE_AMOUNT {
        return Err(AppError::Validation(format!(
            "Amount must not exceed {:.2}",
            MAX_CHARGE_AMOUNT
        )));
    }
    Ok(to_cents(amount))
}

// Malformed ids cannot name an existing charge.
fn parse_charge_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound("Charge not found".to_string()))
}

fn parse_due_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_gateway_timestamp(raw).map(|dt| dt.date_naive()))
        .ok_or_else(|| AppError::Validation(format!("Invalid due date: {}", raw)))
}
