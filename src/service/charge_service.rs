use std::sync::Arc;
use chrono::{Datelike, Days, Months, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    config::BillingConfig,
    domain::*,
    error::{AppError, Result},
    payments::{GatewayChargeRequest, GatewayCustomer, PaymentGateway},
    repository::{ChargeRepository, StudentRepository},
    service::notification_service::NotificationService,
};

pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone)]
pub struct CreateChargeRequest {
    pub student_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub amount_cents: i64,
    pub due_date: Option<NaiveDate>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub created: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Creates charges and answers every read the portal makes about them.
///
/// Only ever writes `PENDING` rows; later status changes belong to the
/// webhook reconciler.
pub struct ChargeService {
    charges: Arc<dyn ChargeRepository>,
    students: Arc<dyn StudentRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifications: Arc<NotificationService>,
    billing: BillingConfig,
}

impl ChargeService {
    pub fn new(
        charges: Arc<dyn ChargeRepository>,
        students: Arc<dyn StudentRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifications: Arc<NotificationService>,
        billing: BillingConfig,
    ) -> Self {
        Self {
            charges,
            students,
            gateway,
            notifications,
            billing,
        }
    }

    /// Creates the remote charge first and persists locally only on success,
    /// so no row ever exists without an external charge id.
    pub async fn create_charge(&self, request: CreateChargeRequest) -> Result<Charge> {
        if request.amount_cents <= 0 {
            return Err(AppError::Validation("Amount must be greater than zero".to_string()));
        }

        let student = self.students
            .find_by_id(request.student_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

        if let Some(subscription_id) = request.subscription_id {
            self.students
                .find_subscription(subscription_id, student.id)
                .await?
                .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))?;
        }

        let customer_id = self.ensure_gateway_customer(&student).await?;

        let id = Uuid::new_v4();
        let due_date = request.due_date.unwrap_or_else(|| Utc::now().date_naive());
        let description = request.description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| self.billing.default_description.clone());

        let remote = self.gateway
            .create_charge(&GatewayChargeRequest {
                customer_id,
                amount_cents: request.amount_cents,
                due_date,
                description: description.clone(),
                external_reference: id.to_string(),
            })
            .await?;

        let now = Utc::now();
        let charge = Charge {
            id,
            student_id: student.id,
            subscription_id: request.subscription_id,
            amount_cents: request.amount_cents,
            due_date,
            description,
            external_charge_id: remote.external_charge_id,
            invoice_url: remote.invoice_url,
            status: ChargeStatus::Pending,
            paid_at: None,
            pix_code: remote.pix.as_ref().map(|pix| pix.pix_code.clone()),
            qr_code_image: remote.pix.map(|pix| pix.qr_code_image),
            created_at: now,
            updated_at: now,
        };
        let external_charge_id = charge.external_charge_id.clone();

        let charge = self.charges.create(charge).await.map_err(|e| {
            tracing::error!(
                charge_id = %id,
                external_charge_id = %external_charge_id,
                "Gateway charge created but local persist failed: {}",
                e
            );
            e
        })?;

        self.notifications.notify_charge(&charge, NotificationKind::PaymentDue).await;

        tracing::info!(
            charge_id = %charge.id,
            external_charge_id = %charge.external_charge_id,
            student_id = %charge.student_id,
            "Charge created"
        );

        Ok(charge)
    }

    async fn ensure_gateway_customer(&self, student: &Student) -> Result<String> {
        if let Some(ref customer_id) = student.gateway_customer_id {
            return Ok(customer_id.clone());
        }

        let email = student.email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::Validation("Student has no email on file".to_string()))?;

        let customer_id = self.gateway
            .create_customer(&GatewayCustomer {
                name: student.full_name.clone(),
                email,
                cpf: student.cpf_digits(),
                external_reference: student.id.to_string(),
            })
            .await?;

        if self.students.set_gateway_customer_id(student.id, &customer_id).await? {
            return Ok(customer_id);
        }

        // A concurrent request stored its customer first; use that one.
        let stored = self.students
            .find_by_id(student.id)
            .await?
            .and_then(|s| s.gateway_customer_id)
            .ok_or_else(|| AppError::Internal("Gateway customer id vanished".to_string()))?;

        tracing::warn!(
            student_id = %student.id,
            orphaned_customer_id = %customer_id,
            customer_id = %stored,
            "Gateway customer already provisioned concurrently"
        );

        Ok(stored)
    }

    /// Ownership mismatches are reported as `NotFound` so other students'
    /// charges cannot be probed.
    pub async fn get_charge(&self, id: Uuid, student_id: Uuid) -> Result<Charge> {
        self.charges
            .find_by_id(id)
            .await?
            .filter(|charge| charge.is_owned_by(student_id))
            .ok_or_else(|| AppError::NotFound("Charge not found".to_string()))
    }

    /// Polled by the portal. One row read, never a gateway call.
    pub async fn get_charge_status(&self, id: Uuid, student_id: Uuid) -> Result<ChargeStatusView> {
        let charge = self.get_charge(id, student_id).await?;
        Ok(ChargeStatusView::from(&charge))
    }

    pub async fn get_pix_qr_code(&self, id: Uuid, student_id: Uuid) -> Result<PixQrCode> {
        let charge = self.get_charge(id, student_id).await?;

        if !charge.status.is_payable() {
            return Err(AppError::Validation("Charge is not awaiting payment".to_string()));
        }

        if let Some(cached) = charge.cached_pix() {
            return Ok(cached);
        }

        let pix = self.gateway.fetch_pix_qr_code(&charge.external_charge_id).await?;
        self.charges.cache_pix_qr_code(charge.id, &pix).await?;

        tracing::debug!(charge_id = %charge.id, "Cached PIX QR code");

        Ok(pix)
    }

    pub async fn list_charges(&self, student_id: Uuid, filter: ChargeFilter) -> Result<ChargePage> {
        let filter = ChargeFilter {
            status: filter.status,
            limit: filter.limit.clamp(1, MAX_PAGE_SIZE),
            offset: filter.offset.max(0),
        };
        self.charges.list_by_student(student_id, &filter).await
    }

    /// Charges every billable subscription that has nothing due between the
    /// start of `today`'s month and the end of the month the new charge would
    /// fall in. Each subscription succeeds or fails on its own.
    pub async fn generate_monthly_charges(&self, today: NaiveDate) -> Result<GenerationReport> {
        let (month_start, _) = month_bounds(today)
            .ok_or_else(|| AppError::Internal(format!("Cannot compute month bounds for {}", today)))?;

        let subscriptions = self.students.list_billable_subscriptions().await?;
        tracing::info!("Found {} billable subscriptions", subscriptions.len());

        let mut report = GenerationReport::default();
        for subscription in subscriptions {
            let due_date = self.due_date_for(&subscription, today).unwrap_or(today);
            let Some((_, due_month_end)) = month_bounds(due_date) else {
                report.errors += 1;
                tracing::error!(subscription_id = %subscription.id, "Cannot compute month bounds for {}", due_date);
                continue;
            };

            // The window must reach the due date's month; a past due day lands in the next one.
            match self.charges
                .exists_for_subscription_between(subscription.id, month_start, due_month_end)
                .await
            {
                Ok(true) => {
                    report.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(
                        subscription_id = %subscription.id,
                        "Failed to check existing charges: {}",
                        e
                    );
                    continue;
                }
            }

            let request = CreateChargeRequest {
                student_id: subscription.student_id,
                subscription_id: Some(subscription.id),
                amount_cents: subscription.price_cents,
                due_date: Some(due_date),
                description: Some(format!(
                    "{} {}",
                    self.billing.default_description,
                    due_date.format("%m/%Y")
                )),
            };

            match self.create_charge(request).await {
                Ok(_) => report.created += 1,
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(
                        subscription_id = %subscription.id,
                        "Failed to create monthly charge: {}",
                        e
                    );
                }
            }
        }

        Ok(report)
    }

    fn due_date_for(&self, subscription: &Subscription, today: NaiveDate) -> Option<NaiveDate> {
        let due_day = self.billing.default_due_day.clamp(1, 28);
        let due = subscription
            .next_billing_date
            .or_else(|| NaiveDate::from_ymd_opt(today.year(), today.month(), due_day))?;

        if due < today {
            due.checked_add_months(Months::new(1))
        } else {
            Some(due)
        }
    }
}

fn month_bounds(day: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let start = day.checked_sub_days(Days::new(u64::from(day.day0())))?;
    let end = start.checked_add_months(Months::new(1))?.checked_sub_days(Days::new(1))?;
    Some((start, end))
}
