use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Charge, ChargeFilter, ChargePage, ChargeStatus, PixQrCode},
    error::{AppError, Result},
    repository::ChargeRepository,
};

#[derive(FromRow)]
struct ChargeRow {
    id: String,
    student_id: String,
    subscription_id: Option<String>,
    amount_cents: i64,
    due_date: NaiveDate,
    description: String,
    external_charge_id: String,
    invoice_url: Option<String>,
    status: String,
    paid_at: Option<NaiveDateTime>,
    pix_code: Option<String>,
    qr_code_image: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const CHARGE_COLUMNS: &str = r#"
    id, student_id, subscription_id, amount_cents, due_date, description,
    external_charge_id, invoice_url, status, paid_at, pix_code, qr_code_image,
    created_at, updated_at
"#;

pub struct SqliteChargeRepository {
    pool: SqlitePool,
}

impl SqliteChargeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_charge(row: ChargeRow) -> Result<Charge> {
        Ok(Charge {
            id: parse_uuid(&row.id)?,
            student_id: parse_uuid(&row.student_id)?,
            subscription_id: row.subscription_id.as_deref().map(parse_uuid).transpose()?,
            amount_cents: row.amount_cents,
            due_date: row.due_date,
            description: row.description,
            external_charge_id: row.external_charge_id,
            invoice_url: row.invoice_url,
            status: ChargeStatus::parse(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid charge status: {}", row.status)))?,
            paid_at: row.paid_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            pix_code: row.pix_code,
            qr_code_image: row.qr_code_image,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| AppError::Database(e.to_string()))
}

#[async_trait]
impl ChargeRepository for SqliteChargeRepository {
    async fn create(&self, charge: Charge) -> Result<Charge> {
        let now = Utc::now().naive_utc();

        sqlx::query(
            r#"
            INSERT INTO charges (
                id, student_id, subscription_id, amount_cents, due_date, description,
                external_charge_id, invoice_url, status, paid_at, pix_code, qr_code_image,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(charge.id.to_string())
        .bind(charge.student_id.to_string())
        .bind(charge.subscription_id.map(|id| id.to_string()))
        .bind(charge.amount_cents)
        .bind(charge.due_date)
        .bind(&charge.description)
        .bind(&charge.external_charge_id)
        .bind(&charge.invoice_url)
        .bind(charge.status.as_str())
        .bind(charge.paid_at.map(|dt| dt.naive_utc()))
        .bind(&charge.pix_code)
        .bind(&charge.qr_code_image)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(charge.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created charge".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Charge>> {
        let row = sqlx::query_as::<_, ChargeRow>(&format!(
            "SELECT {} FROM charges WHERE id = ?",
            CHARGE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_charge).transpose()
    }

    async fn find_by_external_id(&self, external_charge_id: &str) -> Result<Option<Charge>> {
        let row = sqlx::query_as::<_, ChargeRow>(&format!(
            "SELECT {} FROM charges WHERE external_charge_id = ?",
            CHARGE_COLUMNS
        ))
        .bind(external_charge_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_charge).transpose()
    }

    async fn list_by_student(&self, student_id: Uuid, filter: &ChargeFilter) -> Result<ChargePage> {
        let student_id_str = student_id.to_string();
        let status = filter.status.map(|s| s.as_str());

        let rows = sqlx::query_as::<_, ChargeRow>(&format!(
            r#"
            SELECT {}
            FROM charges
            WHERE student_id = ? AND (? IS NULL OR status = ?)
            ORDER BY due_date DESC, created_at DESC
            LIMIT ? OFFSET ?
            "#,
            CHARGE_COLUMNS
        ))
        .bind(&student_id_str)
        .bind(status)
        .bind(status)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM charges WHERE student_id = ? AND (? IS NULL OR status = ?)"
        )
        .bind(&student_id_str)
        .bind(status)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let items = rows
            .into_iter()
            .map(Self::row_to_charge)
            .collect::<Result<Vec<_>>>()?;

        Ok(ChargePage { items, total })
    }

    async fn exists_for_subscription_between(
        &self,
        subscription_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM charges
            WHERE subscription_id = ? AND due_date >= ? AND due_date <= ?
            "#
        )
        .bind(subscription_id.to_string())
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn apply_transition(
        &self,
        external_charge_id: &str,
        target: ChargeStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let target_str = target.as_str();
        let now = Utc::now().naive_utc();

        // Single statement: SQLite applies it atomically, so readers see
        // either the old (status, paid_at) pair or the new one.
        let paid_at_naive = if target.is_paid() {
            Some(paid_at.unwrap_or_else(Utc::now).naive_utc())
        } else {
            None
        };

        let result = sqlx::query(
            r#"
            UPDATE charges
            SET status = ?,
                paid_at = COALESCE(paid_at, ?),
                updated_at = ?
            WHERE external_charge_id = ? AND status <> ?
            "#
        )
        .bind(target_str)
        .bind(paid_at_naive)
        .bind(now)
        .bind(external_charge_id)
        .bind(target_str)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn cache_pix_qr_code(&self, id: Uuid, pix: &PixQrCode) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE charges
            SET pix_code = ?, qr_code_image = ?
            WHERE id = ?
            "#
        )
        .bind(&pix.pix_code)
        .bind(&pix.qr_code_image)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
