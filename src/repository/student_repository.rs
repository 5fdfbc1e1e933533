use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Student, Subscription},
    error::{AppError, Result},
    repository::StudentRepository,
};

#[derive(FromRow)]
struct StudentRow {
    id: String,
    full_name: String,
    email: Option<String>,
    cpf: Option<String>,
    gateway_customer_id: Option<String>,
    is_active: bool,
}

#[derive(FromRow)]
struct SubscriptionRow {
    id: String,
    student_id: String,
    plan_name: String,
    price_cents: i64,
    next_billing_date: Option<NaiveDate>,
    is_active: bool,
}

pub struct SqliteStudentRepository {
    pool: SqlitePool,
}

impl SqliteStudentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_student(row: StudentRow) -> Result<Student> {
        Ok(Student {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            full_name: row.full_name,
            email: row.email,
            cpf: row.cpf,
            gateway_customer_id: row.gateway_customer_id,
            is_active: row.is_active,
        })
    }

    fn row_to_subscription(row: SubscriptionRow) -> Result<Subscription> {
        Ok(Subscription {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            student_id: Uuid::parse_str(&row.student_id).map_err(|e| AppError::Database(e.to_string()))?,
            plan_name: row.plan_name,
            price_cents: row.price_cents,
            next_billing_date: row.next_billing_date,
            is_active: row.is_active,
        })
    }
}

#[async_trait]
impl StudentRepository for SqliteStudentRepository {
    async fn create(&self, student: Student) -> Result<Student> {
        sqlx::query(
            r#"
            INSERT INTO students (id, full_name, email, cpf, gateway_customer_id, is_active)
            VALUES (?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(student.id.to_string())
        .bind(&student.full_name)
        .bind(&student.email)
        .bind(&student.cpf)
        .bind(&student.gateway_customer_id)
        .bind(student.is_active)
        .execute(&self.pool)
        .await?;

        self.find_by_id(student.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created student".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>> {
        let row = sqlx::query_as::<_, StudentRow>(
            r#"
            SELECT id, full_name, email, cpf, gateway_customer_id, is_active
            FROM students
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_student).transpose()
    }

    async fn set_gateway_customer_id(&self, id: Uuid, customer_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE students SET gateway_customer_id = ? WHERE id = ? AND gateway_customer_id IS NULL",
        )
        .bind(customer_id)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_subscription(&self, subscription: Subscription) -> Result<Subscription> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (id, student_id, plan_name, price_cents, next_billing_date, is_active)
            VALUES (?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(subscription.id.to_string())
        .bind(subscription.student_id.to_string())
        .bind(&subscription.plan_name)
        .bind(subscription.price_cents)
        .bind(subscription.next_billing_date)
        .bind(subscription.is_active)
        .execute(&self.pool)
        .await?;

        Ok(subscription)
    }

    async fn find_subscription(&self, id: Uuid, student_id: Uuid) -> Result<Option<Subscription>> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT id, student_id, plan_name, price_cents, next_billing_date, is_active
            FROM subscriptions
            WHERE id = ? AND student_id = ?
            "#
        )
        .bind(id.to_string())
        .bind(student_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_subscription).transpose()
    }

    async fn list_billable_subscriptions(&self) -> Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            r#"
            SELECT s.id, s.student_id, s.plan_name, s.price_cents, s.next_billing_date, s.is_active
            FROM subscriptions s
            JOIN students st ON st.id = s.student_id
            WHERE s.is_active = 1 AND st.is_active = 1
            ORDER BY s.created_at
            "#
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_subscription).collect()
    }
}
