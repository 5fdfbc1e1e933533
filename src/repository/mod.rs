use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod charge_repository;
pub mod student_repository;
pub mod notification_repository;

pub use charge_repository::SqliteChargeRepository;
pub use student_repository::SqliteStudentRepository;
pub use notification_repository::SqliteNotificationRepository;

#[async_trait]
pub trait ChargeRepository: Send + Sync {
    async fn create(&self, charge: Charge) -> Result<Charge>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Charge>>;
    async fn find_by_external_id(&self, external_charge_id: &str) -> Result<Option<Charge>>;
    async fn list_by_student(&self, student_id: Uuid, filter: &ChargeFilter) -> Result<ChargePage>;
    async fn exists_for_subscription_between(
        &self,
        subscription_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<bool>;
    /// Atomically moves the charge to `target` unless it is already there.
    /// `paid_at` is only written when the column is still empty.
    /// Returns `true` when a row actually changed.
    async fn apply_transition(
        &self,
        external_charge_id: &str,
        target: ChargeStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> Result<bool>;
    /// Touches only the PIX cache columns.
    async fn cache_pix_qr_code(&self, id: Uuid, pix: &PixQrCode) -> Result<()>;
}

#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn create(&self, student: Student) -> Result<Student>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>>;
    /// Stores the id only if none is set yet. Returns `false` when another
    /// id was already there.
    async fn set_gateway_customer_id(&self, id: Uuid, customer_id: &str) -> Result<bool>;
    async fn create_subscription(&self, subscription: Subscription) -> Result<Subscription>;
    async fn find_subscription(&self, id: Uuid, student_id: Uuid) -> Result<Option<Subscription>>;
    /// Active subscriptions whose student is also active.
    async fn list_billable_subscriptions(&self) -> Result<Vec<Subscription>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: Notification) -> Result<Notification>;
    async fn list_by_student(&self, student_id: Uuid, limit: i64) -> Result<Vec<Notification>>;
}
