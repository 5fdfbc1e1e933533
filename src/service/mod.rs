pub mod charge_service;
pub mod notification_service;
pub mod webhook_reconciler;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::auth::SessionStore;
use crate::config::BillingConfig;
use crate::payments::PaymentGateway;
use crate::repository::*;
use charge_service::ChargeService;
use notification_service::NotificationService;
use webhook_reconciler::WebhookReconciler;

pub use charge_service::{CreateChargeRequest, GenerationReport};
pub use webhook_reconciler::ReconcileOutcome;

pub struct ServiceContext {
    pub charge_repo: Arc<dyn ChargeRepository>,
    pub student_repo: Arc<dyn StudentRepository>,
    pub charge_service: Arc<ChargeService>,
    pub webhook_reconciler: Arc<WebhookReconciler>,
    pub notification_service: Arc<NotificationService>,
    pub session_store: Arc<SessionStore>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        gateway: Arc<dyn PaymentGateway>,
        billing: BillingConfig,
    ) -> Self {
        let charge_repo: Arc<dyn ChargeRepository> =
            Arc::new(SqliteChargeRepository::new(db_pool.clone()));
        let student_repo: Arc<dyn StudentRepository> =
            Arc::new(SqliteStudentRepository::new(db_pool.clone()));
        let notification_repo: Arc<dyn NotificationRepository> =
            Arc::new(SqliteNotificationRepository::new(db_pool.clone()));

        let notification_service = Arc::new(NotificationService::new(notification_repo));
        let charge_service = Arc::new(ChargeService::new(
            charge_repo.clone(),
            student_repo.clone(),
            gateway,
            notification_service.clone(),
            billing,
        ));
        let webhook_reconciler = Arc::new(WebhookReconciler::new(
            charge_repo.clone(),
            notification_service.clone(),
        ));
        let session_store = Arc::new(SessionStore::new(db_pool.clone()));

        Self {
            charge_repo,
            student_repo,
            charge_service,
            webhook_reconciler,
            notification_service,
            session_store,
            db_pool,
        }
    }
}
