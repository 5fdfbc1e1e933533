#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use academy_billing::{
    config::BillingConfig,
    connect_database,
    domain::{
        Charge, ChargeFilter, ChargePage, ChargeStatus, GatewayPayment, PixQrCode, Student,
        Subscription,
    },
    error::{AppError, Result as AppResult},
    payments::{
        GatewayCharge, GatewayChargeRequest, GatewayCustomer, GatewayError, GatewayFailure,
        PaymentGateway,
    },
    repository::ChargeRepository,
    service::{CreateChargeRequest, ServiceContext},
};

/// In-process stand-in for the payment provider.
#[derive(Default)]
pub struct FakeGateway {
    pub fail_create_charge: AtomicBool,
    pub fail_pix: AtomicBool,
    pub omit_pix_on_create: AtomicBool,
    charge_counter: AtomicUsize,
    customer_counter: AtomicUsize,
    calls: Mutex<Vec<String>>,
    charge_requests: Mutex<Vec<GatewayChargeRequest>>,
}

impl FakeGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == operation).count()
    }

    pub fn charge_requests(&self) -> Vec<GatewayChargeRequest> {
        self.charge_requests.lock().unwrap().clone()
    }

    fn record(&self, operation: &str) {
        self.calls.lock().unwrap().push(operation.to_string());
    }

    fn pix_for(external_charge_id: &str) -> PixQrCode {
        PixQrCode {
            pix_code: format!("00020126pix-{}", external_charge_id),
            qr_code_image: format!("data:image/png;base64,qr-{}", external_charge_id),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_customer(&self, _customer: &GatewayCustomer) -> Result<String, GatewayError> {
        self.record("create_customer");
        let n = self.customer_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("cus_{}", n))
    }

    async fn create_charge(&self, request: &GatewayChargeRequest) -> Result<GatewayCharge, GatewayError> {
        self.record("create_charge");
        self.charge_requests.lock().unwrap().push(request.clone());
        if self.fail_create_charge.load(Ordering::SeqCst) {
            return Err(GatewayError::new("create_charge", GatewayFailure::Timeout));
        }
        let n = self.charge_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let external_charge_id = format!("ext-{}", n);
        let pix = if self.omit_pix_on_create.load(Ordering::SeqCst) {
            None
        } else {
            Some(Self::pix_for(&external_charge_id))
        };
        Ok(GatewayCharge {
            invoice_url: Some(format!("https://sandbox.asaas.com/i/{}", external_charge_id)),
            external_charge_id,
            pix,
        })
    }

    async fn fetch_pix_qr_code(&self, external_charge_id: &str) -> Result<PixQrCode, GatewayError> {
        self.record("fetch_pix_qr_code");
        if self.fail_pix.load(Ordering::SeqCst) {
            return Err(GatewayError::new(
                "fetch_pix_qr_code",
                GatewayFailure::Status { status: 503, body: "unavailable".to_string() },
            ));
        }
        Ok(Self::pix_for(external_charge_id))
    }
}

/// Charge store that delegates to a real one but can be told to fail.
pub struct FaultyCharges {
    pub inner: Arc<dyn ChargeRepository>,
    pub fail_subscription: Option<Uuid>,
    pub fail_external_lookup: bool,
}

impl FaultyCharges {
    pub fn wrap(inner: Arc<dyn ChargeRepository>) -> Self {
        Self { inner, fail_subscription: None, fail_external_lookup: false }
    }

    fn broken() -> AppError {
        AppError::Database("disk I/O error".to_string())
    }
}

#[async_trait]
impl ChargeRepository for FaultyCharges {
    async fn create(&self, charge: Charge) -> AppResult<Charge> {
        self.inner.create(charge).await
    }

    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Charge>> {
        self.inner.find_by_id(id).await
    }

    async fn find_by_external_id(&self, external_charge_id: &str) -> AppResult<Option<Charge>> {
        if self.fail_external_lookup {
            return Err(Self::broken());
        }
        self.inner.find_by_external_id(external_charge_id).await
    }

    async fn list_by_student(&self, student_id: Uuid, filter: &ChargeFilter) -> AppResult<ChargePage> {
        self.inner.list_by_student(student_id, filter).await
    }

    async fn exists_for_subscription_between(
        &self,
        subscription_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<bool> {
        if self.fail_subscription == Some(subscription_id) {
            return Err(Self::broken());
        }
        self.inner.exists_for_subscription_between(subscription_id, from, to).await
    }

    async fn apply_transition(
        &self,
        external_charge_id: &str,
        target: ChargeStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> AppResult<bool> {
        self.inner.apply_transition(external_charge_id, target, paid_at).await
    }

    async fn cache_pix_qr_code(&self, id: Uuid, pix: &PixQrCode) -> AppResult<()> {
        self.inner.cache_pix_qr_code(id, pix).await
    }
}

pub struct TestContext {
    pub context: Arc<ServiceContext>,
    pub gateway: Arc<FakeGateway>,
}

pub async fn setup() -> TestContext {
    // One connection: every pooled connection to :memory: would be a separate database.
    let pool = connect_database("sqlite::memory:", 1)
        .await
        .expect("in-memory database");
    let gateway = FakeGateway::new();
    let context = Arc::new(ServiceContext::new(
        pool,
        gateway.clone(),
        BillingConfig::default(),
    ));
    TestContext { context, gateway }
}

pub async fn insert_student(ctx: &TestContext, name: &str) -> Student {
    ctx.context
        .student_repo
        .create(Student {
            id: Uuid::new_v4(),
            full_name: name.to_string(),
            email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
            cpf: Some("123.456.789-09".to_string()),
            gateway_customer_id: None,
            is_active: true,
        })
        .await
        .expect("student inserted")
}

pub async fn insert_subscription(
    ctx: &TestContext,
    student_id: Uuid,
    price_cents: i64,
    next_billing_date: Option<NaiveDate>,
) -> Subscription {
    ctx.context
        .student_repo
        .create_subscription(Subscription {
            id: Uuid::new_v4(),
            student_id,
            plan_name: "Monthly".to_string(),
            price_cents,
            next_billing_date,
            is_active: true,
        })
        .await
        .expect("subscription inserted")
}

pub async fn create_charge(ctx: &TestContext, student_id: Uuid, amount_cents: i64) -> Charge {
    ctx.context
        .charge_service
        .create_charge(CreateChargeRequest {
            student_id,
            subscription_id: None,
            amount_cents,
            due_date: Some(Utc::now().date_naive()),
            description: None,
        })
        .await
        .expect("charge created")
}

pub fn payment(external_charge_id: &str) -> GatewayPayment {
    GatewayPayment {
        id: external_charge_id.to_string(),
        customer: Some("cus_1".to_string()),
        status: None,
        value: Some(150.0),
        billing_type: Some("PIX".to_string()),
        confirmed_date: None,
        payment_date: None,
        external_reference: None,
    }
}
