mod common;

use std::sync::Arc;

use academy_billing::{api::create_app, config::Settings};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::*;

const WEBHOOK_TOKEN: &str = "whsec-test";

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.gateway.webhook_token = Some(WEBHOOK_TOKEN.to_string());
    settings
}

fn app(ctx: &TestContext) -> Router {
    create_app(ctx.context.clone(), Arc::new(settings()))
}

async fn login(ctx: &TestContext, student_id: Uuid) -> String {
    let token = format!("session-{}", Uuid::new_v4());
    ctx.context
        .session_store
        .create(student_id, &token, Utc::now() + Duration::hours(1))
        .await
        .expect("session created");
    token
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str, token: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn webhook(token: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::post("/webhook/asaas").header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header("asaas-access-token", token);
    }
    builder.body(body.into()).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let ctx = setup().await;
    let (status, body) = send(
        app(&ctx),
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn portal_requires_a_session() {
    let ctx = setup().await;

    let (status, body) = send(
        app(&ctx),
        Request::get("/api/portal/payments").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(app(&ctx), get("/api/portal/payments", "not-a-session")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn session_cookie_is_accepted() {
    let ctx = setup().await;
    let student = insert_student(&ctx, "Ana Souza").await;
    let token = login(&ctx, student.id).await;

    let request = Request::get("/api/portal/payments")
        .header(header::COOKIE, format!("session={}", token))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app(&ctx), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn create_then_poll_until_confirmed() {
    let ctx = setup().await;
    let student = insert_student(&ctx, "Bruno Lima").await;
    let token = login(&ctx, student.id).await;

    let (status, created) = send(
        app(&ctx),
        post_json(
            "/api/portal/payments/create",
            &token,
            json!({ "amount": 150.00, "dueDate": "2025-04-10", "description": "April tuition" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["success"], true);
    assert!(created["pixCode"].as_str().is_some());
    let payment_id = created["paymentId"].as_str().unwrap().to_string();

    let status_uri = format!("/api/portal/payments/{}/status", payment_id);
    let (status, polled) = send(app(&ctx), get(&status_uri, &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(polled["status"], "PENDING");
    assert!(polled["paidDate"].is_null());

    let delivery = json!({
        "event": "PAYMENT_CONFIRMED",
        "payment": { "id": "ext-1", "status": "CONFIRMED", "value": 150.00, "billingType": "PIX" }
    });
    let (status, ack) = send(app(&ctx), webhook(Some(WEBHOOK_TOKEN), delivery.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["success"], true);

    let (_, polled) = send(app(&ctx), get(&status_uri, &token)).await;
    assert_eq!(polled["status"], "CONFIRMED");
    assert!(polled["paidDate"].is_string());

    // Redelivery is acknowledged but changes nothing.
    let (status, ack) = send(app(&ctx), webhook(Some(WEBHOOK_TOKEN), delivery.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["success"], false);

    let (_, detail) = send(app(&ctx), get(&format!("/api/portal/payments/{}", payment_id), &token)).await;
    assert_eq!(detail["payment"]["amount"], 150.0);
    assert_eq!(detail["payment"]["dueDate"], "2025-04-10");
    assert_eq!(detail["payment"]["status"], "CONFIRMED");
}

#[tokio::test]
async fn invalid_create_requests_are_rejected() {
    let ctx = setup().await;
    let student = insert_student(&ctx, "Carla Dias").await;
    let token = login(&ctx, student.id).await;

    for payload in [
        json!({ "amount": -10.0 }),
        json!({ "amount": 0 }),
        json!({ "amount": 10.0, "dueDate": "10/04/2025" }),
        json!({ "amount": 1e300 }),
        json!({ "description": "no amount" }),
    ] {
        let (status, body) = send(app(&ctx), post_json("/api/portal/payments/create", &token, payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    assert!(ctx.gateway.calls().is_empty());
}

#[tokio::test]
async fn gateway_outage_maps_to_bad_gateway() {
    let ctx = setup().await;
    let student = insert_student(&ctx, "Diego Alves").await;
    let token = login(&ctx, student.id).await;
    ctx.gateway.fail_create_charge.store(true, std::sync::atomic::Ordering::SeqCst);

    let (status, body) = send(
        app(&ctx),
        post_json("/api/portal/payments/create", &token, json!({ "amount": 99.9 })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn foreign_and_malformed_ids_are_not_found() {
    let ctx = setup().await;
    let owner = insert_student(&ctx, "Eva Rocha").await;
    let intruder = insert_student(&ctx, "Fabio Melo").await;
    let charge = create_charge(&ctx, owner.id, 5000).await;
    let token = login(&ctx, intruder.id).await;

    for uri in [
        format!("/api/portal/payments/{}", charge.id),
        format!("/api/portal/payments/{}/status", charge.id),
        format!("/api/portal/payments/{}/qr-code", charge.id),
        "/api/portal/payments/not-a-uuid".to_string(),
    ] {
        let (status, body) = send(app(&ctx), get(&uri, &token)).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["success"], false);
    }
}

#[tokio::test]
async fn qr_code_and_listing() {
    let ctx = setup().await;
    let student = insert_student(&ctx, "Gabi Nunes").await;
    let token = login(&ctx, student.id).await;
    let first = create_charge(&ctx, student.id, 1000).await;
    create_charge(&ctx, student.id, 2000).await;

    let (status, qr) = send(
        app(&ctx),
        get(&format!("/api/portal/payments/{}/qr-code", first.id), &token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(qr["pixCode"], "00020126pix-ext-1");
    assert!(qr["qrCodeImage"].as_str().unwrap().starts_with("data:image/png;base64,"));

    let (status, page) = send(app(&ctx), get("/api/portal/payments?limit=1", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["payments"].as_array().unwrap().len(), 1);

    let (_, filtered) = send(app(&ctx), get("/api/portal/payments?status=RECEIVED", &token)).await;
    assert_eq!(filtered["total"], 0);

    let (status, _) = send(app(&ctx), get("/api/portal/payments?status=BOGUS", &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, notifications) = send(app(&ctx), get("/api/portal/notifications", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(notifications["notifications"].as_array().unwrap().len(), 2);
    assert_eq!(notifications["notifications"][0]["type"], "PAYMENT_DUE");
}

#[tokio::test]
async fn webhook_rejects_bad_tokens() {
    let ctx = setup().await;
    let student = insert_student(&ctx, "Hugo Pires").await;
    let charge = create_charge(&ctx, student.id, 5000).await;
    let delivery = json!({
        "event": "PAYMENT_RECEIVED",
        "payment": { "id": charge.external_charge_id }
    })
    .to_string();

    for token in [None, Some("wrong")] {
        let (status, _) = send(app(&ctx), webhook(token, delivery.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let stored = ctx.context.charge_repo.find_by_id(charge.id).await.unwrap().unwrap();
    assert!(!stored.status.is_paid());
}

#[tokio::test]
async fn webhook_acknowledges_what_it_cannot_apply() {
    let ctx = setup().await;

    for body in [
        "{not json".to_string(),
        json!({ "event": "PAYMENT_CONFIRMED" }).to_string(),
        json!({ "event": "PAYMENT_CONFIRMED", "payment": { "id": "ext-missing" } }).to_string(),
        json!({ "event": "PAYMENT_CREATED", "payment": { "id": "ext-missing" } }).to_string(),
    ] {
        let (status, ack) = send(app(&ctx), webhook(Some(WEBHOOK_TOKEN), body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["success"], false);
    }
}

#[tokio::test]
async fn slow_webhook_is_acknowledged_and_finished_in_background() {
    let ctx = setup().await;
    let student = insert_student(&ctx, "Ivo Dantas").await;
    let charge = create_charge(&ctx, student.id, 5000).await;

    let mut settings = settings();
    settings.webhook.processing_timeout_ms = 50;
    let app = create_app(ctx.context.clone(), Arc::new(settings));

    // Holding the only pooled connection stalls the store write.
    let held = ctx.context.db_pool.acquire().await.unwrap();

    let delivery = json!({
        "event": "PAYMENT_RECEIVED",
        "payment": { "id": charge.external_charge_id }
    });
    let (status, ack) = send(app, webhook(Some(WEBHOOK_TOKEN), delivery.to_string())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["success"], false);

    drop(held);

    let mut stored = None;
    for _ in 0..100 {
        let current = ctx.context.charge_repo.find_by_id(charge.id).await.unwrap().unwrap();
        if current.status.is_paid() {
            stored = Some(current);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    let stored = stored.expect("background write completed");
    assert_eq!(stored.status, academy_billing::domain::ChargeStatus::Received);
    assert!(stored.paid_at.is_some());
}
