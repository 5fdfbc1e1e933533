pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        .route("/health", get(handlers::root::health_check))

        // Student portal, behind the session middleware
        .nest("/api/portal", portal_routes(app_state.clone()))

        // Gateway callbacks, behind the shared-secret check
        .nest("/webhook", webhook_routes(app_state.clone()))

        .with_state(app_state)

        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn portal_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/payments", get(handlers::payments::list))
        .route("/payments/create", post(handlers::payments::create))
        .route("/payments/:id", get(handlers::payments::get))
        .route("/payments/:id/status", get(handlers::payments::status))
        .route("/payments/:id/qr-code", get(handlers::payments::qr_code))
        .route("/notifications", get(handlers::notifications::list))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_student,
        ))
}

fn webhook_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/asaas", post(handlers::webhook::asaas))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::webhook_auth::require_webhook_token,
        ))
}
