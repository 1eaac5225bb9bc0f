use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::PaymentState;

pub fn payment_routes(state: Arc<PaymentState>, config: Arc<AppConfig>) -> Router {
    // Provider legs are signed, not authenticated
    let provider_routes = Router::new()
        .route("/return", get(handlers::payment_return))
        .route("/ipn", get(handlers::payment_ipn));

    let protected_routes = Router::new()
        .route("/{appointment_id}/url", post(handlers::create_payment_url))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(provider_routes)
        .merge(protected_routes)
        .with_state(state)
}
