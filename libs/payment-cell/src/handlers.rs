use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::actor_from_user;

use crate::models::CallbackAck;
use crate::PaymentState;

/// First hop recorded by the reverse proxy, or loopback when served directly.
fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|value| value.to_str().ok()))
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

pub async fn create_payment_url(
    State(state): State<Arc<PaymentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<i64>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let response = state
        .gateway
        .build_payment_url(&actor, appointment_id, &client_ip(&headers))
        .await?;
    Ok(Json(json!(response)))
}

pub async fn payment_return(
    State(state): State<Arc<PaymentState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    let outcome = state.gateway.handle_return(&params).await?;
    Ok(Json(json!(outcome)))
}

/// Provider webhook; the provider expects 200 with an ack body whatever the outcome.
pub async fn payment_ipn(
    State(state): State<Arc<PaymentState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<CallbackAck> {
    Json(state.gateway.handle_callback(&params).await)
}
