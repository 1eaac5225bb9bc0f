use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::actor_from_user;

use crate::models::{
    AppointmentQuery, CancelAppointmentRequest, CompleteAppointmentRequest, CreateAppointmentRequest,
    DoctorDecisionRequest, RateAppointmentRequest,
};
use crate::AppointmentState;

/// Decision endpoints accept an empty body.
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))
}

pub async fn create_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.bookings.create_appointment(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(json!(appointment))))
}

pub async fn list_appointments(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointments = state.bookings.list_appointments(&actor, query).await?;
    Ok(Json(json!({ "appointments": appointments, "total": appointments.len() })))
}

pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.bookings.get_appointment(&actor, appointment_id).await?;
    Ok(Json(json!(appointment)))
}

pub async fn get_appointment_by_code(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.bookings.get_by_code(&actor, &code).await?;
    Ok(Json(json!(appointment)))
}

pub async fn approve_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<i64>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let request: DoctorDecisionRequest = optional_body(&body)?;
    let appointment = state.bookings.approve(&actor, appointment_id, request).await?;
    Ok(Json(json!(appointment)))
}

pub async fn reject_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<i64>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let request: DoctorDecisionRequest = optional_body(&body)?;
    let appointment = state.bookings.reject(&actor, appointment_id, request).await?;
    Ok(Json(json!(appointment)))
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<i64>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.bookings.cancel(&actor, appointment_id, request).await?;
    Ok(Json(json!(appointment)))
}

pub async fn check_in_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.bookings.check_in(&actor, appointment_id).await?;
    Ok(Json(json!(appointment)))
}

pub async fn complete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<i64>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.bookings.complete(&actor, appointment_id, request).await?;
    Ok(Json(json!(appointment)))
}

pub async fn mark_no_show(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.bookings.mark_no_show(&actor, appointment_id).await?;
    Ok(Json(json!(appointment)))
}

pub async fn rate_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<i64>,
    Json(request): Json<RateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let appointment = state.bookings.rate(&actor, appointment_id, request).await?;
    Ok(Json(json!(appointment)))
}
