use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Weekday};
use serde::Deserialize;
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::actor_from_user;

use crate::models::{
    BatchApproveRequest, BatchRejectRequest, CreateLeaveRequest, CreateWorkShiftRequest, LeaveQuery,
    ShiftKind, UpdateLeaveRequest, UpdateWorkShiftRequest,
};
use crate::ScheduleState;

#[derive(Debug, Deserialize)]
pub struct ShiftListQuery {
    pub weekday: Option<Weekday>,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
    pub shift: Option<ShiftKind>,
}

// ==============================================================================
// WEEKLY SCHEDULE
// ==============================================================================

pub async fn list_shifts(
    State(state): State<Arc<ScheduleState>>,
    Query(query): Query<ShiftListQuery>,
) -> Result<Json<Value>, AppError> {
    let shifts = state.shifts.list_shifts(query.weekday).await?;
    Ok(Json(json!({ "shifts": shifts, "total": shifts.len() })))
}

pub async fn create_shift(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateWorkShiftRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = actor_from_user(&user)?;
    let shift = state.shifts.create_shift(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(json!(shift))))
}

pub async fn update_shift(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path(shift_id): Path<i64>,
    Json(request): Json<UpdateWorkShiftRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let shift = state.shifts.update_shift(&actor, shift_id, request).await?;
    Ok(Json(json!(shift)))
}

pub async fn get_effective_shifts(
    State(state): State<Arc<ScheduleState>>,
    Path(doctor_id): Path<i64>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>, AppError> {
    let shifts = state.resolver.effective_shifts(doctor_id, query.date).await?;
    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "shifts": shifts,
    })))
}

pub async fn get_available_slots(
    State(state): State<Arc<ScheduleState>>,
    Path(doctor_id): Path<i64>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let body = match query.shift {
        Some(shift) => {
            let slots = state.slots.available_slots(doctor_id, query.date, shift).await?;
            json!({ "doctor_id": doctor_id, "date": query.date, "shift": shift, "slots": slots })
        }
        None => {
            let shifts = state.slots.available_slots_for_day(doctor_id, query.date).await?;
            json!({ "doctor_id": doctor_id, "date": query.date, "shifts": shifts })
        }
    };
    Ok(Json(body))
}

// ==============================================================================
// LEAVE REQUESTS
// ==============================================================================

pub async fn create_leave(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateLeaveRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let actor = actor_from_user(&user)?;
    let leave = state.leaves.create_leave(&actor, request).await?;
    Ok((StatusCode::CREATED, Json(json!(leave))))
}

pub async fn list_leaves(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Query(query): Query<LeaveQuery>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let leaves = state.leaves.list_leaves(&actor, query).await?;
    Ok(Json(json!({ "leaves": leaves, "total": leaves.len() })))
}

pub async fn get_leave(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path(leave_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let leave = state.leaves.get_leave(&actor, leave_id).await?;
    Ok(Json(json!(leave)))
}

pub async fn update_leave(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path(leave_id): Path<i64>,
    Json(request): Json<UpdateLeaveRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let leave = state.leaves.update_leave(&actor, leave_id, request).await?;
    Ok(Json(json!(leave)))
}

pub async fn cancel_leave(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path(leave_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let leave = state.leaves.cancel_leave(&actor, leave_id).await?;
    Ok(Json(json!(leave)))
}

pub async fn delete_leave(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path(leave_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let actor = actor_from_user(&user)?;
    state.leaves.delete_leave(&actor, leave_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn batch_approve_leaves(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BatchApproveRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let outcome = state.leaves.batch_approve(&actor, &request.ids).await?;
    Ok(Json(json!(outcome)))
}

pub async fn batch_reject_leaves(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BatchRejectRequest>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let outcome = state.leaves.batch_reject(&actor, &request.ids, &request.reason).await?;
    Ok(Json(json!(outcome)))
}

pub async fn get_leave_balance(
    State(state): State<Arc<ScheduleState>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let actor = actor_from_user(&user)?;
    let balance = state.leaves.get_balance(&actor, doctor_id).await?;
    Ok(Json(json!({
        "doctor_id": balance.doctor_id,
        "annual_allowance": balance.annual_allowance,
        "annual_used": balance.annual_used,
        "remaining": balance.remaining(),
    })))
}
