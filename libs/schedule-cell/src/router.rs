use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::ScheduleState;

pub fn schedule_routes(state: Arc<ScheduleState>, config: Arc<AppConfig>) -> Router {
    // Slot lookups are public; patients browse them before signing in
    let public_routes = Router::new()
        .route("/doctors/{doctor_id}/effective", get(handlers::get_effective_shifts))
        .route("/doctors/{doctor_id}/slots", get(handlers::get_available_slots));

    let protected_routes = Router::new()
        .route("/shifts", get(handlers::list_shifts).post(handlers::create_shift))
        .route("/shifts/{shift_id}", put(handlers::update_shift))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn leave_routes(state: Arc<ScheduleState>, config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_leave).get(handlers::list_leaves))
        .route("/batch/approve", post(handlers::batch_approve_leaves))
        .route("/batch/reject", post(handlers::batch_reject_leaves))
        .route("/balance/{doctor_id}", get(handlers::get_leave_balance))
        .route(
            "/{leave_id}",
            get(handlers::get_leave).put(handlers::update_leave).delete(handlers::delete_leave),
        )
        .route("/{leave_id}/cancel", post(handlers::cancel_leave))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
