mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{Fixture, ADMIN_ID, DOCTOR_ID};
use schedule_cell::router::{leave_routes, schedule_routes};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn app(fixture: &Fixture, test_config: &TestConfig) -> Router {
    let config = test_config.to_arc();
    Router::new()
        .nest("/schedule", schedule_routes(fixture.state.clone(), config.clone()))
        .nest("/leaves", leave_routes(fixture.state.clone(), config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_slot_query_is_public() {
    let fixture = Fixture::new().await;
    let app = app(&fixture, &TestConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/schedule/doctors/{}/slots?date=2030-03-04&shift=morning", DOCTOR_ID))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["slots"].as_array().unwrap().len(), 8);
    assert_eq!(body["slots"][0]["start_time"], "08:00:00");
}

#[tokio::test]
async fn test_leave_routes_require_token() {
    let fixture = Fixture::new().await;
    let app = app(&fixture, &TestConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/leaves").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_doctor_files_and_admin_approves_leave() {
    let fixture = Fixture::new().await;
    let config = TestConfig::default();
    let doctor_token = JwtTestUtils::bearer(&TestUser::doctor(DOCTOR_ID), &config.jwt_secret);
    let admin_token = JwtTestUtils::bearer(&TestUser::admin(ADMIN_ID), &config.jwt_secret);

    let create = Request::builder()
        .method("POST")
        .uri("/leaves")
        .header("Authorization", &doctor_token)
        .header("Content-Type", "application/json")
        .body(Body::from(json!({
            "scope": { "kind": "specific_date_shift", "date": "2030-03-04", "shift": "morning" },
            "reason": "medical conference",
            "category": "business_trip"
        }).to_string()))
        .unwrap();
    let response = app(&fixture, &config).oneshot(create).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let leave_id = body_json(response).await["id"].as_i64().unwrap();

    let approve = Request::builder()
        .method("POST")
        .uri("/leaves/batch/approve")
        .header("Authorization", &admin_token)
        .header("Content-Type", "application/json")
        .body(Body::from(json!({ "ids": [leave_id] }).to_string()))
        .unwrap();
    let response = app(&fixture, &config).oneshot(approve).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["succeeded"][0]["status"], "approved");

    let slots = Request::builder()
        .uri(format!("/schedule/doctors/{}/slots?date=2030-03-04", DOCTOR_ID))
        .body(Body::empty())
        .unwrap();
    let body = body_json(app(&fixture, &config).oneshot(slots).await.unwrap()).await;
    assert!(body["shifts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_doctor_cannot_manage_shifts() {
    let fixture = Fixture::new().await;
    let config = TestConfig::default();
    let doctor_token = JwtTestUtils::bearer(&TestUser::doctor(DOCTOR_ID), &config.jwt_secret);

    let request = Request::builder()
        .method("POST")
        .uri("/schedule/shifts")
        .header("Authorization", &doctor_token)
        .header("Content-Type", "application/json")
        .body(Body::from(json!({
            "weekday": "Tue",
            "shift": "evening",
            "start_time": "18:00:00",
            "end_time": "21:00:00"
        }).to_string()))
        .unwrap();
    let response = app(&fixture, &config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["kind"], "authorization");
}
