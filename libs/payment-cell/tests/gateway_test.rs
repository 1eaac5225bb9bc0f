mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use tokio_test::assert_ok;

use appointment_cell::models::{AppointmentStatus, DoctorDecisionRequest, PaymentMethod, PaymentStatus};
use payment_cell::models::{CallbackAck, PaymentError};
use shared_models::auth::ActorContext;

use common::{date, time, Fixture, OTHER_PATIENT_ID};

const AMOUNT: i64 = 24_000_000;

#[tokio::test]
async fn test_payment_url_is_signed_and_reuses_reference() {
    let fixture = Fixture::new().await;
    let booked = fixture.book(PaymentMethod::Gateway).await;

    let first = fixture.gateway.build_payment_url(&fixture.patient, booked.id, "203.0.113.9").await.unwrap();
    assert_eq!(first.amount, AMOUNT);
    assert!(first.transaction_ref.starts_with(&booked.confirmation_code));
    assert!(first.payment_url.starts_with(&fixture.config.payment.pay_url));
    assert!(first.payment_url.contains("vnp_Amount=24000000"));
    assert!(first.payment_url.contains("vnp_Command=pay"));
    assert!(first.payment_url.contains("vnp_IpAddr=203.0.113.9"));
    assert!(first.payment_url.contains("vnp_CreateDate=20300301090000"));
    assert!(first.payment_url.contains("vnp_ExpireDate=20300301091500"));
    assert!(first.payment_url.contains("&vnp_SecureHash="));

    let processing = fixture.bookings.get_appointment(&fixture.patient, booked.id).await.unwrap();
    assert_eq!(processing.payment_status, PaymentStatus::Processing);

    fixture.clock.advance(Duration::minutes(5));
    let second = fixture.gateway.build_payment_url(&fixture.patient, booked.id, "203.0.113.9").await.unwrap();
    assert_eq!(second.transaction_ref, first.transaction_ref);
}

#[tokio::test]
async fn test_payment_url_preconditions() {
    let fixture = Fixture::new().await;
    let booked = fixture.book(PaymentMethod::Gateway).await;

    assert_matches!(
        fixture
            .gateway
            .build_payment_url(&ActorContext::patient(OTHER_PATIENT_ID), booked.id, "127.0.0.1")
            .await,
        Err(PaymentError::Unauthorized(_))
    );
    assert_matches!(
        fixture.gateway.build_payment_url(&fixture.patient, 999, "127.0.0.1").await,
        Err(PaymentError::NotFound(_))
    );

    let cancelled = fixture
        .bookings
        .cancel(&fixture.patient, booked.id, appointment_cell::models::CancelAppointmentRequest {
            reason: "booked by mistake".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(cancelled.status, AppointmentStatus::CancelledByPatient);

    let cash = fixture.book(PaymentMethod::Cash).await;
    assert_matches!(
        fixture.gateway.build_payment_url(&fixture.patient, cash.id, "127.0.0.1").await,
        Err(PaymentError::Validation(_))
    );
    assert_matches!(
        fixture.gateway.build_payment_url(&fixture.patient, booked.id, "127.0.0.1").await,
        Err(PaymentError::Conflict(_))
    );
}

#[tokio::test]
async fn test_paid_booking_still_needs_the_doctor() {
    let fixture = Fixture::new().await;
    let booked = fixture.book(PaymentMethod::Gateway).await;
    assert_eq!(booked.status, AppointmentStatus::PendingPayment);
    let url = fixture.gateway.build_payment_url(&fixture.patient, booked.id, "127.0.0.1").await.unwrap();

    let ack = fixture
        .gateway
        .handle_callback(&fixture.signed_callback(&url.transaction_ref, AMOUNT, "00"))
        .await;
    assert_eq!(ack, CallbackAck::success());

    let paid = fixture.bookings.get_appointment(&fixture.patient, booked.id).await.unwrap();
    assert_eq!(paid.status, AppointmentStatus::PendingDoctorApproval);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert!(paid.paid_at.is_some());
    assert_eq!(paid.raw_payment_payload.as_ref().unwrap()["vnp_TransactionNo"], "14012345");

    let rejected = fixture
        .bookings
        .reject(&fixture.doctor, booked.id, DoctorDecisionRequest {
            reason: Some("Needs a specialist".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(rejected.status, AppointmentStatus::Rejected);
    assert_eq!(rejected.payment_status, PaymentStatus::Refunded);
    assert_eq!(rejected.refund_amount, Some(240_000));
}

#[tokio::test]
async fn test_replayed_callback_is_acknowledged_once() {
    let fixture = Fixture::new().await;
    let booked = fixture.book(PaymentMethod::Gateway).await;
    let url = fixture.gateway.build_payment_url(&fixture.patient, booked.id, "127.0.0.1").await.unwrap();
    let callback = fixture.signed_callback(&url.transaction_ref, AMOUNT, "00");

    assert_eq!(fixture.gateway.handle_callback(&callback).await.rsp_code, CallbackAck::SUCCESS);
    let first = fixture.bookings.get_appointment(&fixture.patient, booked.id).await.unwrap();

    fixture.clock.advance(Duration::minutes(3));
    let replay = fixture.gateway.handle_callback(&callback).await;
    assert_eq!(replay.rsp_code, CallbackAck::ALREADY_PROCESSED);

    let after = fixture.bookings.get_appointment(&fixture.patient, booked.id).await.unwrap();
    assert_eq!(after.paid_at, first.paid_at);
    assert_eq!(after.updated_at, first.updated_at);
}

#[tokio::test]
async fn test_callback_rejections_leave_booking_untouched() {
    let fixture = Fixture::new().await;
    let booked = fixture.book(PaymentMethod::Gateway).await;
    let url = fixture.gateway.build_payment_url(&fixture.patient, booked.id, "127.0.0.1").await.unwrap();
    let before = fixture.bookings.get_appointment(&fixture.patient, booked.id).await.unwrap();

    let mut tampered = fixture.signed_callback(&url.transaction_ref, AMOUNT, "00");
    tampered.insert("vnp_Amount".to_string(), "100".to_string());
    assert_eq!(fixture.gateway.handle_callback(&tampered).await.rsp_code, CallbackAck::INVALID_SIGNATURE);

    let short = fixture.signed_callback(&url.transaction_ref, AMOUNT - 100, "00");
    assert_eq!(fixture.gateway.handle_callback(&short).await.rsp_code, CallbackAck::AMOUNT_MISMATCH);

    let unknown = fixture.signed_callback("NOSUCHREF", AMOUNT, "00");
    assert_eq!(fixture.gateway.handle_callback(&unknown).await.rsp_code, CallbackAck::NOT_FOUND);

    let after = fixture.bookings.get_appointment(&fixture.patient, booked.id).await.unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_failed_payment_gets_a_fresh_reference() {
    let fixture = Fixture::new().await;
    let booked = fixture.book(PaymentMethod::Gateway).await;
    let first = fixture.gateway.build_payment_url(&fixture.patient, booked.id, "127.0.0.1").await.unwrap();

    let ack = fixture
        .gateway
        .handle_callback(&fixture.signed_callback(&first.transaction_ref, AMOUNT, "24"))
        .await;
    assert_eq!(ack, CallbackAck::success());

    let failed = fixture.bookings.get_appointment(&fixture.patient, booked.id).await.unwrap();
    assert_eq!(failed.payment_status, PaymentStatus::Failed);
    assert_eq!(failed.status, AppointmentStatus::PendingPayment);
    assert!(failed.payment_failed_at.is_some());

    fixture.clock.advance(Duration::minutes(2));
    let retry = fixture.gateway.build_payment_url(&fixture.patient, booked.id, "127.0.0.1").await.unwrap();
    assert_ne!(retry.transaction_ref, first.transaction_ref);

    let retrying = fixture.bookings.get_appointment(&fixture.patient, booked.id).await.unwrap();
    assert_eq!(retrying.payment_status, PaymentStatus::Processing);

    // The old reference no longer points at the booking
    let stale = fixture.signed_callback(&first.transaction_ref, AMOUNT, "00");
    assert_eq!(fixture.gateway.handle_callback(&stale).await.rsp_code, CallbackAck::NOT_FOUND);

    let ok = fixture.signed_callback(&retry.transaction_ref, AMOUNT, "00");
    assert_eq!(fixture.gateway.handle_callback(&ok).await.rsp_code, CallbackAck::SUCCESS);
}

#[tokio::test]
async fn test_late_payment_on_expired_booking_is_recorded_only() {
    let fixture = Fixture::new().await;
    let booked = fixture.book(PaymentMethod::Gateway).await;
    let url = fixture.gateway.build_payment_url(&fixture.patient, booked.id, "127.0.0.1").await.unwrap();

    fixture.clock.advance(Duration::minutes(45));
    assert_eq!(fixture.sweeper.run_once().await.unwrap(), 1);

    let ack = fixture
        .gateway
        .handle_callback(&fixture.signed_callback(&url.transaction_ref, AMOUNT, "00"))
        .await;
    assert_eq!(ack, CallbackAck::success());

    let late = fixture.bookings.get_appointment(&fixture.patient, booked.id).await.unwrap();
    assert_eq!(late.status, AppointmentStatus::Expired);
    assert_eq!(late.payment_status, PaymentStatus::Paid);
}

#[tokio::test]
async fn test_return_leg_reports_without_changing_state() {
    let fixture = Fixture::new().await;
    let booked = fixture.book(PaymentMethod::Gateway).await;
    let url = fixture.gateway.build_payment_url(&fixture.patient, booked.id, "127.0.0.1").await.unwrap();
    let before = fixture.bookings.get_appointment(&fixture.patient, booked.id).await.unwrap();

    let outcome = fixture
        .gateway
        .handle_return(&fixture.signed_callback(&url.transaction_ref, AMOUNT, "00"))
        .await
        .unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.appointment_id, Some(booked.id));

    let after = fixture.bookings.get_appointment(&fixture.patient, booked.id).await.unwrap();
    assert_eq!(after, before);

    let mut forged = fixture.signed_callback(&url.transaction_ref, AMOUNT, "00");
    forged.insert("vnp_ResponseCode".to_string(), "24".to_string());
    assert_matches!(fixture.gateway.handle_return(&forged).await, Err(PaymentError::InvalidSignature));
}

#[tokio::test]
async fn test_cash_booking_is_settled_at_completion() {
    let fixture = Fixture::new().await;
    let booked = fixture.book(PaymentMethod::Cash).await;
    assert_ok!(fixture.bookings.approve(&fixture.doctor, booked.id, Default::default()).await);

    fixture.clock.set_local(date(2030, 3, 4).and_time(time(8, 25)));
    assert_ok!(fixture.bookings.check_in(&fixture.doctor, booked.id).await);
    let completed = fixture
        .bookings
        .complete(&fixture.doctor, booked.id, appointment_cell::models::CompleteAppointmentRequest {
            diagnosis: "Healthy".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(completed.payment_status, PaymentStatus::Paid);
    assert_matches!(
        fixture.gateway.build_payment_url(&fixture.patient, booked.id, "127.0.0.1").await,
        Err(PaymentError::Validation(_))
    );
}
