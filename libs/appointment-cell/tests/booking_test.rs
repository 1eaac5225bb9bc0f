mod common;

use assert_matches::assert_matches;
use chrono::Duration;

use appointment_cell::models::{AppointmentError, AppointmentQuery, AppointmentStatus, PaymentMethod, PaymentStatus};
use schedule_cell::models::{DegreeRank, DoctorProfile};
use shared_models::auth::ActorContext;

use common::{booking_request, monday, time, Fixture, DOCTOR_ID, OTHER_DOCTOR_ID, OTHER_PATIENT_ID, PATIENT_ID};

#[tokio::test]
async fn test_cash_booking_waits_for_doctor() {
    let fixture = Fixture::new().await;

    let appointment = fixture
        .bookings
        .create_appointment(&fixture.patient, booking_request(DOCTOR_ID, time(8, 30), PaymentMethod::Cash))
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::PendingDoctorApproval);
    assert_eq!(appointment.payment_status, PaymentStatus::Unpaid);
    assert_eq!(appointment.patient_id, PATIENT_ID);
    assert_eq!(appointment.price, 240_000);
    assert_eq!(appointment.confirmation_code.len(), 8);

    common::settle().await;
    assert_eq!(fixture.notifier.events(), vec!["appointment.created".to_string()]);
}

#[tokio::test]
async fn test_gateway_booking_waits_for_payment() {
    let fixture = Fixture::new().await;

    let appointment = fixture
        .bookings
        .create_appointment(&fixture.patient, booking_request(OTHER_DOCTOR_ID, time(9, 0), PaymentMethod::Gateway))
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::PendingPayment);
    assert_eq!(appointment.price, 150_000);
    assert_eq!(appointment.amount_minor(), 15_000_000);
}

#[tokio::test]
async fn test_booked_slot_is_no_longer_offered() {
    let fixture = Fixture::new().await;
    fixture
        .bookings
        .create_appointment(&fixture.patient, booking_request(DOCTOR_ID, time(8, 30), PaymentMethod::Cash))
        .await
        .unwrap();

    let slots = fixture
        .slots
        .available_slots(DOCTOR_ID, monday(), schedule_cell::models::ShiftKind::Morning)
        .await
        .unwrap();
    let taken: Vec<_> = slots.iter().filter(|s| !s.available).map(|s| s.start_time).collect();
    assert_eq!(taken, vec![time(8, 30)]);
}

#[tokio::test]
async fn test_date_window_is_enforced() {
    let fixture = Fixture::new().await;

    let mut today = booking_request(DOCTOR_ID, time(8, 30), PaymentMethod::Cash);
    today.date = common::date(2030, 3, 1);
    assert_matches!(
        fixture.bookings.create_appointment(&fixture.patient, today).await,
        Err(AppointmentError::Validation(_))
    );

    let mut too_far = booking_request(DOCTOR_ID, time(8, 30), PaymentMethod::Cash);
    too_far.date = monday() + Duration::days(35);
    assert_matches!(
        fixture.bookings.create_appointment(&fixture.patient, too_far).await,
        Err(AppointmentError::Validation(_))
    );
}

#[tokio::test]
async fn test_slot_must_be_aligned_and_inside_shift() {
    let fixture = Fixture::new().await;

    for at in [time(8, 15), time(12, 0), time(14, 0)] {
        let result = fixture
            .bookings
            .create_appointment(&fixture.patient, booking_request(DOCTOR_ID, at, PaymentMethod::Cash))
            .await;
        assert_matches!(result, Err(AppointmentError::Validation(_)), "{} should not be bookable", at);
    }
}

#[tokio::test]
async fn test_second_booking_for_same_slot_conflicts() {
    let fixture = Fixture::new().await;
    fixture
        .bookings
        .create_appointment(&fixture.patient, booking_request(DOCTOR_ID, time(8, 30), PaymentMethod::Cash))
        .await
        .unwrap();

    let result = fixture
        .bookings
        .create_appointment(
            &ActorContext::patient(OTHER_PATIENT_ID),
            booking_request(DOCTOR_ID, time(8, 30), PaymentMethod::Gateway),
        )
        .await;
    assert_matches!(result, Err(AppointmentError::Conflict(_)));
}

#[tokio::test]
async fn test_concurrent_bookings_for_one_slot_admit_exactly_one() {
    let fixture = Fixture::new().await;
    let first = ActorContext::patient(PATIENT_ID);
    let second = ActorContext::patient(OTHER_PATIENT_ID);

    let (a, b) = futures::join!(
        fixture
            .bookings
            .create_appointment(&first, booking_request(DOCTOR_ID, time(8, 30), PaymentMethod::Cash)),
        fixture
            .bookings
            .create_appointment(&second, booking_request(DOCTOR_ID, time(8, 30), PaymentMethod::Cash)),
    );

    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|r| matches!(r, Err(AppointmentError::Conflict(_)))));

    let held = fixture
        .bookings
        .list_appointments(&fixture.admin, AppointmentQuery { doctor_id: Some(DOCTOR_ID), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(held.len(), 1);
}

#[tokio::test]
async fn test_patient_cannot_hold_two_doctors_at_once() {
    let fixture = Fixture::new().await;
    fixture
        .bookings
        .create_appointment(&fixture.patient, booking_request(DOCTOR_ID, time(9, 0), PaymentMethod::Cash))
        .await
        .unwrap();

    let result = fixture
        .bookings
        .create_appointment(&fixture.patient, booking_request(OTHER_DOCTOR_ID, time(9, 0), PaymentMethod::Cash))
        .await;
    assert_matches!(result, Err(AppointmentError::Conflict(_)));
}

#[tokio::test]
async fn test_cancelled_slot_can_be_rebooked() {
    let fixture = Fixture::new().await;
    let first = fixture
        .bookings
        .create_appointment(&fixture.patient, booking_request(DOCTOR_ID, time(10, 0), PaymentMethod::Cash))
        .await
        .unwrap();
    fixture
        .bookings
        .cancel(&fixture.patient, first.id, appointment_cell::models::CancelAppointmentRequest {
            reason: "plans changed".to_string(),
        })
        .await
        .unwrap();

    let rebooked = fixture
        .bookings
        .create_appointment(
            &ActorContext::patient(OTHER_PATIENT_ID),
            booking_request(DOCTOR_ID, time(10, 0), PaymentMethod::Cash),
        )
        .await;
    assert!(rebooked.is_ok());
}

#[tokio::test]
async fn test_inactive_or_unknown_doctor_is_rejected() {
    let fixture = Fixture::new().await;
    fixture.directory.upsert(DoctorProfile {
        doctor_id: 9,
        facility_id: 1,
        base_price: 100_000,
        degree_rank: DegreeRank::Doctor,
        slot_minutes: None,
        max_daily_appointments: None,
        active: false,
    }).await;

    assert_matches!(
        fixture
            .bookings
            .create_appointment(&fixture.patient, booking_request(9, time(8, 0), PaymentMethod::Cash))
            .await,
        Err(AppointmentError::Validation(_))
    );
    assert_matches!(
        fixture
            .bookings
            .create_appointment(&fixture.patient, booking_request(99, time(8, 0), PaymentMethod::Cash))
            .await,
        Err(AppointmentError::NotFound(_))
    );
}

#[tokio::test]
async fn test_booking_actor_rules() {
    let fixture = Fixture::new().await;

    let mut for_someone_else = booking_request(DOCTOR_ID, time(8, 0), PaymentMethod::Cash);
    for_someone_else.patient_id = Some(OTHER_PATIENT_ID);
    assert_matches!(
        fixture.bookings.create_appointment(&fixture.patient, for_someone_else.clone()).await,
        Err(AppointmentError::Unauthorized(_))
    );
    assert_matches!(
        fixture.bookings.create_appointment(&fixture.doctor, for_someone_else.clone()).await,
        Err(AppointmentError::Unauthorized(_))
    );

    let booked = fixture.bookings.create_appointment(&fixture.admin, for_someone_else).await.unwrap();
    assert_eq!(booked.patient_id, OTHER_PATIENT_ID);
}

#[tokio::test]
async fn test_lookup_by_code_respects_ownership() {
    let fixture = Fixture::new().await;
    let booked = fixture
        .bookings
        .create_appointment(&fixture.patient, booking_request(DOCTOR_ID, time(8, 0), PaymentMethod::Cash))
        .await
        .unwrap();

    let found = fixture
        .bookings
        .get_by_code(&fixture.doctor, &booked.confirmation_code.to_lowercase())
        .await
        .unwrap();
    assert_eq!(found.id, booked.id);

    assert_matches!(
        fixture
            .bookings
            .get_by_code(&ActorContext::patient(OTHER_PATIENT_ID), &booked.confirmation_code)
            .await,
        Err(AppointmentError::Unauthorized(_))
    );
    assert_matches!(
        fixture.bookings.get_appointment(&fixture.patient, 999).await,
        Err(AppointmentError::NotFound(_))
    );
}

#[tokio::test]
async fn test_listing_is_scoped_to_the_caller() {
    let fixture = Fixture::new().await;
    fixture
        .bookings
        .create_appointment(&fixture.patient, booking_request(DOCTOR_ID, time(8, 0), PaymentMethod::Cash))
        .await
        .unwrap();
    fixture
        .bookings
        .create_appointment(
            &ActorContext::patient(OTHER_PATIENT_ID),
            booking_request(OTHER_DOCTOR_ID, time(8, 0), PaymentMethod::Cash),
        )
        .await
        .unwrap();

    let mine = fixture.bookings.list_appointments(&fixture.patient, AppointmentQuery::default()).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].patient_id, PATIENT_ID);

    let doctors = fixture.bookings.list_appointments(&fixture.doctor, AppointmentQuery::default()).await.unwrap();
    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].doctor_id, DOCTOR_ID);

    let everything = fixture.bookings.list_appointments(&fixture.admin, AppointmentQuery::default()).await.unwrap();
    assert_eq!(everything.len(), 2);
}
