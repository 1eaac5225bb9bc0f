#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Weekday};

use appointment_cell::models::{Appointment, CreateAppointmentRequest, PaymentMethod};
use appointment_cell::store::{MemoryAppointmentStore, StoreOccupancy};
use appointment_cell::{BookingService, ExpirySweeper, LoggingRefundProcessor};
use payment_cell::services::signature::{canonical_query, sign, SECURE_HASH};
use payment_cell::{PaymentGatewayService, PaymentState};
use schedule_cell::models::{CreateWorkShiftRequest, DegreeRank, DoctorProfile, ShiftKind};
use schedule_cell::store::{MemoryDoctorDirectory, MemoryLeaveStore, MemoryWorkShiftStore};
use schedule_cell::{ScheduleResolver, SlotCalculator, WorkShiftService};
use shared_config::{AppConfig, SchedulingConfig};
use shared_models::auth::ActorContext;
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{RecordingNotifier, TestConfig};

pub const DOCTOR_ID: i64 = 7;
pub const PATIENT_ID: i64 = 100;
pub const OTHER_PATIENT_ID: i64 = 101;
pub const OFFSET_MINUTES: i32 = 7 * 60;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub struct Fixture {
    pub config: AppConfig,
    pub gateway: Arc<PaymentGatewayService>,
    pub bookings: Arc<BookingService>,
    pub sweeper: Arc<ExpirySweeper>,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub patient: ActorContext,
    pub doctor: ActorContext,
    pub admin: ActorContext,
}

impl Fixture {
    /// Local "now" is Friday 2030-03-01 09:00; doctor 7 (Master, base 200 000) works Monday mornings.
    pub async fn new() -> Self {
        let config = TestConfig::default().to_app_config();
        let clock = Arc::new(FixedClock::at_local(date(2030, 3, 1).and_time(time(9, 0)), OFFSET_MINUTES));
        let shift_store = Arc::new(MemoryWorkShiftStore::new());
        let directory = Arc::new(MemoryDoctorDirectory::new());
        let store = Arc::new(MemoryAppointmentStore::new());
        let notifier = RecordingNotifier::new();
        let refunds = Arc::new(LoggingRefundProcessor);
        let scheduling = SchedulingConfig::default();

        directory.upsert(DoctorProfile {
            doctor_id: DOCTOR_ID,
            facility_id: 1,
            base_price: 200_000,
            degree_rank: DegreeRank::Master,
            slot_minutes: None,
            max_daily_appointments: None,
            active: true,
        }).await;

        let admin = ActorContext::admin(1);
        WorkShiftService::new(shift_store.clone(), clock.clone())
            .create_shift(&admin, CreateWorkShiftRequest {
                weekday: Weekday::Mon,
                shift: ShiftKind::Morning,
                start_time: time(8, 0),
                end_time: time(12, 0),
                active: None,
                note: None,
            })
            .await
            .unwrap();

        let resolver = Arc::new(ScheduleResolver::new(shift_store, Arc::new(MemoryLeaveStore::new())));
        let slots = Arc::new(SlotCalculator::new(
            resolver,
            directory,
            Arc::new(StoreOccupancy::new(store.clone())),
            clock.clone(),
            scheduling.clone(),
        ));
        let bookings = Arc::new(BookingService::new(
            store.clone(),
            slots,
            refunds.clone(),
            clock.clone(),
            notifier.clone(),
            scheduling.clone(),
        ));
        let sweeper = Arc::new(ExpirySweeper::new(
            store.clone(),
            refunds,
            clock.clone(),
            notifier.clone(),
            &scheduling,
        ));
        let gateway = Arc::new(PaymentGatewayService::new(
            store,
            clock.clone(),
            notifier.clone(),
            config.payment.clone(),
        ));

        Self {
            config,
            gateway,
            bookings,
            sweeper,
            clock,
            notifier,
            patient: ActorContext::patient(PATIENT_ID),
            doctor: ActorContext::doctor(DOCTOR_ID),
            admin,
        }
    }

    pub fn state(&self) -> Arc<PaymentState> {
        Arc::new(PaymentState { gateway: self.gateway.clone() })
    }

    pub async fn book(&self, payment_method: PaymentMethod) -> Appointment {
        self.bookings
            .create_appointment(&self.patient, CreateAppointmentRequest {
                patient_id: None,
                doctor_id: DOCTOR_ID,
                date: date(2030, 3, 4),
                shift: ShiftKind::Morning,
                time: time(8, 30),
                reason_text: Some("annual check-up".to_string()),
                note: None,
                payment_method,
            })
            .await
            .unwrap()
    }

    /// Provider callback parameters, signed with the test secret.
    pub fn signed_callback(&self, transaction_ref: &str, amount: i64, response_code: &str) -> HashMap<String, String> {
        let amount = amount.to_string();
        let mut params: HashMap<String, String> = [
            ("vnp_TmnCode", self.config.payment.tmn_code.as_str()),
            ("vnp_Amount", amount.as_str()),
            ("vnp_BankCode", "NCB"),
            ("vnp_OrderInfo", "Payment for appointment"),
            ("vnp_PayDate", "20300301091500"),
            ("vnp_ResponseCode", response_code),
            ("vnp_TransactionNo", "14012345"),
            ("vnp_TransactionStatus", response_code),
            ("vnp_TxnRef", transaction_ref),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let signature = sign(&self.config.payment.hash_secret, &canonical_query(&params)).unwrap();
        params.insert(SECURE_HASH.to_string(), signature);
        params.insert("vnp_SecureHashType".to_string(), "HmacSHA512".to_string());
        params
    }
}
