#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Weekday};
use tokio::sync::{Barrier, Mutex};

use appointment_cell::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, CreateAppointmentRequest, PaymentMethod,
    StateGuard,
};
use appointment_cell::store::{AppointmentStore, MemoryAppointmentStore, StoreOccupancy};
use shared_database::DatabaseError;
use appointment_cell::{AppointmentState, BookingService, ExpirySweeper, RefundProcessor};
use schedule_cell::models::{CreateWorkShiftRequest, DegreeRank, DoctorProfile, ShiftKind};
use schedule_cell::store::{MemoryDoctorDirectory, MemoryLeaveStore, MemoryWorkShiftStore};
use schedule_cell::{ScheduleResolver, SlotCalculator, WorkShiftService};
use shared_config::SchedulingConfig;
use shared_models::auth::ActorContext;
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::RecordingNotifier;

pub const DOCTOR_ID: i64 = 7;
pub const OTHER_DOCTOR_ID: i64 = 8;
pub const PATIENT_ID: i64 = 100;
pub const OTHER_PATIENT_ID: i64 = 101;
pub const ADMIN_ID: i64 = 1;
pub const OFFSET_MINUTES: i32 = 7 * 60;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn monday() -> NaiveDate {
    date(2030, 3, 4)
}

/// Lets detached notification tasks run on the test runtime.
pub async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

pub fn booking_request(doctor_id: i64, at: NaiveTime, payment_method: PaymentMethod) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        patient_id: None,
        doctor_id,
        date: monday(),
        shift: ShiftKind::Morning,
        time: at,
        reason_text: Some("persistent cough".to_string()),
        note: None,
        payment_method,
    }
}

#[derive(Default)]
pub struct RecordingRefunds {
    refunded: Mutex<Vec<(i64, i64)>>,
}

impl RecordingRefunds {
    pub async fn refunded(&self) -> Vec<(i64, i64)> {
        self.refunded.lock().await.clone()
    }
}

#[async_trait]
impl RefundProcessor for RecordingRefunds {
    async fn refund(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        self.refunded
            .lock()
            .await
            .push((appointment.id, appointment.refund_amount.unwrap_or_default()));
        Ok(())
    }
}

/// Holds every `get` until `readers` callers have loaded, so they all act on the same snapshot.
pub struct LockstepStore {
    inner: Arc<MemoryAppointmentStore>,
    gate: Barrier,
}

impl LockstepStore {
    pub fn new(inner: Arc<MemoryAppointmentStore>, readers: usize) -> Self {
        Self { inner, gate: Barrier::new(readers) }
    }
}

#[async_trait]
impl AppointmentStore for LockstepStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, DatabaseError> {
        self.inner.insert(appointment).await
    }

    async fn get(&self, id: i64) -> Result<Option<Appointment>, DatabaseError> {
        let snapshot = self.inner.get(id).await;
        self.gate.wait().await;
        snapshot
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Appointment>, DatabaseError> {
        self.inner.get_by_code(code).await
    }

    async fn get_by_transaction_ref(&self, transaction_ref: &str) -> Result<Option<Appointment>, DatabaseError> {
        self.inner.get_by_transaction_ref(transaction_ref).await
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError> {
        self.inner.list(query).await
    }

    async fn list_by_status(&self, statuses: &[AppointmentStatus]) -> Result<Vec<Appointment>, DatabaseError> {
        self.inner.list_by_status(statuses).await
    }

    async fn update_if(&self, appointment: Appointment, guard: StateGuard) -> Result<Option<Appointment>, DatabaseError> {
        self.inner.update_if(appointment, guard).await
    }

    async fn occupying_for_shift(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        shift: ShiftKind,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        self.inner.occupying_for_shift(doctor_id, date, shift).await
    }

    async fn occupying_for_day(&self, doctor_id: i64, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError> {
        self.inner.occupying_for_day(doctor_id, date).await
    }
}

pub struct Fixture {
    pub bookings: Arc<BookingService>,
    pub sweeper: Arc<ExpirySweeper>,
    pub slots: Arc<SlotCalculator>,
    pub store: Arc<MemoryAppointmentStore>,
    pub directory: Arc<MemoryDoctorDirectory>,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub refunds: Arc<RecordingRefunds>,
    pub patient: ActorContext,
    pub doctor: ActorContext,
    pub admin: ActorContext,
}

impl Fixture {
    /// Local "now" is Friday 2030-03-01 09:00. Doctors 7 (Master, base 200 000) and 8 (Doctor,
    /// base 150 000) share the facility's Monday 08:00-12:00 morning shift.
    pub async fn new() -> Self {
        let clock = Arc::new(FixedClock::at_local(date(2030, 3, 1).and_time(time(9, 0)), OFFSET_MINUTES));
        let shift_store = Arc::new(MemoryWorkShiftStore::new());
        let leave_store = Arc::new(MemoryLeaveStore::new());
        let directory = Arc::new(MemoryDoctorDirectory::new());
        let store = Arc::new(MemoryAppointmentStore::new());
        let notifier = RecordingNotifier::new();
        let refunds = Arc::new(RecordingRefunds::default());
        let config = SchedulingConfig::default();

        for (doctor_id, base_price, degree_rank) in [
            (DOCTOR_ID, 200_000, DegreeRank::Master),
            (OTHER_DOCTOR_ID, 150_000, DegreeRank::Doctor),
        ] {
            directory.upsert(DoctorProfile {
                doctor_id,
                facility_id: 1,
                base_price,
                degree_rank,
                slot_minutes: None,
                max_daily_appointments: None,
                active: true,
            }).await;
        }

        let admin = ActorContext::admin(ADMIN_ID);
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

        let resolver = Arc::new(ScheduleResolver::new(shift_store, leave_store));
        let slots = Arc::new(SlotCalculator::new(
            resolver,
            directory.clone(),
            Arc::new(StoreOccupancy::new(store.clone())),
            clock.clone(),
            config.clone(),
        ));
        let bookings = Arc::new(BookingService::new(
            store.clone(),
            slots.clone(),
            refunds.clone(),
            clock.clone(),
            notifier.clone(),
            config.clone(),
        ));
        let sweeper = Arc::new(ExpirySweeper::new(
            store.clone(),
            refunds.clone(),
            clock.clone(),
            notifier.clone(),
            &config,
        ));

        Self {
            bookings,
            sweeper,
            slots,
            store,
            directory,
            clock,
            notifier,
            refunds,
            patient: ActorContext::patient(PATIENT_ID),
            doctor: ActorContext::doctor(DOCTOR_ID),
            admin,
        }
    }

    /// A second booking service over `store`, sharing this fixture's clock, slots and collaborators.
    pub fn bookings_over(&self, store: Arc<dyn AppointmentStore>) -> BookingService {
        BookingService::new(
            store,
            self.slots.clone(),
            self.refunds.clone(),
            self.clock.clone(),
            self.notifier.clone(),
            SchedulingConfig::default(),
        )
    }

    pub fn state(&self) -> Arc<AppointmentState> {
        Arc::new(AppointmentState { bookings: self.bookings.clone() })
    }

    /// Books 08:30 with doctor 7 and has the doctor confirm it.
    pub async fn confirmed_booking(&self) -> Appointment {
        let created = self
            .bookings
            .create_appointment(&self.patient, booking_request(DOCTOR_ID, time(8, 30), PaymentMethod::Cash))
            .await
            .unwrap();
        self.bookings
            .approve(&self.doctor, created.id, Default::default())
            .await
            .unwrap()
    }
}
