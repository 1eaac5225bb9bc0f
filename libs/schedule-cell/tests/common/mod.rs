#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Weekday};
use tokio::sync::Mutex;

use schedule_cell::models::{CreateWorkShiftRequest, DegreeRank, DoctorProfile, ShiftKind};
use schedule_cell::store::{MemoryDoctorDirectory, MemoryLeaveStore, MemoryWorkShiftStore, OccupancySource};
use schedule_cell::{LeaveBalanceLedger, LeaveService, ScheduleResolver, ScheduleState, SlotCalculator, WorkShiftService};
use shared_config::{LeavePolicyConfig, SchedulingConfig};
use shared_database::DatabaseError;
use shared_models::auth::ActorContext;
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::RecordingNotifier;

pub const DOCTOR_ID: i64 = 7;
pub const ADMIN_ID: i64 = 1;
pub const OFFSET_MINUTES: i32 = 7 * 60;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// Monday used by most scenarios.
pub fn monday() -> NaiveDate {
    date(2030, 3, 4)
}

#[derive(Default)]
pub struct StaticOccupancy {
    held: Mutex<Vec<(i64, NaiveDate, ShiftKind, NaiveTime)>>,
}

impl StaticOccupancy {
    pub async fn hold(&self, doctor_id: i64, date: NaiveDate, shift: ShiftKind, time: NaiveTime) {
        self.held.lock().await.push((doctor_id, date, shift, time));
    }
}

#[async_trait]
impl OccupancySource for StaticOccupancy {
    async fn occupied_times(&self, doctor_id: i64, date: NaiveDate, shift: ShiftKind) -> Result<Vec<NaiveTime>, DatabaseError> {
        Ok(self
            .held
            .lock()
            .await
            .iter()
            .filter(|(d, day, s, _)| *d == doctor_id && *day == date && *s == shift)
            .map(|(_, _, _, t)| *t)
            .collect())
    }

    async fn occupied_count_for_day(&self, doctor_id: i64, date: NaiveDate) -> Result<usize, DatabaseError> {
        Ok(self.held.lock().await.iter().filter(|(d, day, _, _)| *d == doctor_id && *day == date).count())
    }
}

pub struct Fixture {
    pub state: Arc<ScheduleState>,
    pub clock: Arc<FixedClock>,
    pub directory: Arc<MemoryDoctorDirectory>,
    pub occupancy: Arc<StaticOccupancy>,
    pub notifier: Arc<RecordingNotifier>,
    pub admin: ActorContext,
    pub doctor: ActorContext,
}

impl Fixture {
    /// Local "now" is Friday 2030-03-01 09:00; doctor 7 works a Monday 08:00-12:00 morning shift.
    pub async fn new() -> Self {
        let clock = Arc::new(FixedClock::at_local(date(2030, 3, 1).and_time(time(9, 0)), OFFSET_MINUTES));
        let shift_store = Arc::new(MemoryWorkShiftStore::new());
        let leave_store = Arc::new(MemoryLeaveStore::new());
        let directory = Arc::new(MemoryDoctorDirectory::new());
        let occupancy = Arc::new(StaticOccupancy::default());
        let notifier = RecordingNotifier::new();

        directory.upsert(DoctorProfile {
            doctor_id: DOCTOR_ID,
            facility_id: 1,
            base_price: 200_000,
            degree_rank: DegreeRank::Master,
            slot_minutes: None,
            max_daily_appointments: None,
            active: true,
        }).await;

        let resolver = Arc::new(ScheduleResolver::new(shift_store.clone(), leave_store.clone()));
        let ledger = Arc::new(LeaveBalanceLedger::new(leave_store.clone(), LeavePolicyConfig::default(), clock.clone()));
        let state = Arc::new(ScheduleState {
            shifts: Arc::new(WorkShiftService::new(shift_store.clone(), clock.clone())),
            resolver: resolver.clone(),
            slots: Arc::new(SlotCalculator::new(
                resolver,
                directory.clone(),
                occupancy.clone(),
                clock.clone(),
                SchedulingConfig::default(),
            )),
            leaves: Arc::new(LeaveService::new(leave_store, ledger, clock.clone(), notifier.clone())),
        });

        let admin = ActorContext::admin(ADMIN_ID);
        state.shifts.create_shift(&admin, CreateWorkShiftRequest {
            weekday: Weekday::Mon,
            shift: ShiftKind::Morning,
            start_time: time(8, 0),
            end_time: time(12, 0),
            active: None,
            note: None,
        }).await.unwrap();

        Self {
            state,
            clock,
            directory,
            occupancy,
            notifier,
            admin,
            doctor: ActorContext::doctor(DOCTOR_ID),
        }
    }
}
