use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use schedule_cell::models::ShiftKind;
use schedule_cell::store::OccupancySource;
use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentQuery, AppointmentStatus, StateGuard};

pub mod memory;
pub mod supabase;

pub use memory::MemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

/// Partial unique index over occupying bookings of one doctor slot.
pub const DOCTOR_SLOT_CONSTRAINT: &str = "appointments_doctor_slot_active_key";
/// Partial unique index over occupying bookings of one patient slot.
pub const PATIENT_SLOT_CONSTRAINT: &str = "appointments_patient_slot_active_key";
pub const CONFIRMATION_CODE_CONSTRAINT: &str = "appointments_confirmation_code_key";

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Fails with `DatabaseError::Duplicate` naming the violated constraint when the doctor slot,
    /// the patient slot or the confirmation code is already taken.
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, DatabaseError>;

    async fn get(&self, id: i64) -> Result<Option<Appointment>, DatabaseError>;

    async fn get_by_code(&self, code: &str) -> Result<Option<Appointment>, DatabaseError>;

    async fn get_by_transaction_ref(&self, transaction_ref: &str) -> Result<Option<Appointment>, DatabaseError>;

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError>;

    async fn list_by_status(&self, statuses: &[AppointmentStatus]) -> Result<Vec<Appointment>, DatabaseError>;

    /// Writes `appointment` only if the stored row still matches `guard`. Returns `None` when it did not.
    async fn update_if(
        &self,
        appointment: Appointment,
        guard: StateGuard,
    ) -> Result<Option<Appointment>, DatabaseError>;

    async fn occupying_for_shift(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        shift: ShiftKind,
    ) -> Result<Vec<Appointment>, DatabaseError>;

    async fn occupying_for_day(&self, doctor_id: i64, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError>;
}

/// Exposes the appointment store to the slot calculator.
pub struct StoreOccupancy {
    store: Arc<dyn AppointmentStore>,
}

impl StoreOccupancy {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OccupancySource for StoreOccupancy {
    async fn occupied_times(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        shift: ShiftKind,
    ) -> Result<Vec<NaiveTime>, DatabaseError> {
        let held = self.store.occupying_for_shift(doctor_id, date, shift).await?;
        Ok(held.into_iter().map(|a| a.time).collect())
    }

    async fn occupied_count_for_day(&self, doctor_id: i64, date: NaiveDate) -> Result<usize, DatabaseError> {
        Ok(self.store.occupying_for_day(doctor_id, date).await?.len())
    }
}
