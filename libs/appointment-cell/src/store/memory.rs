use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use schedule_cell::models::ShiftKind;
use shared_database::DatabaseError;

use crate::models::{Appointment, AppointmentQuery, AppointmentStatus, StateGuard};
use crate::store::{AppointmentStore, CONFIRMATION_CODE_CONSTRAINT, DOCTOR_SLOT_CONSTRAINT, PATIENT_SLOT_CONSTRAINT};

#[derive(Default)]
struct AppointmentTable {
    next_id: i64,
    rows: BTreeMap<i64, Appointment>,
}

impl AppointmentTable {
    /// Same rules as the database's unique indexes, checked under the table lock.
    fn violated_constraint(&self, candidate: &Appointment) -> Option<&'static str> {
        if self.rows.values().any(|a| a.confirmation_code == candidate.confirmation_code) {
            return Some(CONFIRMATION_CODE_CONSTRAINT);
        }

        let same_slot = |a: &Appointment| {
            a.status.is_occupying() && a.date == candidate.date && a.shift == candidate.shift && a.time == candidate.time
        };
        if self.rows.values().any(|a| same_slot(a) && a.doctor_id == candidate.doctor_id) {
            return Some(DOCTOR_SLOT_CONSTRAINT);
        }
        if self.rows.values().any(|a| same_slot(a) && a.patient_id == candidate.patient_id) {
            return Some(PATIENT_SLOT_CONSTRAINT);
        }
        None
    }
}

#[derive(Default)]
pub struct MemoryAppointmentStore {
    inner: Mutex<AppointmentTable>,
}

impl MemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for MemoryAppointmentStore {
    async fn insert(&self, mut appointment: Appointment) -> Result<Appointment, DatabaseError> {
        let mut table = self.inner.lock().await;
        if let Some(constraint) = table.violated_constraint(&appointment) {
            return Err(DatabaseError::Duplicate(constraint.to_string()));
        }
        table.next_id += 1;
        appointment.id = table.next_id;
        table.rows.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, id: i64) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self.inner.lock().await.rows.get(&id).cloned())
    }

    async fn get_by_code(&self, code: &str) -> Result<Option<Appointment>, DatabaseError> {
        let table = self.inner.lock().await;
        Ok(table.rows.values().find(|a| a.confirmation_code == code).cloned())
    }

    async fn get_by_transaction_ref(&self, transaction_ref: &str) -> Result<Option<Appointment>, DatabaseError> {
        let table = self.inner.lock().await;
        Ok(table
            .rows
            .values()
            .find(|a| a.transaction_ref.as_deref() == Some(transaction_ref))
            .cloned())
    }

    async fn list(&self, query: &AppointmentQuery) -> Result<Vec<Appointment>, DatabaseError> {
        let table = self.inner.lock().await;
        Ok(table
            .rows
            .values()
            .filter(|a| query.patient_id.map_or(true, |id| a.patient_id == id))
            .filter(|a| query.doctor_id.map_or(true, |id| a.doctor_id == id))
            .filter(|a| query.status.map_or(true, |s| a.status == s))
            .filter(|a| query.date.map_or(true, |d| a.date == d))
            .cloned()
            .collect())
    }

    async fn list_by_status(&self, statuses: &[AppointmentStatus]) -> Result<Vec<Appointment>, DatabaseError> {
        let table = self.inner.lock().await;
        Ok(table.rows.values().filter(|a| statuses.contains(&a.status)).cloned().collect())
    }

    async fn update_if(
        &self,
        appointment: Appointment,
        guard: StateGuard,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let mut table = self.inner.lock().await;
        match table.rows.get(&appointment.id) {
            Some(current) if StateGuard::of(current) == guard => {
                table.rows.insert(appointment.id, appointment.clone());
                Ok(Some(appointment))
            }
            _ => Ok(None),
        }
    }

    async fn occupying_for_shift(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        shift: ShiftKind,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let table = self.inner.lock().await;
        Ok(table
            .rows
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.date == date && a.shift == shift && a.status.is_occupying())
            .cloned()
            .collect())
    }

    async fn occupying_for_day(&self, doctor_id: i64, date: NaiveDate) -> Result<Vec<Appointment>, DatabaseError> {
        let table = self.inner.lock().await;
        Ok(table
            .rows
            .values()
            .filter(|a| a.doctor_id == doctor_id && a.date == date && a.status.is_occupying())
            .cloned()
            .collect())
    }
}
