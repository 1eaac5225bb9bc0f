use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Weekday};

use shared_database::DatabaseError;

use crate::models::{DoctorProfile, LeaveBalance, LeaveQuery, LeaveRequest, LeaveStatus, ShiftKind, WorkShift};

pub mod memory;
pub mod supabase;

pub use memory::{MemoryDoctorDirectory, MemoryLeaveStore, MemoryWorkShiftStore};
pub use supabase::{SupabaseDoctorDirectory, SupabaseLeaveStore, SupabaseWorkShiftStore};

#[async_trait]
pub trait WorkShiftStore: Send + Sync {
    async fn list_shifts(&self, weekday: Option<Weekday>) -> Result<Vec<WorkShift>, DatabaseError>;

    async fn get_shift(&self, id: i64) -> Result<Option<WorkShift>, DatabaseError>;

    /// Fails with `DatabaseError::Duplicate` when another active shift holds the same weekday and kind.
    async fn insert_shift(&self, shift: WorkShift) -> Result<WorkShift, DatabaseError>;

    async fn update_shift(&self, shift: WorkShift) -> Result<Option<WorkShift>, DatabaseError>;
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
    async fn insert_leave(&self, leave: LeaveRequest) -> Result<LeaveRequest, DatabaseError>;

    async fn get_leave(&self, id: i64) -> Result<Option<LeaveRequest>, DatabaseError>;

    async fn list_leaves(&self, query: &LeaveQuery) -> Result<Vec<LeaveRequest>, DatabaseError>;

    /// Writes `leave` only if the stored row is still in `expected`. Returns `None` when the guard failed.
    async fn update_leave_if_status(
        &self,
        leave: LeaveRequest,
        expected: LeaveStatus,
    ) -> Result<Option<LeaveRequest>, DatabaseError>;

    /// Removes the row only while its status is one of `allowed`.
    async fn delete_leave_if_status(&self, id: i64, allowed: &[LeaveStatus]) -> Result<bool, DatabaseError>;

    async fn get_balance(&self, doctor_id: i64) -> Result<Option<LeaveBalance>, DatabaseError>;

    /// Fails with `DatabaseError::Duplicate` when the doctor already has a balance row.
    async fn insert_balance(&self, balance: LeaveBalance) -> Result<LeaveBalance, DatabaseError>;

    /// Writes `balance` (with its version already bumped) only if the stored version is `expected_version`.
    async fn update_balance_if_version(
        &self,
        balance: LeaveBalance,
        expected_version: i64,
    ) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    async fn get_doctor(&self, doctor_id: i64) -> Result<Option<DoctorProfile>, DatabaseError>;
}

/// Bookings that currently hold slots. Implemented by the appointment store.
#[async_trait]
pub trait OccupancySource: Send + Sync {
    async fn occupied_times(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        shift: ShiftKind,
    ) -> Result<Vec<NaiveTime>, DatabaseError>;

    async fn occupied_count_for_day(&self, doctor_id: i64, date: NaiveDate) -> Result<usize, DatabaseError>;
}
