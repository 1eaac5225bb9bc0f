use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Weekday;
use tokio::sync::Mutex;

use shared_database::DatabaseError;

use crate::models::{DoctorProfile, LeaveBalance, LeaveQuery, LeaveRequest, LeaveStatus, WorkShift};
use crate::store::{DoctorDirectory, LeaveStore, WorkShiftStore};

#[derive(Default)]
struct ShiftTable {
    next_id: i64,
    rows: HashMap<i64, WorkShift>,
}

impl ShiftTable {
    fn active_clash(&self, shift: &WorkShift) -> bool {
        shift.active
            && self.rows.values().any(|other| {
                other.id != shift.id && other.active && other.weekday == shift.weekday && other.shift == shift.shift
            })
    }
}

/// In-process shift table with the active (weekday, kind) uniqueness rule of the database index.
#[derive(Default)]
pub struct MemoryWorkShiftStore {
    inner: Mutex<ShiftTable>,
}

impl MemoryWorkShiftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkShiftStore for MemoryWorkShiftStore {
    async fn list_shifts(&self, weekday: Option<Weekday>) -> Result<Vec<WorkShift>, DatabaseError> {
        let table = self.inner.lock().await;
        let mut shifts: Vec<WorkShift> = table
            .rows
            .values()
            .filter(|s| weekday.map_or(true, |w| s.weekday == w))
            .cloned()
            .collect();
        shifts.sort_by_key(|s| (s.weekday.num_days_from_monday(), s.shift, s.id));
        Ok(shifts)
    }

    async fn get_shift(&self, id: i64) -> Result<Option<WorkShift>, DatabaseError> {
        Ok(self.inner.lock().await.rows.get(&id).cloned())
    }

    async fn insert_shift(&self, mut shift: WorkShift) -> Result<WorkShift, DatabaseError> {
        let mut table = self.inner.lock().await;
        shift.id = 0;
        if table.active_clash(&shift) {
            return Err(DatabaseError::Duplicate("work_shifts_active_weekday_shift_key".to_string()));
        }
        table.next_id += 1;
        shift.id = table.next_id;
        table.rows.insert(shift.id, shift.clone());
        Ok(shift)
    }

    async fn update_shift(&self, shift: WorkShift) -> Result<Option<WorkShift>, DatabaseError> {
        let mut table = self.inner.lock().await;
        if !table.rows.contains_key(&shift.id) {
            return Ok(None);
        }
        if table.active_clash(&shift) {
            return Err(DatabaseError::Duplicate("work_shifts_active_weekday_shift_key".to_string()));
        }
        table.rows.insert(shift.id, shift.clone());
        Ok(Some(shift))
    }
}

#[derive(Default)]
struct LeaveTables {
    next_id: i64,
    leaves: HashMap<i64, LeaveRequest>,
    balances: HashMap<i64, LeaveBalance>,
}

#[derive(Default)]
pub struct MemoryLeaveStore {
    inner: Mutex<LeaveTables>,
}

impl MemoryLeaveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaveStore for MemoryLeaveStore {
    async fn insert_leave(&self, mut leave: LeaveRequest) -> Result<LeaveRequest, DatabaseError> {
        let mut tables = self.inner.lock().await;
        tables.next_id += 1;
        leave.id = tables.next_id;
        tables.leaves.insert(leave.id, leave.clone());
        Ok(leave)
    }

    async fn get_leave(&self, id: i64) -> Result<Option<LeaveRequest>, DatabaseError> {
        Ok(self.inner.lock().await.leaves.get(&id).cloned())
    }

    async fn list_leaves(&self, query: &LeaveQuery) -> Result<Vec<LeaveRequest>, DatabaseError> {
        let tables = self.inner.lock().await;
        let mut leaves: Vec<LeaveRequest> = tables
            .leaves
            .values()
            .filter(|l| query.doctor_id.map_or(true, |d| l.doctor_id == d))
            .filter(|l| query.status.map_or(true, |s| l.status == s))
            .cloned()
            .collect();
        leaves.sort_by_key(|l| l.id);
        Ok(leaves)
    }

    async fn update_leave_if_status(
        &self,
        leave: LeaveRequest,
        expected: LeaveStatus,
    ) -> Result<Option<LeaveRequest>, DatabaseError> {
        let mut tables = self.inner.lock().await;
        match tables.leaves.get(&leave.id) {
            Some(current) if current.status == expected => {
                tables.leaves.insert(leave.id, leave.clone());
                Ok(Some(leave))
            }
            _ => Ok(None),
        }
    }

    async fn delete_leave_if_status(&self, id: i64, allowed: &[LeaveStatus]) -> Result<bool, DatabaseError> {
        let mut tables = self.inner.lock().await;
        let deletable = tables.leaves.get(&id).map_or(false, |l| allowed.contains(&l.status));
        if deletable {
            tables.leaves.remove(&id);
        }
        Ok(deletable)
    }

    async fn get_balance(&self, doctor_id: i64) -> Result<Option<LeaveBalance>, DatabaseError> {
        Ok(self.inner.lock().await.balances.get(&doctor_id).cloned())
    }

    async fn insert_balance(&self, balance: LeaveBalance) -> Result<LeaveBalance, DatabaseError> {
        let mut tables = self.inner.lock().await;
        if tables.balances.contains_key(&balance.doctor_id) {
            return Err(DatabaseError::Duplicate("leave_balances_pkey".to_string()));
        }
        tables.balances.insert(balance.doctor_id, balance.clone());
        Ok(balance)
    }

    async fn update_balance_if_version(
        &self,
        balance: LeaveBalance,
        expected_version: i64,
    ) -> Result<bool, DatabaseError> {
        let mut tables = self.inner.lock().await;
        match tables.balances.get(&balance.doctor_id) {
            Some(current) if current.version == expected_version => {
                tables.balances.insert(balance.doctor_id, balance);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryDoctorDirectory {
    doctors: Mutex<HashMap<i64, DoctorProfile>>,
}

impl MemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a directory from a JSON array of doctor profiles.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let profiles: Vec<DoctorProfile> = serde_json::from_str(raw)?;
        let doctors = profiles.into_iter().map(|p| (p.doctor_id, p)).collect();
        Ok(Self { doctors: Mutex::new(doctors) })
    }

    pub async fn upsert(&self, profile: DoctorProfile) {
        self.doctors.lock().await.insert(profile.doctor_id, profile);
    }
}

#[async_trait]
impl DoctorDirectory for MemoryDoctorDirectory {
    async fn get_doctor(&self, doctor_id: i64) -> Result<Option<DoctorProfile>, DatabaseError> {
        Ok(self.doctors.lock().await.get(&doctor_id).cloned())
    }
}
