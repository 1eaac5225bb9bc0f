use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// WEEKLY SCHEDULE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftKind {
    Morning,
    Afternoon,
    Evening,
}

impl ShiftKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftKind::Morning => "morning",
            ShiftKind::Afternoon => "afternoon",
            ShiftKind::Evening => "evening",
        }
    }
}

impl fmt::Display for ShiftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShiftKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morning" => Ok(ShiftKind::Morning),
            "afternoon" => Ok(ShiftKind::Afternoon),
            "evening" => Ok(ShiftKind::Evening),
            _ => Err(format!("Unknown shift: {}", s)),
        }
    }
}

/// Facility-wide recurring shift. Weekday values serialize as `Mon`..`Sun`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkShift {
    pub id: i64,
    pub weekday: Weekday,
    pub shift: ShiftKind,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkShiftRequest {
    pub weekday: Weekday,
    pub shift: ShiftKind,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub active: Option<bool>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWorkShiftRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub active: Option<bool>,
    pub note: Option<String>,
}

/// A shift as it applies to one doctor on one date, after leave exceptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveShift {
    pub shift: ShiftKind,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl EffectiveShift {
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start_time && time < self.end_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftSlots {
    pub shift: ShiftKind,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: u32,
    pub slots: Vec<Slot>,
}

// ==============================================================================
// DOCTOR DIRECTORY
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegreeRank {
    Doctor,
    Master,
    SpecialistOne,
    SpecialistTwo,
    Phd,
    AssociateProfessor,
    Professor,
}

/// Read-only view of a doctor as the booking engine needs it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub doctor_id: i64,
    pub facility_id: i64,
    pub base_price: i64,
    pub degree_rank: DegreeRank,
    pub slot_minutes: Option<u32>,
    pub max_daily_appointments: Option<u32>,
    pub active: bool,
}

// ==============================================================================
// LEAVE REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
            LeaveStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_cancellable(&self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Approved)
    }

    pub fn is_deletable(&self) -> bool {
        matches!(self, LeaveStatus::Pending | LeaveStatus::Rejected | LeaveStatus::Cancelled)
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveCategory {
    Annual,
    Sick,
    BusinessTrip,
    Other,
}

/// What a leave request covers. Each variant carries exactly the fields its shape needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LeaveScope {
    /// The whole of one date.
    SpecificDate { date: NaiveDate },
    /// One shift on one date.
    SpecificDateShift { date: NaiveDate, shift: ShiftKind },
    /// Every occurrence of a weekday; `shift: None` means the whole day.
    RecurringWeekdayShift { weekday: Weekday, shift: Option<ShiftKind> },
}

impl LeaveScope {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            LeaveScope::SpecificDate { date } | LeaveScope::SpecificDateShift { date, .. } => Some(*date),
            LeaveScope::RecurringWeekdayShift { .. } => None,
        }
    }

    pub fn shift(&self) -> Option<ShiftKind> {
        match self {
            LeaveScope::SpecificDate { .. } => None,
            LeaveScope::SpecificDateShift { shift, .. } => Some(*shift),
            LeaveScope::RecurringWeekdayShift { shift, .. } => *shift,
        }
    }

    pub fn is_whole_day(&self) -> bool {
        self.shift().is_none()
    }

    /// True when this leave removes `shift` on `date`.
    pub fn covers(&self, date: NaiveDate, shift: ShiftKind) -> bool {
        let day_matches = match self {
            LeaveScope::SpecificDate { date: d } | LeaveScope::SpecificDateShift { date: d, .. } => *d == date,
            LeaveScope::RecurringWeekdayShift { weekday, .. } => date.weekday() == *weekday,
        };
        day_matches && self.shift().map_or(true, |s| s == shift)
    }

    /// Two scopes overlap when they can hit the same day and share at least one shift.
    pub fn overlaps(&self, other: &LeaveScope) -> bool {
        use LeaveScope::*;

        let days_meet = match (self, other) {
            (RecurringWeekdayShift { weekday: a, .. }, RecurringWeekdayShift { weekday: b, .. }) => a == b,
            (RecurringWeekdayShift { weekday, .. }, dated) | (dated, RecurringWeekdayShift { weekday, .. }) => {
                dated.date().map_or(false, |d| d.weekday() == *weekday)
            }
            (a, b) => a.date() == b.date(),
        };

        let shifts_meet = match (self.shift(), other.shift()) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        };

        days_meet && shifts_meet
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: i64,
    pub doctor_id: i64,
    #[serde(flatten)]
    pub scope: LeaveScope,
    pub reason: String,
    pub category: LeaveCategory,
    pub attachment_ref: Option<String>,
    pub status: LeaveStatus,
    pub approver_id: Option<i64>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    /// Balance units taken on approval; credited back if the leave is cancelled.
    #[serde(default)]
    pub deducted_units: f64,
    pub cancelled_by: Option<i64>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLeaveRequest {
    /// Required when an admin files on a doctor's behalf; doctors file for themselves.
    pub doctor_id: Option<i64>,
    pub scope: LeaveScope,
    pub reason: String,
    pub category: LeaveCategory,
    pub attachment_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateLeaveRequest {
    pub scope: LeaveScope,
    pub reason: String,
    pub category: LeaveCategory,
    pub attachment_ref: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaveQuery {
    pub doctor_id: Option<i64>,
    pub status: Option<LeaveStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchApproveRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRejectRequest {
    pub ids: Vec<i64>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<LeaveRequest>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveBalance {
    pub doctor_id: i64,
    pub annual_allowance: f64,
    pub annual_used: f64,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl LeaveBalance {
    pub fn remaining(&self) -> f64 {
        self.annual_allowance - self.annual_used
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Validation(msg) => AppError::ValidationError(msg),
            ScheduleError::Conflict(msg) => AppError::Conflict(msg),
            ScheduleError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            ScheduleError::Unauthorized(msg) => AppError::Forbidden(msg),
            ScheduleError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
