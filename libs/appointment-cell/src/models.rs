use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use schedule_cell::models::{ScheduleError, ShiftKind};
use shared_database::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// STATUS ENUMS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    PendingDoctorApproval,
    PendingPayment,
    Rejected,
    Confirmed,
    InProgress,
    Completed,
    CancelledByPatient,
    CancelledByDoctor,
    CancelledByAdmin,
    NoShow,
    Expired,
}

impl AppointmentStatus {
    /// States that hold a slot against other bookings.
    pub const OCCUPYING: [AppointmentStatus; 4] = [
        AppointmentStatus::PendingDoctorApproval,
        AppointmentStatus::PendingPayment,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::PendingDoctorApproval => "pending_doctor_approval",
            AppointmentStatus::PendingPayment => "pending_payment",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::CancelledByPatient => "cancelled_by_patient",
            AppointmentStatus::CancelledByDoctor => "cancelled_by_doctor",
            AppointmentStatus::CancelledByAdmin => "cancelled_by_admin",
            AppointmentStatus::NoShow => "no_show",
            AppointmentStatus::Expired => "expired",
        }
    }

    pub fn is_occupying(&self) -> bool {
        Self::OCCUPYING.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected
                | AppointmentStatus::Completed
                | AppointmentStatus::CancelledByPatient
                | AppointmentStatus::CancelledByDoctor
                | AppointmentStatus::CancelledByAdmin
                | AppointmentStatus::NoShow
                | AppointmentStatus::Expired
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Processing,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Gateway,
}

impl PaymentMethod {
    /// Gateway bookings wait for the provider before the doctor sees them.
    pub fn initial_status(&self) -> AppointmentStatus {
        match self {
            PaymentMethod::Gateway => AppointmentStatus::PendingPayment,
            PaymentMethod::Cash | PaymentMethod::BankTransfer => AppointmentStatus::PendingDoctorApproval,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleAction {
    DoctorApprove,
    DoctorReject,
    PaymentSucceeded,
    CancelByPatient,
    CancelByDoctor,
    CancelByAdmin,
    CheckIn,
    Complete,
    MarkNoShow,
    Expire,
}

// ==============================================================================
// APPOINTMENT
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub confirmation_code: String,
    pub patient_id: i64,
    pub doctor_id: i64,
    pub facility_id: i64,
    pub date: NaiveDate,
    pub shift: ShiftKind,
    pub time: NaiveTime,
    pub reason_text: Option<String>,
    pub note: Option<String>,
    pub price: i64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub status: AppointmentStatus,

    pub doctor_decision_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub check_in_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<i64>,
    pub cancellation_reason: Option<String>,

    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub advice: Option<String>,
    pub follow_up_date: Option<NaiveDate>,

    pub rating_stars: Option<u8>,
    pub rating_comment: Option<String>,
    pub rated_at: Option<DateTime<Utc>>,

    pub transaction_ref: Option<String>,
    pub raw_payment_payload: Option<Value>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_failed_at: Option<DateTime<Utc>>,
    pub refund_amount: Option<i64>,
    pub refunded_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    /// Clinic-local start of the appointment.
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    /// Gateway amount in minor units.
    pub fn amount_minor(&self) -> i64 {
        self.price * 100
    }
}

/// What a guarded write expects to find: the (status, payment status) pair, and whether the
/// patient has rated yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateGuard {
    pub status: AppointmentStatus,
    pub payment_status: PaymentStatus,
    pub rated: bool,
}

impl StateGuard {
    pub fn of(appointment: &Appointment) -> Self {
        Self {
            status: appointment.status,
            payment_status: appointment.payment_status,
            rated: appointment.rating_stars.is_some(),
        }
    }
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    /// Set by admins booking for a patient; patients book for themselves.
    pub patient_id: Option<i64>,
    pub doctor_id: i64,
    pub date: NaiveDate,
    pub shift: ShiftKind,
    pub time: NaiveTime,
    pub reason_text: Option<String>,
    pub note: Option<String>,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorDecisionRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub diagnosis: String,
    pub prescription: Option<String>,
    pub advice: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateAppointmentRequest {
    pub stars: u8,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentQuery {
    pub patient_id: Option<i64>,
    pub doctor_id: Option<i64>,
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
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

impl From<ScheduleError> for AppointmentError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::Validation(msg) => AppointmentError::Validation(msg),
            ScheduleError::Conflict(msg) => AppointmentError::Conflict(msg),
            ScheduleError::NotFound(what) => AppointmentError::NotFound(what),
            ScheduleError::Unauthorized(msg) => AppointmentError::Unauthorized(msg),
            ScheduleError::Database(e) => AppointmentError::Database(e),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Validation(msg) => AppError::ValidationError(msg),
            AppointmentError::Conflict(msg) => AppError::Conflict(msg),
            AppointmentError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
            AppointmentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
