use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use appointment_cell::models::AppointmentError;
use shared_database::DatabaseError;
use shared_models::error::AppError;

// ==============================================================================
// RESPONSES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentUrlResponse {
    pub appointment_id: i64,
    pub transaction_ref: String,
    /// Minor units, as sent to the provider.
    pub amount: i64,
    pub payment_url: String,
    pub expires_at: DateTime<Utc>,
}

/// What the browser leg reports. Informational only; the webhook settles the booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnOutcome {
    pub transaction_ref: String,
    pub appointment_id: Option<i64>,
    pub success: bool,
    pub response_code: String,
    pub message: String,
}

/// Webhook acknowledgement in the provider's shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAck {
    #[serde(rename = "RspCode")]
    pub rsp_code: String,
    #[serde(rename = "Message")]
    pub message: String,
}

impl CallbackAck {
    pub const SUCCESS: &'static str = "00";
    pub const NOT_FOUND: &'static str = "01";
    pub const ALREADY_PROCESSED: &'static str = "02";
    pub const AMOUNT_MISMATCH: &'static str = "04";
    pub const INVALID_SIGNATURE: &'static str = "97";
    pub const UNEXPECTED: &'static str = "99";

    fn new(code: &str, message: &str) -> Self {
        Self {
            rsp_code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn success() -> Self {
        Self::new(Self::SUCCESS, "Confirm Success")
    }

    pub fn already_processed() -> Self {
        Self::new(Self::ALREADY_PROCESSED, "Order already confirmed")
    }
}

impl From<&PaymentError> for CallbackAck {
    fn from(err: &PaymentError) -> Self {
        match err {
            PaymentError::NotFound(_) => CallbackAck::new(CallbackAck::NOT_FOUND, "Order not found"),
            PaymentError::AmountMismatch { .. } => CallbackAck::new(CallbackAck::AMOUNT_MISMATCH, "Invalid amount"),
            PaymentError::InvalidSignature => CallbackAck::new(CallbackAck::INVALID_SIGNATURE, "Invalid signature"),
            _ => CallbackAck::new(CallbackAck::UNEXPECTED, "Unknown error"),
        }
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment signature verification failed")]
    InvalidSignature,

    #[error("Amount mismatch: expected {expected}, received {received}")]
    AmountMismatch { expected: i64, received: String },

    #[error("Payment gateway is not configured")]
    NotConfigured,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<AppointmentError> for PaymentError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Validation(msg) => PaymentError::Validation(msg),
            AppointmentError::Conflict(msg) => PaymentError::Conflict(msg),
            AppointmentError::NotFound(what) => PaymentError::NotFound(what),
            AppointmentError::Unauthorized(msg) => PaymentError::Unauthorized(msg),
            AppointmentError::Database(e) => PaymentError::Database(e),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(msg) => AppError::ValidationError(msg),
            PaymentError::Conflict(msg) => AppError::Conflict(msg),
            PaymentError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            PaymentError::Unauthorized(msg) => AppError::Forbidden(msg),
            PaymentError::InvalidSignature => AppError::Signature("Payment signature verification failed".to_string()),
            e @ PaymentError::AmountMismatch { .. } => AppError::AmountMismatch(e.to_string()),
            PaymentError::NotConfigured => AppError::ExternalService("Payment gateway is not configured".to_string()),
            PaymentError::Database(e) => AppError::Database(e.to_string()),
        }
    }
}
