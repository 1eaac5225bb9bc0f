use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::models::{Appointment, AppointmentError, PaymentStatus};

/// Moves a paid booking to `Refunded` for its full price. Returns whether anything changed.
pub fn mark_refunded(appointment: &mut Appointment, now: DateTime<Utc>) -> bool {
    if appointment.payment_status != PaymentStatus::Paid {
        return false;
    }
    appointment.payment_status = PaymentStatus::Refunded;
    appointment.refund_amount = Some(appointment.price);
    appointment.refunded_at = Some(now);
    true
}

/// Hands a refund to whatever settles money with the patient.
/// The booking already carries the refund fields when this runs.
#[async_trait]
pub trait RefundProcessor: Send + Sync {
    async fn refund(&self, appointment: &Appointment) -> Result<(), AppointmentError>;
}

/// Records refunds in the log for manual settlement by the front desk.
#[derive(Debug, Default)]
pub struct LoggingRefundProcessor;

#[async_trait]
impl RefundProcessor for LoggingRefundProcessor {
    async fn refund(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        info!(
            appointment_id = appointment.id,
            transaction_ref = appointment.transaction_ref.as_deref().unwrap_or("-"),
            amount = appointment.refund_amount.unwrap_or_default(),
            "REFUND requested"
        );
        Ok(())
    }
}
