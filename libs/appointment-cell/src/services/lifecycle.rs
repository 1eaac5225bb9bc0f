use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, LifecycleAction};

/// The appointment state machine. Every status change goes through `transition`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Target status for `action` from `current`, or `None` when the pair is not in the table.
    pub fn next_status(&self, current: AppointmentStatus, action: LifecycleAction) -> Option<AppointmentStatus> {
        use AppointmentStatus::*;
        use LifecycleAction::*;

        match (current, action) {
            (PendingDoctorApproval, DoctorApprove) => Some(Confirmed),
            (PendingDoctorApproval, DoctorReject) => Some(Rejected),
            (PendingPayment, PaymentSucceeded) => Some(PendingDoctorApproval),

            (PendingDoctorApproval | PendingPayment | Confirmed, CancelByPatient) => Some(CancelledByPatient),
            (PendingDoctorApproval | PendingPayment | Confirmed, CancelByDoctor) => Some(CancelledByDoctor),
            (PendingDoctorApproval | PendingPayment | Confirmed, CancelByAdmin) => Some(CancelledByAdmin),

            (Confirmed, CheckIn) => Some(InProgress),
            (InProgress, Complete) => Some(Completed),
            (Confirmed, MarkNoShow) => Some(NoShow),

            (PendingDoctorApproval | PendingPayment | Confirmed, Expire) => Some(Expired),

            _ => None,
        }
    }

    pub fn transition(
        &self,
        current: AppointmentStatus,
        action: LifecycleAction,
    ) -> Result<AppointmentStatus, AppointmentError> {
        match self.next_status(current, action) {
            Some(next) => {
                debug!("Status transition: {} --{:?}--> {}", current, action, next);
                Ok(next)
            }
            None => {
                warn!("Invalid transition attempted: {:?} from {}", action, current);
                Err(AppointmentError::Conflict(format!(
                    "Cannot {:?} an appointment that is {}", action, current
                )))
            }
        }
    }

    /// Actions the table accepts from `current`.
    pub fn get_valid_actions(&self, current: AppointmentStatus) -> Vec<LifecycleAction> {
        use LifecycleAction::*;

        [
            DoctorApprove, DoctorReject, PaymentSucceeded, CancelByPatient, CancelByDoctor,
            CancelByAdmin, CheckIn, Complete, MarkNoShow, Expire,
        ]
        .into_iter()
        .filter(|action| self.next_status(current, *action).is_some())
        .collect()
    }

    /// Whether the periodic sweep should expire this booking.
    /// `now_local` is clinic wall-clock time; `now` is the same instant in UTC.
    pub fn should_expire(
        &self,
        appointment: &Appointment,
        now_local: NaiveDateTime,
        now: DateTime<Utc>,
        payment_window: Duration,
    ) -> bool {
        let past_date = appointment.date < now_local.date();
        match appointment.status {
            AppointmentStatus::PendingDoctorApproval | AppointmentStatus::Confirmed => past_date,
            AppointmentStatus::PendingPayment => past_date || appointment.created_at + payment_window <= now,
            _ => false,
        }
    }
}
