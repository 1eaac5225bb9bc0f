use std::sync::Arc;

use chrono::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};

use shared_config::SchedulingConfig;
use shared_utils::clock::Clock;
use shared_utils::notification::{dispatch_detached, Notification, NotificationDispatcher};

use crate::models::{Appointment, AppointmentError, AppointmentStatus, LifecycleAction, StateGuard};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::refund::{mark_refunded, RefundProcessor};
use crate::store::AppointmentStore;

const EXPIRABLE: [AppointmentStatus; 3] = [
    AppointmentStatus::PendingDoctorApproval,
    AppointmentStatus::PendingPayment,
    AppointmentStatus::Confirmed,
];

/// Periodic sweep that expires stale bookings and frees their slots.
pub struct ExpirySweeper {
    store: Arc<dyn AppointmentStore>,
    lifecycle: AppointmentLifecycleService,
    refunds: Arc<dyn RefundProcessor>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationDispatcher>,
    payment_window: Duration,
    period: std::time::Duration,
}

impl ExpirySweeper {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        refunds: Arc<dyn RefundProcessor>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationDispatcher>,
        config: &SchedulingConfig,
    ) -> Self {
        Self {
            store,
            lifecycle: AppointmentLifecycleService::new(),
            refunds,
            clock,
            notifier,
            payment_window: Duration::minutes(config.payment_window_minutes),
            period: std::time::Duration::from_secs(config.expiry_sweep_interval_seconds.max(1)),
        }
    }

    /// One pass over every expirable booking. Returns how many were expired.
    /// Individual write failures are logged and left for the next pass.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<usize, AppointmentError> {
        let now = self.clock.now();
        let local_now = self.clock.local_now();
        let candidates = self.store.list_by_status(&EXPIRABLE).await?;

        let mut expired = 0;
        for appointment in candidates
            .into_iter()
            .filter(|a| self.lifecycle.should_expire(a, local_now, now, self.payment_window))
        {
            let id = appointment.id;
            let guard = StateGuard::of(&appointment);
            let next = match self.lifecycle.transition(appointment.status, LifecycleAction::Expire) {
                Ok(next) => next,
                Err(e) => {
                    warn!(appointment_id = id, "Skipping expiry: {}", e);
                    continue;
                }
            };

            let mut updated = Appointment {
                status: next,
                updated_at: now,
                ..appointment
            };
            let refunded = mark_refunded(&mut updated, now);

            match self.store.update_if(updated, guard).await {
                Ok(Some(saved)) => {
                    expired += 1;
                    if refunded {
                        if let Err(e) = self.refunds.refund(&saved).await {
                            error!(appointment_id = id, "Refund hand-off failed: {}", e);
                        }
                    }
                    dispatch_detached(
                        self.notifier.clone(),
                        Notification::new(
                            "appointment.expired",
                            saved.id,
                            vec![saved.patient_id, saved.doctor_id],
                            "Appointment expired",
                        ),
                    );
                }
                Ok(None) => debug!(appointment_id = id, "Appointment changed during sweep, skipped"),
                Err(e) => warn!(appointment_id = id, "Failed to expire appointment: {}", e),
            }
        }

        if expired > 0 {
            info!("Expired {} stale appointments", expired);
        }
        Ok(expired)
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            info!("Expiry sweep running every {:?}", self.period);

            loop {
                ticker.tick().await;
                if let Err(e) = self.run_once().await {
                    error!("Expiry sweep failed: {}", e);
                }
            }
        })
    }
}
