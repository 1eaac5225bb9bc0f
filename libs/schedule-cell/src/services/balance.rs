use std::sync::Arc;

use tracing::{debug, warn};

use shared_config::LeavePolicyConfig;
use shared_utils::clock::Clock;

use crate::models::{LeaveBalance, LeaveScope, ScheduleError};
use crate::store::LeaveStore;

const MAX_BALANCE_ATTEMPTS: u32 = 5;

/// Annual-leave ledger. Every write is a version-checked read-modify-write.
pub struct LeaveBalanceLedger {
    store: Arc<dyn LeaveStore>,
    policy: LeavePolicyConfig,
    clock: Arc<dyn Clock>,
}

impl LeaveBalanceLedger {
    pub fn new(store: Arc<dyn LeaveStore>, policy: LeavePolicyConfig, clock: Arc<dyn Clock>) -> Self {
        Self { store, policy, clock }
    }

    /// Day-equivalent units an approved leave of this shape consumes.
    pub fn deduction_for(&self, scope: &LeaveScope) -> f64 {
        if scope.is_whole_day() {
            self.policy.whole_day_units
        } else {
            self.policy.shift_fraction
        }
    }

    pub async fn get_or_create(&self, doctor_id: i64) -> Result<LeaveBalance, ScheduleError> {
        if let Some(balance) = self.store.get_balance(doctor_id).await? {
            return Ok(balance);
        }

        let fresh = LeaveBalance {
            doctor_id,
            annual_allowance: self.policy.annual_allowance_days,
            annual_used: 0.0,
            version: 0,
            updated_at: self.clock.now(),
        };
        match self.store.insert_balance(fresh).await {
            Ok(created) => {
                debug!("Opened leave balance for doctor {}", doctor_id);
                Ok(created)
            }
            Err(e) if e.is_duplicate() => self
                .store
                .get_balance(doctor_id)
                .await?
                .ok_or_else(|| ScheduleError::NotFound(format!("Leave balance for doctor {}", doctor_id))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn debit(&self, doctor_id: i64, units: f64) -> Result<LeaveBalance, ScheduleError> {
        self.apply(doctor_id, |balance| {
            if balance.remaining() < units {
                return Err(ScheduleError::Validation(format!(
                    "Insufficient annual leave: {} remaining, {} required",
                    balance.remaining(), units
                )));
            }
            Ok(balance.annual_used + units)
        }).await
    }

    pub async fn credit(&self, doctor_id: i64, units: f64) -> Result<LeaveBalance, ScheduleError> {
        self.apply(doctor_id, |balance| Ok((balance.annual_used - units).max(0.0))).await
    }

    async fn apply<F>(&self, doctor_id: i64, next_used: F) -> Result<LeaveBalance, ScheduleError>
    where
        F: Fn(&LeaveBalance) -> Result<f64, ScheduleError>,
    {
        for attempt in 1..=MAX_BALANCE_ATTEMPTS {
            let current = self.get_or_create(doctor_id).await?;
            let updated = LeaveBalance {
                annual_used: next_used(&current)?,
                version: current.version + 1,
                updated_at: self.clock.now(),
                ..current.clone()
            };

            if self.store.update_balance_if_version(updated.clone(), current.version).await? {
                debug!(
                    "Leave balance for doctor {}: used {} -> {}",
                    doctor_id, current.annual_used, updated.annual_used
                );
                return Ok(updated);
            }

            warn!(
                "Leave balance for doctor {} changed concurrently, retrying attempt {}/{}",
                doctor_id, attempt, MAX_BALANCE_ATTEMPTS
            );
            tokio::time::sleep(tokio::time::Duration::from_millis(20 * attempt as u64)).await;
        }

        Err(ScheduleError::Conflict(format!(
            "Leave balance for doctor {} is being updated concurrently", doctor_id
        )))
    }
}
