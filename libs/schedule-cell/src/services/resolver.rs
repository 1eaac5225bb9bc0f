use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::models::{EffectiveShift, LeaveQuery, LeaveRequest, LeaveStatus, ScheduleError, ShiftKind, WorkShift};
use crate::store::{LeaveStore, WorkShiftStore};

/// Merges the facility's weekly shifts with a doctor's approved leave.
pub struct ScheduleResolver {
    shifts: Arc<dyn WorkShiftStore>,
    leaves: Arc<dyn LeaveStore>,
}

impl ScheduleResolver {
    pub fn new(shifts: Arc<dyn WorkShiftStore>, leaves: Arc<dyn LeaveStore>) -> Self {
        Self { shifts, leaves }
    }

    pub async fn effective_shifts(&self, doctor_id: i64, date: NaiveDate) -> Result<Vec<EffectiveShift>, ScheduleError> {
        let shifts = self.shifts.list_shifts(Some(date.weekday())).await?;
        let approved = self.leaves.list_leaves(&LeaveQuery {
            doctor_id: Some(doctor_id),
            status: Some(LeaveStatus::Approved),
        }).await?;

        let effective = resolve(&shifts, &approved, date);
        debug!(
            "Doctor {} on {}: {} of {} shifts remain after {} approved leaves",
            doctor_id, date, effective.len(), shifts.len(), approved.len()
        );
        Ok(effective)
    }

    pub async fn effective_shift(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        shift: ShiftKind,
    ) -> Result<Option<EffectiveShift>, ScheduleError> {
        Ok(self
            .effective_shifts(doctor_id, date)
            .await?
            .into_iter()
            .find(|s| s.shift == shift))
    }
}

/// Active shifts of `date`'s weekday that no approved leave covers, ordered by shift kind.
pub fn resolve(shifts: &[WorkShift], approved: &[LeaveRequest], date: NaiveDate) -> Vec<EffectiveShift> {
    let mut effective: Vec<EffectiveShift> = shifts
        .iter()
        .filter(|s| s.active && s.weekday == date.weekday())
        .filter(|s| {
            !approved
                .iter()
                .filter(|l| l.status == LeaveStatus::Approved)
                .any(|l| l.scope.covers(date, s.shift))
        })
        .map(|s| EffectiveShift {
            shift: s.shift,
            start_time: s.start_time,
            end_time: s.end_time,
        })
        .collect();
    effective.sort_by_key(|s| s.shift);
    effective
}
