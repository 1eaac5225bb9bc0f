use std::sync::Arc;

use chrono::Weekday;
use tracing::info;

use shared_database::DatabaseError;
use shared_models::auth::ActorContext;
use shared_utils::clock::Clock;

use crate::models::{CreateWorkShiftRequest, ScheduleError, UpdateWorkShiftRequest, WorkShift};
use crate::store::WorkShiftStore;

/// Admin management of the facility-wide weekly schedule.
pub struct WorkShiftService {
    store: Arc<dyn WorkShiftStore>,
    clock: Arc<dyn Clock>,
}

impl WorkShiftService {
    pub fn new(store: Arc<dyn WorkShiftStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn list_shifts(&self, weekday: Option<Weekday>) -> Result<Vec<WorkShift>, ScheduleError> {
        Ok(self.store.list_shifts(weekday).await?)
    }

    pub async fn create_shift(
        &self,
        actor: &ActorContext,
        request: CreateWorkShiftRequest,
    ) -> Result<WorkShift, ScheduleError> {
        require_admin(actor)?;
        validate_window(&request.start_time, &request.end_time)?;

        let now = self.clock.now();
        let shift = WorkShift {
            id: 0,
            weekday: request.weekday,
            shift: request.shift,
            start_time: request.start_time,
            end_time: request.end_time,
            active: request.active.unwrap_or(true),
            note: request.note,
            created_at: now,
            updated_at: now,
        };

        let created = self.store.insert_shift(shift).await.map_err(duplicate_as_conflict)?;
        info!("Work shift {} created: {} {}", created.id, created.weekday, created.shift);
        Ok(created)
    }

    pub async fn update_shift(
        &self,
        actor: &ActorContext,
        shift_id: i64,
        request: UpdateWorkShiftRequest,
    ) -> Result<WorkShift, ScheduleError> {
        require_admin(actor)?;

        let mut shift = self
            .store
            .get_shift(shift_id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(format!("Work shift {}", shift_id)))?;

        if let Some(start_time) = request.start_time {
            shift.start_time = start_time;
        }
        if let Some(end_time) = request.end_time {
            shift.end_time = end_time;
        }
        if let Some(active) = request.active {
            shift.active = active;
        }
        if request.note.is_some() {
            shift.note = request.note;
        }
        validate_window(&shift.start_time, &shift.end_time)?;
        shift.updated_at = self.clock.now();

        self.store
            .update_shift(shift)
            .await
            .map_err(duplicate_as_conflict)?
            .ok_or_else(|| ScheduleError::NotFound(format!("Work shift {}", shift_id)))
    }
}

fn require_admin(actor: &ActorContext) -> Result<(), ScheduleError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ScheduleError::Unauthorized("Only admins manage work shifts".to_string()))
    }
}

fn validate_window(start: &chrono::NaiveTime, end: &chrono::NaiveTime) -> Result<(), ScheduleError> {
    if end <= start {
        return Err(ScheduleError::Validation("Shift end time must be after its start time".to_string()));
    }
    Ok(())
}

fn duplicate_as_conflict(err: DatabaseError) -> ScheduleError {
    if err.is_duplicate() {
        ScheduleError::Conflict("An active shift already exists for that weekday and shift".to_string())
    } else {
        ScheduleError::Database(err)
    }
}
