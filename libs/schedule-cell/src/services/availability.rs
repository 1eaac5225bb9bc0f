use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveTime};
use tracing::{debug, instrument};

use shared_config::SchedulingConfig;
use shared_utils::clock::Clock;

use crate::models::{DoctorProfile, EffectiveShift, ScheduleError, ShiftKind, ShiftSlots, Slot};
use crate::services::resolver::ScheduleResolver;
use crate::store::{DoctorDirectory, OccupancySource};

/// Turns effective shifts into fixed-width slots and marks the ones held by bookings.
pub struct SlotCalculator {
    resolver: Arc<ScheduleResolver>,
    directory: Arc<dyn DoctorDirectory>,
    occupancy: Arc<dyn OccupancySource>,
    clock: Arc<dyn Clock>,
    config: SchedulingConfig,
}

impl SlotCalculator {
    pub fn new(
        resolver: Arc<ScheduleResolver>,
        directory: Arc<dyn DoctorDirectory>,
        occupancy: Arc<dyn OccupancySource>,
        clock: Arc<dyn Clock>,
        config: SchedulingConfig,
    ) -> Self {
        Self { resolver, directory, occupancy, clock, config }
    }

    pub async fn doctor(&self, doctor_id: i64) -> Result<DoctorProfile, ScheduleError> {
        self.directory
            .get_doctor(doctor_id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(format!("Doctor {}", doctor_id)))
    }

    fn slot_minutes(&self, doctor: &DoctorProfile) -> u32 {
        doctor.slot_minutes.filter(|m| *m > 0).unwrap_or(self.config.default_slot_minutes)
    }

    #[instrument(skip(self))]
    pub async fn available_slots(
        &self,
        doctor_id: i64,
        date: NaiveDate,
        shift: ShiftKind,
    ) -> Result<Vec<Slot>, ScheduleError> {
        let doctor = self.doctor(doctor_id).await?;
        let Some(effective) = self.resolver.effective_shift(doctor_id, date, shift).await? else {
            debug!("No effective {} shift for doctor {} on {}", shift, doctor_id, date);
            return Ok(vec![]);
        };
        let cap_reached = self.daily_cap_reached(&doctor, date).await?;
        self.slots_for_shift(&doctor, date, &effective, cap_reached).await
    }

    pub async fn available_slots_for_day(&self, doctor_id: i64, date: NaiveDate) -> Result<Vec<ShiftSlots>, ScheduleError> {
        let doctor = self.doctor(doctor_id).await?;
        let cap_reached = self.daily_cap_reached(&doctor, date).await?;
        let slot_minutes = self.slot_minutes(&doctor);

        let mut day = Vec::new();
        for effective in self.resolver.effective_shifts(doctor_id, date).await? {
            let slots = self.slots_for_shift(&doctor, date, &effective, cap_reached).await?;
            day.push(ShiftSlots {
                shift: effective.shift,
                start_time: effective.start_time,
                end_time: effective.end_time,
                slot_minutes,
                slots,
            });
        }
        Ok(day)
    }

    /// Confirms that `time` is a free, aligned slot inside the doctor's effective shift.
    pub async fn ensure_bookable(
        &self,
        doctor: &DoctorProfile,
        date: NaiveDate,
        shift: ShiftKind,
        time: NaiveTime,
    ) -> Result<EffectiveShift, ScheduleError> {
        let effective = self
            .resolver
            .effective_shift(doctor.doctor_id, date, shift)
            .await?
            .ok_or_else(|| ScheduleError::Validation(format!(
                "Doctor {} has no {} shift on {}", doctor.doctor_id, shift, date
            )))?;

        let slot_minutes = self.slot_minutes(doctor);
        let bounds = discretize(effective.start_time, effective.end_time, slot_minutes);
        if !bounds.iter().any(|(start, _)| *start == time) {
            return Err(ScheduleError::Validation(format!(
                "{} is not a {}-minute slot within {}-{}",
                time, slot_minutes, effective.start_time, effective.end_time
            )));
        }

        if self.daily_cap_reached(doctor, date).await? {
            return Err(ScheduleError::Conflict(format!(
                "Doctor {} is fully booked on {}", doctor.doctor_id, date
            )));
        }

        let occupied = self.occupancy.occupied_times(doctor.doctor_id, date, shift).await?;
        if occupied.contains(&time) {
            return Err(ScheduleError::Conflict(format!("Slot {} on {} is already booked", time, date)));
        }

        Ok(effective)
    }

    async fn daily_cap_reached(&self, doctor: &DoctorProfile, date: NaiveDate) -> Result<bool, ScheduleError> {
        match doctor.max_daily_appointments {
            Some(cap) => {
                let count = self.occupancy.occupied_count_for_day(doctor.doctor_id, date).await?;
                Ok(count >= cap as usize)
            }
            None => Ok(false),
        }
    }

    async fn slots_for_shift(
        &self,
        doctor: &DoctorProfile,
        date: NaiveDate,
        effective: &EffectiveShift,
        cap_reached: bool,
    ) -> Result<Vec<Slot>, ScheduleError> {
        let occupied = self.occupancy.occupied_times(doctor.doctor_id, date, effective.shift).await?;
        let now = self.clock.local_now();

        let slots = discretize(effective.start_time, effective.end_time, self.slot_minutes(doctor))
            .into_iter()
            .map(|(start_time, end_time)| {
                let in_past = date < now.date() || (date == now.date() && start_time <= now.time());
                Slot {
                    start_time,
                    end_time,
                    available: !cap_reached && !in_past && !occupied.contains(&start_time),
                }
            })
            .collect();
        Ok(slots)
    }
}

/// Splits `[start, end)` into `minutes`-wide slots that end no later than `end`.
pub fn discretize(start: NaiveTime, end: NaiveTime, minutes: u32) -> Vec<(NaiveTime, NaiveTime)> {
    let mut bounds = Vec::new();
    if minutes == 0 {
        return bounds;
    }
    let step = Duration::minutes(minutes as i64);
    let mut cursor = start;
    loop {
        let (slot_end, wrapped) = cursor.overflowing_add_signed(step);
        if wrapped != 0 || slot_end > end || slot_end <= cursor {
            break;
        }
        bounds.push((cursor, slot_end));
        cursor = slot_end;
    }
    bounds
}
