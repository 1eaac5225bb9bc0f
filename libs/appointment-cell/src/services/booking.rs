use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{error, info, instrument, warn};

use schedule_cell::services::SlotCalculator;
use shared_config::SchedulingConfig;
use shared_models::auth::{ActorContext, Role};
use shared_utils::clock::Clock;
use shared_utils::notification::{dispatch_detached, Notification, NotificationDispatcher};

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, CancelAppointmentRequest,
    CompleteAppointmentRequest, CreateAppointmentRequest, DoctorDecisionRequest, LifecycleAction, PaymentMethod,
    PaymentStatus, RateAppointmentRequest, StateGuard,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::pricing::PricingService;
use crate::services::refund::{mark_refunded, RefundProcessor};
use crate::store::{AppointmentStore, CONFIRMATION_CODE_CONSTRAINT};

/// No 0/O, 1/I/L: codes are read out over the phone.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 8;
const MAX_CODE_ATTEMPTS: usize = 5;

pub fn generate_confirmation_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Booking lifecycle: creation with conflict checks, doctor decisions, cancellation,
/// check-in, completion and rating.
pub struct BookingService {
    store: Arc<dyn AppointmentStore>,
    slots: Arc<SlotCalculator>,
    pricing: PricingService,
    lifecycle: AppointmentLifecycleService,
    refunds: Arc<dyn RefundProcessor>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationDispatcher>,
    config: SchedulingConfig,
}

impl BookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        slots: Arc<SlotCalculator>,
        refunds: Arc<dyn RefundProcessor>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationDispatcher>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            store,
            slots,
            pricing: PricingService::new(),
            lifecycle: AppointmentLifecycleService::new(),
            refunds,
            clock,
            notifier,
            config,
        }
    }

    #[instrument(skip(self, request), fields(actor_id = actor.actor_id, doctor_id = request.doctor_id))]
    pub async fn create_appointment(
        &self,
        actor: &ActorContext,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let patient_id = match actor.role {
            Role::Patient => match request.patient_id {
                Some(id) if id != actor.actor_id => {
                    return Err(AppointmentError::Unauthorized("Patients can only book for themselves".to_string()));
                }
                _ => actor.actor_id,
            },
            Role::Admin => request
                .patient_id
                .ok_or_else(|| AppointmentError::Validation("patient_id is required".to_string()))?,
            Role::Doctor => {
                return Err(AppointmentError::Unauthorized("Doctors cannot book appointments".to_string()));
            }
        };

        let today = self.clock.local_now().date();
        if request.date <= today {
            return Err(AppointmentError::Validation("Appointments must be booked for a future date".to_string()));
        }
        let horizon = today + Duration::days(self.config.max_advance_booking_days);
        if request.date > horizon {
            return Err(AppointmentError::Validation(format!(
                "Appointments can be booked at most {} days ahead", self.config.max_advance_booking_days
            )));
        }

        let doctor = self.slots.doctor(request.doctor_id).await?;
        if !doctor.active {
            return Err(AppointmentError::Validation(format!(
                "Doctor {} is not accepting appointments", doctor.doctor_id
            )));
        }
        self.slots
            .ensure_bookable(&doctor, request.date, request.shift, request.time)
            .await?;
        self.ensure_patient_free(patient_id, &request).await?;

        let price = self.pricing.calculate_price(&doctor)?;
        let now = self.clock.now();
        let mut draft = Appointment {
            id: 0,
            confirmation_code: String::new(),
            patient_id,
            doctor_id: doctor.doctor_id,
            facility_id: doctor.facility_id,
            date: request.date,
            shift: request.shift,
            time: request.time,
            reason_text: request.reason_text,
            note: request.note,
            price,
            payment_method: request.payment_method,
            payment_status: PaymentStatus::Unpaid,
            status: request.payment_method.initial_status(),
            doctor_decision_at: None,
            rejection_reason: None,
            check_in_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            diagnosis: None,
            prescription: None,
            advice: None,
            follow_up_date: None,
            rating_stars: None,
            rating_comment: None,
            rated_at: None,
            transaction_ref: None,
            raw_payment_payload: None,
            paid_at: None,
            payment_failed_at: None,
            refund_amount: None,
            refunded_at: None,
            created_at: now,
            updated_at: now,
        };

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            draft.confirmation_code = generate_confirmation_code();
            match self.store.insert(draft.clone()).await {
                Ok(created) => {
                    info!(
                        appointment_id = created.id,
                        "Appointment {} booked for patient {} at {} {}",
                        created.confirmation_code, patient_id, created.date, created.time
                    );
                    self.notify("appointment.created", &created, "Appointment booked");
                    return Ok(created);
                }
                Err(e) if e.constraint() == Some(CONFIRMATION_CODE_CONSTRAINT) => {
                    warn!("Confirmation code collision on attempt {}, retrying", attempt);
                }
                Err(e) if e.is_duplicate() => {
                    return Err(AppointmentError::Conflict(format!(
                        "Slot {} on {} was just taken", request.time, request.date
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }

        error!("Could not allocate a confirmation code after {} attempts", MAX_CODE_ATTEMPTS);
        Err(AppointmentError::Conflict("Could not allocate a confirmation code, please retry".to_string()))
    }

    pub async fn get_appointment(&self, actor: &ActorContext, id: i64) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(id).await?;
        ensure_can_view(actor, &appointment)?;
        Ok(appointment)
    }

    pub async fn get_by_code(&self, actor: &ActorContext, code: &str) -> Result<Appointment, AppointmentError> {
        let appointment = self
            .store
            .get_by_code(&code.trim().to_uppercase())
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Appointment {}", code)))?;
        ensure_can_view(actor, &appointment)?;
        Ok(appointment)
    }

    pub async fn list_appointments(
        &self,
        actor: &ActorContext,
        mut query: AppointmentQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        match actor.role {
            Role::Admin => {}
            Role::Doctor => {
                if query.doctor_id.is_some_and(|id| id != actor.actor_id) {
                    return Err(AppointmentError::Unauthorized("Doctors can only list their own appointments".to_string()));
                }
                query.doctor_id = Some(actor.actor_id);
            }
            Role::Patient => {
                if query.patient_id.is_some_and(|id| id != actor.actor_id) {
                    return Err(AppointmentError::Unauthorized("Patients can only list their own appointments".to_string()));
                }
                query.patient_id = Some(actor.actor_id);
            }
        }
        Ok(self.store.list(&query).await?)
    }

    #[instrument(skip(self, request), fields(actor_id = actor.actor_id))]
    pub async fn approve(
        &self,
        actor: &ActorContext,
        id: i64,
        request: DoctorDecisionRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(id).await?;
        ensure_assigned_doctor(actor, &current)?;
        let next = self.lifecycle.transition(current.status, LifecycleAction::DoctorApprove)?;
        if request.reason.as_deref().is_some_and(|r| !r.trim().is_empty()) {
            return Err(AppointmentError::Validation("An approval must not carry a reason".to_string()));
        }

        let guard = StateGuard::of(&current);
        let now = self.clock.now();
        let updated = Appointment {
            status: next,
            doctor_decision_at: Some(now),
            updated_at: now,
            ..current
        };
        let saved = self.persist(updated, guard).await?;
        info!(appointment_id = saved.id, "Appointment confirmed by doctor {}", actor.actor_id);
        self.notify("appointment.confirmed", &saved, "Appointment confirmed");
        Ok(saved)
    }

    #[instrument(skip(self, request), fields(actor_id = actor.actor_id))]
    pub async fn reject(
        &self,
        actor: &ActorContext,
        id: i64,
        request: DoctorDecisionRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(id).await?;
        ensure_assigned_doctor(actor, &current)?;
        let next = self.lifecycle.transition(current.status, LifecycleAction::DoctorReject)?;
        let reason = request.reason.as_deref().map(str::trim).unwrap_or_default();
        if reason.chars().count() < self.config.min_rejection_reason_length {
            return Err(AppointmentError::Validation(format!(
                "A rejection reason of at least {} characters is required",
                self.config.min_rejection_reason_length
            )));
        }

        let guard = StateGuard::of(&current);
        let now = self.clock.now();
        let mut updated = Appointment {
            status: next,
            doctor_decision_at: Some(now),
            rejection_reason: Some(reason.to_string()),
            updated_at: now,
            ..current
        };
        let refunded = mark_refunded(&mut updated, now);

        let saved = self.persist(updated, guard).await?;
        info!(appointment_id = saved.id, "Appointment rejected by doctor {}", actor.actor_id);
        if refunded {
            self.request_refund(&saved).await;
        }
        self.notify("appointment.rejected", &saved, reason);
        Ok(saved)
    }

    #[instrument(skip(self, request), fields(actor_id = actor.actor_id))]
    pub async fn cancel(
        &self,
        actor: &ActorContext,
        id: i64,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(id).await?;
        let action = match actor.role {
            Role::Patient if actor.is_patient(current.patient_id) => LifecycleAction::CancelByPatient,
            Role::Doctor if actor.is_doctor(current.doctor_id) => LifecycleAction::CancelByDoctor,
            Role::Admin => LifecycleAction::CancelByAdmin,
            _ => {
                return Err(AppointmentError::Unauthorized("Not allowed to cancel this appointment".to_string()));
            }
        };
        let next = self.lifecycle.transition(current.status, action)?;

        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(AppointmentError::Validation("A cancellation reason is required".to_string()));
        }
        if action == LifecycleAction::CancelByPatient {
            let notice = current.starts_at() - self.clock.local_now();
            if notice < Duration::hours(self.config.min_cancellation_notice_hours) {
                return Err(AppointmentError::Validation(format!(
                    "Appointments must be cancelled at least {} hours in advance",
                    self.config.min_cancellation_notice_hours
                )));
            }
        }

        let guard = StateGuard::of(&current);
        let now = self.clock.now();
        let mut updated = Appointment {
            status: next,
            cancelled_at: Some(now),
            cancelled_by: Some(actor.actor_id),
            cancellation_reason: Some(reason.to_string()),
            updated_at: now,
            ..current
        };
        let refunded = mark_refunded(&mut updated, now);

        let saved = self.persist(updated, guard).await?;
        info!(appointment_id = saved.id, "Appointment {} by {}", saved.status, actor.actor_id);
        if refunded {
            self.request_refund(&saved).await;
        }
        self.notify("appointment.cancelled", &saved, reason);
        Ok(saved)
    }

    pub async fn check_in(&self, actor: &ActorContext, id: i64) -> Result<Appointment, AppointmentError> {
        let current = self.load(id).await?;
        ensure_doctor_or_admin(actor, &current)?;
        let next = self.lifecycle.transition(current.status, LifecycleAction::CheckIn)?;
        let today = self.clock.local_now().date();
        if current.date != today {
            return Err(AppointmentError::Validation(format!(
                "Check-in is only possible on {}", current.date
            )));
        }

        let guard = StateGuard::of(&current);
        let now = self.clock.now();
        let updated = Appointment {
            status: next,
            check_in_at: Some(now),
            started_at: Some(now),
            updated_at: now,
            ..current
        };
        let saved = self.persist(updated, guard).await?;
        self.notify("appointment.checked_in", &saved, "Patient checked in");
        Ok(saved)
    }

    #[instrument(skip(self, request), fields(actor_id = actor.actor_id))]
    pub async fn complete(
        &self,
        actor: &ActorContext,
        id: i64,
        request: CompleteAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(id).await?;
        ensure_assigned_doctor(actor, &current)?;
        let next = self.lifecycle.transition(current.status, LifecycleAction::Complete)?;

        let diagnosis = request.diagnosis.trim();
        if diagnosis.is_empty() {
            return Err(AppointmentError::Validation("A diagnosis is required".to_string()));
        }
        if let Some(follow_up) = request.follow_up_date {
            if follow_up <= current.date {
                return Err(AppointmentError::Validation("Follow-up date must be after the appointment".to_string()));
            }
        }

        let guard = StateGuard::of(&current);
        let now = self.clock.now();
        let mut updated = Appointment {
            status: next,
            diagnosis: Some(diagnosis.to_string()),
            prescription: request.prescription,
            advice: request.advice,
            follow_up_date: request.follow_up_date,
            completed_at: Some(now),
            updated_at: now,
            ..current
        };
        settle_cash(&mut updated, now);

        let saved = self.persist(updated, guard).await?;
        info!(appointment_id = saved.id, "Appointment completed, payment {}", saved.payment_status);
        self.notify("appointment.completed", &saved, "Consultation completed");
        Ok(saved)
    }

    pub async fn mark_no_show(&self, actor: &ActorContext, id: i64) -> Result<Appointment, AppointmentError> {
        let current = self.load(id).await?;
        ensure_doctor_or_admin(actor, &current)?;
        let next = self.lifecycle.transition(current.status, LifecycleAction::MarkNoShow)?;
        if self.clock.local_now() < current.starts_at() {
            return Err(AppointmentError::Validation("The appointment has not started yet".to_string()));
        }

        let guard = StateGuard::of(&current);
        let now = self.clock.now();
        let updated = Appointment {
            status: next,
            updated_at: now,
            ..current
        };
        let saved = self.persist(updated, guard).await?;
        self.notify("appointment.no_show", &saved, "Patient did not attend");
        Ok(saved)
    }

    pub async fn rate(
        &self,
        actor: &ActorContext,
        id: i64,
        request: RateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(id).await?;
        if !actor.is_patient(current.patient_id) {
            return Err(AppointmentError::Unauthorized("Only the patient can rate an appointment".to_string()));
        }
        if current.status != AppointmentStatus::Completed {
            return Err(AppointmentError::Conflict(format!(
                "Only completed appointments can be rated, this one is {}", current.status
            )));
        }
        if current.rating_stars.is_some() {
            return Err(AppointmentError::Conflict("Appointment has already been rated".to_string()));
        }
        if !(1..=5).contains(&request.stars) {
            return Err(AppointmentError::Validation("Rating must be between 1 and 5 stars".to_string()));
        }
        let comment = request
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if request.stars <= 2 && comment.is_none() {
            return Err(AppointmentError::Validation("Low ratings need a comment".to_string()));
        }

        let guard = StateGuard::of(&current);
        let now = self.clock.now();
        let updated = Appointment {
            rating_stars: Some(request.stars),
            rating_comment: comment,
            rated_at: Some(now),
            updated_at: now,
            ..current
        };
        // A concurrent rating flips the guard's rated flag first
        let saved = self
            .store
            .update_if(updated, guard)
            .await?
            .ok_or_else(|| AppointmentError::Conflict("Appointment has already been rated".to_string()))?;
        self.notify("appointment.rated", &saved, "Patient rated the consultation");
        Ok(saved)
    }

    async fn ensure_patient_free(
        &self,
        patient_id: i64,
        request: &CreateAppointmentRequest,
    ) -> Result<(), AppointmentError> {
        let same_day = self
            .store
            .list(&AppointmentQuery {
                patient_id: Some(patient_id),
                date: Some(request.date),
                ..AppointmentQuery::default()
            })
            .await?;

        if same_day
            .iter()
            .any(|a| a.status.is_occupying() && a.shift == request.shift && a.time == request.time)
        {
            return Err(AppointmentError::Conflict(format!(
                "Patient {} already has an appointment at {} {}", patient_id, request.date, request.time
            )));
        }
        Ok(())
    }

    async fn load(&self, id: i64) -> Result<Appointment, AppointmentError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound(format!("Appointment {}", id)))
    }

    async fn persist(&self, updated: Appointment, guard: StateGuard) -> Result<Appointment, AppointmentError> {
        let id = updated.id;
        self.store.update_if(updated, guard).await?.ok_or_else(|| {
            AppointmentError::Conflict(format!("Appointment {} changed concurrently, reload and retry", id))
        })
    }

    async fn request_refund(&self, appointment: &Appointment) {
        if let Err(e) = self.refunds.refund(appointment).await {
            error!(appointment_id = appointment.id, "Refund hand-off failed: {}", e);
        }
    }

    fn notify(&self, event: &str, appointment: &Appointment, message: &str) {
        dispatch_detached(
            self.notifier.clone(),
            Notification::new(
                event,
                appointment.id,
                vec![appointment.patient_id, appointment.doctor_id],
                message,
            ),
        );
    }
}

/// Cash collected at the desk: an unpaid cash booking is settled on completion.
fn settle_cash(appointment: &mut Appointment, now: DateTime<Utc>) {
    if appointment.payment_method == PaymentMethod::Cash && appointment.payment_status == PaymentStatus::Unpaid {
        appointment.payment_status = PaymentStatus::Paid;
        appointment.paid_at = Some(now);
        appointment.transaction_ref = Some(format!("CASH-{}", appointment.confirmation_code));
    }
}

fn ensure_can_view(actor: &ActorContext, appointment: &Appointment) -> Result<(), AppointmentError> {
    if actor.is_admin() || actor.is_patient(appointment.patient_id) || actor.is_doctor(appointment.doctor_id) {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized("Not allowed to access this appointment".to_string()))
    }
}

fn ensure_assigned_doctor(actor: &ActorContext, appointment: &Appointment) -> Result<(), AppointmentError> {
    if actor.is_doctor(appointment.doctor_id) {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized("Only the assigned doctor can do this".to_string()))
    }
}

fn ensure_doctor_or_admin(actor: &ActorContext, appointment: &Appointment) -> Result<(), AppointmentError> {
    if actor.is_admin() || actor.is_doctor(appointment.doctor_id) {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized("Only the assigned doctor or the front desk can do this".to_string()))
    }
}
