use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use shared_models::auth::{ActorContext, Role};
use shared_utils::clock::Clock;
use shared_utils::notification::{dispatch_detached, Notification, NotificationDispatcher};

use crate::models::{
    BatchFailure, BatchOutcome, CreateLeaveRequest, LeaveBalance, LeaveCategory, LeaveQuery, LeaveRequest,
    LeaveScope, LeaveStatus, ScheduleError, UpdateLeaveRequest,
};
use crate::services::balance::LeaveBalanceLedger;
use crate::store::LeaveStore;

/// Leave request workflow: filing, editing, admin decisions, cancellation and removal.
pub struct LeaveService {
    store: Arc<dyn LeaveStore>,
    ledger: Arc<LeaveBalanceLedger>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationDispatcher>,
    /// Held from the overlap check to the status write of one approval.
    approvals: Mutex<()>,
}

impl LeaveService {
    pub fn new(
        store: Arc<dyn LeaveStore>,
        ledger: Arc<LeaveBalanceLedger>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            ledger,
            clock,
            notifier,
            approvals: Mutex::new(()),
        }
    }

    #[instrument(skip(self, request), fields(actor_id = actor.actor_id))]
    pub async fn create_leave(
        &self,
        actor: &ActorContext,
        request: CreateLeaveRequest,
    ) -> Result<LeaveRequest, ScheduleError> {
        let doctor_id = match actor.role {
            Role::Doctor => match request.doctor_id {
                Some(id) if id != actor.actor_id => {
                    return Err(ScheduleError::Unauthorized("Doctors can only file their own leave".to_string()));
                }
                _ => actor.actor_id,
            },
            Role::Admin => request
                .doctor_id
                .ok_or_else(|| ScheduleError::Validation("doctor_id is required".to_string()))?,
            Role::Patient => {
                return Err(ScheduleError::Unauthorized("Patients cannot file leave".to_string()));
            }
        };

        self.validate_leave(doctor_id, None, &request.scope, &request.reason, request.category, request.attachment_ref.as_deref()).await?;

        let now = self.clock.now();
        let leave = LeaveRequest {
            id: 0,
            doctor_id,
            scope: request.scope,
            reason: request.reason.trim().to_string(),
            category: request.category,
            attachment_ref: request.attachment_ref,
            status: LeaveStatus::Pending,
            approver_id: None,
            approved_at: None,
            rejection_reason: None,
            deducted_units: 0.0,
            cancelled_by: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.store.insert_leave(leave).await?;
        info!("Leave request {} filed for doctor {}", created.id, doctor_id);
        self.notify("leave.created", &created, "Leave request submitted for review");
        Ok(created)
    }

    pub async fn update_leave(
        &self,
        actor: &ActorContext,
        leave_id: i64,
        request: UpdateLeaveRequest,
    ) -> Result<LeaveRequest, ScheduleError> {
        let mut leave = self.load(leave_id).await?;
        if !actor.is_doctor(leave.doctor_id) {
            return Err(ScheduleError::Unauthorized("Only the requesting doctor can edit a leave request".to_string()));
        }
        if leave.status != LeaveStatus::Pending {
            return Err(ScheduleError::Conflict(format!("Leave request is {} and can no longer be edited", leave.status)));
        }

        self.validate_leave(leave.doctor_id, Some(leave.id), &request.scope, &request.reason, request.category, request.attachment_ref.as_deref()).await?;

        leave.scope = request.scope;
        leave.reason = request.reason.trim().to_string();
        leave.category = request.category;
        leave.attachment_ref = request.attachment_ref;
        leave.updated_at = self.clock.now();

        self.store
            .update_leave_if_status(leave, LeaveStatus::Pending)
            .await?
            .ok_or_else(|| ScheduleError::Conflict("Leave request changed while it was being edited".to_string()))
    }

    pub async fn get_leave(&self, actor: &ActorContext, leave_id: i64) -> Result<LeaveRequest, ScheduleError> {
        let leave = self.load(leave_id).await?;
        ensure_owner_or_admin(actor, leave.doctor_id)?;
        Ok(leave)
    }

    pub async fn list_leaves(&self, actor: &ActorContext, mut query: LeaveQuery) -> Result<Vec<LeaveRequest>, ScheduleError> {
        match actor.role {
            Role::Admin => {}
            Role::Doctor => {
                if query.doctor_id.is_some_and(|id| id != actor.actor_id) {
                    return Err(ScheduleError::Unauthorized("Doctors can only list their own leave".to_string()));
                }
                query.doctor_id = Some(actor.actor_id);
            }
            Role::Patient => {
                return Err(ScheduleError::Unauthorized("Patients cannot list leave".to_string()));
            }
        }
        Ok(self.store.list_leaves(&query).await?)
    }

    pub async fn get_balance(&self, actor: &ActorContext, doctor_id: i64) -> Result<LeaveBalance, ScheduleError> {
        ensure_owner_or_admin(actor, doctor_id)?;
        self.ledger.get_or_create(doctor_id).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn batch_approve(&self, actor: &ActorContext, ids: &[i64]) -> Result<BatchOutcome, ScheduleError> {
        require_admin(actor)?;
        let mut outcome = BatchOutcome::default();
        for &id in ids {
            match self.approve_one(actor, id).await {
                Ok(leave) => outcome.succeeded.push(leave),
                Err(e) => {
                    warn!("Leave {} not approved: {}", id, e);
                    outcome.failed.push(BatchFailure { id, error: e.to_string() });
                }
            }
        }
        Ok(outcome)
    }

    #[instrument(skip(self, ids, reason), fields(count = ids.len()))]
    pub async fn batch_reject(&self, actor: &ActorContext, ids: &[i64], reason: &str) -> Result<BatchOutcome, ScheduleError> {
        require_admin(actor)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ScheduleError::Validation("A rejection reason is required".to_string()));
        }

        let mut outcome = BatchOutcome::default();
        for &id in ids {
            match self.reject_one(id, reason).await {
                Ok(leave) => outcome.succeeded.push(leave),
                Err(e) => {
                    warn!("Leave {} not rejected: {}", id, e);
                    outcome.failed.push(BatchFailure { id, error: e.to_string() });
                }
            }
        }
        Ok(outcome)
    }

    pub async fn cancel_leave(&self, actor: &ActorContext, leave_id: i64) -> Result<LeaveRequest, ScheduleError> {
        let leave = self.load(leave_id).await?;
        ensure_owner_or_admin(actor, leave.doctor_id)?;
        if !leave.status.is_cancellable() {
            return Err(ScheduleError::Conflict(format!("A {} leave request cannot be cancelled", leave.status)));
        }

        let refund = (leave.status == LeaveStatus::Approved && leave.category == LeaveCategory::Annual)
            .then_some(leave.deducted_units)
            .filter(|units| *units > 0.0);
        if let Some(units) = refund {
            self.ledger.credit(leave.doctor_id, units).await?;
        }

        let expected = leave.status;
        let doctor_id = leave.doctor_id;
        let now = self.clock.now();
        let cancelled = LeaveRequest {
            status: LeaveStatus::Cancelled,
            cancelled_by: Some(actor.actor_id),
            cancelled_at: Some(now),
            updated_at: now,
            ..leave
        };

        match self.store.update_leave_if_status(cancelled, expected).await? {
            Some(saved) => {
                info!("Leave request {} cancelled by {}", saved.id, actor.actor_id);
                self.notify("leave.cancelled", &saved, "Leave request cancelled");
                Ok(saved)
            }
            None => {
                if let Some(units) = refund {
                    if let Err(e) = self.ledger.debit(doctor_id, units).await {
                        error!("Failed to restore {} units for doctor {}: {}", units, doctor_id, e);
                    }
                }
                Err(ScheduleError::Conflict("Leave request changed while it was being cancelled".to_string()))
            }
        }
    }

    pub async fn delete_leave(&self, actor: &ActorContext, leave_id: i64) -> Result<(), ScheduleError> {
        let leave = self.load(leave_id).await?;
        ensure_owner_or_admin(actor, leave.doctor_id)?;
        if !leave.status.is_deletable() {
            return Err(ScheduleError::Conflict(format!("A {} leave request cannot be deleted", leave.status)));
        }

        let allowed = [LeaveStatus::Pending, LeaveStatus::Rejected, LeaveStatus::Cancelled];
        if !self.store.delete_leave_if_status(leave_id, &allowed).await? {
            return Err(ScheduleError::Conflict("Leave request changed while it was being deleted".to_string()));
        }
        info!("Leave request {} deleted by {}", leave_id, actor.actor_id);
        Ok(())
    }

    async fn approve_one(&self, actor: &ActorContext, leave_id: i64) -> Result<LeaveRequest, ScheduleError> {
        let _serial = self.approvals.lock().await;
        let leave = self.load(leave_id).await?;
        if leave.status != LeaveStatus::Pending {
            return Err(ScheduleError::Conflict(format!("Leave request is {}, not pending", leave.status)));
        }
        self.ensure_no_overlap(leave.doctor_id, Some(leave.id), &leave.scope).await?;

        let units = if leave.category == LeaveCategory::Annual {
            let units = self.ledger.deduction_for(&leave.scope);
            self.ledger.debit(leave.doctor_id, units).await?;
            units
        } else {
            0.0
        };

        let now = self.clock.now();
        let doctor_id = leave.doctor_id;
        let approved = LeaveRequest {
            status: LeaveStatus::Approved,
            approver_id: Some(actor.actor_id),
            approved_at: Some(now),
            deducted_units: units,
            updated_at: now,
            ..leave
        };

        match self.store.update_leave_if_status(approved, LeaveStatus::Pending).await? {
            Some(saved) => {
                info!("Leave request {} approved, {} units deducted", saved.id, units);
                self.notify("leave.approved", &saved, "Leave request approved");
                Ok(saved)
            }
            None => {
                if units > 0.0 {
                    if let Err(e) = self.ledger.credit(doctor_id, units).await {
                        error!("Failed to return {} units to doctor {}: {}", units, doctor_id, e);
                    }
                }
                Err(ScheduleError::Conflict("Leave request changed while it was being approved".to_string()))
            }
        }
    }

    async fn reject_one(&self, leave_id: i64, reason: &str) -> Result<LeaveRequest, ScheduleError> {
        let leave = self.load(leave_id).await?;
        if leave.status != LeaveStatus::Pending {
            return Err(ScheduleError::Conflict(format!("Leave request is {}, not pending", leave.status)));
        }

        let rejected = LeaveRequest {
            status: LeaveStatus::Rejected,
            rejection_reason: Some(reason.to_string()),
            updated_at: self.clock.now(),
            ..leave
        };

        let saved = self
            .store
            .update_leave_if_status(rejected, LeaveStatus::Pending)
            .await?
            .ok_or_else(|| ScheduleError::Conflict("Leave request changed while it was being rejected".to_string()))?;
        self.notify("leave.rejected", &saved, reason);
        Ok(saved)
    }

    async fn validate_leave(
        &self,
        doctor_id: i64,
        editing: Option<i64>,
        scope: &LeaveScope,
        reason: &str,
        category: LeaveCategory,
        attachment_ref: Option<&str>,
    ) -> Result<(), ScheduleError> {
        if reason.trim().is_empty() {
            return Err(ScheduleError::Validation("A reason is required".to_string()));
        }
        if let Some(date) = scope.date() {
            if date < self.clock.local_now().date() {
                return Err(ScheduleError::Validation(format!("Leave date {} is in the past", date)));
            }
        }
        if category == LeaveCategory::Sick && attachment_ref.map_or(true, |a| a.trim().is_empty()) {
            return Err(ScheduleError::Validation("Sick leave requires a supporting attachment".to_string()));
        }

        self.ensure_no_overlap(doctor_id, editing, scope).await?;

        if category == LeaveCategory::Annual {
            let balance = self.ledger.get_or_create(doctor_id).await?;
            if balance.remaining() <= 0.0 {
                return Err(ScheduleError::Validation("No annual leave remaining".to_string()));
            }
        }
        Ok(())
    }

    async fn ensure_no_overlap(&self, doctor_id: i64, exclude: Option<i64>, scope: &LeaveScope) -> Result<(), ScheduleError> {
        let approved = self.store.list_leaves(&LeaveQuery {
            doctor_id: Some(doctor_id),
            status: Some(LeaveStatus::Approved),
        }).await?;

        if let Some(clash) = approved
            .iter()
            .filter(|l| Some(l.id) != exclude)
            .find(|l| l.scope.overlaps(scope))
        {
            return Err(ScheduleError::Conflict(format!(
                "Overlaps approved leave request {}", clash.id
            )));
        }
        Ok(())
    }

    async fn load(&self, leave_id: i64) -> Result<LeaveRequest, ScheduleError> {
        self.store
            .get_leave(leave_id)
            .await?
            .ok_or_else(|| ScheduleError::NotFound(format!("Leave request {}", leave_id)))
    }

    fn notify(&self, event: &str, leave: &LeaveRequest, message: &str) {
        dispatch_detached(
            self.notifier.clone(),
            Notification::new(event, leave.id, vec![leave.doctor_id], message),
        );
    }
}

fn require_admin(actor: &ActorContext) -> Result<(), ScheduleError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ScheduleError::Unauthorized("Only admins can decide leave requests".to_string()))
    }
}

fn ensure_owner_or_admin(actor: &ActorContext, doctor_id: i64) -> Result<(), ScheduleError> {
    if actor.is_admin() || actor.is_doctor(doctor_id) {
        Ok(())
    } else {
        Err(ScheduleError::Unauthorized("Not allowed to access this doctor's leave".to_string()))
    }
}
