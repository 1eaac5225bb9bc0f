use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde_json::json;
use tracing::{error, info, instrument, warn};

use appointment_cell::models::{
    Appointment, AppointmentStatus, LifecycleAction, PaymentMethod, PaymentStatus, StateGuard,
};
use appointment_cell::services::AppointmentLifecycleService;
use appointment_cell::store::AppointmentStore;
use shared_config::PaymentGatewayConfig;
use shared_models::auth::ActorContext;
use shared_utils::clock::Clock;
use shared_utils::notification::{dispatch_detached, Notification, NotificationDispatcher};

use crate::models::{CallbackAck, PaymentError, PaymentUrlResponse, ReturnOutcome};
use crate::services::signature::{canonical_query, sign, verify};

const PROVIDER_DATE_FORMAT: &str = "%Y%m%d%H%M%S";
const PROVIDER_SUCCESS: &str = "00";

fn provider_date(local: NaiveDateTime) -> String {
    local.format(PROVIDER_DATE_FORMAT).to_string()
}

/// Provider success needs both the response code and, when sent, the transaction status.
pub fn is_provider_success(params: &HashMap<String, String>) -> bool {
    let response_ok = params.get("vnp_ResponseCode").map(String::as_str) == Some(PROVIDER_SUCCESS);
    let status_ok = params
        .get("vnp_TransactionStatus")
        .map_or(true, |status| status == PROVIDER_SUCCESS);
    response_ok && status_ok
}

/// Signed redirect URLs out, signed return and webhook legs in.
pub struct PaymentGatewayService {
    store: Arc<dyn AppointmentStore>,
    lifecycle: AppointmentLifecycleService,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn NotificationDispatcher>,
    config: PaymentGatewayConfig,
}

impl PaymentGatewayService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn NotificationDispatcher>,
        config: PaymentGatewayConfig,
    ) -> Self {
        Self {
            store,
            lifecycle: AppointmentLifecycleService::new(),
            clock,
            notifier,
            config,
        }
    }

    #[instrument(skip(self, client_ip), fields(actor_id = actor.actor_id))]
    pub async fn build_payment_url(
        &self,
        actor: &ActorContext,
        appointment_id: i64,
        client_ip: &str,
    ) -> Result<PaymentUrlResponse, PaymentError> {
        if !self.config.is_configured() {
            return Err(PaymentError::NotConfigured);
        }

        let current = self
            .store
            .get(appointment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("Appointment {}", appointment_id)))?;
        if !actor.is_patient(current.patient_id) {
            return Err(PaymentError::Unauthorized("Only the booking patient can pay for it".to_string()));
        }
        if current.payment_method != PaymentMethod::Gateway {
            return Err(PaymentError::Validation(format!(
                "Appointment {} is not paid online", appointment_id
            )));
        }
        if matches!(current.payment_status, PaymentStatus::Paid | PaymentStatus::Refunded) {
            return Err(PaymentError::Conflict("Appointment is already paid".to_string()));
        }
        if current.status != AppointmentStatus::PendingPayment {
            return Err(PaymentError::Conflict(format!(
                "Appointment is {} and no longer awaiting payment", current.status
            )));
        }

        let now = self.clock.now();
        let local_now = self.clock.local_now();
        let transaction_ref = match (&current.transaction_ref, current.payment_status) {
            (Some(existing), PaymentStatus::Unpaid | PaymentStatus::Processing) => existing.clone(),
            _ => format!("{}{}", current.confirmation_code, local_now.format("%y%m%d%H%M%S")),
        };

        let guard = StateGuard::of(&current);
        let updated = Appointment {
            payment_status: PaymentStatus::Processing,
            transaction_ref: Some(transaction_ref.clone()),
            updated_at: now,
            ..current
        };
        let saved = self
            .store
            .update_if(updated, guard)
            .await?
            .ok_or_else(|| PaymentError::Conflict("Appointment changed while preparing payment".to_string()))?;

        let expires_local = local_now + Duration::minutes(self.config.expire_minutes);
        let amount = saved.amount_minor();
        let params: BTreeMap<String, String> = [
            ("vnp_Version", self.config.version.clone()),
            ("vnp_Command", "pay".to_string()),
            ("vnp_TmnCode", self.config.tmn_code.clone()),
            ("vnp_Amount", amount.to_string()),
            ("vnp_CurrCode", self.config.currency.clone()),
            ("vnp_TxnRef", transaction_ref.clone()),
            ("vnp_OrderInfo", format!("Payment for appointment {}", saved.confirmation_code)),
            ("vnp_OrderType", self.config.order_type.clone()),
            ("vnp_Locale", self.config.locale.clone()),
            ("vnp_ReturnUrl", self.config.return_url.clone()),
            ("vnp_IpAddr", client_ip.to_string()),
            ("vnp_CreateDate", provider_date(local_now)),
            ("vnp_ExpireDate", provider_date(expires_local)),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect();

        let query = canonical_query(&params);
        let signature = sign(&self.config.hash_secret, &query)?;
        let payment_url = format!("{}?{}&vnp_SecureHash={}", self.config.pay_url, query, signature);

        info!(appointment_id, transaction_ref = %transaction_ref, "Payment URL issued for {} minor units", amount);
        Ok(PaymentUrlResponse {
            appointment_id,
            transaction_ref,
            amount,
            payment_url,
            expires_at: now + Duration::minutes(self.config.expire_minutes),
        })
    }

    /// Browser return leg. Verifies and reports; never changes the booking.
    pub async fn handle_return(&self, params: &HashMap<String, String>) -> Result<ReturnOutcome, PaymentError> {
        if !verify(&self.config.hash_secret, params) {
            warn!("Payment return with invalid signature");
            return Err(PaymentError::InvalidSignature);
        }

        let transaction_ref = params.get("vnp_TxnRef").cloned().unwrap_or_default();
        let appointment_id = if transaction_ref.is_empty() {
            None
        } else {
            self.store.get_by_transaction_ref(&transaction_ref).await?.map(|a| a.id)
        };
        let success = is_provider_success(params);

        Ok(ReturnOutcome {
            transaction_ref,
            appointment_id,
            success,
            response_code: params.get("vnp_ResponseCode").cloned().unwrap_or_default(),
            message: if success {
                "Payment received, awaiting confirmation".to_string()
            } else {
                "Payment was not completed".to_string()
            },
        })
    }

    /// Provider webhook. Always answers with an acknowledgement; errors become ack codes.
    #[instrument(skip(self, params), fields(transaction_ref = params.get("vnp_TxnRef").map(String::as_str).unwrap_or("-")))]
    pub async fn handle_callback(&self, params: &HashMap<String, String>) -> CallbackAck {
        match self.reconcile(params).await {
            Ok(ack) => ack,
            Err(e) => {
                match &e {
                    PaymentError::Database(_) | PaymentError::Conflict(_) => error!("Payment callback failed: {}", e),
                    _ => warn!("Payment callback rejected: {}", e),
                }
                CallbackAck::from(&e)
            }
        }
    }

    async fn reconcile(&self, params: &HashMap<String, String>) -> Result<CallbackAck, PaymentError> {
        if !verify(&self.config.hash_secret, params) {
            return Err(PaymentError::InvalidSignature);
        }

        let transaction_ref = params
            .get("vnp_TxnRef")
            .filter(|r| !r.is_empty())
            .ok_or_else(|| PaymentError::NotFound("Transaction".to_string()))?;
        let current = self
            .store
            .get_by_transaction_ref(transaction_ref)
            .await?
            .ok_or_else(|| PaymentError::NotFound(format!("Transaction {}", transaction_ref)))?;

        let expected = current.amount_minor();
        let received = params.get("vnp_Amount").cloned().unwrap_or_default();
        if received.parse::<i64>().ok() != Some(expected) {
            return Err(PaymentError::AmountMismatch { expected, received });
        }

        if !matches!(current.payment_status, PaymentStatus::Unpaid | PaymentStatus::Processing) {
            info!(appointment_id = current.id, "Callback replay ignored, payment already {}", current.payment_status);
            return Ok(CallbackAck::already_processed());
        }

        let success = is_provider_success(params);
        let now = self.clock.now();
        let guard = StateGuard::of(&current);
        let mut updated = Appointment {
            raw_payment_payload: Some(json!(params)),
            updated_at: now,
            ..current
        };

        if success {
            updated.payment_status = PaymentStatus::Paid;
            updated.paid_at = Some(now);
            if updated.status == AppointmentStatus::PendingPayment {
                updated.status = self
                    .lifecycle
                    .transition(updated.status, LifecycleAction::PaymentSucceeded)?;
            } else {
                warn!(
                    appointment_id = updated.id,
                    "Payment received for a {} appointment, needs manual follow-up", updated.status
                );
            }
        } else {
            updated.payment_status = PaymentStatus::Failed;
            updated.payment_failed_at = Some(now);
        }

        let id = updated.id;
        let Some(saved) = self.store.update_if(updated, guard).await? else {
            // Lost to a concurrent delivery of the same callback
            let latest = self.store.get(id).await?;
            if latest.is_some_and(|a| !matches!(a.payment_status, PaymentStatus::Unpaid | PaymentStatus::Processing)) {
                return Ok(CallbackAck::already_processed());
            }
            return Err(PaymentError::Conflict(format!("Appointment {} changed during reconciliation", id)));
        };

        info!(appointment_id = saved.id, "Payment {} for {}", saved.payment_status, saved.confirmation_code);
        let (event, message) = if success {
            ("payment.succeeded", "Payment received")
        } else {
            ("payment.failed", "Payment failed")
        };
        dispatch_detached(
            self.notifier.clone(),
            Notification::new(event, saved.id, vec![saved.patient_id], message),
        );
        Ok(CallbackAck::success())
    }
}
