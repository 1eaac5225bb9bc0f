use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Supabase,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub storage_backend: StorageBackend,
    /// JSON array of doctor profiles loaded into the in-memory directory.
    pub memory_doctors: Option<String>,
    pub scheduling: SchedulingConfig,
    pub leave_policy: LeavePolicyConfig,
    pub payment: PaymentGatewayConfig,
}

/// Booking rules shared by the slot calculator, the lifecycle manager and the expiry sweep.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub default_slot_minutes: u32,
    pub max_advance_booking_days: i64,
    pub min_cancellation_notice_hours: i64,
    pub min_rejection_reason_length: usize,
    pub payment_window_minutes: i64,
    /// Clinic wall-clock offset from UTC; appointment dates and times are local.
    pub clinic_utc_offset_minutes: i32,
    pub expiry_sweep_interval_seconds: u64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            default_slot_minutes: 30,
            max_advance_booking_days: 30,
            min_cancellation_notice_hours: 24,
            min_rejection_reason_length: 10,
            payment_window_minutes: 30,
            clinic_utc_offset_minutes: 7 * 60,
            expiry_sweep_interval_seconds: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LeavePolicyConfig {
    pub annual_allowance_days: f64,
    pub whole_day_units: f64,
    pub shift_fraction: f64,
}

impl Default for LeavePolicyConfig {
    fn default() -> Self {
        Self {
            annual_allowance_days: 12.0,
            whole_day_units: 1.0,
            shift_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentGatewayConfig {
    pub tmn_code: String,
    pub hash_secret: String,
    pub pay_url: String,
    pub return_url: String,
    pub version: String,
    pub locale: String,
    pub currency: String,
    pub order_type: String,
    pub expire_minutes: i64,
}

impl Default for PaymentGatewayConfig {
    fn default() -> Self {
        Self {
            tmn_code: String::new(),
            hash_secret: String::new(),
            pay_url: "https://sandbox.vnpayment.vn/paymentv2/vpcpay.html".to_string(),
            return_url: "http://localhost:3000/payments/return".to_string(),
            version: "2.1.0".to_string(),
            locale: "vn".to_string(),
            currency: "VND".to_string(),
            order_type: "other".to_string(),
            expire_minutes: 15,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_jwt_secret: String::new(),
            storage_backend: StorageBackend::Memory,
            memory_doctors: None,
            scheduling: SchedulingConfig::default(),
            leave_policy: LeavePolicyConfig::default(),
            payment: PaymentGatewayConfig::default(),
        }
    }
}

fn env_or_empty(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_slot_minutes: env_parse("SLOT_MINUTES", defaults.default_slot_minutes),
            max_advance_booking_days: env_parse("MAX_ADVANCE_BOOKING_DAYS", defaults.max_advance_booking_days),
            min_cancellation_notice_hours: env_parse("MIN_CANCELLATION_NOTICE_HOURS", defaults.min_cancellation_notice_hours),
            min_rejection_reason_length: env_parse("MIN_REJECTION_REASON_LENGTH", defaults.min_rejection_reason_length),
            payment_window_minutes: env_parse("PAYMENT_WINDOW_MINUTES", defaults.payment_window_minutes),
            clinic_utc_offset_minutes: env_parse("CLINIC_UTC_OFFSET_MINUTES", defaults.clinic_utc_offset_minutes),
            expiry_sweep_interval_seconds: env_parse("EXPIRY_SWEEP_INTERVAL_SECONDS", defaults.expiry_sweep_interval_seconds),
        }
    }
}

impl LeavePolicyConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            annual_allowance_days: env_parse("ANNUAL_LEAVE_DAYS", defaults.annual_allowance_days),
            whole_day_units: env_parse("LEAVE_WHOLE_DAY_UNITS", defaults.whole_day_units),
            shift_fraction: env_parse("LEAVE_SHIFT_FRACTION", defaults.shift_fraction),
        }
    }
}

impl PaymentGatewayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tmn_code: env_or_empty("PAYMENT_TMN_CODE"),
            hash_secret: env_or_empty("PAYMENT_HASH_SECRET"),
            pay_url: env_or_default("PAYMENT_PAY_URL", &defaults.pay_url),
            return_url: env_or_default("PAYMENT_RETURN_URL", &defaults.return_url),
            version: env_or_default("PAYMENT_VERSION", &defaults.version),
            locale: env_or_default("PAYMENT_LOCALE", &defaults.locale),
            currency: env_or_default("PAYMENT_CURRENCY", &defaults.currency),
            order_type: env_or_default("PAYMENT_ORDER_TYPE", &defaults.order_type),
            expire_minutes: env_parse("PAYMENT_EXPIRE_MINUTES", defaults.expire_minutes),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.tmn_code.is_empty() && !self.hash_secret.is_empty()
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let storage_backend = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            Ok("supabase") => StorageBackend::Supabase,
            Ok(other) => {
                warn!("Unknown STORAGE_BACKEND '{}', using supabase", other);
                StorageBackend::Supabase
            }
            Err(_) => StorageBackend::Supabase,
        };

        let config = Self {
            supabase_url: env_or_empty("SUPABASE_URL"),
            supabase_anon_key: env_or_empty("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_jwt_secret: env_or_empty("SUPABASE_JWT_SECRET"),
            storage_backend,
            memory_doctors: env::var("MEMORY_DOCTORS").ok(),
            scheduling: SchedulingConfig::from_env(),
            leave_policy: LeavePolicyConfig::from_env(),
            payment: PaymentGatewayConfig::from_env(),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }
        if !config.payment.is_configured() {
            warn!("Payment gateway not configured - online payments will be rejected");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        let database_ready = match self.storage_backend {
            StorageBackend::Memory => true,
            StorageBackend::Supabase => {
                !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
            }
        };
        database_ready && !self.supabase_jwt_secret.is_empty()
    }
}
