use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};
use tracing::{info, warn};

use appointment_cell::router::appointment_routes;
use appointment_cell::store::{AppointmentStore, MemoryAppointmentStore, StoreOccupancy, SupabaseAppointmentStore};
use appointment_cell::{AppointmentState, BookingService, ExpirySweeper, LoggingRefundProcessor};
use payment_cell::router::payment_routes;
use payment_cell::{PaymentGatewayService, PaymentState};
use schedule_cell::router::{leave_routes, schedule_routes};
use schedule_cell::store::{
    DoctorDirectory, LeaveStore, MemoryDoctorDirectory, MemoryLeaveStore, MemoryWorkShiftStore,
    SupabaseDoctorDirectory, SupabaseLeaveStore, SupabaseWorkShiftStore, WorkShiftStore,
};
use schedule_cell::{LeaveBalanceLedger, LeaveService, ScheduleResolver, ScheduleState, SlotCalculator, WorkShiftService};
use shared_config::{AppConfig, StorageBackend};
use shared_database::supabase::SupabaseClient;
use shared_utils::clock::{Clock, SystemClock};
use shared_utils::notification::{NotificationDispatcher, TracingNotifier};

struct Stores {
    shifts: Arc<dyn WorkShiftStore>,
    leaves: Arc<dyn LeaveStore>,
    doctors: Arc<dyn DoctorDirectory>,
    appointments: Arc<dyn AppointmentStore>,
}

impl Stores {
    fn for_backend(config: &AppConfig) -> Self {
        match config.storage_backend {
            StorageBackend::Supabase => {
                let supabase = Arc::new(SupabaseClient::new(config));
                Self {
                    shifts: Arc::new(SupabaseWorkShiftStore::new(supabase.clone())),
                    leaves: Arc::new(SupabaseLeaveStore::new(supabase.clone())),
                    doctors: Arc::new(SupabaseDoctorDirectory::new(supabase.clone())),
                    appointments: Arc::new(SupabaseAppointmentStore::new(supabase)),
                }
            }
            StorageBackend::Memory => Self {
                shifts: Arc::new(MemoryWorkShiftStore::new()),
                leaves: Arc::new(MemoryLeaveStore::new()),
                doctors: Arc::new(memory_directory(config)),
                appointments: Arc::new(MemoryAppointmentStore::new()),
            },
        }
    }
}

fn memory_directory(config: &AppConfig) -> MemoryDoctorDirectory {
    let Some(raw) = config.memory_doctors.as_deref() else {
        warn!("MEMORY_DOCTORS not set, the doctor directory is empty and every booking will be rejected");
        return MemoryDoctorDirectory::new();
    };
    match MemoryDoctorDirectory::from_json(raw) {
        Ok(directory) => directory,
        Err(e) => {
            warn!("MEMORY_DOCTORS is not a valid doctor list ({}), the doctor directory is empty", e);
            MemoryDoctorDirectory::new()
        }
    }
}

/// Every cell's state, wired against one storage backend.
pub struct AppServices {
    pub schedule: Arc<ScheduleState>,
    pub appointments: Arc<AppointmentState>,
    pub payments: Arc<PaymentState>,
    pub sweeper: Arc<ExpirySweeper>,
}

impl AppServices {
    pub fn build(config: &AppConfig) -> Self {
        info!("Using {:?} storage backend", config.storage_backend);
        let stores = Stores::for_backend(config);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.scheduling.clinic_utc_offset_minutes));
        let notifier: Arc<dyn NotificationDispatcher> = Arc::new(TracingNotifier);
        let refunds = Arc::new(LoggingRefundProcessor);

        let resolver = Arc::new(ScheduleResolver::new(stores.shifts.clone(), stores.leaves.clone()));
        let slots = Arc::new(SlotCalculator::new(
            resolver.clone(),
            stores.doctors.clone(),
            Arc::new(StoreOccupancy::new(stores.appointments.clone())),
            clock.clone(),
            config.scheduling.clone(),
        ));
        let ledger = Arc::new(LeaveBalanceLedger::new(
            stores.leaves.clone(),
            config.leave_policy.clone(),
            clock.clone(),
        ));

        let schedule = Arc::new(ScheduleState {
            shifts: Arc::new(WorkShiftService::new(stores.shifts.clone(), clock.clone())),
            resolver,
            slots: slots.clone(),
            leaves: Arc::new(LeaveService::new(stores.leaves.clone(), ledger, clock.clone(), notifier.clone())),
        });

        let bookings = Arc::new(BookingService::new(
            stores.appointments.clone(),
            slots,
            refunds.clone(),
            clock.clone(),
            notifier.clone(),
            config.scheduling.clone(),
        ));
        let sweeper = Arc::new(ExpirySweeper::new(
            stores.appointments.clone(),
            refunds,
            clock.clone(),
            notifier.clone(),
            &config.scheduling,
        ));
        let gateway = Arc::new(PaymentGatewayService::new(
            stores.appointments,
            clock,
            notifier,
            config.payment.clone(),
        ));

        Self {
            schedule,
            appointments: Arc::new(AppointmentState { bookings }),
            payments: Arc::new(PaymentState { gateway }),
            sweeper,
        }
    }
}

pub fn create_router(config: Arc<AppConfig>, services: &AppServices) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking API is running!" }))
        .nest("/schedule", schedule_routes(services.schedule.clone(), config.clone()))
        .nest("/leaves", leave_routes(services.schedule.clone(), config.clone()))
        .nest("/appointments", appointment_routes(services.appointments.clone(), config.clone()))
        .nest("/payments", payment_routes(services.payments.clone(), config))
}
