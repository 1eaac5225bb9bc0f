pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

use std::sync::Arc;

pub use models::*;
pub use services::{BookingService, ExpirySweeper, LoggingRefundProcessor, RefundProcessor};
pub use store::{AppointmentStore, StoreOccupancy};

/// Services behind the appointment router.
#[derive(Clone)]
pub struct AppointmentState {
    pub bookings: Arc<BookingService>,
}
