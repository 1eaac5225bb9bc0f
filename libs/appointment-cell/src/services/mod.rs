pub mod booking;
pub mod expiry;
pub mod lifecycle;
pub mod pricing;
pub mod refund;

pub use booking::BookingService;
pub use expiry::ExpirySweeper;
pub use lifecycle::AppointmentLifecycleService;
pub use pricing::PricingService;
pub use refund::{LoggingRefundProcessor, RefundProcessor};
