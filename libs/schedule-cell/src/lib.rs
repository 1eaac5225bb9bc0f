pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

use std::sync::Arc;

pub use models::*;
pub use services::{LeaveBalanceLedger, LeaveService, ScheduleResolver, SlotCalculator, WorkShiftService};

/// Services shared by the schedule and leave routers.
#[derive(Clone)]
pub struct ScheduleState {
    pub shifts: Arc<WorkShiftService>,
    pub resolver: Arc<ScheduleResolver>,
    pub slots: Arc<SlotCalculator>,
    pub leaves: Arc<LeaveService>,
}
