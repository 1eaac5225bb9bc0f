pub mod availability;
pub mod balance;
pub mod leave;
pub mod resolver;
pub mod shifts;

pub use availability::SlotCalculator;
pub use balance::LeaveBalanceLedger;
pub use leave::LeaveService;
pub use resolver::ScheduleResolver;
pub use shifts::WorkShiftService;
