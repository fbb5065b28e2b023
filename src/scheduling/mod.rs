pub mod calendar;
pub mod grid;
pub mod occupancy;
pub mod planner;

pub use calendar::{DayHours, DayWindow, ShopCalendar};
pub use occupancy::OccupancyIndex;
pub use planner::{GRACE_MINUTES, SlotAvailability, SlotUnavailableReason, available_starts};
