pub mod meals;
pub mod push_contracts;

pub use meals::{normalize_meal_slot, Day, DayMeals, MealsSnapshot, WeekSchedule};
pub use push_contracts::{DeviceHandle, DispatchReport, PushMessage};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid target: subject '{subject}' has no day '{day}'")]
    InvalidTarget { subject: String, day: String },
    #[error("device handle must not be empty")]
    InvalidHandle,
    #[error("no registered recipients besides the sender")]
    NoRecipients,
}
