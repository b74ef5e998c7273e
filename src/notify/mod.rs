//! Daily sweep reminders: classification, delivery, and scheduling.

pub mod dispatcher;
pub mod scheduler;
pub mod transport;

pub use dispatcher::{classify, NotificationDispatcher, Reminder, RunSummary, UPCOMING_PER_DAY};
pub use scheduler::DailySchedule;
pub use transport::{DeliveryError, Transport};
