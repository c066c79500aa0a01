pub mod delivery;
pub mod registration;
pub mod scheduler;
pub mod service;
pub mod store;

pub use delivery::DeliveryHandler;
pub use registration::AlarmRegistration;
pub use scheduler::{ReminderScheduler, ScheduleOutcome};
pub use service::{AlarmService, TokioAlarmService, TriggerHandler};
pub use store::RegistrationStore;
