//! Exact-time task reminders that ring until acknowledged, plus a focus
//! countdown timer.
//!
//! The alarm side arms one wake-up per task through an [`AlarmService`],
//! delivers through sound ([`AlertController`]) and a desktop
//! notification ([`NotificationPresenter`]), and only goes quiet on an
//! explicit acknowledgment. The timer side is an independent one-second
//! countdown ([`CountdownController`]) with watchable ticks.

pub mod alarm;
pub mod alert;
pub mod engine;
pub mod notify;
pub mod settings;
pub mod timer;
mod utils;

pub use alarm::{
    AlarmRegistration, AlarmService, DeliveryHandler, RegistrationStore, ReminderScheduler,
    ScheduleOutcome, TokioAlarmService, TriggerHandler,
};
pub use alert::{AlertController, AlertSink, RingtoneSink};
pub use engine::ReminderEngine;
pub use notify::{DesktopPresenter, NotificationPresenter};
pub use settings::{AlertSettings, FocusSettings, SettingsStore};
pub use timer::{
    format_mmss, CountdownController, CountdownPhase, CountdownSnapshot, CountdownState,
    DEFAULT_FOCUS_DURATION,
};
