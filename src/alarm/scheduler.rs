use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{info, warn};

use super::registration::AlarmRegistration;
use super::service::AlarmService;

/// What became of a schedule request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The reminder is armed and will fire at its due instant.
    Scheduled,
    /// The backend may not arm exact alarms. Nothing was registered and
    /// the caller must surface the missing permission to the user.
    PermissionRequired,
}

/// Front door for arming reminders. Checks the permission gate before
/// touching the backend, so a denied environment never half-registers.
pub struct ReminderScheduler {
    service: Arc<dyn AlarmService>,
}

impl ReminderScheduler {
    pub fn new(service: Arc<dyn AlarmService>) -> Self {
        Self { service }
    }

    /// Arm (or re-arm) the reminder for `task_id`. A due instant in the
    /// past is accepted and fires immediately.
    pub fn schedule(&self, task_id: &str, due_instant: DateTime<Utc>) -> Result<ScheduleOutcome> {
        if !self.service.can_schedule_exact() {
            warn!("exact alarm permission missing; not scheduling {}", task_id);
            return Ok(ScheduleOutcome::PermissionRequired);
        }

        let registration = AlarmRegistration::new(task_id, due_instant);
        info!("scheduling reminder for {} at {}", task_id, due_instant);
        self.service.register(registration)?;
        Ok(ScheduleOutcome::Scheduled)
    }

    pub fn cancel(&self, task_id: &str) -> Result<()> {
        self.service.cancel(task_id)
    }

    pub fn pending(&self, task_id: &str) -> Option<AlarmRegistration> {
        self.service.pending(task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubService {
        exact_allowed: bool,
        registered: Mutex<Vec<AlarmRegistration>>,
        cancelled: Mutex<Vec<String>>,
    }

    impl StubService {
        fn new(exact_allowed: bool) -> Self {
            Self {
                exact_allowed,
                registered: Mutex::new(Vec::new()),
                cancelled: Mutex::new(Vec::new()),
            }
        }
    }

    impl AlarmService for StubService {
        fn can_schedule_exact(&self) -> bool {
            self.exact_allowed
        }

        fn register(&self, registration: AlarmRegistration) -> Result<()> {
            self.registered.lock().unwrap().push(registration);
            Ok(())
        }

        fn cancel(&self, task_id: &str) -> Result<()> {
            self.cancelled.lock().unwrap().push(task_id.to_string());
            Ok(())
        }

        fn pending(&self, task_id: &str) -> Option<AlarmRegistration> {
            self.registered
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|registration| registration.task_id == task_id)
                .cloned()
        }
    }

    #[test]
    fn denied_permission_reports_without_registering() {
        let stub = Arc::new(StubService::new(false));
        let scheduler = ReminderScheduler::new(stub.clone());

        let outcome = scheduler.schedule("water-plants", Utc::now()).unwrap();

        assert_eq!(outcome, ScheduleOutcome::PermissionRequired);
        assert!(stub.registered.lock().unwrap().is_empty());
        assert!(scheduler.pending("water-plants").is_none());
    }

    #[test]
    fn granted_permission_registers_with_a_fresh_token() {
        let stub = Arc::new(StubService::new(true));
        let scheduler = ReminderScheduler::new(stub.clone());

        let due = Utc::now();
        assert_eq!(
            scheduler.schedule("water-plants", due).unwrap(),
            ScheduleOutcome::Scheduled
        );
        assert_eq!(
            scheduler.schedule("water-plants", due).unwrap(),
            ScheduleOutcome::Scheduled
        );

        let registered = stub.registered.lock().unwrap();
        assert_eq!(registered.len(), 2);
        assert_eq!(registered[0].task_id, "water-plants");
        assert_ne!(registered[0].delivery_token, registered[1].delivery_token);
    }

    #[test]
    fn cancel_passes_through_to_the_backend() {
        let stub = Arc::new(StubService::new(true));
        let scheduler = ReminderScheduler::new(stub.clone());

        scheduler.cancel("water-plants").unwrap();
        assert_eq!(
            *stub.cancelled.lock().unwrap(),
            vec!["water-plants".to_string()]
        );
    }
}
