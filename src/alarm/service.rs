use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::{
    runtime::Handle,
    time::{sleep_until, Instant},
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::registration::AlarmRegistration;
use super::store::RegistrationStore;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Where a fired alarm goes. Implemented by the delivery layer; kept as a
/// trait so scheduling can be exercised without audio or notifications.
pub trait TriggerHandler: Send + Sync {
    fn on_alarm(&self, task_id: &str);
}

/// Registration surface of the alarm backend. The scheduler is written
/// against this trait so tests can substitute a backend that refuses
/// exact scheduling.
pub trait AlarmService: Send + Sync {
    /// Whether the backend is currently allowed to arm exact-time alarms.
    fn can_schedule_exact(&self) -> bool;

    fn register(&self, registration: AlarmRegistration) -> Result<()>;

    /// Discard the pending registration for `task_id`, if any. Cancelling
    /// an unknown task is a no-op.
    fn cancel(&self, task_id: &str) -> Result<()>;

    fn pending(&self, task_id: &str) -> Option<AlarmRegistration>;
}

struct PendingAlarm {
    registration: AlarmRegistration,
    cancel: CancellationToken,
}

struct ServiceState {
    pending: Mutex<HashMap<String, PendingAlarm>>,
    handler: Arc<dyn TriggerHandler>,
    store: Option<RegistrationStore>,
}

impl ServiceState {
    /// Take the pending entry for `task_id` if `token` still owns it. A
    /// wake-up whose token no longer matches was replaced or cancelled
    /// after it went to sleep and must not deliver.
    fn claim(&self, task_id: &str, token: Uuid) -> Option<AlarmRegistration> {
        let mut pending = lock(&self.pending);
        let claimed = match pending.get(task_id) {
            Some(entry) if entry.registration.delivery_token == token => {
                pending.remove(task_id).map(|entry| entry.registration)
            }
            _ => None,
        };

        if claimed.is_some() {
            self.persist(&pending);
        }
        claimed
    }

    fn persist(&self, pending: &HashMap<String, PendingAlarm>) {
        let Some(store) = &self.store else {
            return;
        };

        let mut registrations: Vec<AlarmRegistration> = pending
            .values()
            .map(|entry| entry.registration.clone())
            .collect();
        registrations.sort_by(|a, b| a.task_id.cmp(&b.task_id));

        if let Err(err) = store.save(&registrations) {
            log_error!("failed to persist registrations: {err:?}");
        }
    }
}

/// Alarm backend on the tokio timer wheel. Each armed registration gets
/// one wake-up task; replacing or cancelling a registration cancels its
/// token, and a wake-up that still fires only delivers if its delivery
/// token matches the map entry at that moment.
pub struct TokioAlarmService {
    inner: Arc<ServiceState>,
    runtime: Handle,
}

impl TokioAlarmService {
    pub fn new(handler: Arc<dyn TriggerHandler>) -> Result<Self> {
        Self::with_store(handler, None)
    }

    /// Build a service that mirrors its registrations into `store` and
    /// re-arms whatever a previous process left there. Registrations
    /// already past due fire immediately.
    pub fn with_store(
        handler: Arc<dyn TriggerHandler>,
        store: Option<RegistrationStore>,
    ) -> Result<Self> {
        let runtime = Handle::try_current()
            .context("TokioAlarmService must be created inside a tokio runtime")?;

        let service = Self {
            inner: Arc::new(ServiceState {
                pending: Mutex::new(HashMap::new()),
                handler,
                store,
            }),
            runtime,
        };
        service.restore()?;
        Ok(service)
    }

    /// Cancel every in-flight wake-up without touching the persisted
    /// registrations. A service built over the same store re-arms them.
    pub fn shutdown(&self) {
        let pending = lock(&self.inner.pending);
        for entry in pending.values() {
            entry.cancel.cancel();
        }
    }

    fn restore(&self) -> Result<()> {
        let Some(store) = &self.inner.store else {
            return Ok(());
        };

        let saved = store.load()?;
        if saved.is_empty() {
            return Ok(());
        }

        log_info!("re-arming {} persisted registration(s)", saved.len());
        for registration in saved {
            self.arm(registration);
        }
        Ok(())
    }

    fn arm(&self, registration: AlarmRegistration) {
        let task_id = registration.task_id.clone();
        let token = registration.delivery_token;
        let cancel = CancellationToken::new();

        {
            let mut pending = lock(&self.inner.pending);
            if let Some(previous) = pending.insert(
                task_id.clone(),
                PendingAlarm {
                    registration: registration.clone(),
                    cancel: cancel.clone(),
                },
            ) {
                previous.cancel.cancel();
                log_info!("replaced pending registration for {}", task_id);
            }
            self.inner.persist(&pending);
        }

        let now = Utc::now();
        if registration.is_due(now) {
            log_warn!(
                "registration for {} was due {}; firing immediately",
                task_id,
                registration.due_instant
            );
        }
        let wait = (registration.due_instant - now)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let deadline = Instant::now() + wait;

        let inner = Arc::clone(&self.inner);
        self.runtime.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log_debug!("wake-up for {} cancelled", task_id);
                }
                _ = sleep_until(deadline) => {
                    if let Some(registration) = inner.claim(&task_id, token) {
                        log_info!("alarm fired for {} (due {})", task_id, registration.due_instant);
                        inner.handler.on_alarm(&task_id);
                    } else {
                        log_debug!("wake-up for {} superseded; skipping delivery", task_id);
                    }
                }
            }
        });
    }
}

impl AlarmService for TokioAlarmService {
    // The tokio backend can always arm exact wake-ups.
    fn can_schedule_exact(&self) -> bool {
        true
    }

    fn register(&self, registration: AlarmRegistration) -> Result<()> {
        self.arm(registration);
        Ok(())
    }

    fn cancel(&self, task_id: &str) -> Result<()> {
        let mut pending = lock(&self.inner.pending);
        if let Some(entry) = pending.remove(task_id) {
            entry.cancel.cancel();
            self.inner.persist(&pending);
            log_info!("cancelled registration for {}", task_id);
        }
        Ok(())
    }

    fn pending(&self, task_id: &str) -> Option<AlarmRegistration> {
        lock(&self.inner.pending)
            .get(task_id)
            .map(|entry| entry.registration.clone())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration};
    use tokio::time::sleep;

    #[derive(Default)]
    struct CountingHandler {
        fired: Mutex<Vec<String>>,
    }

    impl CountingHandler {
        fn fired(&self) -> Vec<String> {
            lock(&self.fired).clone()
        }
    }

    impl TriggerHandler for CountingHandler {
        fn on_alarm(&self, task_id: &str) {
            lock(&self.fired).push(task_id.to_string());
        }
    }

    fn due_in(secs: i64) -> DateTime<Utc> {
        Utc::now() + ChronoDuration::seconds(secs)
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_at_the_due_instant() {
        let handler = Arc::new(CountingHandler::default());
        let service = TokioAlarmService::new(handler.clone()).unwrap();

        service
            .register(AlarmRegistration::new("water-plants", due_in(5)))
            .unwrap();
        assert!(service.pending("water-plants").is_some());

        sleep(Duration::from_secs(4)).await;
        assert!(handler.fired().is_empty());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(handler.fired(), vec!["water-plants".to_string()]);
        assert!(service.pending("water-plants").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn past_due_registration_fires_immediately() {
        let handler = Arc::new(CountingHandler::default());
        let service = TokioAlarmService::new(handler.clone()).unwrap();

        service
            .register(AlarmRegistration::new("water-plants", due_in(-30)))
            .unwrap();

        sleep(Duration::from_millis(1)).await;
        assert_eq!(handler.fired(), vec!["water-plants".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn due_instant_of_now_fires_immediately() {
        let handler = Arc::new(CountingHandler::default());
        let service = TokioAlarmService::new(handler.clone()).unwrap();

        service
            .register(AlarmRegistration::new("water-plants", Utc::now()))
            .unwrap();

        sleep(Duration::from_millis(1)).await;
        assert_eq!(handler.fired(), vec!["water-plants".to_string()]);
        assert!(service.pending("water-plants").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_later_replaces_the_earlier_wake_up() {
        let handler = Arc::new(CountingHandler::default());
        let service = TokioAlarmService::new(handler.clone()).unwrap();

        service
            .register(AlarmRegistration::new("water-plants", due_in(5)))
            .unwrap();
        service
            .register(AlarmRegistration::new("water-plants", due_in(60)))
            .unwrap();

        sleep(Duration::from_secs(10)).await;
        assert!(handler.fired().is_empty());

        sleep(Duration::from_secs(55)).await;
        assert_eq!(handler.fired(), vec!["water-plants".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_earlier_moves_the_wake_up_forward() {
        let handler = Arc::new(CountingHandler::default());
        let service = TokioAlarmService::new(handler.clone()).unwrap();

        service
            .register(AlarmRegistration::new("water-plants", due_in(60)))
            .unwrap();
        service
            .register(AlarmRegistration::new("water-plants", due_in(5)))
            .unwrap();

        sleep(Duration::from_secs(6)).await;
        assert_eq!(handler.fired(), vec!["water-plants".to_string()]);

        // The original wake-up must not deliver a second time.
        sleep(Duration::from_secs(60)).await;
        assert_eq!(handler.fired().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_the_pending_wake_up() {
        let handler = Arc::new(CountingHandler::default());
        let service = TokioAlarmService::new(handler.clone()).unwrap();

        service
            .register(AlarmRegistration::new("water-plants", due_in(5)))
            .unwrap();
        service.cancel("water-plants").unwrap();
        assert!(service.pending("water-plants").is_none());

        // Cancelling again, or cancelling an unknown task, stays quiet.
        service.cancel("water-plants").unwrap();
        service.cancel("never-registered").unwrap();

        sleep(Duration::from_secs(10)).await;
        assert!(handler.fired().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn persisted_registrations_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registrations.json");

        let first_handler = Arc::new(CountingHandler::default());
        let service = TokioAlarmService::with_store(
            first_handler.clone(),
            Some(RegistrationStore::new(path.clone())),
        )
        .unwrap();
        service
            .register(AlarmRegistration::new("water-plants", due_in(300)))
            .unwrap();
        service.shutdown();

        let second_handler = Arc::new(CountingHandler::default());
        let revived = TokioAlarmService::with_store(
            second_handler.clone(),
            Some(RegistrationStore::new(path)),
        )
        .unwrap();
        assert!(revived.pending("water-plants").is_some());

        sleep(Duration::from_secs(301)).await;
        assert!(first_handler.fired().is_empty());
        assert_eq!(second_handler.fired(), vec!["water-plants".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn delivery_clears_the_persisted_registration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registrations.json");

        let handler = Arc::new(CountingHandler::default());
        let service = TokioAlarmService::with_store(
            handler.clone(),
            Some(RegistrationStore::new(path.clone())),
        )
        .unwrap();
        service
            .register(AlarmRegistration::new("water-plants", due_in(5)))
            .unwrap();

        sleep(Duration::from_secs(6)).await;
        assert_eq!(handler.fired().len(), 1);
        assert!(RegistrationStore::new(path).load().unwrap().is_empty());
    }
}
