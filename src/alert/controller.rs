use std::sync::{Arc, Mutex};

use anyhow::Result;
use log::{debug, error, info};

/// Something that can produce and silence the audible alarm.
pub trait AlertSink: Send + Sync {
    fn start(&self) -> Result<()>;
    fn stop(&self);
}

/// Owns the single ringing slot. At most one alert session is active at a
/// time; a trigger that lands while ringing is absorbed without restarting
/// playback, and only an explicit acknowledgment releases the slot.
pub struct AlertController {
    session: Mutex<Option<String>>,
    sink: Arc<dyn AlertSink>,
}

impl AlertController {
    pub fn new(sink: Arc<dyn AlertSink>) -> Self {
        Self {
            session: Mutex::new(None),
            sink,
        }
    }

    /// Begin ringing for `task_id`. No-op when an alert is already active,
    /// regardless of which task started it.
    pub(crate) fn start(&self, task_id: &str) {
        let mut session = match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(active) = session.as_deref() {
            debug!("alert already ringing for {}; ignoring trigger for {}", active, task_id);
            return;
        }

        *session = Some(task_id.to_string());
        if let Err(err) = self.sink.start() {
            // The session stays active: the visual path still needs an
            // acknowledgment even when audio is unavailable.
            error!("alarm playback failed for {}: {err:?}", task_id);
        } else {
            info!("alarm ringing for {}", task_id);
        }
    }

    /// Silence the alarm and release the slot, returning the task it was
    /// ringing for. Safe to call when idle.
    pub(crate) fn stop(&self) -> Option<String> {
        let mut session = match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        self.sink.stop();
        session.take()
    }

    pub fn is_ringing(&self) -> bool {
        self.ringing_task().is_some()
    }

    pub fn ringing_task(&self) -> Option<String> {
        let session = match self.session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        session.clone()
    }
}
