use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, warn};

use crate::alarm::{AlarmService, ReminderScheduler, ScheduleOutcome};
use crate::alert::AlertController;

/// Ties scheduling and alerting together behind the three calls the rest
/// of the application makes: schedule, cancel, acknowledge.
pub struct ReminderEngine {
    scheduler: ReminderScheduler,
    alerts: Arc<AlertController>,
}

impl ReminderEngine {
    pub fn new(service: Arc<dyn AlarmService>, alerts: Arc<AlertController>) -> Self {
        Self {
            scheduler: ReminderScheduler::new(service),
            alerts,
        }
    }

    pub fn schedule_reminder(
        &self,
        task_id: &str,
        due_instant: DateTime<Utc>,
    ) -> Result<ScheduleOutcome> {
        self.scheduler.schedule(task_id, due_instant)
    }

    pub fn cancel_reminder(&self, task_id: &str) -> Result<()> {
        self.scheduler.cancel(task_id)
    }

    /// Stop the ringing alarm, reporting whether one was active. The slot
    /// holds at most one alert, so an acknowledgment silences whatever is
    /// ringing even when the ids disagree.
    pub fn acknowledge_alert(&self, task_id: &str) -> bool {
        match self.alerts.stop() {
            Some(ringing) => {
                if ringing != task_id {
                    warn!(
                        "acknowledged {} while {} was ringing; silenced anyway",
                        task_id, ringing
                    );
                }
                true
            }
            None => {
                debug!("acknowledged {} with no active alert", task_id);
                false
            }
        }
    }

    pub fn alerts(&self) -> &AlertController {
        &self.alerts
    }
}
