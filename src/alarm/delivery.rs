use std::sync::Arc;

use log::{error, info};

use crate::alert::AlertController;
use crate::notify::NotificationPresenter;

use super::service::TriggerHandler;

/// Connects fired alarms to the user-facing surfaces. Runs on whatever
/// context the alarm backend fires from, so it must stay quick and must
/// not assume any earlier in-process state.
pub struct DeliveryHandler {
    alerts: Arc<AlertController>,
    presenter: Arc<dyn NotificationPresenter>,
}

impl DeliveryHandler {
    pub fn new(alerts: Arc<AlertController>, presenter: Arc<dyn NotificationPresenter>) -> Self {
        Self { alerts, presenter }
    }
}

impl TriggerHandler for DeliveryHandler {
    fn on_alarm(&self, task_id: &str) {
        info!("delivering reminder for {}", task_id);

        // Sound first; a playback failure is logged inside the controller
        // and must not block the visual path.
        self.alerts.start(task_id);

        if let Err(err) = self.presenter.present(task_id) {
            error!("could not present notification for {}: {err:?}", task_id);
        }
    }
}
