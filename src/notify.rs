use anyhow::{Context, Result};
use log::info;
use notify_rust::{Notification, Timeout, Urgency};

/// Visual surface for a fired reminder. `present` must return quickly;
/// the alarm keeps ringing regardless of what happens here.
pub trait NotificationPresenter: Send + Sync {
    fn present(&self, task_id: &str) -> Result<()>;
}

/// Desktop notification naming the due task, marked critical so it stays
/// on screen until the user deals with it.
pub struct DesktopPresenter;

impl NotificationPresenter for DesktopPresenter {
    fn present(&self, task_id: &str) -> Result<()> {
        Notification::new()
            .summary("Task due")
            .body(&format!(
                "{} is due. Press Enter in the taskchime terminal to stop the alarm.",
                task_id
            ))
            .appname("taskchime")
            .icon("alarm-clock")
            .urgency(Urgency::Critical)
            .timeout(Timeout::Never)
            .show()
            .with_context(|| format!("failed to show notification for {}", task_id))?;

        info!("notification shown for {}", task_id);
        Ok(())
    }
}
