use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One scheduled reminder. Re-registering the same task replaces the
/// previous registration wholesale; the delivery token is how a
/// superseded wake-up recognizes that it lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmRegistration {
    pub task_id: String,
    pub due_instant: DateTime<Utc>,
    pub delivery_token: Uuid,
}

impl AlarmRegistration {
    pub fn new(task_id: impl Into<String>, due_instant: DateTime<Utc>) -> Self {
        Self {
            task_id: task_id.into(),
            due_instant,
            delivery_token: Uuid::new_v4(),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_instant <= now
    }
}
