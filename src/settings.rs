use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock, time::Duration};

use crate::timer::DEFAULT_FOCUS_DURATION;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FocusSettings {
    pub duration_secs: u64,
}

impl FocusSettings {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

impl Default for FocusSettings {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_FOCUS_DURATION.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSettings {
    pub tone_hz: f32,
    pub volume: f32,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            tone_hz: 880.0,
            volume: 0.8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserSettings {
    focus: FocusSettings,
    alert: AlertSettings,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            focus: FocusSettings::default(),
            alert: AlertSettings::default(),
        }
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn focus(&self) -> FocusSettings {
        self.data.read().unwrap().focus.clone()
    }

    pub fn alert(&self) -> AlertSettings {
        self.data.read().unwrap().alert.clone()
    }

    pub fn update_focus(&self, settings: FocusSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.focus = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    pub fn update_alert(&self, settings: AlertSettings) -> Result<()> {
        {
            let mut guard = self.data.write().unwrap();
            guard.alert = settings;
            self.persist(&guard)?;
        }
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
