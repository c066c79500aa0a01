use std::{fs, path::PathBuf};

use anyhow::{Context, Result};

use super::registration::AlarmRegistration;

/// File-backed mirror of the pending registrations, so reminders survive
/// a process restart. Reads are lenient: a missing or malformed file just
/// means there is nothing to re-arm.
pub struct RegistrationStore {
    path: PathBuf,
}

impl RegistrationStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<Vec<AlarmRegistration>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path).with_context(|| {
            format!("Failed to read registrations from {}", self.path.display())
        })?;
        Ok(serde_json::from_str(&contents).unwrap_or_default())
    }

    pub fn save(&self, registrations: &[AlarmRegistration]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let serialized = serde_json::to_string_pretty(registrations)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write registrations to {}", self.path.display()))
    }
}
