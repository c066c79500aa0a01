use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Default focus interval: the classic 25-minute pomodoro.
pub const DEFAULT_FOCUS_DURATION: Duration = Duration::from_secs(25 * 60);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CountdownPhase {
    Idle,
    Running,
    Paused,
    Finished,
}

impl Default for CountdownPhase {
    fn default() -> Self {
        CountdownPhase::Idle
    }
}

/// Countdown bookkeeping, mutated only by user actions and the tick
/// driver. While Idle, `remaining` always equals `total`; `Finished` is
/// terminal until `reset()`.
#[derive(Debug, Clone)]
pub struct CountdownState {
    pub phase: CountdownPhase,
    pub remaining: Duration,
    pub total: Duration,
}

impl CountdownState {
    pub fn new(total: Duration) -> Self {
        Self {
            phase: CountdownPhase::Idle,
            remaining: total,
            total,
        }
    }

    /// Begin counting down. Valid only from Idle; a paused countdown is
    /// continued with `resume()`, not restarted.
    pub fn start(&mut self) -> Result<()> {
        if self.phase != CountdownPhase::Idle {
            bail!("countdown can only start from idle");
        }
        self.phase = CountdownPhase::Running;
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.phase != CountdownPhase::Running {
            bail!("countdown is not running");
        }
        self.phase = CountdownPhase::Paused;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.phase != CountdownPhase::Paused {
            bail!("countdown is not paused");
        }
        self.phase = CountdownPhase::Running;
        Ok(())
    }

    /// Return to Idle with the full duration restored. Valid from any
    /// phase.
    pub fn reset(&mut self) {
        self.phase = CountdownPhase::Idle;
        self.remaining = self.total;
    }

    /// One-second decrement. Only meaningful while Running; anywhere
    /// else it leaves the state untouched.
    pub fn tick(&mut self) {
        if self.phase != CountdownPhase::Running {
            return;
        }
        self.remaining = self.remaining.saturating_sub(Duration::from_secs(1));
        if self.remaining.is_zero() {
            self.phase = CountdownPhase::Finished;
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == CountdownPhase::Running
    }
}

/// Format a duration as "MM:SS" for countdown display.
pub fn format_mmss(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
