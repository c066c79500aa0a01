use std::{sync::Arc, time::Duration};

use anyhow::{bail, Result};
use log::info;
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use super::state::{CountdownPhase, CountdownState};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountdownSnapshot {
    pub phase: CountdownPhase,
    pub remaining_secs: u64,
    pub total_secs: u64,
}

impl CountdownSnapshot {
    fn of(state: &CountdownState) -> Self {
        Self {
            phase: state.phase,
            remaining_secs: state.remaining.as_secs(),
            total_secs: state.total.as_secs(),
        }
    }
}

/// Drives a single countdown: spawns the one-second ticker while the
/// phase is Running and publishes every change on a watch channel.
/// Ticks are published under the state lock, so once `pause()` returns
/// no further tick can be observed until `resume()`.
#[derive(Clone)]
pub struct CountdownController {
    state: Arc<Mutex<CountdownState>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_tx: Arc<watch::Sender<CountdownSnapshot>>,
    tick_interval: Duration,
}

impl CountdownController {
    pub fn new(total: Duration) -> Self {
        let state = CountdownState::new(total);
        let (tick_tx, _) = watch::channel(CountdownSnapshot::of(&state));

        Self {
            state: Arc::new(Mutex::new(state)),
            ticker: Arc::new(Mutex::new(None)),
            tick_tx: Arc::new(tick_tx),
            tick_interval: Duration::from_secs(1),
        }
    }

    /// Receiver yielding the latest snapshot: once per second while
    /// Running, plus one update on every user-driven transition.
    pub fn subscribe(&self) -> watch::Receiver<CountdownSnapshot> {
        self.tick_tx.subscribe()
    }

    pub async fn snapshot(&self) -> CountdownSnapshot {
        CountdownSnapshot::of(&*self.state.lock().await)
    }

    pub async fn start(&self) -> Result<CountdownSnapshot> {
        let snapshot = {
            let mut state = self.state.lock().await;
            if state.total.is_zero() {
                bail!("countdown duration must be greater than zero");
            }
            state.start()?;
            self.publish(&state)
        };

        self.spawn_ticker().await;
        info!("countdown started ({}s total)", snapshot.total_secs);
        Ok(snapshot)
    }

    pub async fn pause(&self) -> Result<CountdownSnapshot> {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.pause()?;
            self.publish(&state)
        };

        self.cancel_ticker().await;
        info!("countdown paused at {}s remaining", snapshot.remaining_secs);
        Ok(snapshot)
    }

    pub async fn resume(&self) -> Result<CountdownSnapshot> {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.resume()?;
            self.publish(&state)
        };

        self.spawn_ticker().await;
        info!("countdown resumed at {}s remaining", snapshot.remaining_secs);
        Ok(snapshot)
    }

    /// Stop ticking and restore the full duration. Valid from any phase.
    pub async fn reset(&self) -> CountdownSnapshot {
        let snapshot = {
            let mut state = self.state.lock().await;
            state.reset();
            self.publish(&state)
        };

        self.cancel_ticker().await;
        snapshot
    }

    fn publish(&self, state: &CountdownState) -> CountdownSnapshot {
        let snapshot = CountdownSnapshot::of(state);
        let _ = self.tick_tx.send(snapshot.clone());
        snapshot
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if let Some(handle) = ticker_guard.take() {
            handle.abort();
        }

        let state = Arc::clone(&self.state);
        let tick_tx = Arc::clone(&self.tick_tx);
        let tick_interval = self.tick_interval;

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // An interval's first tick completes immediately; the first
            // decrement is owed one full second from now.
            interval.tick().await;

            loop {
                interval.tick().await;

                let mut guard = state.lock().await;
                if !guard.is_running() {
                    break;
                }
                guard.tick();
                let snapshot = CountdownSnapshot::of(&guard);
                let finished = guard.phase == CountdownPhase::Finished;
                let _ = tick_tx.send(snapshot);
                drop(guard);

                if finished {
                    info!("countdown finished");
                    break;
                }
            }
        });

        *ticker_guard = Some(handle);
    }

    async fn cancel_ticker(&self) {
        if let Some(handle) = self.ticker.lock().await.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn next_snapshot(rx: &mut watch::Receiver<CountdownSnapshot>) -> CountdownSnapshot {
        rx.changed().await.expect("tick channel closed");
        rx.borrow().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_arrive_once_per_second_while_running() {
        let controller = CountdownController::new(Duration::from_secs(5));
        let mut ticks = controller.subscribe();

        controller.start().await.unwrap();
        let started = next_snapshot(&mut ticks).await;
        assert_eq!(started.phase, CountdownPhase::Running);
        assert_eq!(started.remaining_secs, 5);

        for expected in [4, 3, 2] {
            let tick = next_snapshot(&mut ticks).await;
            assert_eq!(tick.phase, CountdownPhase::Running);
            assert_eq!(tick.remaining_secs, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_finishes_at_zero() {
        let controller = CountdownController::new(Duration::from_secs(2));
        let mut ticks = controller.subscribe();

        controller.start().await.unwrap();
        next_snapshot(&mut ticks).await;

        let first = next_snapshot(&mut ticks).await;
        assert_eq!(first.remaining_secs, 1);

        let last = next_snapshot(&mut ticks).await;
        assert_eq!(last.phase, CountdownPhase::Finished);
        assert_eq!(last.remaining_secs, 0);

        // Finished is terminal until reset.
        assert!(controller.start().await.is_err());
        let reset = controller.reset().await;
        assert_eq!(reset.phase, CountdownPhase::Idle);
        assert_eq!(reset.remaining_secs, 2);
        assert!(controller.start().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn pause_stops_ticks_and_resume_continues_from_remaining() {
        let controller = CountdownController::new(Duration::from_secs(30));
        let mut ticks = controller.subscribe();

        controller.start().await.unwrap();
        next_snapshot(&mut ticks).await;

        let mut tick = next_snapshot(&mut ticks).await;
        while tick.remaining_secs > 28 {
            tick = next_snapshot(&mut ticks).await;
        }
        assert_eq!(tick.remaining_secs, 28);

        let paused = controller.pause().await.unwrap();
        assert_eq!(paused.phase, CountdownPhase::Paused);
        assert_eq!(paused.remaining_secs, 28);
        next_snapshot(&mut ticks).await;

        // No tick may be observed while paused, however long we wait.
        time::advance(Duration::from_secs(60)).await;
        assert!(!ticks.has_changed().unwrap());
        assert_eq!(controller.snapshot().await.remaining_secs, 28);

        let resumed = controller.resume().await.unwrap();
        assert_eq!(resumed.remaining_secs, 28);
        next_snapshot(&mut ticks).await;

        let tick = next_snapshot(&mut ticks).await;
        assert_eq!(tick.remaining_secs, 27);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_while_running_stops_ticks_and_restores_total() {
        let controller = CountdownController::new(Duration::from_secs(10));
        let mut ticks = controller.subscribe();

        controller.start().await.unwrap();
        next_snapshot(&mut ticks).await;
        let tick = next_snapshot(&mut ticks).await;
        assert_eq!(tick.remaining_secs, 9);

        let reset = controller.reset().await;
        assert_eq!(reset.phase, CountdownPhase::Idle);
        assert_eq!(reset.remaining_secs, 10);
        next_snapshot(&mut ticks).await;

        // The cancelled ticker must not land a late tick on the fresh
        // Idle state.
        time::advance(Duration::from_secs(30)).await;
        assert!(!ticks.has_changed().unwrap());
        assert_eq!(controller.snapshot().await.remaining_secs, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_transitions_are_rejected() {
        let controller = CountdownController::new(Duration::from_secs(10));

        assert!(controller.pause().await.is_err());
        assert!(controller.resume().await.is_err());

        controller.start().await.unwrap();
        assert!(controller.start().await.is_err());
        assert!(controller.resume().await.is_err());

        controller.pause().await.unwrap();
        assert!(controller.start().await.is_err());
        assert!(controller.pause().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_is_rejected() {
        let controller = CountdownController::new(Duration::ZERO);
        assert!(controller.start().await.is_err());
    }
}
