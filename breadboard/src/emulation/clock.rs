//! Fixed-interval driver for a shared [`Workbench`].
//!
//! The clock is the only concurrent piece: a tokio task that locks the
//! workbench once per period, calls [`Workbench::tick`] and releases the
//! lock. The lock is never held across an await point. Each clock is bound
//! to the run that was current when it was spawned: it ends once that run
//! is stopped or replaced by a restart, when the lock is poisoned, or when
//! the clock is aborted or dropped.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::core::Workbench;

#[derive(Debug)]
pub struct SimulationClock {
    handle: Option<JoinHandle<u64>>,
}

impl SimulationClock {
    /// Spawn the tick loop on the current tokio runtime. The period and the
    /// run to drive are read from the workbench once, at spawn time.
    pub fn spawn(workbench: Arc<Mutex<Workbench>>) -> Self {
        let (period, run) = match workbench.lock() {
            Ok(wb) => (wb.options().tick_interval, wb.engine().run_id()),
            Err(poisoned) => {
                let wb = poisoned.into_inner();
                (wb.options().tick_interval, wb.engine().run_id())
            }
        };
        let period = period.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; the first step happens
            // one full period after start.
            interval.tick().await;

            let mut ticks = 0u64;
            loop {
                interval.tick().await;
                let Ok(mut wb) = workbench.lock() else {
                    warn!("workbench lock poisoned; clock stopping");
                    break;
                };
                if wb.engine().run_id() != run {
                    debug!(run, "run ended; clock stopping");
                    break;
                }
                if wb.tick().is_none() {
                    break;
                }
                ticks += 1;
            }
            debug!(ticks, "clock finished");
            ticks
        });

        Self {
            handle: Some(handle),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    pub fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Wait for the loop to end on its own (after the workbench stops).
    /// Returns the number of ticks it drove, or `None` if it was aborted.
    pub async fn join(mut self) -> Option<u64> {
        let handle = self.handle.take()?;
        handle.await.ok()
    }
}

impl Drop for SimulationClock {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WorkbenchOptions;

    const PROGRAM: &str = "void setup() {}\nvoid loop() { digitalWrite(13, HIGH); delay(10); }";

    fn workbench() -> Arc<Mutex<Workbench>> {
        let options = WorkbenchOptions::default()
            .with_tick_interval(Duration::from_millis(10))
            .with_placement_seed(1);
        Arc::new(Mutex::new(Workbench::with_options(options)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_ticks_until_stopped() {
        let wb = workbench();
        wb.lock().unwrap().start_simulation(PROGRAM).unwrap();

        let clock = SimulationClock::spawn(wb.clone());
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert_eq!(wb.lock().unwrap().engine().tick_count(), 3);

        wb.lock().unwrap().stop_simulation();
        assert_eq!(clock.join().await, Some(3));
    }

    #[tokio::test]
    async fn test_clock_exits_when_idle() {
        let wb = workbench();
        let clock = SimulationClock::spawn(wb);
        assert_eq!(clock.join().await, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_within_period_keeps_one_clock() {
        let wb = workbench();
        wb.lock().unwrap().start_simulation(PROGRAM).unwrap();
        let first = SimulationClock::spawn(wb.clone());
        tokio::time::sleep(Duration::from_millis(15)).await;

        {
            let mut guard = wb.lock().unwrap();
            guard.stop_simulation();
            guard.start_simulation(PROGRAM).unwrap();
        }
        let second = SimulationClock::spawn(wb.clone());
        tokio::time::sleep(Duration::from_millis(105)).await;

        assert_eq!(wb.lock().unwrap().engine().tick_count(), 10);
        assert!(first.is_finished());
        assert_eq!(first.join().await, Some(1));

        wb.lock().unwrap().stop_simulation();
        assert_eq!(second.join().await, Some(10));
    }
}
