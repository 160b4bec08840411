//! Alarm Scheduler (spec §4.9, C9).
//!
//! Background worker ticking at a configurable period. Pulls due alarms,
//! atomically deactivates each, and hands it to a detached ringing callback
//! so the scheduler loop never blocks on playback.

pub mod store;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{error, info};

pub use store::{Alarm, AlarmStore};

/// Set to true by the Scheduler when a ringing alarm has not yet been
/// stopped; the Dialog Controller reads it to bypass quiet hours and to
/// bias the Intent Router toward the stop intent (spec §4.9, §4.11).
#[derive(Clone)]
pub struct RingingFlag(Arc<AtomicBool>);

impl RingingFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self, ringing: bool) {
        self.0.store(ringing, Ordering::SeqCst);
    }

    pub fn is_ringing(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for RingingFlag {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Scheduler {
    store: Arc<AlarmStore>,
    tick_period: Duration,
    ringing: RingingFlag,
    fired_today: HashSet<u64>,
    fired_day: chrono::NaiveDate,
}

impl Scheduler {
    pub fn new(store: Arc<AlarmStore>, tick_period: Duration, ringing: RingingFlag) -> Self {
        Self {
            store,
            tick_period,
            ringing,
            fired_today: HashSet::new(),
            fired_day: Local::now().date_naive(),
        }
    }

    fn reset_dedup_if_new_day(&mut self) {
        let today = Local::now().date_naive();
        if today != self.fired_day {
            self.fired_today.clear();
            self.fired_day = today;
        }
    }

    /// One scheduler tick (spec §4.9 steps 1-2). Returns the alarms that
    /// fired this tick so the caller can enqueue the ringing callback on a
    /// detached worker.
    pub fn tick(&mut self) -> Vec<Alarm> {
        self.reset_dedup_if_new_day();
        let now = Local::now().naive_local();

        let due: Vec<Alarm> = match self.store.get_active_alarms() {
            Ok(alarms) => alarms
                .into_iter()
                .filter(|a| a.time <= now && !self.fired_today.contains(&a.id))
                .collect(),
            Err(e) => {
                error!("alarm scheduler: failed to load active alarms: {e}");
                return Vec::new();
            }
        };

        let mut fired = Vec::new();
        for alarm in due {
            match self.store.deactivate(alarm.id) {
                Ok(true) => {
                    self.fired_today.insert(alarm.id);
                    self.ringing.set(true);
                    info!("alarm {} fired at {}", alarm.id, alarm.time);
                    fired.push(alarm);
                }
                Ok(false) => {}
                Err(e) => error!("alarm scheduler: failed to deactivate {}: {e}", alarm.id),
            }
        }
        fired
    }

    /// Runs the tick loop until `shutdown` fires, sending each batch of
    /// newly fired alarms down `tx` for a detached ringing worker to pick up
    /// (spec §5: "drives ringing callbacks on detached tasks").
    pub async fn run(mut self, tx: mpsc::Sender<Alarm>, mut shutdown: mpsc::Receiver<()>) {
        let mut interval = tokio::time::interval(self.tick_period);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    for alarm in self.tick() {
                        if tx.send(alarm).await.is_err() {
                            return;
                        }
                    }
                }
                _ = shutdown.recv() => return,
            }
        }
    }

    pub fn ringing_flag(&self) -> RingingFlag {
        self.ringing.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn scheduler() -> (Scheduler, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(AlarmStore::open(&dir.path().join("a.db")).unwrap());
        let sched = Scheduler::new(store, Duration::from_secs(1), RingingFlag::new());
        (sched, dir)
    }

    #[test]
    fn due_alarm_fires_exactly_once() {
        let (mut sched, _dir) = scheduler();
        let past = Local::now().naive_local() - ChronoDuration::minutes(1);
        let id = sched.store.add_alarm(past, "wake", "ring").unwrap();

        let fired = sched.tick();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].id, id);
        assert!(sched.ringing.is_ringing());

        // Second tick: alarm already deactivated, must not refire.
        let fired_again = sched.tick();
        assert!(fired_again.is_empty());
    }

    #[test]
    fn future_alarm_does_not_fire() {
        let (mut sched, _dir) = scheduler();
        let future = Local::now().naive_local() + ChronoDuration::hours(1);
        sched.store.add_alarm(future, "later", "ring").unwrap();
        assert!(sched.tick().is_empty());
    }
}
