use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::alarm::model::{AlarmSpec, SchedulerState, format_fire_at};
use crate::clock::SharedClock;
use crate::selection::TrackSelection;

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Called on the waiting thread once an alarm reaches its instant.
pub trait AlarmHandler: Send + Sync {
    fn on_alarm(&self, spec: &AlarmSpec);
}

#[derive(Debug)]
struct Slot {
    state: SchedulerState,
    generation: u64,
}

#[derive(Debug)]
struct Shared {
    slot: Mutex<Slot>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Single-alarm scheduler. Each armed alarm gets its own waiting thread
/// tagged with a generation; a thread whose generation is no longer current
/// exits without firing.
pub struct AlarmScheduler {
    shared: Arc<Shared>,
    clock: SharedClock,
    handler: Arc<dyn AlarmHandler>,
    tick: Duration,
}

impl AlarmScheduler {
    pub fn new(clock: SharedClock, handler: Arc<dyn AlarmHandler>, tick: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    state: SchedulerState::Idle,
                    generation: 0,
                }),
                wake: Condvar::new(),
            }),
            clock,
            handler,
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    /// Arms `spec`, replacing whatever was pending. Returns false once the
    /// scheduler has been shut down or the waiting thread cannot be started.
    pub fn set_alarm(&self, spec: AlarmSpec) -> bool {
        let generation = {
            let mut slot = self.shared.lock();
            if slot.state == SchedulerState::Stopped {
                return false;
            }
            slot.generation += 1;
            slot.state = SchedulerState::Waiting(spec.clone());
            slot.generation
        };
        self.shared.wake.notify_all();

        let shared = Arc::clone(&self.shared);
        let clock = Arc::clone(&self.clock);
        let handler = Arc::clone(&self.handler);
        let tick = self.tick;
        let spawned = thread::Builder::new()
            .name(format!("alarm-wait-{generation}"))
            .spawn(move || run_wait_loop(&shared, clock, handler, tick, generation));

        match spawned {
            Ok(_) => {
                info!(
                    generation,
                    fire_at = %format_fire_at(&spec.fire_at),
                    track = spec.track_id().unwrap_or("-"),
                    "alarm armed"
                );
                true
            }
            Err(err) => {
                error!("could not start alarm wait thread: {err}");
                let mut slot = self.shared.lock();
                if slot.generation == generation {
                    slot.generation += 1;
                    slot.state = SchedulerState::Idle;
                }
                false
            }
        }
    }

    /// Cancels a waiting alarm. An alarm already firing cannot be recalled.
    pub fn cancel(&self) -> bool {
        let cancelled = {
            let mut slot = self.shared.lock();
            if matches!(slot.state, SchedulerState::Waiting(_)) {
                slot.generation += 1;
                slot.state = SchedulerState::Idle;
                true
            } else {
                false
            }
        };
        if cancelled {
            self.shared.wake.notify_all();
            info!("alarm cancelled");
        }
        cancelled
    }

    /// Swaps the track of a waiting alarm in place, keeping its instant.
    /// The waiting thread re-reads the slot, so it fires the new track.
    /// Returns false unless an alarm is waiting.
    pub fn replace_track(&self, track: Option<TrackSelection>) -> bool {
        let mut slot = self.shared.lock();
        let SchedulerState::Waiting(spec) = &slot.state else {
            return false;
        };
        let spec = spec.with_track(track);
        info!(
            generation = slot.generation,
            track = spec.track_id().unwrap_or("-"),
            "alarm track replaced"
        );
        slot.state = SchedulerState::Waiting(spec);
        true
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.lock().state.clone()
    }

    #[cfg(test)]
    fn pending(&self) -> Option<AlarmSpec> {
        match &self.shared.lock().state {
            SchedulerState::Waiting(spec) => Some(spec.clone()),
            _ => None,
        }
    }

    pub fn shutdown(&self) {
        {
            let mut slot = self.shared.lock();
            if slot.state == SchedulerState::Stopped {
                return;
            }
            slot.generation += 1;
            slot.state = SchedulerState::Stopped;
        }
        self.shared.wake.notify_all();
        debug!("alarm scheduler stopped");
    }

    #[cfg(test)]
    fn wait_for_state(
        &self,
        timeout: Duration,
        predicate: impl Fn(&SchedulerState) -> bool,
    ) -> bool {
        let slot = self.shared.lock();
        let (slot, _) = self
            .shared
            .wake
            .wait_timeout_while(slot, timeout, |slot| !predicate(&slot.state))
            .unwrap_or_else(PoisonError::into_inner);
        predicate(&slot.state)
    }
}

impl Drop for AlarmScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_wait_loop(
    shared: &Shared,
    clock: SharedClock,
    handler: Arc<dyn AlarmHandler>,
    tick: Duration,
    generation: u64,
) {
    let mut slot = shared.lock();
    loop {
        if slot.generation != generation {
            debug!(generation, "alarm wait superseded");
            return;
        }
        let spec = match &slot.state {
            SchedulerState::Waiting(spec) => spec.clone(),
            _ => return,
        };

        if clock.now() >= spec.fire_at {
            slot.state = SchedulerState::Firing(spec.clone());
            drop(slot);
            shared.wake.notify_all();

            info!(generation, "alarm firing");
            handler.on_alarm(&spec);

            let mut slot = shared.lock();
            if slot.generation == generation && matches!(slot.state, SchedulerState::Firing(_)) {
                slot.state = SchedulerState::Idle;
            }
            drop(slot);
            shared.wake.notify_all();
            return;
        }

        slot = shared
            .wake
            .wait_timeout(slot, tick)
            .map(|(guard, _)| guard)
            .unwrap_or_else(|poisoned| poisoned.into_inner().0);
    }
}
