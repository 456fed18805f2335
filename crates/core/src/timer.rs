//! Derived tick sources that fire at a fixed tick interval (§4.2).
//!
//! Each timer owns its own `std::thread` and waits on the shared
//! `tick_available` condition variable, mirroring `sys/timer.c`'s
//! `pthread_cond_wait` loop. Firing is a pure function of
//! `current_tick - last_fired >= interval`. Only one timer -- the scheduler
//! timer, used when `sync_mode` is [`crate::scheduler::SyncMode::Timer`] --
//! is wired to notify `scheduler_activate` on fire; every other configured
//! timer is observable-but-inert, exactly as `sys/kernel.c` creates one
//! scheduler-sync timer with a callback alongside N diagnostic timers with
//! none.

use std::sync::{Arc, Mutex};
use std::thread;

use tracing::debug;

use crate::clock::SyncSignals;
use crate::sim_state::SimState;

/// One timer: an interval in ticks, the tick it last fired on, and an
/// optional side effect invoked synchronously when it fires.
pub struct Timer {
    pub interval: u64,
    last_fired: u64,
}

impl Timer {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            last_fired: 0,
        }
    }

    /// `true` and advances `last_fired` iff enough ticks have elapsed.
    fn try_fire(&mut self, current_tick: u64) -> bool {
        if current_tick.saturating_sub(self.last_fired) >= self.interval {
            self.last_fired = current_tick;
            true
        } else {
            false
        }
    }
}

/// Spawn a diagnostic timer thread: observable (it logs on fire) but inert,
/// never notifying `scheduler_activate`. Used for every entry in
/// `config.timer_intervals` besides the scheduler timer.
pub fn spawn(lock: Arc<Mutex<SimState>>, signals: Arc<SyncSignals>, interval: u64) -> thread::JoinHandle<()> {
    spawn_inner(lock, signals, interval, false)
}

/// Spawn the distinguished scheduler timer: on fire, notifies
/// `scheduler_activate` so the scheduler thread wakes even when it is
/// parked on that condition variable rather than `tick_available` (§4.2,
/// §4.7 "Activation").
pub fn spawn_scheduler_timer(
    lock: Arc<Mutex<SimState>>,
    signals: Arc<SyncSignals>,
    interval: u64,
) -> thread::JoinHandle<()> {
    spawn_inner(lock, signals, interval, true)
}

fn spawn_inner(
    lock: Arc<Mutex<SimState>>,
    signals: Arc<SyncSignals>,
    interval: u64,
    notifies_scheduler: bool,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut timer = Timer::new(interval);
        let mut last_seen_tick = 0u64;
        loop {
            let mut state = lock.lock().expect("system mutex poisoned");
            state = signals
                .tick_available
                .wait_while(state, |s| !s.shutdown && s.tick == last_seen_tick)
                .expect("system mutex poisoned");
            if state.shutdown {
                break;
            }
            last_seen_tick = state.tick;
            if timer.try_fire(state.tick) {
                debug!(interval = timer.interval, tick = state.tick, "timer fired");
                if notifies_scheduler {
                    signals.scheduler_activate.notify_all();
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_interval_has_elapsed() {
        let mut timer = Timer::new(3);
        assert!(!timer.try_fire(1));
        assert!(!timer.try_fire(2));
        assert!(timer.try_fire(3));
    }

    #[test]
    fn refires_after_the_next_full_interval() {
        let mut timer = Timer::new(2);
        assert!(timer.try_fire(2));
        assert!(!timer.try_fire(3));
        assert!(timer.try_fire(4));
    }

    #[test]
    fn zero_interval_is_clamped_to_one() {
        let timer = Timer::new(0);
        assert_eq!(timer.interval, 1);
    }
}
