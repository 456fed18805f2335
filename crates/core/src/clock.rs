//! The authoritative tick generator (§4.1, §5).
//!
//! The clock is the only component that decrements TTL and the only one
//! that advances the instruction engine; every tick it performs, under the
//! system mutex, a strictly ordered critical section: TTL decrement on every
//! bound thread, one instruction step per bound thread, then a broadcast to
//! every waiter on the shared tick condition variable. This mirrors
//! `clock_function`'s pthread-mutex-guarded loop in the original `sys/clock.c`.

use std::sync::{Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::isa;
use crate::sim_state::SimState;

/// Ticks-per-second driving the clock's wall-clock pacing.
#[derive(Debug, Clone, Copy)]
pub struct ClockConfig {
    pub frequency_hz: u32,
}

impl ClockConfig {
    pub fn period(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.frequency_hz.max(1) as u64)
    }
}

/// Shared condition variables all flows synchronize through (§5).
///
/// `tick_available` is notified once per tick by the clock; `scheduler_activate`
/// is notified by a timer when the scheduler is in [`crate::scheduler::SyncMode::Timer`].
#[derive(Default)]
pub struct SyncSignals {
    pub tick_available: Condvar,
    pub scheduler_activate: Condvar,
}

/// Run one full tick's critical section: TTL decrement, instruction step,
/// tick increment. Called with the system mutex already held.
pub fn advance_tick(state: &mut SimState) {
    state.tick += 1;

    let physical = &mut state.physical;
    let table = &mut state.process_table;
    for (_, _, _, thread) in state.machine.threads_mut() {
        let Some(pid) = thread.bound_pid else {
            continue;
        };
        if let Some(pcb) = table.get_mut(pid) {
            if !pcb.is_terminated() {
                pcb.decrement_ttl();
            }
        }
    }

    for (_, _, _, thread) in state.machine.threads_mut() {
        let Some(pid) = thread.bound_pid else {
            continue;
        };
        if let Some(pcb) = table.get_mut(pid) {
            isa::step(physical, pcb, thread);
        }
    }

    debug!(tick = state.tick, "tick advanced");
}

/// Drive the clock loop on its own thread until `state.shutdown` is set.
///
/// Returns the [`thread::JoinHandle`] so the orchestrator can join it at
/// shutdown, in keeping with the cooperative-cancellation rule in §5.
pub fn spawn(
    lock: std::sync::Arc<Mutex<SimState>>,
    signals: std::sync::Arc<SyncSignals>,
    config: ClockConfig,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        info!(frequency_hz = config.frequency_hz, "clock started");
        loop {
            thread::sleep(config.period());
            let mut state = lock.lock().expect("system mutex poisoned");
            if state.shutdown {
                break;
            }
            advance_tick(&mut state);
            signals.tick_available.notify_all();
            if state.shutdown {
                break;
            }
        }
        info!("clock stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;
    use crate::pcb::Pcb;
    use crate::scheduler::{SchedulerConfig, SchedulerPolicy, SyncMode};

    fn scheduler_config() -> SchedulerConfig {
        SchedulerConfig {
            quantum: 10,
            policy: SchedulerPolicy::RoundRobin,
            sync_mode: SyncMode::Clock,
            max_processes: 8,
        }
    }

    fn state_with_bound_pcb(ttl: u32) -> (SimState, u64) {
        let mut state = SimState::new(Machine::new(1, 1, 1), scheduler_config());
        let pid = state.process_table.next_pid();
        state.process_table.insert(Pcb::new(pid, 0, ttl));
        crate::machine::bind(&mut state.machine, &mut state.process_table, pid).unwrap();
        (state, pid)
    }

    #[test]
    fn tick_counter_increments_by_exactly_one() {
        let (mut state, _) = state_with_bound_pcb(10);
        advance_tick(&mut state);
        assert_eq!(state.tick, 1);
        advance_tick(&mut state);
        assert_eq!(state.tick, 2);
    }

    #[test]
    fn ttl_decrements_once_per_tick_for_bound_pcbs() {
        let (mut state, pid) = state_with_bound_pcb(3);
        advance_tick(&mut state);
        assert_eq!(state.process_table.get(pid).unwrap().ttl, 2);
    }

    #[test]
    fn ttl_never_goes_negative() {
        let (mut state, pid) = state_with_bound_pcb(1);
        advance_tick(&mut state);
        advance_tick(&mut state);
        assert_eq!(state.process_table.get(pid).unwrap().ttl, 0);
    }

    #[test]
    fn period_scales_inversely_with_frequency() {
        let fast = ClockConfig { frequency_hz: 1000 };
        let slow = ClockConfig { frequency_hz: 10 };
        assert!(fast.period() < slow.period());
    }
}
