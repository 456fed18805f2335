//! Optional synthetic-load source used for scheduling experiments (§4.8).
//!
//! Generated PCBs carry no code segment — [`crate::isa::step`] is a no-op on
//! them, so they exist purely to occupy queue slots and hardware threads for
//! a randomized number of ticks, letting a policy be exercised without a
//! program file on disk.

use rand::Rng;

use crate::pcb::Pcb;
use crate::sim_state::SimState;

#[derive(Debug, Clone, Copy)]
pub struct GeneratorConfig {
    pub interval_range: (u32, u32),
    pub ttl_range: (u32, u32),
    pub max_processes: usize,
}

/// Drives synthetic arrivals into `state.arrivals`, holding a pending PCB
/// across ticks rather than discarding it when the system is at capacity
/// (§4.8, scenario 6's backpressure law).
pub struct ProcessGenerator {
    config: GeneratorConfig,
    next_arrival_tick: u64,
    pending: Option<Pcb>,
}

impl ProcessGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self {
            config,
            next_arrival_tick: 0,
            pending: None,
        }
    }

    /// Called once per tick with the system lock held. Creates a new
    /// candidate PCB when its scheduled arrival tick has passed (if none is
    /// already pending), then tries to admit whatever is pending.
    pub fn tick(&mut self, state: &mut SimState, rng: &mut impl Rng) {
        if self.pending.is_none() && state.tick >= self.next_arrival_tick {
            self.pending = Some(self.spawn_candidate(state, rng));
            let (min, max) = self.config.interval_range;
            let interval = rng.gen_range(min..=max.max(min)) as u64;
            self.next_arrival_tick = state.tick + interval;
        }

        if let Some(pcb) = &self.pending {
            if state.in_system() < self.config.max_processes {
                let pcb = self.pending.take().unwrap();
                let pid = pcb.pid;
                state.process_table.insert(pcb);
                let _ = state.arrivals.enqueue(pid);
            }
        }
    }

    fn spawn_candidate(&self, state: &mut SimState, rng: &mut impl Rng) -> Pcb {
        let pid = state.process_table.next_pid();
        let (ttl_min, ttl_max) = self.config.ttl_range;
        let ttl = rng.gen_range(ttl_min..=ttl_max.max(ttl_min));
        let priority = rng.gen_range(-20..=19);
        Pcb::new(pid, priority, ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Machine;
    use crate::scheduler::{SchedulerConfig, SchedulerPolicy, SyncMode};
    use rand::SeedableRng;

    fn state(max_processes: usize) -> SimState {
        SimState::new(
            Machine::new(1, 1, 1),
            SchedulerConfig {
                quantum: 5,
                policy: SchedulerPolicy::RoundRobin,
                sync_mode: SyncMode::Clock,
                max_processes,
            },
        )
    }

    fn config(max_processes: usize) -> GeneratorConfig {
        GeneratorConfig {
            interval_range: (1, 1),
            ttl_range: (5, 5),
            max_processes,
        }
    }

    #[test]
    fn generates_a_pcb_once_its_arrival_tick_passes() {
        let mut state = state(4);
        let mut generator = ProcessGenerator::new(config(4));
        let mut rng = rand::rngs::StdRng::seed_from_u64(0);
        generator.tick(&mut state, &mut rng);
        assert_eq!(state.arrivals.len(), 1);
    }

    #[test]
    fn pending_arrival_is_held_not_dropped_when_at_capacity() {
        let mut state = state(0);
        let mut generator = ProcessGenerator::new(config(0));
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        generator.tick(&mut state, &mut rng);
        assert_eq!(state.arrivals.len(), 0);
        assert!(generator.pending.is_some());
    }

    #[test]
    fn pending_arrival_admits_once_capacity_frees_up() {
        let mut state = state(1);
        let mut generator = ProcessGenerator::new(config(1));
        let mut rng = rand::rngs::StdRng::seed_from_u64(2);
        generator.tick(&mut state, &mut rng);
        assert_eq!(state.arrivals.len(), 1);
        assert!(generator.pending.is_none());
    }
}
