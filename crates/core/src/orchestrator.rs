//! Wires the clock, timers, scheduler and generator flows together and
//! drives the run loop (§5, §6.1).

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::clock::{self, ClockConfig, SyncSignals};
use crate::config::SimConfig;
use crate::generator::ProcessGenerator;
use crate::loader;
use crate::machine::Machine;
use crate::pcb::{Pid, ProcessState};
use crate::scheduler::SyncMode;
use crate::sim_state::SimState;
use crate::timer;

/// A read-only snapshot of the system, the in-process analogue of `sisctl`'s
/// status/metrics endpoints (§6.1).
#[derive(Debug, Clone)]
pub struct SimSnapshot {
    pub tick: u64,
    pub total_completed: u64,
    pub in_system: usize,
    pub pcb_states: Vec<(Pid, ProcessState)>,
    pub bound_pids: Vec<Option<Pid>>,
}

/// Owns the shared system state and every flow's [`JoinHandle`]; joining
/// them all on shutdown is the cooperative-cancellation contract from §5.
pub struct Orchestrator {
    state: Arc<Mutex<SimState>>,
    signals: Arc<SyncSignals>,
    clock_config: ClockConfig,
    timer_intervals: Vec<u64>,
    sync_mode: SyncMode,
    generator: Option<ProcessGenerator>,
    handles: Vec<JoinHandle<()>>,
}

impl Orchestrator {
    /// Build an orchestrator from a [`SimConfig`], loading any programs
    /// directory up front (§4.4's `load_dir` supplement).
    pub fn new(config: &SimConfig) -> anyhow::Result<Self> {
        let scheduler_config = config.scheduler_config();
        if scheduler_config.sync_mode == SyncMode::Timer && config.timer_intervals.is_empty() {
            anyhow::bail!(
                "sync_mode is Timer but no timer_intervals are configured; the scheduler would never wake"
            );
        }

        let machine = Machine::new(
            config.topology.cpus,
            config.topology.cores_per_cpu,
            config.topology.threads_per_core,
        );
        let mut state = SimState::new(machine, scheduler_config);

        if let Some(dir) = &config.programs_directory {
            load_programs(&mut state, dir)?;
        }

        let generator = config.generator.enabled.then(|| {
            info!("process generator enabled");
            ProcessGenerator::new(config.generator_config())
        });

        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            signals: Arc::new(SyncSignals::default()),
            clock_config: config.clock_config(),
            timer_intervals: config.timer_intervals.clone(),
            sync_mode: scheduler_config.sync_mode,
            generator,
            handles: Vec::new(),
        })
    }

    /// Spawn the clock, every configured timer, and (if enabled) the
    /// generator's own thread. In [`SyncMode::Timer`], the first configured
    /// interval becomes the distinguished scheduler timer (§4.2); every
    /// other interval stays a diagnostic, scheduler-inert timer.
    pub fn start(&mut self) {
        self.handles.push(clock::spawn(
            Arc::clone(&self.state),
            Arc::clone(&self.signals),
            self.clock_config,
        ));

        let mut intervals = self.timer_intervals.iter().copied();
        if self.sync_mode == SyncMode::Timer {
            let interval = intervals.next().expect(
                "SyncMode::Timer requires at least one configured timer interval to drive the scheduler",
            );
            self.handles.push(timer::spawn_scheduler_timer(
                Arc::clone(&self.state),
                Arc::clone(&self.signals),
                interval,
            ));
        }
        for interval in intervals {
            self.handles
                .push(timer::spawn(Arc::clone(&self.state), Arc::clone(&self.signals), interval));
        }

        self.handles.push(self.spawn_scheduler());

        if let Some(generator) = self.generator.take() {
            self.handles.push(self.spawn_generator(generator));
        }

        info!("orchestrator started");
    }

    fn spawn_scheduler(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let signals = Arc::clone(&self.signals);
        let sync_mode = self.sync_mode;
        std::thread::spawn(move || loop {
            let mut guard = state.lock().expect("system mutex poisoned");
            let condvar = match sync_mode {
                SyncMode::Clock => &signals.tick_available,
                SyncMode::Timer => &signals.scheduler_activate,
            };
            let last_tick = guard.tick;
            guard = condvar
                .wait_while(guard, |s| !s.shutdown && s.tick == last_tick)
                .expect("system mutex poisoned");
            if guard.shutdown {
                break;
            }
            let tick = guard.tick;
            let SimState {
                machine,
                process_table,
                physical,
                arrivals,
                scheduler,
                ..
            } = &mut *guard;
            if let Err(err) = scheduler.wake(machine, process_table, physical, arrivals, tick) {
                tracing::warn!("{err}");
            }
        })
    }

    fn spawn_generator(&self, mut generator: ProcessGenerator) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let signals = Arc::clone(&self.signals);
        std::thread::spawn(move || {
            let mut rng = StdRng::from_entropy();
            loop {
                let mut guard = state.lock().expect("system mutex poisoned");
                let last_tick = guard.tick;
                guard = signals
                    .tick_available
                    .wait_while(guard, |s| !s.shutdown && s.tick == last_tick)
                    .expect("system mutex poisoned");
                if guard.shutdown {
                    break;
                }
                generator.tick(&mut guard, &mut rng);
            }
        })
    }

    /// Signal shutdown, wake every waiter, and join all flows (§5
    /// "Cancellation").
    pub fn shutdown(mut self) {
        {
            let mut guard = self.state.lock().expect("system mutex poisoned");
            guard.shutdown = true;
        }
        self.signals.tick_available.notify_all();
        self.signals.scheduler_activate.notify_all();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        info!("orchestrator stopped");
    }

    pub fn snapshot(&self) -> SimSnapshot {
        let guard = self.state.lock().expect("system mutex poisoned");
        let pcb_states = guard
            .process_table
            .pids()
            .map(|pid| (pid, guard.process_table.get(pid).unwrap().state))
            .collect();
        let bound_pids = guard.machine.threads().map(|(_, _, _, t)| t.bound_pid).collect();
        SimSnapshot {
            tick: guard.tick,
            total_completed: guard.scheduler.total_completed,
            in_system: guard.in_system(),
            pcb_states,
            bound_pids,
        }
    }

    /// Give tests direct, locked access to the shared state, bypassing the
    /// thread flows entirely (used by the single-step scenario tests).
    pub fn with_state<R>(&self, f: impl FnOnce(&mut SimState) -> R) -> R {
        let mut guard = self.state.lock().expect("system mutex poisoned");
        f(&mut guard)
    }
}

fn load_programs(state: &mut SimState, dir: &Path) -> anyhow::Result<()> {
    let mut rng = StdRng::from_entropy();
    let SimState {
        physical,
        process_table,
        arrivals,
        ..
    } = state;
    let pcbs = loader::load_dir(physical, &mut || process_table.next_pid(), dir, &mut rng)?;
    for pcb in pcbs {
        let pid = pcb.pid;
        process_table.insert(pcb);
        arrivals.enqueue(pid)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PolicyOption, SimConfig, SyncModeOption};

    #[test]
    fn fresh_orchestrator_reports_tick_zero() {
        let config = SimConfig::default();
        let orchestrator = Orchestrator::new(&config).unwrap();
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.tick, 0);
        assert_eq!(snapshot.total_completed, 0);
    }

    #[test]
    fn snapshot_reflects_directly_mutated_state() {
        let config = SimConfig {
            scheduler_policy: PolicyOption::RoundRobin,
            ..SimConfig::default()
        };
        let orchestrator = Orchestrator::new(&config).unwrap();
        orchestrator.with_state(|state| {
            state.tick = 7;
        });
        assert_eq!(orchestrator.snapshot().tick, 7);
    }

    #[test]
    fn timer_sync_mode_without_any_timer_interval_is_rejected() {
        let config = SimConfig {
            sync_mode: SyncModeOption::Timer,
            timer_intervals: Vec::new(),
            ..SimConfig::default()
        };
        assert!(Orchestrator::new(&config).is_err());
    }

    #[test]
    fn timer_sync_mode_with_a_configured_interval_is_accepted() {
        let config = SimConfig {
            sync_mode: SyncModeOption::Timer,
            timer_intervals: vec![4],
            ..SimConfig::default()
        };
        assert!(Orchestrator::new(&config).is_ok());
    }

    #[test]
    fn scheduler_timer_actually_drives_dispatch_in_timer_sync_mode() {
        use crate::pcb::Pcb;

        let config = SimConfig {
            clock_frequency_hz: 1000,
            sync_mode: SyncModeOption::Timer,
            timer_intervals: vec![1],
            ..SimConfig::default()
        };
        let mut orchestrator = Orchestrator::new(&config).unwrap();
        orchestrator.with_state(|state| {
            let pid = state.process_table.next_pid();
            state.process_table.insert(Pcb::new(pid, 0, 50));
            state.arrivals.enqueue(pid).unwrap();
        });

        orchestrator.start();
        std::thread::sleep(std::time::Duration::from_millis(200));
        let snapshot = orchestrator.snapshot();
        orchestrator.shutdown();

        assert!(snapshot.tick > 0, "clock should have ticked");
        assert!(
            snapshot.bound_pids.iter().any(Option::is_some),
            "the scheduler timer should have dispatched the waiting pcb"
        );
    }
}
