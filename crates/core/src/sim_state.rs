//! The single piece of state every flow (clock, timers, scheduler, generator)
//! shares behind one mutex (§5).
//!
//! Centralizing ownership here — one [`ProcessTable`] as the sole home of every
//! [`crate::pcb::Pcb`], with queues and hardware threads holding only [`crate::pcb::Pid`]
//! handles — is what keeps the borrow checker happy about the cyclic
//! references the design notes describe: nothing outside this struct ever
//! owns a PCB.

use crate::machine::Machine;
use crate::memory::PhysicalMemory;
use crate::process_table::ProcessTable;
use crate::queue::ProcessQueue;
use crate::scheduler::{Scheduler, SchedulerConfig};

pub struct SimState {
    pub tick: u64,
    pub physical: PhysicalMemory,
    pub process_table: ProcessTable,
    pub machine: Machine,
    pub scheduler: Scheduler,
    /// PCBs the loader/generator have created but the scheduler has not yet
    /// absorbed into its policy-specific structure (§4.7 "Absorb arrivals").
    pub arrivals: ProcessQueue,
    pub shutdown: bool,
}

impl SimState {
    pub fn new(machine: Machine, scheduler_config: SchedulerConfig) -> Self {
        let arrivals_capacity = scheduler_config.max_processes.max(1);
        Self {
            tick: 0,
            physical: PhysicalMemory::new(),
            process_table: ProcessTable::new(),
            machine,
            scheduler: Scheduler::new(scheduler_config),
            arrivals: ProcessQueue::new(arrivals_capacity),
            shutdown: false,
        }
    }

    /// Total PCBs in the system: queued, bucketed, and bound (§3's
    /// population-bound invariant).
    pub fn in_system(&self) -> usize {
        self.scheduler.queued_count() + self.arrivals.len() + self.machine.running_count()
    }
}
