//! Process Control Block: the simulator's sole representation of a process.

use crate::memory::PageTable;

/// Process identifier, assigned monotonically by the loader/generator.
pub type Pid = u64;

/// Discrete PCB lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Waiting,
    Running,
    Terminated,
}

/// The saved hardware-thread register file, captured on unbind and restored on bind.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuContext {
    pub pc: u32,
    pub ir: u32,
    pub registers: [u32; 16],
}

/// Virtual layout of a loaded program: where its code and data segments start.
#[derive(Debug, Clone, Copy)]
pub struct MemoryMap {
    pub code_vaddr: u32,
    pub data_vaddr: u32,
}

/// The Process Control Block.
///
/// A PCB is created by the loader or the generator in [`ProcessState::Waiting`]
/// and is owned by exactly one of: a ready queue, a priority bucket, or a
/// hardware-thread binding (tracked by [`Pid`] elsewhere, never by a second
/// copy of this struct — see DESIGN.md on replicated PCB state).
#[derive(Debug)]
pub struct Pcb {
    pub pid: Pid,
    pub state: ProcessState,
    pub priority: i8,
    pub ttl: u32,
    pub initial_ttl: u32,
    pub quantum_counter: u32,
    pub virtual_deadline: Option<i64>,
    pub memory_map: Option<MemoryMap>,
    pub page_table: Option<PageTable>,
    pub context: CpuContext,
}

impl Pcb {
    pub fn new(pid: Pid, priority: i8, initial_ttl: u32) -> Self {
        Self {
            pid,
            state: ProcessState::Waiting,
            priority,
            ttl: initial_ttl,
            initial_ttl,
            quantum_counter: 0,
            virtual_deadline: None,
            memory_map: None,
            page_table: None,
            context: CpuContext::default(),
        }
    }

    /// Decrement TTL by one tick, never below zero. Only the clock flow calls this.
    pub fn decrement_ttl(&mut self) {
        self.ttl = self.ttl.saturating_sub(1);
    }

    /// Combines lifecycle state and expired TTL — used by the scheduler's
    /// reap step (§4.7), which treats either as grounds for reclaiming a PCB.
    pub fn is_terminated(&self) -> bool {
        self.state == ProcessState::Terminated || self.ttl == 0
    }

    /// State-only check for whether a PCB is terminated, ignoring TTL. Used
    /// by the instruction engine's no-op gate (§4.5), which must still run a
    /// PCB's guaranteed step on the tick its TTL reaches zero.
    pub fn is_terminated_state(&self) -> bool {
        self.state == ProcessState::Terminated
    }

    pub fn terminate(&mut self) {
        self.state = ProcessState::Terminated;
        self.ttl = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pcb_starts_waiting_with_full_ttl() {
        let pcb = Pcb::new(1, 0, 42);
        assert_eq!(pcb.state, ProcessState::Waiting);
        assert_eq!(pcb.ttl, 42);
        assert_eq!(pcb.initial_ttl, 42);
    }

    #[test]
    fn ttl_never_goes_below_zero() {
        let mut pcb = Pcb::new(1, 0, 1);
        pcb.decrement_ttl();
        pcb.decrement_ttl();
        assert_eq!(pcb.ttl, 0);
    }

    #[test]
    fn terminate_forces_ttl_to_zero() {
        let mut pcb = Pcb::new(1, 0, 10);
        pcb.terminate();
        assert_eq!(pcb.ttl, 0);
        assert!(pcb.is_terminated());
    }
}
