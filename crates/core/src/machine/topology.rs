//! Machine → CPU → Core → Hardware Thread topology (§3, §4.6).

use crate::machine::tlb::Tlb;
use crate::pcb::Pid;

/// One hardware execution context: registers, PC/IR, and a non-owning
/// handle to whichever PCB is currently bound here.
///
/// The thread never owns a [`crate::pcb::Pcb`] — see DESIGN.md on replicated
/// PCB state. `bound_pid` doubles as the "page-table-base register is null"
/// check from §4.5: a step only happens when it is `Some`.
#[derive(Debug, Clone)]
pub struct HwThread {
    pub registers: [u32; 16],
    pub pc: u32,
    pub ir: u32,
    pub tlb: Tlb,
    pub bound_pid: Option<Pid>,
}

impl HwThread {
    pub fn new() -> Self {
        Self {
            registers: [0; 16],
            pc: 0,
            ir: 0,
            tlb: Tlb::new(),
            bound_pid: None,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound_pid.is_some()
    }
}

impl Default for HwThread {
    fn default() -> Self {
        Self::new()
    }
}

/// A core: a fixed-capacity array of hardware threads.
#[derive(Debug, Clone)]
pub struct Core {
    pub hw_threads: Vec<HwThread>,
}

impl Core {
    pub fn new(threads_per_core: usize) -> Self {
        Self {
            hw_threads: (0..threads_per_core).map(|_| HwThread::new()).collect(),
        }
    }

    /// Number of threads with a bound PCB — a prefix count maintained by
    /// compaction in [`crate::machine::binding::unbind`].
    pub fn current_pcb_count(&self) -> usize {
        self.hw_threads.iter().filter(|t| t.is_bound()).count()
    }
}

/// A CPU: owns a fixed set of cores.
#[derive(Debug, Clone)]
pub struct Cpu {
    pub cores: Vec<Core>,
}

impl Cpu {
    pub fn new(cores_per_cpu: usize, threads_per_core: usize) -> Self {
        Self {
            cores: (0..cores_per_cpu).map(|_| Core::new(threads_per_core)).collect(),
        }
    }
}

/// The whole machine: owns all CPUs.
#[derive(Debug, Clone)]
pub struct Machine {
    pub cpus: Vec<Cpu>,
}

impl Machine {
    pub fn new(num_cpus: usize, cores_per_cpu: usize, threads_per_core: usize) -> Self {
        Self {
            cpus: (0..num_cpus).map(|_| Cpu::new(cores_per_cpu, threads_per_core)).collect(),
        }
    }

    /// Iterate over every hardware thread in topology order
    /// (CPU index, core index, thread index), used for preemption tie-breaks (§4.7).
    pub fn threads(&self) -> impl Iterator<Item = (usize, usize, usize, &HwThread)> {
        self.cpus.iter().enumerate().flat_map(|(ci, cpu)| {
            cpu.cores.iter().enumerate().flat_map(move |(ki, core)| {
                core.hw_threads
                    .iter()
                    .enumerate()
                    .map(move |(ti, thread)| (ci, ki, ti, thread))
            })
        })
    }

    pub fn threads_mut(&mut self) -> impl Iterator<Item = (usize, usize, usize, &mut HwThread)> {
        self.cpus.iter_mut().enumerate().flat_map(|(ci, cpu)| {
            cpu.cores.iter_mut().enumerate().flat_map(move |(ki, core)| {
                core.hw_threads
                    .iter_mut()
                    .enumerate()
                    .map(move |(ti, thread)| (ci, ki, ti, thread))
            })
        })
    }

    pub fn total_threads(&self) -> usize {
        self.cpus.iter().map(|c| c.cores.iter().map(|k| k.hw_threads.len()).sum::<usize>()).sum()
    }

    pub fn running_count(&self) -> usize {
        self.threads().filter(|(_, _, _, t)| t.is_bound()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topology_has_the_configured_shape() {
        let machine = Machine::new(2, 3, 4);
        assert_eq!(machine.cpus.len(), 2);
        assert_eq!(machine.cpus[0].cores.len(), 3);
        assert_eq!(machine.cpus[0].cores[0].hw_threads.len(), 4);
        assert_eq!(machine.total_threads(), 24);
    }

    #[test]
    fn fresh_threads_are_unbound() {
        let machine = Machine::new(1, 1, 1);
        assert_eq!(machine.running_count(), 0);
    }

    #[test]
    fn threads_iterate_in_topology_order() {
        let machine = Machine::new(2, 1, 2);
        let order: Vec<(usize, usize, usize)> = machine
            .threads()
            .map(|(c, k, t, _)| (c, k, t))
            .collect();
        assert_eq!(order, vec![(0, 0, 0), (0, 0, 1), (1, 0, 0), (1, 0, 1)]);
    }
}
