//! The scheduler: policy-driven dispatch, preemption and quantum accounting
//! (§4.7).
//!
//! A single [`Scheduler`] instance holds both the round-robin/EDF ready queue
//! and the 40 priority buckets; exactly one set is non-empty for a given run
//! depending on [`SchedulerPolicy`] — a sum type over shared state, per the
//! "Policy dispatch" design note, rather than three separate scheduler types.

pub mod policy;

pub use policy::{bucket_capacity, bucket_index, virtual_deadline, SchedulerPolicy, SyncMode};

use tracing::info;

use crate::error::SimResult;
use crate::machine::{binding, Machine};
use crate::memory::PhysicalMemory;
use crate::pcb::{Pid, ProcessState};
use crate::process_table::ProcessTable;
use crate::queue::ProcessQueue;

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub quantum: u32,
    pub policy: SchedulerPolicy,
    pub sync_mode: SyncMode,
    pub max_processes: usize,
}

pub struct Scheduler {
    pub quantum: u32,
    pub policy: SchedulerPolicy,
    pub sync_mode: SyncMode,
    ready_queue: ProcessQueue,
    priority_buckets: Vec<ProcessQueue>,
    pub total_completed: u64,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let bucket_cap = bucket_capacity(config.max_processes);
        Self {
            quantum: config.quantum,
            policy: config.policy,
            sync_mode: config.sync_mode,
            ready_queue: ProcessQueue::new(config.max_processes.max(1)),
            priority_buckets: (0..40).map(|_| ProcessQueue::new(bucket_cap)).collect(),
            total_completed: 0,
        }
    }

    /// Total PCBs currently held by this scheduler's own structures (not
    /// counting bound or freshly-arrived-but-undrained ones).
    pub fn queued_count(&self) -> usize {
        self.ready_queue.len() + self.priority_buckets.iter().map(|b| b.len()).sum::<usize>()
    }

    fn enqueue_waiting(&mut self, table: &ProcessTable, pid: Pid) -> SimResult<()> {
        match self.policy {
            SchedulerPolicy::RoundRobin | SchedulerPolicy::DeadlineEDF => {
                self.ready_queue.enqueue(pid)
            }
            SchedulerPolicy::PreemptivePriority => {
                let priority = table.get(pid).map(|p| p.priority).unwrap_or(0);
                self.priority_buckets[bucket_index(priority)].enqueue(pid)
            }
        }
    }

    /// Run one full wake: Reap, Absorb arrivals, Dispatch (§4.7). Called
    /// with the system lock already held.
    pub fn wake(
        &mut self,
        machine: &mut Machine,
        table: &mut ProcessTable,
        physical: &mut PhysicalMemory,
        arrivals: &mut ProcessQueue,
        tick: u64,
    ) -> SimResult<()> {
        self.reap(machine, table, physical, tick)?;
        self.absorb_arrivals(machine, table, arrivals)?;
        self.dispatch(machine, table, tick)?;
        Ok(())
    }

    fn reap(
        &mut self,
        machine: &mut Machine,
        table: &mut ProcessTable,
        physical: &mut PhysicalMemory,
        tick: u64,
    ) -> SimResult<()> {
        let bound: Vec<Pid> = machine.threads().filter_map(|(_, _, _, t)| t.bound_pid).collect();

        for pid in bound {
            let (terminated, quantum_exceeded) = {
                let pcb = table.get_mut(pid).expect("bound pid must have a pcb");
                pcb.quantum_counter += 1;
                (pcb.is_terminated(), pcb.quantum_counter >= self.quantum)
            };

            if terminated {
                binding::unbind(machine, table, pid)?;
                if let Some(pcb) = table.remove(pid) {
                    if let Some(pt) = pcb.page_table {
                        for frame in pt.present_frames() {
                            let _ = physical.release_frame(frame);
                        }
                    }
                }
                self.total_completed += 1;
                info!(pid, tick, "pcb completed");
            } else if quantum_exceeded {
                binding::unbind(machine, table, pid)?;
                let priority = {
                    let pcb = table.get_mut(pid).expect("pcb must still exist");
                    pcb.quantum_counter = 0;
                    pcb.state = ProcessState::Waiting;
                    if self.policy == SchedulerPolicy::DeadlineEDF {
                        pcb.virtual_deadline =
                            Some(virtual_deadline(self.quantum, pcb.priority, tick));
                    }
                    pcb.priority
                };
                let _ = priority;
                self.enqueue_waiting(table, pid)?;
            }
        }
        Ok(())
    }

    fn absorb_arrivals(
        &mut self,
        machine: &mut Machine,
        table: &mut ProcessTable,
        arrivals: &mut ProcessQueue,
    ) -> SimResult<()> {
        while let Some(pid) = arrivals.dequeue() {
            if self.policy == SchedulerPolicy::PreemptivePriority {
                self.maybe_preempt_for(machine, table, pid)?;
            }
            self.enqueue_waiting(table, pid)?;
        }
        Ok(())
    }

    /// If every hardware thread is occupied and `pid`'s priority is
    /// strictly better than the least important running PCB's, preempt that
    /// PCB to make room. Ties go to the first in topology order; a new
    /// arrival never preempts an equal-priority runner (§4.7).
    fn maybe_preempt_for(
        &mut self,
        machine: &mut Machine,
        table: &mut ProcessTable,
        pid: Pid,
    ) -> SimResult<()> {
        if machine.running_count() < machine.total_threads() {
            return Ok(());
        }
        let arrival_priority = table.get(pid).map(|p| p.priority).unwrap_or(0);

        let victim = machine
            .threads()
            .filter_map(|(_, _, _, t)| t.bound_pid)
            .fold(None::<(Pid, i8)>, |worst, candidate| {
                let priority = table.get(candidate).map(|p| p.priority).unwrap_or(i8::MIN);
                match worst {
                    Some((_, worst_priority)) if priority <= worst_priority => worst,
                    _ => Some((candidate, priority)),
                }
            });

        if let Some((victim_pid, victim_priority)) = victim {
            if arrival_priority < victim_priority {
                binding::unbind(machine, table, victim_pid)?;
                let pcb = table.get_mut(victim_pid).expect("pcb must still exist");
                pcb.quantum_counter = 0;
                pcb.state = ProcessState::Waiting;
                self.enqueue_waiting(table, victim_pid)?;
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, machine: &mut Machine, table: &mut ProcessTable, tick: u64) -> SimResult<()> {
        while binding::can_admit(machine) {
            let Some(pid) = self.select_next(table, tick) else {
                break;
            };
            {
                let pcb = table.get_mut(pid).expect("selected pid must exist");
                pcb.state = ProcessState::Running;
                pcb.quantum_counter = 0;
                if self.policy == SchedulerPolicy::DeadlineEDF && pcb.virtual_deadline.is_none() {
                    pcb.virtual_deadline = Some(virtual_deadline(self.quantum, pcb.priority, tick));
                }
            }
            binding::bind(machine, table, pid)?;
        }
        Ok(())
    }

    fn select_next(&mut self, table: &mut ProcessTable, tick: u64) -> Option<Pid> {
        match self.policy {
            SchedulerPolicy::RoundRobin => self.ready_queue.dequeue(),
            SchedulerPolicy::DeadlineEDF => {
                let pids: Vec<Pid> = self.ready_queue.iter().copied().collect();
                for pid in &pids {
                    let pcb = table.get_mut(*pid)?;
                    if pcb.virtual_deadline.is_none() {
                        pcb.virtual_deadline = Some(virtual_deadline(self.quantum, pcb.priority, tick));
                    }
                }
                let mut best: Option<(Pid, i64)> = None;
                for pid in pids {
                    let deadline = table.get(pid)?.virtual_deadline?;
                    if best.map_or(true, |(_, d)| deadline < d) {
                        best = Some((pid, deadline));
                    }
                }
                best.and_then(|(pid, _)| self.ready_queue.remove_where(|p| p == pid))
            }
            SchedulerPolicy::PreemptivePriority => {
                self.priority_buckets.iter_mut().find_map(|bucket| bucket.dequeue())
            }
        }
    }
}
