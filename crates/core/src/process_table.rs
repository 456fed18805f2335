//! The single authoritative store of live PCBs.
//!
//! Queues and hardware-thread slots hold only [`Pid`]s; this table is the one
//! place a [`Pcb`] actually lives, which is how the simulator avoids the
//! "replicated PCB state on binding" hazard called out in DESIGN.md.

use std::collections::HashMap;

use crate::pcb::{Pcb, Pid};

#[derive(Debug, Default)]
pub struct ProcessTable {
    pcbs: HashMap<Pid, Pcb>,
    next_pid: Pid,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self {
            pcbs: HashMap::new(),
            next_pid: 1,
        }
    }

    /// Reserve the next monotonic pid without inserting a PCB yet.
    pub fn next_pid(&mut self) -> Pid {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    pub fn insert(&mut self, pcb: Pcb) {
        self.pcbs.insert(pcb.pid, pcb);
    }

    pub fn get(&self, pid: Pid) -> Option<&Pcb> {
        self.pcbs.get(&pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Pcb> {
        self.pcbs.get_mut(&pid)
    }

    /// Remove and return a PCB, e.g. after it has been destroyed.
    pub fn remove(&mut self, pid: Pid) -> Option<Pcb> {
        self.pcbs.remove(&pid)
    }

    pub fn len(&self) -> usize {
        self.pcbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcbs.is_empty()
    }

    pub fn pids(&self) -> impl Iterator<Item = Pid> + '_ {
        self.pcbs.keys().copied()
    }
}
