//! Error taxonomy for the simulator.
//!
//! Every failure here is local to one PCB or one allocation request; none of
//! them is allowed to destabilize the rest of the simulation (see spec §7).

use thiserror::Error;

use crate::pcb::Pid;

/// All recoverable failures the simulator can report.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    /// A bounded queue was already at capacity.
    #[error("queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    /// The physical frame allocator has no user-range frames left.
    #[error("no free physical frames available")]
    NoFreeFrames,

    /// The kernel arena bump allocator ran out of space for a new page table.
    #[error("kernel arena exhausted")]
    KernelArenaExhausted,

    /// A virtual address resolved to a non-present page-table entry.
    #[error("page fault for pid {pid} at virtual address {vaddr:#08x}")]
    PageFault { pid: Pid, vaddr: u32 },

    /// The instruction decoder saw an opcode outside the four defined ones.
    #[error("invalid opcode {opcode:#03x} for pid {pid}")]
    InvalidOpcode { pid: Pid, opcode: u8 },

    /// A physical read or write fell outside the address bus.
    #[error("address {addr:#08x} is outside the physical address bus")]
    InvalidAddress { addr: u32 },

    /// The machine had no free hardware-thread slot to bind a PCB to.
    #[error("no free hardware thread to bind pid {pid}")]
    BindFailure { pid: Pid },

    /// A program description file could not be parsed.
    #[error("failed to parse program file {path}: {reason}")]
    ProgramParse { path: String, reason: String },
}

pub type SimResult<T> = Result<T, SimError>;
