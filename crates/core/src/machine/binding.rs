//! Bind/unbind: the save-restore logic moving a PCB between a queue slot and
//! a hardware thread (§4.6).

use crate::error::{SimError, SimResult};
use crate::machine::topology::Machine;
use crate::pcb::{Pid, ProcessState};
use crate::process_table::ProcessTable;

/// `true` iff some core has a hardware-thread slot with no bound PCB.
pub fn can_admit(machine: &Machine) -> bool {
    machine.threads().any(|(_, _, _, t)| !t.is_bound())
}

/// Bind `pid` to the first free hardware-thread slot in topology order.
///
/// Loads the PCB's saved context into the thread's registers and flushes its
/// TLB. On a PCB's first dispatch (saved PC is 0 and it has never run), PC is
/// set to the code segment's virtual entry address instead of 0.
pub fn bind(machine: &mut Machine, table: &mut ProcessTable, pid: Pid) -> SimResult<()> {
    let slot = machine
        .threads_mut()
        .find(|(_, _, _, t)| !t.is_bound())
        .map(|(ci, ki, ti, _)| (ci, ki, ti));

    let (ci, ki, ti) = slot.ok_or(SimError::BindFailure { pid })?;
    let pcb = table.get_mut(pid).ok_or(SimError::BindFailure { pid })?;

    let first_dispatch = pcb.context.pc == 0 && pcb.state != ProcessState::Running;
    let entry_pc = if first_dispatch {
        pcb.memory_map.map(|m| m.code_vaddr).unwrap_or(0)
    } else {
        pcb.context.pc
    };

    let thread = &mut machine.cpus[ci].cores[ki].hw_threads[ti];
    thread.registers = pcb.context.registers;
    thread.pc = entry_pc;
    thread.ir = pcb.context.ir;
    thread.tlb.flush();
    thread.bound_pid = Some(pid);

    Ok(())
}

/// Unbind whichever thread currently holds `pid`, saving its registers back
/// into the PCB and compacting later occupied slots within the same core so
/// `current_pcb_count` stays a prefix count (§4.6).
pub fn unbind(machine: &mut Machine, table: &mut ProcessTable, pid: Pid) -> SimResult<()> {
    let location = machine
        .threads()
        .find(|(_, _, _, t)| t.bound_pid == Some(pid))
        .map(|(ci, ki, ti, _)| (ci, ki, ti));

    let (ci, ki, ti) = location.ok_or(SimError::BindFailure { pid })?;

    {
        let thread = &machine.cpus[ci].cores[ki].hw_threads[ti];
        if let Some(pcb) = table.get_mut(pid) {
            pcb.context.registers = thread.registers;
            pcb.context.pc = thread.pc;
            pcb.context.ir = thread.ir;
        }
    }

    let core = &mut machine.cpus[ci].cores[ki];
    core.hw_threads[ti].bound_pid = None;
    core.hw_threads[ti].tlb.flush();
    compact_core(core);

    Ok(())
}

/// Slide occupied slots to the front of the core's thread array, preserving
/// their relative order, so that `current_pcb_count` is always a prefix.
fn compact_core(core: &mut crate::machine::topology::Core) {
    let mut write = 0;
    for read in 0..core.hw_threads.len() {
        if core.hw_threads[read].is_bound() {
            if write != read {
                core.hw_threads.swap(write, read);
            }
            write += 1;
        }
    }
}
