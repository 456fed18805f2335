//! The four-opcode instruction engine (§4.5).
//!
//! A step fetches one word through the MMU at the thread's PC, decodes it,
//! and executes it. Any failure here — a page fault, an invalid opcode — is
//! local to the owning PCB: it is marked [`ProcessState::Terminated`] and the
//! step returns, leaving every other PCB undisturbed.

use tracing::warn;

use crate::error::SimError;
use crate::machine::topology::HwThread;
use crate::memory::{mmu_read, mmu_write, PhysicalMemory};
use crate::pcb::Pcb;

const OPCODE_LD: u32 = 0x0;
const OPCODE_ST: u32 = 0x1;
const OPCODE_ADD: u32 = 0x2;
const OPCODE_EXIT: u32 = 0xF;

/// Execute exactly one instruction cycle for `pcb` on `thread`.
///
/// A no-op if the PCB is already terminated or has no page table (the
/// process generator's synthetic, codeless PCBs fall in the latter case and
/// simply ride out their TTL without executing anything).
pub fn step(physical: &mut PhysicalMemory, pcb: &mut Pcb, thread: &mut HwThread) {
    if pcb.is_terminated_state() {
        return;
    }
    let Some(page_table) = pcb.page_table.as_mut() else {
        return;
    };
    let pid = pcb.pid;

    let word = match mmu_read(physical, page_table, pid, thread.pc) {
        Ok(word) => word,
        Err(err) => {
            warn!(pid, pc = thread.pc, "{err}");
            pcb.terminate();
            return;
        }
    };
    thread.ir = word;
    let opcode = (word >> 28) & 0xF;

    match opcode {
        OPCODE_LD => {
            let reg = ((word >> 24) & 0xF) as usize;
            let addr = word & 0x00FF_FFFF;
            match mmu_read(physical, page_table, pid, addr) {
                Ok(value) => {
                    thread.registers[reg] = value;
                    thread.pc += 4;
                }
                Err(err) => {
                    warn!(pid, addr, "{err}");
                    pcb.terminate();
                }
            }
        }
        OPCODE_ST => {
            let reg = ((word >> 24) & 0xF) as usize;
            let addr = word & 0x00FF_FFFF;
            let value = thread.registers[reg];
            match mmu_write(physical, page_table, pid, addr, value) {
                Ok(()) => thread.pc += 4,
                Err(err) => {
                    warn!(pid, addr, "{err}");
                    pcb.terminate();
                }
            }
        }
        OPCODE_ADD => {
            let dst = ((word >> 24) & 0xF) as usize;
            let src1 = ((word >> 20) & 0xF) as usize;
            let src2 = ((word >> 16) & 0xF) as usize;
            let lhs = thread.registers[src1] as i32;
            let rhs = thread.registers[src2] as i32;
            thread.registers[dst] = lhs.wrapping_add(rhs) as u32;
            thread.pc += 4;
        }
        OPCODE_EXIT => {
            pcb.terminate();
        }
        other => {
            let err = SimError::InvalidOpcode {
                pid,
                opcode: other as u8,
            };
            warn!(pid, "{err}");
            pcb.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{PageTable, PteFlags};
    use crate::pcb::MemoryMap;

    fn setup(program: &[u32], data: &[u32]) -> (PhysicalMemory, Pcb, HwThread) {
        let mut physical = PhysicalMemory::new();
        let mut page_table = PageTable::allocate(&mut physical, 2).unwrap();

        let code_frame = physical.allocate_frame().unwrap();
        page_table
            .map_page(0, code_frame, PteFlags::RW | PteFlags::USER)
            .unwrap();
        for (i, word) in program.iter().enumerate() {
            physical
                .write_word(code_frame * 4096 + (i as u32) * 4, *word)
                .unwrap();
        }

        let data_frame = physical.allocate_frame().unwrap();
        page_table
            .map_page(1, data_frame, PteFlags::RW | PteFlags::USER)
            .unwrap();
        for (i, word) in data.iter().enumerate() {
            physical
                .write_word(data_frame * 4096 + (i as u32) * 4, *word)
                .unwrap();
        }

        let mut pcb = Pcb::new(1, 0, 100);
        pcb.memory_map = Some(MemoryMap {
            code_vaddr: 0,
            data_vaddr: 0x1000,
        });
        pcb.page_table = Some(page_table);

        let mut thread = HwThread::new();
        thread.pc = 0;
        thread.bound_pid = Some(1);

        (physical, pcb, thread)
    }

    #[test]
    fn ld_loads_register_from_data_segment() {
        // LD r0, 0x1000 (vaddr of the data segment's first word)
        let (mut physical, mut pcb, mut thread) = setup(&[0x0000_1000], &[42]);
        step(&mut physical, &mut pcb, &mut thread);
        assert_eq!(thread.registers[0], 42);
        assert_eq!(thread.pc, 4);
    }

    #[test]
    fn st_stores_register_to_data_segment() {
        // ST r0, 0x1000
        let (mut physical, mut pcb, mut thread) = setup(&[0x1000_1000], &[0]);
        thread.registers[0] = 99;
        step(&mut physical, &mut pcb, &mut thread);
        let data_frame = pcb.page_table.as_ref().unwrap().entry(1).unwrap().frame();
        let value = physical.read_word(data_frame * 4096).unwrap();
        assert_eq!(value, 99);
    }

    #[test]
    fn add_wraps_on_signed_overflow() {
        // ADD r2, r0, r1
        let (mut physical, mut pcb, mut thread) = setup(&[0x2201_0000], &[]);
        thread.registers[0] = i32::MAX as u32;
        thread.registers[1] = 1;
        step(&mut physical, &mut pcb, &mut thread);
        assert_eq!(thread.registers[2], i32::MIN as u32);
        assert_eq!(thread.pc, 4);
    }

    #[test]
    fn exit_terminates_without_advancing_pc() {
        let (mut physical, mut pcb, mut thread) = setup(&[0xF000_0000], &[]);
        step(&mut physical, &mut pcb, &mut thread);
        assert!(pcb.is_terminated());
        assert_eq!(thread.pc, 0);
    }

    #[test]
    fn invalid_opcode_terminates_the_pcb() {
        let (mut physical, mut pcb, mut thread) = setup(&[0x5000_0000], &[]);
        step(&mut physical, &mut pcb, &mut thread);
        assert!(pcb.is_terminated());
    }

    #[test]
    fn page_fault_terminates_only_the_offending_pcb() {
        // LD r0, 0x2000 -- vpn 2 is outside this 2-page table.
        let (mut physical, mut pcb, mut thread) = setup(&[0x0000_2000], &[]);
        step(&mut physical, &mut pcb, &mut thread);
        assert!(pcb.is_terminated());
    }

    #[test]
    fn step_on_terminated_pcb_is_a_no_op() {
        let (mut physical, mut pcb, mut thread) = setup(&[0x2201_0000], &[]);
        pcb.terminate();
        let pc_before = thread.pc;
        step(&mut physical, &mut pcb, &mut thread);
        assert_eq!(thread.pc, pc_before);
    }

    #[test]
    fn expired_ttl_still_gets_its_guaranteed_step() {
        // ADD r2, r0, r1 -- ttl hit zero this tick, but state is still Waiting,
        // so the instruction must still execute.
        let (mut physical, mut pcb, mut thread) = setup(&[0x2201_0000], &[]);
        pcb.ttl = 0;
        thread.registers[0] = 2;
        thread.registers[1] = 3;
        step(&mut physical, &mut pcb, &mut thread);
        assert_eq!(thread.registers[2], 5);
        assert_eq!(thread.pc, 4);
    }

    #[test]
    fn codeless_pcb_step_is_a_no_op() {
        let mut physical = PhysicalMemory::new();
        let mut pcb = Pcb::new(1, 0, 10);
        let mut thread = HwThread::new();
        step(&mut physical, &mut pcb, &mut thread);
        assert!(!pcb.is_terminated());
    }
}
