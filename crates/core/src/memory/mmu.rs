//! The MMU translator: virtual address in, physical word in or out.

use crate::error::{SimError, SimResult};
use crate::memory::page_table::{split_virtual_address, PageTable};
use crate::memory::physical::PhysicalMemory;
use crate::pcb::Pid;

/// Translate `vaddr` through `page_table` and read the resulting word.
///
/// Sets the entry's `accessed` bit on success. A non-present page is a
/// [`SimError::PageFault`], fatal for the owning process but never for the
/// simulator as a whole.
pub fn mmu_read(
    physical: &PhysicalMemory,
    page_table: &mut PageTable,
    pid: Pid,
    vaddr: u32,
) -> SimResult<u32> {
    let phys_addr = translate(page_table, pid, vaddr)?;
    page_table.mark_accessed(vaddr / crate::memory::physical::FRAME_SIZE);
    physical.read_word(phys_addr)
}

/// Translate `vaddr` through `page_table` and write `value` there.
///
/// Sets the entry's `accessed` and `dirty` bits on success.
pub fn mmu_write(
    physical: &mut PhysicalMemory,
    page_table: &mut PageTable,
    pid: Pid,
    vaddr: u32,
    value: u32,
) -> SimResult<()> {
    let phys_addr = translate(page_table, pid, vaddr)?;
    page_table.mark_dirty(vaddr / crate::memory::physical::FRAME_SIZE);
    physical.write_word(phys_addr, value)
}

fn translate(page_table: &PageTable, pid: Pid, vaddr: u32) -> SimResult<u32> {
    let (vpn, offset) = split_virtual_address(vaddr);
    let entry = page_table.entry(vpn);
    match entry {
        Some(entry) if entry.present() => {
            Ok((entry.frame() << 12) | offset)
        }
        _ => Err(SimError::PageFault { pid, vaddr }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::page_table::PteFlags;

    fn setup() -> (PhysicalMemory, PageTable) {
        let mut pm = PhysicalMemory::new();
        let pt = PageTable::allocate(&mut pm, 4).unwrap();
        (pm, pt)
    }

    #[test]
    fn write_then_read_round_trips() {
        let (mut pm, mut pt) = setup();
        let frame = pm.allocate_frame().unwrap();
        pt.map_page(0, frame, PteFlags::RW | PteFlags::USER).unwrap();

        mmu_write(&mut pm, &mut pt, 1, 0x10, 12).unwrap();
        let value = mmu_read(&pm, &mut pt, 1, 0x10).unwrap();
        assert_eq!(value, 12);
    }

    #[test]
    fn missing_page_is_a_page_fault() {
        let (pm, mut pt) = setup();
        let result = mmu_read(&pm, &mut pt, 7, 0x2000);
        assert!(matches!(result, Err(SimError::PageFault { pid: 7, .. })));
    }

    #[test]
    fn write_sets_dirty_and_accessed() {
        let (mut pm, mut pt) = setup();
        let frame = pm.allocate_frame().unwrap();
        pt.map_page(0, frame, PteFlags::RW).unwrap();
        mmu_write(&mut pm, &mut pt, 1, 0x0, 1).unwrap();
        let entry = pt.entry(0).unwrap();
        assert!(entry.flags().contains(PteFlags::DIRTY));
        assert!(entry.flags().contains(PteFlags::ACCESSED));
    }
}
