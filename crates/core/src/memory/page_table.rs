//! Per-process page tables, allocated in the kernel arena.

use bitflags::bitflags;

use crate::error::{SimError, SimResult};
use crate::memory::physical::{PhysicalMemory, FRAME_SIZE};

bitflags! {
    /// Permission and status bits carried by a single page-table entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PteFlags: u8 {
        const PRESENT  = 0b0001_0000;
        const RW       = 0b0000_1000;
        const USER     = 0b0000_0100;
        const ACCESSED = 0b0000_0010;
        const DIRTY    = 0b0000_0001;
    }
}

/// One virtual-page mapping: a 12-bit frame number plus the flag bits.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageTableEntry {
    frame: u16,
    flags: PteFlags,
}

impl Default for PteFlags {
    fn default() -> Self {
        PteFlags::empty()
    }
}

impl PageTableEntry {
    pub fn present(&self) -> bool {
        self.flags.contains(PteFlags::PRESENT)
    }

    pub fn frame(&self) -> u32 {
        self.frame as u32
    }

    pub fn flags(&self) -> PteFlags {
        self.flags
    }

    fn map(&mut self, frame: u32, flags: PteFlags) {
        self.frame = frame as u16;
        self.flags = flags | PteFlags::PRESENT;
    }

    fn mark_accessed(&mut self) {
        self.flags |= PteFlags::ACCESSED;
    }

    fn mark_dirty(&mut self) {
        self.flags |= PteFlags::ACCESSED | PteFlags::DIRTY;
    }
}

/// A process's virtual-to-physical map, one entry per virtual page.
///
/// The entry array itself lives in ordinary Rust heap memory (not inside the
/// simulated physical address space); only the kernel-arena *bytes* it
/// notionally consumes are accounted for via [`PhysicalMemory::arena_alloc`]
/// at construction time, matching the original's "page table lives in the
/// kernel arena" placement without requiring a second indirection through
/// the word array for every translation.
#[derive(Debug)]
pub struct PageTable {
    entries: Vec<PageTableEntry>,
    /// Byte offset into the kernel arena this table was carved from, kept
    /// for diagnostics and for the one-page-table-per-process invariant.
    arena_base: u32,
}

impl PageTable {
    /// Allocate a table with `num_pages` entries from the kernel arena.
    pub fn allocate(physical: &mut PhysicalMemory, num_pages: u32) -> SimResult<Self> {
        let bytes_per_entry = 4u32;
        let arena_base = physical.arena_alloc(num_pages * bytes_per_entry)?;
        Ok(Self {
            entries: vec![PageTableEntry::default(); num_pages as usize],
            arena_base,
        })
    }

    pub fn num_pages(&self) -> u32 {
        self.entries.len() as u32
    }

    pub fn arena_base(&self) -> u32 {
        self.arena_base
    }

    pub fn entry(&self, vpn: u32) -> Option<&PageTableEntry> {
        self.entries.get(vpn as usize)
    }

    /// Map a virtual page to a physical frame with the given permission bits.
    pub fn map_page(&mut self, vpn: u32, frame: u32, flags: PteFlags) -> SimResult<()> {
        let entry = self
            .entries
            .get_mut(vpn as usize)
            .ok_or(SimError::KernelArenaExhausted)?;
        entry.map(frame, flags);
        Ok(())
    }

    /// All currently-present frames, for release-on-destroy and the
    /// frame-bitmap consistency invariant (§8).
    pub fn present_frames(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries
            .iter()
            .filter(|e| e.present())
            .map(|e| e.frame())
    }

    pub(crate) fn mark_accessed(&mut self, vpn: u32) {
        if let Some(e) = self.entries.get_mut(vpn as usize) {
            e.mark_accessed();
        }
    }

    pub(crate) fn mark_dirty(&mut self, vpn: u32) {
        if let Some(e) = self.entries.get_mut(vpn as usize) {
            e.mark_dirty();
        }
    }
}

/// Split a virtual address into (virtual page number, intra-page offset).
pub fn split_virtual_address(vaddr: u32) -> (u32, u32) {
    (vaddr / FRAME_SIZE, vaddr % FRAME_SIZE)
}
