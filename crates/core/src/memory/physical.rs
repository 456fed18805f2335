//! Flat physical memory, the frame allocator, and the kernel arena.
//!
//! Physical memory is a single word array addressed by a 24-bit byte bus
//! (§3). The first [`KERNEL_ARENA_FRAMES`] frames are reserved at
//! construction time as a bump arena for page tables; everything past that
//! is available to the frame allocator for user pages.

use crate::error::{SimError, SimResult};

/// Size of a word in bytes.
pub const WORD_BYTES: u32 = 4;
/// Size of a physical frame / virtual page in bytes.
pub const FRAME_SIZE: u32 = 4096;
/// Total addressable bytes on the 24-bit bus.
pub const ADDRESS_BUS_BYTES: u32 = 1 << 24;
/// Total words backing physical memory.
pub const TOTAL_WORDS: usize = (ADDRESS_BUS_BYTES / WORD_BYTES) as usize;
/// Total number of 4 KiB frames.
pub const TOTAL_FRAMES: usize = (ADDRESS_BUS_BYTES / FRAME_SIZE) as usize;
/// Frames 0..KERNEL_ARENA_FRAMES (the first 1 MiB) are reserved for the kernel arena.
pub const KERNEL_ARENA_FRAMES: usize = 256;

/// A flat word-addressable store plus a frame bitmap and kernel arena.
///
/// All accessors validate against [`ADDRESS_BUS_BYTES`]; out-of-range
/// addresses surface as [`SimError::InvalidAddress`] rather than panicking,
/// since a single misbehaving process must never destabilize the simulator.
pub struct PhysicalMemory {
    words: Vec<u32>,
    /// `true` means the frame is allocated.
    frame_bitmap: Vec<bool>,
    /// Bump pointer into the kernel arena, in bytes from the arena's start.
    arena_cursor: u32,
}

impl PhysicalMemory {
    /// Create a fresh physical memory with the kernel arena pre-marked allocated.
    pub fn new() -> Self {
        let mut frame_bitmap = vec![false; TOTAL_FRAMES];
        for frame in &mut frame_bitmap[..KERNEL_ARENA_FRAMES] {
            *frame = true;
        }
        Self {
            words: vec![0u32; TOTAL_WORDS],
            frame_bitmap,
            arena_cursor: 0,
        }
    }

    /// Read one word at a physical byte address.
    pub fn read_word(&self, addr: u32) -> SimResult<u32> {
        let index = Self::word_index(addr)?;
        Ok(self.words[index])
    }

    /// Write one word at a physical byte address.
    pub fn write_word(&mut self, addr: u32, value: u32) -> SimResult<()> {
        let index = Self::word_index(addr)?;
        self.words[index] = value;
        Ok(())
    }

    fn word_index(addr: u32) -> SimResult<usize> {
        if addr >= ADDRESS_BUS_BYTES || addr % WORD_BYTES != 0 {
            return Err(SimError::InvalidAddress { addr });
        }
        Ok((addr / WORD_BYTES) as usize)
    }

    /// Allocate a free frame outside the kernel arena; returns its frame index.
    pub fn allocate_frame(&mut self) -> SimResult<u32> {
        let found = self.frame_bitmap[KERNEL_ARENA_FRAMES..]
            .iter()
            .position(|&used| !used)
            .map(|offset| offset + KERNEL_ARENA_FRAMES);
        match found {
            Some(frame) => {
                self.frame_bitmap[frame] = true;
                self.zero_frame(frame as u32);
                Ok(frame as u32)
            }
            None => Err(SimError::NoFreeFrames),
        }
    }

    /// Release a previously allocated user-range frame back to the bitmap.
    ///
    /// Releasing a kernel-arena frame is rejected: the arena is never
    /// reclaimed within a simulator run.
    pub fn release_frame(&mut self, frame: u32) -> SimResult<()> {
        let frame = frame as usize;
        if frame < KERNEL_ARENA_FRAMES || frame >= TOTAL_FRAMES {
            return Err(SimError::InvalidAddress {
                addr: frame as u32 * FRAME_SIZE,
            });
        }
        self.frame_bitmap[frame] = false;
        Ok(())
    }

    /// `true` iff the given frame is currently marked allocated.
    pub fn is_frame_allocated(&self, frame: u32) -> bool {
        self.frame_bitmap
            .get(frame as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Bump-allocate `bytes` worth of space from the kernel arena, rounded up
    /// to a whole number of words. Used by the loader to carve out page
    /// tables (§4.4).
    pub fn arena_alloc(&mut self, bytes: u32) -> SimResult<u32> {
        let aligned = bytes.div_ceil(WORD_BYTES) * WORD_BYTES;
        let arena_bytes = (KERNEL_ARENA_FRAMES as u32) * FRAME_SIZE;
        let base = self.arena_cursor;
        let end = base
            .checked_add(aligned)
            .ok_or(SimError::KernelArenaExhausted)?;
        if end > arena_bytes {
            return Err(SimError::KernelArenaExhausted);
        }
        self.arena_cursor = end;
        Ok(base)
    }

    fn zero_frame(&mut self, frame: u32) {
        let base = (frame * FRAME_SIZE / WORD_BYTES) as usize;
        let words_per_frame = (FRAME_SIZE / WORD_BYTES) as usize;
        for word in &mut self.words[base..base + words_per_frame] {
            *word = 0;
        }
    }
}

impl Default for PhysicalMemory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_arena_is_preallocated() {
        let pm = PhysicalMemory::new();
        for frame in 0..KERNEL_ARENA_FRAMES as u32 {
            assert!(pm.is_frame_allocated(frame));
        }
        assert!(!pm.is_frame_allocated(KERNEL_ARENA_FRAMES as u32));
    }

    #[test]
    fn allocate_never_returns_kernel_arena() {
        let mut pm = PhysicalMemory::new();
        let frame = pm.allocate_frame().unwrap();
        assert!(frame >= KERNEL_ARENA_FRAMES as u32);
    }

    #[test]
    fn release_then_reallocate_reuses_frame() {
        let mut pm = PhysicalMemory::new();
        let frame = pm.allocate_frame().unwrap();
        pm.release_frame(frame).unwrap();
        assert!(!pm.is_frame_allocated(frame));
        let reused = pm.allocate_frame().unwrap();
        assert_eq!(reused, frame);
    }

    #[test]
    fn release_of_kernel_frame_is_rejected() {
        let mut pm = PhysicalMemory::new();
        assert!(pm.release_frame(0).is_err());
    }

    #[test]
    fn read_write_round_trip() {
        let mut pm = PhysicalMemory::new();
        let addr = KERNEL_ARENA_FRAMES as u32 * FRAME_SIZE;
        pm.write_word(addr, 0xDEAD_BEEF).unwrap();
        assert_eq!(pm.read_word(addr).unwrap(), 0xDEAD_BEEF);
    }

    #[test]
    fn out_of_bus_access_is_invalid_address() {
        let pm = PhysicalMemory::new();
        assert!(matches!(
            pm.read_word(ADDRESS_BUS_BYTES),
            Err(SimError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn arena_exhaustion_is_reported() {
        let mut pm = PhysicalMemory::new();
        let arena_bytes = KERNEL_ARENA_FRAMES as u32 * FRAME_SIZE;
        pm.arena_alloc(arena_bytes).unwrap();
        assert!(matches!(
            pm.arena_alloc(WORD_BYTES),
            Err(SimError::KernelArenaExhausted)
        ));
    }
}
