//! A 16-entry round-robin TLB, an optimization hook rather than a
//! correctness requirement (§4.3): the MMU translator never consults it.
//! Every hardware thread carries one and it is flushed on every bind.

pub const TLB_SIZE: usize = 16;

#[derive(Debug, Clone, Copy)]
struct TlbEntry {
    virtual_page: u32,
    physical_frame: u32,
    valid: bool,
}

impl Default for TlbEntry {
    fn default() -> Self {
        Self {
            virtual_page: 0,
            physical_frame: 0,
            valid: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tlb {
    entries: [TlbEntry; TLB_SIZE],
    next_replace: usize,
}

impl Tlb {
    pub fn new() -> Self {
        Self {
            entries: [TlbEntry::default(); TLB_SIZE],
            next_replace: 0,
        }
    }

    pub fn flush(&mut self) {
        self.entries = [TlbEntry::default(); TLB_SIZE];
        self.next_replace = 0;
    }

    pub fn lookup(&self, vpn: u32) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.valid && e.virtual_page == vpn)
            .map(|e| e.physical_frame)
    }

    pub fn insert(&mut self, vpn: u32, frame: u32) {
        self.entries[self.next_replace] = TlbEntry {
            virtual_page: vpn,
            physical_frame: frame,
            valid: true,
        };
        self.next_replace = (self.next_replace + 1) % TLB_SIZE;
    }
}

impl Default for Tlb {
    fn default() -> Self {
        Self::new()
    }
}
