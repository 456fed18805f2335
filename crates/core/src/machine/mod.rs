//! Machine topology and the bind/unbind save-restore logic (§4.6).

pub mod binding;
pub mod tlb;
pub mod topology;

pub use binding::{bind, can_admit, unbind};
pub use tlb::Tlb;
pub use topology::{Core, Cpu, HwThread, Machine};
