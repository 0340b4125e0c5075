//! Guest architecture conventions.
//!
//! Register indices, instruction width and kernel-segment layout for the
//! Alpha-like 64-bit guest. Handlers read and write the simulated register
//! file through these names rather than raw indices.

/// Number of integer registers in the guest register file.
pub const NUM_INT_REGS: usize = 32;

/// Integer return-value register (v0).
pub const RETURN_VALUE_REG: usize = 0;

/// First integer argument register (a0). Arguments a0..a5 occupy
/// `ARG_REG_BASE..ARG_REG_BASE + NUM_ARG_REGS`.
pub const ARG_REG_BASE: usize = 16;

/// Number of integer argument registers before arguments spill to the stack.
pub const NUM_ARG_REGS: usize = 6;

/// Return-address register (ra).
pub const RETURN_ADDRESS_REG: usize = 26;

/// Width of one guest instruction in bytes.
pub const MACH_INST_BYTES: u64 = 4;

/// Base of the direct-mapped kernel segment (k0seg).
pub const K0SEG_BASE: u64 = 0xffff_fc00_0000_0000;

/// Base of the next kernel segment (k1seg); upper bound of k0seg.
pub const K1SEG_BASE: u64 = 0xffff_fe00_0000_0000;

/// Implemented physical address bits (40-bit physical address space).
pub const PA_IMPL_MASK: u64 = 0x00ff_ffff_ffff;

/// Translate a k0seg virtual address to its physical address.
///
/// k0seg is direct-mapped: translation strips the segment base rather than
/// walking a page table.
#[inline]
pub fn k0seg_to_phys(va: u64) -> u64 {
    va & !K0SEG_BASE
}

/// Check whether a virtual address lies inside k0seg.
#[inline]
pub fn in_k0seg(va: u64) -> bool {
    (K0SEG_BASE..K1SEG_BASE).contains(&va)
}
