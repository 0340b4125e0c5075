//! Guest calling-convention argument marshalling.
//!
//! [`ArgCursor`] walks the guest's integer argument registers in order and is
//! handed to the guest-format interpreters. The interpreters themselves (the
//! printf-style formatter and the mbuf dumper) live outside this crate; only
//! their invocation contract is defined here.

use std::io;

use crate::arch::NUM_ARG_REGS;
use crate::context::RegFile;

/// Ordered cursor over the guest's integer argument registers (a0..a5).
///
/// Arguments past the register window spill to the guest stack; walking those
/// is the format interpreter's concern and outside this contract.
#[derive(Debug, Clone)]
pub struct ArgCursor<'a> {
    regs: &'a RegFile,
    index: usize,
}

impl<'a> ArgCursor<'a> {
    /// Start a cursor at the first argument register.
    pub fn new(regs: &'a RegFile) -> Self {
        Self { regs, index: 0 }
    }

    /// Consume and return the next argument, or `None` past the register
    /// window.
    pub fn next_u64(&mut self) -> Option<u64> {
        if self.index < NUM_ARG_REGS {
            let value = self.regs.arg(self.index);
            self.index += 1;
            Some(value)
        } else {
            None
        }
    }

    /// Number of register arguments not yet consumed.
    pub fn remaining(&self) -> usize {
        NUM_ARG_REGS - self.index
    }
}

impl Iterator for ArgCursor<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        self.next_u64()
    }
}

/// Guest printf-style format interpreter.
///
/// The first argument conventionally points at the format string in guest
/// memory; interpretation of the remaining arguments is entirely the
/// implementor's.
pub trait GuestPrintf {
    /// Render one guest printf call to the diagnostic sink.
    fn printf(&mut self, args: ArgCursor<'_>, out: &mut dyn io::Write) -> io::Result<()>;
}

/// Guest network-buffer (mbuf) structure dumper.
///
/// Interprets one argument as a pointer to an mbuf descriptor in simulated
/// memory and renders its fields.
pub trait MbufDumper {
    /// Render one mbuf chain to the diagnostic sink.
    fn dump_mbuf(&mut self, args: ArgCursor<'_>, out: &mut dyn io::Write) -> io::Result<()>;
}
