//! Address-validation handler.
//!
//! Emulates the kernel's `badaddr` probe. The routine's cheap path (valid
//! address) is safe to execute natively, so this handler only short-circuits
//! the invalid case: it writes the failure sentinel into the return-value
//! register and synthesizes the return, exactly as the real probe's fault
//! path would.

use crate::arch::{in_k0seg, k0seg_to_phys, PA_IMPL_MASK};
use crate::context::ExecContext;
use crate::event::skip::SkipFuncEvent;
use crate::system::System;
use crate::trace::TraceCategory;

/// Guest return value signalling a bad address.
pub const BAD_ADDR_SENTINEL: u64 = 1;

/// Intercepts the kernel's address-sanity probe.
#[derive(Debug, Clone)]
pub struct BadAddrEvent {
    skip: SkipFuncEvent,
}

impl BadAddrEvent {
    /// Create a validation handler for the named probe function.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            skip: SkipFuncEvent::new(description),
        }
    }

    /// Name of the intercepted probe.
    pub fn description(&self) -> &str {
        &self.skip.description
    }

    /// Validate the probe's first argument.
    ///
    /// The address is invalid if it falls outside the direct-mapped kernel
    /// segment, or if its physical translation is unbacked. Invalid: set the
    /// return-value register to the failure sentinel and apply the full skip
    /// transformation. Valid: touch nothing and let the probe run natively.
    pub fn process(&self, xc: &mut ExecContext, sys: &mut System) {
        let a0 = xc.regs.arg(0);

        if !in_k0seg(a0) || sys.bad_addr(k0seg_to_phys(a0) & PA_IMPL_MASK) {
            if sys.trace.enabled(TraceCategory::BadAddr) {
                log::debug!(target: "badaddr", "badaddr arg={:#x} bad", a0);
            }
            xc.regs.set_return_value(BAD_ADDR_SENTINEL);
            self.skip.process(xc, sys);
        } else if sys.trace.enabled(TraceCategory::BadAddr) {
            log::debug!(target: "badaddr", "badaddr arg={:#x} good", a0);
        }
    }
}
