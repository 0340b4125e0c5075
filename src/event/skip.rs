//! Function-skip handler.
//!
//! Elides a kernel function body: execution resumes at the caller's return
//! address as if the function had returned, and the branch predictor's
//! return-address stack is rebalanced since the natural return never happens.

use crate::arch::MACH_INST_BYTES;
use crate::context::ExecContext;
use crate::system::System;
use crate::trace::TraceCategory;

/// Skips a kernel function by synthesizing its return.
#[derive(Debug, Clone)]
pub struct SkipFuncEvent {
    /// Name of the elided function, for diagnostics.
    pub description: String,
}

impl SkipFuncEvent {
    /// Create a skip handler for the named function.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// Redirect the thread to its return address.
    ///
    /// Sets PC to the return-address register and NPC one instruction past
    /// it, then pops the predictor's return stack for this thread. Always
    /// succeeds; only PC/NPC and predictor state change.
    pub fn process(&self, xc: &mut ExecContext, sys: &mut System) {
        let newpc = xc.regs.return_address();

        if sys.trace.enabled(TraceCategory::PcEvent) {
            log::debug!(
                target: "pcevent",
                "skipping {}: pc={:#x}, newpc={:#x}",
                self.description,
                xc.regs.pc,
                newpc
            );
        }

        xc.regs.pc = newpc;
        xc.regs.npc = newpc + MACH_INST_BYTES;

        sys.pop_ras(xc.thread_num);
    }
}
