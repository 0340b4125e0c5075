//! Guest-output instrumentation handlers.
//!
//! These observe kernel logging routines without touching simulated state:
//! when their trace category is enabled they marshal the guest's arguments
//! and hand them to the injected format interpreter; when it is disabled they
//! cost one flag check and nothing else.

use crate::context::ExecContext;
use crate::system::System;
use crate::trace::TraceCategory;

/// Captures a guest kernel `printf`, always prefixed with simulated time and
/// CPU identity.
#[derive(Debug, Clone)]
pub struct PrintfEvent {
    /// Name of the intercepted routine.
    pub description: String,
}

impl PrintfEvent {
    /// Create a printf capture for the named routine.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// Render the call if the `Printf` category is enabled.
    pub fn process(&self, xc: &mut ExecContext, sys: &mut System) {
        if !sys.trace.enabled(TraceCategory::Printf) {
            return;
        }
        if let Err(err) = sys.guest_printf(xc, true) {
            log::warn!(target: "printf", "{}: sink write failed: {}", self.description, err);
        }
    }
}

/// Captures a guest debug-logging routine; the time/CPU prefix can be
/// suppressed per registration.
#[derive(Debug, Clone)]
pub struct DebugPrintfEvent {
    /// Name of the intercepted routine.
    pub description: String,
    /// Suppress the time/CPU prefix (for routines that emit partial lines).
    pub raw: bool,
}

impl DebugPrintfEvent {
    /// Create a prefixed debug-printf capture.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            raw: false,
        }
    }

    /// Create an unprefixed (raw) debug-printf capture.
    pub fn new_raw(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            raw: true,
        }
    }

    /// Render the call if the `DebugPrintf` category is enabled.
    pub fn process(&self, xc: &mut ExecContext, sys: &mut System) {
        if !sys.trace.enabled(TraceCategory::DebugPrintf) {
            return;
        }
        if let Err(err) = sys.guest_printf(xc, !self.raw) {
            log::warn!(target: "debugprintf", "{}: sink write failed: {}", self.description, err);
        }
    }
}

/// Dumps a guest network-buffer chain via the injected mbuf dumper.
#[derive(Debug, Clone)]
pub struct DumpMbufEvent {
    /// Name of the intercepted routine.
    pub description: String,
}

impl DumpMbufEvent {
    /// Create an mbuf-dump capture for the named routine.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    /// Render the chain if the `DebugPrintf` category is enabled.
    pub fn process(&self, xc: &mut ExecContext, sys: &mut System) {
        if !sys.trace.enabled(TraceCategory::DebugPrintf) {
            return;
        }
        if let Err(err) = sys.guest_dump_mbuf(xc) {
            log::warn!(target: "debugprintf", "{}: sink write failed: {}", self.description, err);
        }
    }
}
