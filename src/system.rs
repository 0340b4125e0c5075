//! The owning simulated system and its boundary interfaces.
//!
//! Handlers never talk to the memory controller, branch predictor or format
//! interpreters directly; all of those reach the core as injected trait
//! objects held by [`System`]. The system also owns the cross-cutting
//! profiling resources: the named aggregation bins, the call-graph oracle and
//! the system-wide kernel-call counter.

use std::io::{self, Write};

use crate::args::{ArgCursor, GuestPrintf, MbufDumper};
use crate::context::ExecContext;
use crate::trace::TraceConfig;

#[cfg(feature = "profiling")]
use std::collections::HashMap;

/// Memory-validity oracle, answered by the simulated memory controller.
pub trait MemValidity {
    /// True if the physical address is not backed by simulated memory.
    fn bad_addr(&self, paddr: u64) -> bool;
}

/// The branch predictor's return-address stack.
pub trait ReturnStack {
    /// Discard the most recently pushed return-address entry for a thread.
    fn pop_ras(&mut self, thread_num: usize);
}

/// Guest kernel call-graph oracle.
///
/// Decides whether an incoming profiled entry continues the current call
/// path. Injected at configuration time; tests supply a fixed fake.
pub trait CallGraph {
    /// True if `caller` may legitimately call `callee` in the guest kernel.
    fn is_caller(&self, callee: &str, caller: &str) -> bool;

    /// True if `callee` is a valid head of a call path (callable with no
    /// guest caller). Defaults to the empty-caller query.
    fn is_entry_point(&self, callee: &str) -> bool {
        self.is_caller(callee, "")
    }
}

/// Identifier of a [`Bin`] within the owning system, resolved once at
/// profiling-handler construction.
#[cfg(feature = "profiling")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinId(usize);

/// A named aggregation bucket attributing simulated activity to a call path.
///
/// Handlers only ever activate a bin; reading it back is the aggregation
/// system's business.
#[cfg(feature = "profiling")]
#[derive(Debug)]
pub struct Bin {
    /// Bin name, matching the profiled function's registration description.
    pub name: String,
    /// How many times this bin has been put on the active call path.
    pub activations: u64,
}

/// Call-path accounting state, present only on systems configured for it.
#[cfg(feature = "profiling")]
struct Profiling {
    bins: Vec<Bin>,
    by_name: HashMap<String, BinId>,
    call_graph: Box<dyn CallGraph>,
    fn_calls: u64,
}

/// The simulated system owning the execution contexts this core serves.
pub struct System {
    name: String,
    /// Current simulated time, used to prefix diagnostic output.
    pub cur_tick: u64,
    /// Trace category switches.
    pub trace: TraceConfig,
    mem: Box<dyn MemValidity>,
    bpred: Option<Box<dyn ReturnStack>>,
    printf: Option<Box<dyn GuestPrintf>>,
    mbuf: Option<Box<dyn MbufDumper>>,
    sink: Box<dyn Write>,
    #[cfg(feature = "profiling")]
    profiling: Option<Profiling>,
}

impl System {
    /// Create a system around the given memory-validity oracle.
    ///
    /// Diagnostic output goes to stdout until [`System::set_sink`] replaces
    /// it; no branch predictor, format interpreters or profiling are attached.
    pub fn new(name: impl Into<String>, mem: Box<dyn MemValidity>) -> Self {
        Self {
            name: name.into(),
            cur_tick: 0,
            trace: TraceConfig::default(),
            mem,
            bpred: None,
            printf: None,
            mbuf: None,
            sink: Box::new(io::stdout()),
            #[cfg(feature = "profiling")]
            profiling: None,
        }
    }

    /// System name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attach the branch predictor's return-address stack.
    pub fn set_branch_pred(&mut self, bpred: Box<dyn ReturnStack>) {
        self.bpred = Some(bpred);
    }

    /// Attach the guest printf format interpreter.
    pub fn set_printf(&mut self, printf: Box<dyn GuestPrintf>) {
        self.printf = Some(printf);
    }

    /// Attach the guest mbuf dumper.
    pub fn set_mbuf_dumper(&mut self, mbuf: Box<dyn MbufDumper>) {
        self.mbuf = Some(mbuf);
    }

    /// Redirect diagnostic output.
    pub fn set_sink(&mut self, sink: Box<dyn Write>) {
        self.sink = sink;
    }

    /// Ask the memory controller whether a physical address is unbacked.
    pub fn bad_addr(&self, paddr: u64) -> bool {
        self.mem.bad_addr(paddr)
    }

    /// Pop one return-address-stack entry for a thread, if a predictor is
    /// attached.
    pub fn pop_ras(&mut self, thread_num: usize) {
        if let Some(bpred) = self.bpred.as_mut() {
            bpred.pop_ras(thread_num);
        }
    }

    /// Render one guest printf call to the diagnostic sink, optionally
    /// prefixed with simulated time and CPU identity.
    ///
    /// A missing format interpreter is reported once per call and otherwise
    /// ignored; the guest must not be able to fault the host through its
    /// logging.
    pub fn guest_printf(&mut self, xc: &ExecContext, with_prefix: bool) -> io::Result<()> {
        let Some(printf) = self.printf.as_mut() else {
            log::warn!(
                target: "printf",
                "guest printf on {} has no format interpreter attached",
                xc.cpu_name
            );
            return Ok(());
        };
        if with_prefix {
            write!(self.sink, "{}: {}: ", self.cur_tick, xc.cpu_name)?;
        }
        printf.printf(ArgCursor::new(&xc.regs), self.sink.as_mut())
    }

    /// Render one guest mbuf chain to the diagnostic sink.
    pub fn guest_dump_mbuf(&mut self, xc: &ExecContext) -> io::Result<()> {
        let Some(mbuf) = self.mbuf.as_mut() else {
            log::warn!(
                target: "debugprintf",
                "mbuf dump on {} has no dumper attached",
                xc.cpu_name
            );
            return Ok(());
        };
        mbuf.dump_mbuf(ArgCursor::new(&xc.regs), self.sink.as_mut())
    }
}

#[cfg(feature = "profiling")]
impl System {
    /// Configure this system for call-path accounting.
    ///
    /// Bins are registered afterwards with [`System::add_bin`]; profiling
    /// handlers refuse to run on a system that skipped this step.
    pub fn enable_profiling(&mut self, call_graph: Box<dyn CallGraph>) {
        self.profiling = Some(Profiling {
            bins: Vec::new(),
            by_name: HashMap::new(),
            call_graph,
            fn_calls: 0,
        });
    }

    /// True if call-path accounting was configured.
    pub fn profiling_configured(&self) -> bool {
        self.profiling.is_some()
    }

    fn profiling(&self) -> &Profiling {
        self.profiling
            .as_ref()
            .expect("call-path accounting not configured on this system")
    }

    fn profiling_mut(&mut self) -> &mut Profiling {
        self.profiling
            .as_mut()
            .expect("call-path accounting not configured on this system")
    }

    /// Register an aggregation bin. Re-registering a name returns the
    /// existing id.
    ///
    /// # Panics
    ///
    /// If profiling was never enabled; bins only exist on binned systems.
    pub fn add_bin(&mut self, name: impl Into<String>) -> BinId {
        let name = name.into();
        let prof = self.profiling_mut();
        if let Some(&id) = prof.by_name.get(&name) {
            return id;
        }
        let id = BinId(prof.bins.len());
        prof.by_name.insert(name.clone(), id);
        prof.bins.push(Bin {
            name,
            activations: 0,
        });
        id
    }

    /// Look up a bin by name.
    pub fn find_bin(&self, name: &str) -> Option<BinId> {
        self.profiling
            .as_ref()
            .and_then(|prof| prof.by_name.get(name).copied())
    }

    /// Inspect a bin.
    pub fn bin(&self, id: BinId) -> &Bin {
        &self.profiling().bins[id.0]
    }

    /// Put a bin on the active call path (fire-and-forget toward the
    /// aggregation system).
    pub fn activate_bin(&mut self, id: BinId) {
        let bin = &mut self.profiling_mut().bins[id.0];
        bin.activations += 1;
        log::trace!(target: "callpath", "bin {} activated", bin.name);
    }

    /// System-wide count of profiled kernel calls observed.
    pub fn fn_calls(&self) -> u64 {
        self.profiling().fn_calls
    }

    /// Count one more profiled kernel call.
    pub fn bump_fn_calls(&mut self) {
        self.profiling_mut().fn_calls += 1;
    }

    /// Forward a caller-legitimacy query to the call-graph oracle.
    pub fn is_caller(&self, callee: &str, caller: &str) -> bool {
        self.profiling().call_graph.is_caller(callee, caller)
    }

    /// Forward an entry-point query to the call-graph oracle.
    pub fn is_entry_point(&self, callee: &str) -> bool {
        self.profiling().call_graph.is_entry_point(callee)
    }

    /// Diagnostic state-dump hook: log the thread's current call path.
    pub fn dump_state(&self, xc: &ExecContext) {
        if !self.trace.enabled(crate::trace::TraceCategory::CallPath) {
            return;
        }
        let Some(ctx) = xc.sw_ctx.as_ref() else {
            return;
        };
        let path: Vec<&str> = ctx.call_stack.iter().map(|call| call.name.as_str()).collect();
        log::trace!(
            target: "callpath",
            "{}: thread {} depth {} calls {} path {:?}",
            self.name,
            xc.thread_num,
            ctx.depth(),
            ctx.calls,
            path
        );
    }
}
