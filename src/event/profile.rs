//! Call-path profiling handler.
//!
//! The framework only intercepts function *entries*; there is no paired exit
//! event. Whether an incoming entry continues, supersedes, or is unrelated to
//! the current call path is therefore decided entirely by the call-graph
//! oracle, and an entry the oracle rejects is dropped without touching the
//! stack. Address-hit frequency can exceed profiling intent (recursion,
//! unrelated control paths reaching the same PC), so the silent drop is
//! deliberate, documented behavior.

use crate::context::{ExecContext, FnCall, SwContext};
use crate::event::HookError;
use crate::system::{BinId, System};
use crate::trace::TraceCategory;

/// Correlates entry to a profiled kernel function with its aggregation bin.
#[derive(Debug, Clone)]
pub struct FnEvent {
    name: String,
    bin: BinId,
}

impl FnEvent {
    /// Create a profiling handler for the named function.
    ///
    /// The function's bin must already be registered with the system; a
    /// handler cannot exist without its aggregation target.
    pub fn new(name: impl Into<String>, sys: &System) -> Result<Self, HookError> {
        let name = name.into();
        let bin = sys
            .find_bin(&name)
            .ok_or_else(|| HookError::UnknownBin(name.clone()))?;
        Ok(Self { name, bin })
    }

    /// Name of the profiled function.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record entry to the profiled function.
    ///
    /// Speculative entries are discarded outright. A legitimate entry pushes
    /// a call record, activates the bin, counts the call, and requests a
    /// diagnostic state dump.
    ///
    /// # Panics
    ///
    /// If the owning system was never configured for call-path accounting.
    pub fn process(&self, xc: &mut ExecContext, sys: &mut System) {
        if xc.misspeculating {
            return;
        }
        assert!(
            sys.profiling_configured(),
            "FnEvent {} fired on a system without call-path accounting",
            self.name
        );

        if sys.trace.enabled(TraceCategory::CallPath) {
            log::debug!(target: "callpath", "{}: {} event", sys.name(), self.name);
        }

        let mut on_path = false;
        if let Some(ctx) = xc.sw_ctx.as_mut() {
            if let Some(last) = ctx.top() {
                // The stack top must be a legitimate caller of the entered
                // function; anything else is an aliased or recursive hit.
                if !sys.is_caller(&self.name, &last.name) {
                    log::trace!(
                        target: "callpath",
                        "dropping {}: {} is not its caller",
                        self.name,
                        last.name
                    );
                    return;
                }
                ctx.calls = ctx.calls.saturating_sub(1);
                on_path = true;
            }
        }
        if !on_path {
            // Empty stack (or no context yet): only a valid path head may
            // open the call path.
            if !sys.is_entry_point(&self.name) {
                return;
            }
            if xc.sw_ctx.is_none() {
                log::trace!(target: "callpath", "creating software context for {}", self.name);
                xc.sw_ctx = Some(SwContext::default());
            }
        }

        let ctx = xc.sw_ctx.get_or_insert_with(SwContext::default);
        log::trace!(target: "callpath", "adding fn {} to context", self.name);
        ctx.call_stack.push(FnCall {
            name: self.name.clone(),
            bin: self.bin,
        });

        sys.activate_bin(self.bin);
        sys.bump_fn_calls();
        sys.dump_state(xc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::tests::TestMem;
    use crate::system::CallGraph;

    /// Fixed call graph: netisr_thread is the only path head; it calls
    /// ip_input, which calls tcp_input and (recursively) itself. bcopy is
    /// binned but unreachable on this graph.
    struct FixedGraph;

    impl CallGraph for FixedGraph {
        fn is_caller(&self, callee: &str, caller: &str) -> bool {
            matches!(
                (caller, callee),
                ("", "netisr_thread")
                    | ("netisr_thread", "ip_input")
                    | ("ip_input", "tcp_input")
                    | ("ip_input", "ip_input")
            )
        }
    }

    fn binned_system() -> System {
        let mut sys = System::new("tlaser", Box::new(TestMem::all_backed()));
        sys.enable_profiling(Box::new(FixedGraph));
        for name in ["netisr_thread", "ip_input", "tcp_input", "bcopy"] {
            sys.add_bin(name);
        }
        sys
    }

    fn event(sys: &System, name: &str) -> FnEvent {
        FnEvent::new(name, sys).unwrap()
    }

    fn stack_names(xc: &ExecContext) -> Vec<String> {
        xc.sw_ctx
            .as_ref()
            .map(|ctx| ctx.call_stack.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_construction_requires_a_resolvable_bin() {
        let sys = binned_system();
        assert!(FnEvent::new("netisr_thread", &sys).is_ok());

        let err = FnEvent::new("no_such_fn", &sys).unwrap_err();
        assert!(matches!(err, HookError::UnknownBin(name) if name == "no_such_fn"));
    }

    #[test]
    fn test_first_legitimate_entry_creates_one_context() {
        let mut sys = binned_system();
        let mut xc = ExecContext::new(0, "cpu0");

        event(&sys, "netisr_thread").process(&mut xc, &mut sys);

        assert!(xc.sw_ctx.is_some());
        assert_eq!(stack_names(&xc), ["netisr_thread"]);
        assert_eq!(sys.fn_calls(), 1);

        // A second entry reuses the context rather than replacing it.
        event(&sys, "ip_input").process(&mut xc, &mut sys);
        assert_eq!(stack_names(&xc), ["netisr_thread", "ip_input"]);
    }

    #[test]
    fn test_non_entry_point_does_not_open_a_path() {
        let mut sys = binned_system();
        let mut xc = ExecContext::new(0, "cpu0");

        // tcp_input is only reachable through ip_input.
        event(&sys, "tcp_input").process(&mut xc, &mut sys);

        assert!(xc.sw_ctx.is_none());
        assert_eq!(sys.fn_calls(), 0);
    }

    #[test]
    fn test_speculative_entry_changes_nothing() {
        let mut sys = binned_system();
        let mut xc = ExecContext::new(0, "cpu0");
        xc.misspeculating = true;

        event(&sys, "netisr_thread").process(&mut xc, &mut sys);

        assert!(xc.sw_ctx.is_none());
        assert_eq!(sys.fn_calls(), 0);
        let bin = sys.find_bin("netisr_thread").unwrap();
        assert_eq!(sys.bin(bin).activations, 0);
    }

    #[test]
    fn test_stack_discipline_with_spurious_hit() {
        let mut sys = binned_system();
        let mut xc = ExecContext::new(0, "cpu0");

        event(&sys, "netisr_thread").process(&mut xc, &mut sys);
        event(&sys, "ip_input").process(&mut xc, &mut sys);
        assert_eq!(stack_names(&xc), ["netisr_thread", "ip_input"]);

        // bcopy's entry PC is hit on an unrelated path; the oracle rejects
        // it and the stack is untouched.
        event(&sys, "bcopy").process(&mut xc, &mut sys);
        assert_eq!(stack_names(&xc), ["netisr_thread", "ip_input"]);
        assert_eq!(sys.fn_calls(), 2);
    }

    #[test]
    fn test_recursive_entry_on_graph_is_pushed() {
        let mut sys = binned_system();
        let mut xc = ExecContext::new(0, "cpu0");

        event(&sys, "netisr_thread").process(&mut xc, &mut sys);
        event(&sys, "ip_input").process(&mut xc, &mut sys);
        event(&sys, "ip_input").process(&mut xc, &mut sys);

        assert_eq!(stack_names(&xc), ["netisr_thread", "ip_input", "ip_input"]);
    }

    #[test]
    fn test_bin_activation_and_counter_follow_pushes() {
        let mut sys = binned_system();
        let mut xc = ExecContext::new(0, "cpu0");

        event(&sys, "netisr_thread").process(&mut xc, &mut sys);
        event(&sys, "ip_input").process(&mut xc, &mut sys);
        event(&sys, "tcp_input").process(&mut xc, &mut sys);

        assert_eq!(sys.fn_calls(), 3);
        let tcp = sys.find_bin("tcp_input").unwrap();
        assert_eq!(sys.bin(tcp).activations, 1);
    }

    #[test]
    fn test_contexts_are_independent_per_thread() {
        let mut sys = binned_system();
        let mut xc0 = ExecContext::new(0, "cpu0");
        let mut xc1 = ExecContext::new(1, "cpu1");

        event(&sys, "netisr_thread").process(&mut xc0, &mut sys);
        event(&sys, "ip_input").process(&mut xc0, &mut sys);
        event(&sys, "netisr_thread").process(&mut xc1, &mut sys);

        assert_eq!(stack_names(&xc0), ["netisr_thread", "ip_input"]);
        assert_eq!(stack_names(&xc1), ["netisr_thread"]);
        assert_eq!(sys.fn_calls(), 3);
    }

    #[test]
    #[should_panic(expected = "without call-path accounting")]
    fn test_unbinned_system_is_a_fatal_invariant() {
        let binned = binned_system();
        let fn_event = event(&binned, "netisr_thread");

        // Same handler fired against a system that skipped profiling setup.
        let mut plain = System::new("other", Box::new(TestMem::all_backed()));
        let mut xc = ExecContext::new(0, "cpu0");
        fn_event.process(&mut xc, &mut plain);
    }
}
