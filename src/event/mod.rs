//! PC-triggered kernel-call handlers and their dispatch contract.
//!
//! Each handler variant reacts to the simulated PC reaching the entry address
//! of a known kernel function. The variants form a closed set selected at
//! registration time; all of them share the single `process(xc, sys)`
//! contract, and the [`PcEventQueue`] drives whichever are registered at the
//! current PC.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::context::ExecContext;
use crate::system::System;

pub mod badaddr;
pub mod output;
#[cfg(feature = "profiling")]
pub mod profile;
pub mod skip;

pub use badaddr::{BadAddrEvent, BAD_ADDR_SENTINEL};
pub use output::{DebugPrintfEvent, DumpMbufEvent, PrintfEvent};
#[cfg(feature = "profiling")]
pub use profile::FnEvent;
pub use skip::SkipFuncEvent;

/// Errors raised while building handlers.
#[derive(Debug, Error)]
pub enum HookError {
    /// A profiling handler named a bin the system does not know. The handler
    /// cannot exist without its aggregation target; the caller must halt.
    #[error("no bin named {0:?} registered with the system")]
    UnknownBin(String),
}

/// One registered handler, any variant.
#[derive(Debug, Clone)]
pub enum KernelEvent {
    /// Function elision.
    SkipFunc(SkipFuncEvent),
    /// Kernel address-sanity probe.
    BadAddr(BadAddrEvent),
    /// Guest printf capture.
    Printf(PrintfEvent),
    /// Guest debug-printf capture.
    DebugPrintf(DebugPrintfEvent),
    /// Guest network-buffer dump.
    DumpMbuf(DumpMbufEvent),
    /// Call-path profiling.
    #[cfg(feature = "profiling")]
    Fn(FnEvent),
}

impl KernelEvent {
    /// React to a PC hit on the owning thread.
    pub fn process(&self, xc: &mut ExecContext, sys: &mut System) {
        match self {
            KernelEvent::SkipFunc(ev) => ev.process(xc, sys),
            KernelEvent::BadAddr(ev) => ev.process(xc, sys),
            KernelEvent::Printf(ev) => ev.process(xc, sys),
            KernelEvent::DebugPrintf(ev) => ev.process(xc, sys),
            KernelEvent::DumpMbuf(ev) => ev.process(xc, sys),
            #[cfg(feature = "profiling")]
            KernelEvent::Fn(ev) => ev.process(xc, sys),
        }
    }

    /// Human-readable description (the intercepted function's name).
    pub fn description(&self) -> &str {
        match self {
            KernelEvent::SkipFunc(ev) => &ev.description,
            KernelEvent::BadAddr(ev) => ev.description(),
            KernelEvent::Printf(ev) => &ev.description,
            KernelEvent::DebugPrintf(ev) => &ev.description,
            KernelEvent::DumpMbuf(ev) => &ev.description,
            #[cfg(feature = "profiling")]
            KernelEvent::Fn(ev) => ev.name(),
        }
    }
}

/// View of one registration: target address plus description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    /// Guest entry address the handler is keyed on.
    pub addr: u64,
    /// Intercepted function's name.
    pub description: String,
}

/// Address-keyed handler registry.
///
/// Multiple handlers may be registered at one address; they fire in
/// registration order. Registrations are immutable once made (remove and
/// re-register to change one).
#[derive(Debug, Default)]
pub struct PcEventQueue {
    events: BTreeMap<u64, Vec<KernelEvent>>,
}

impl PcEventQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler at a guest entry address.
    pub fn schedule(&mut self, addr: u64, event: KernelEvent) {
        log::debug!(
            target: "pcevent",
            "registering {} at {:#x}",
            event.description(),
            addr
        );
        self.events.entry(addr).or_default().push(event);
    }

    /// Drop every handler registered at an address; returns how many were
    /// removed.
    pub fn remove(&mut self, addr: u64) -> usize {
        self.events.remove(&addr).map_or(0, |list| list.len())
    }

    /// Run every handler registered at the thread's current PC.
    ///
    /// Handlers fire in registration order against the PC captured on entry,
    /// even if an earlier handler redirects it. Returns how many fired.
    pub fn service(&self, xc: &mut ExecContext, sys: &mut System) -> usize {
        let Some(list) = self.events.get(&xc.regs.pc) else {
            return 0;
        };
        for event in list {
            event.process(xc, sys);
        }
        list.len()
    }

    /// Total number of registered handlers.
    pub fn len(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All registrations, in address order.
    pub fn descriptors(&self) -> impl Iterator<Item = EventDescriptor> + '_ {
        self.events.iter().flat_map(|(&addr, list)| {
            list.iter().map(move |event| EventDescriptor {
                addr,
                description: event.description().to_string(),
            })
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::system::{MemValidity, ReturnStack};
    use std::cell::{Ref, RefCell, RefMut};
    use std::io::{self, Write};
    use std::rc::Rc;

    /// Memory oracle with an explicit unbacked-address list.
    pub(crate) struct TestMem {
        unbacked: Vec<u64>,
    }

    impl TestMem {
        pub fn all_backed() -> Self {
            Self { unbacked: Vec::new() }
        }

        pub fn unbacked_at(paddr: u64) -> Self {
            Self { unbacked: vec![paddr] }
        }
    }

    impl MemValidity for TestMem {
        fn bad_addr(&self, paddr: u64) -> bool {
            self.unbacked.contains(&paddr)
        }
    }

    /// Return-address stack recording which threads were popped.
    pub(crate) struct RasSpy {
        pops: Rc<RefCell<Vec<usize>>>,
    }

    impl RasSpy {
        pub fn new() -> (Self, Rc<RefCell<Vec<usize>>>) {
            let pops = Rc::new(RefCell::new(Vec::new()));
            (Self { pops: Rc::clone(&pops) }, pops)
        }
    }

    impl ReturnStack for RasSpy {
        fn pop_ras(&mut self, thread_num: usize) {
            self.pops.borrow_mut().push(thread_num);
        }
    }

    /// Diagnostic sink whose contents stay inspectable after handoff.
    #[derive(Clone, Default)]
    pub(crate) struct SharedSink(Rc<RefCell<Vec<u8>>>);

    impl SharedSink {
        pub fn new() -> (Self, Self) {
            let sink = Self::default();
            (sink.clone(), sink)
        }

        pub fn borrow(&self) -> Ref<'_, Vec<u8>> {
            self.0.borrow()
        }

        pub fn borrow_mut(&self) -> RefMut<'_, Vec<u8>> {
            self.0.borrow_mut()
        }
    }

    impl Write for SharedSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn skip_at(name: &str) -> KernelEvent {
        KernelEvent::SkipFunc(SkipFuncEvent::new(name))
    }

    #[test]
    fn test_service_fires_only_on_exact_pc_match() {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut sys = System::new("tlaser", Box::new(TestMem::all_backed()));
        let mut xc = ExecContext::new(0, "cpu0");
        xc.regs.set_return_address(0x9000);

        let mut queue = PcEventQueue::new();
        queue.schedule(0x5000, skip_at("simple_lock"));

        xc.regs.pc = 0x5004;
        assert_eq!(queue.service(&mut xc, &mut sys), 0);
        assert_eq!(xc.regs.pc, 0x5004);

        xc.regs.pc = 0x5000;
        assert_eq!(queue.service(&mut xc, &mut sys), 1);
        assert_eq!(xc.regs.pc, 0x9000);
    }

    #[test]
    fn test_multiple_events_at_one_address_fire_in_order() {
        let mut sys = System::new("tlaser", Box::new(TestMem::all_backed()));
        let mut xc = ExecContext::new(0, "cpu0");
        xc.regs.set_return_address(0x9000);
        xc.regs.pc = 0x5000;

        let mut queue = PcEventQueue::new();
        // Printf capture first (a no-op with tracing off), then the skip.
        queue.schedule(0x5000, KernelEvent::Printf(PrintfEvent::new("printf")));
        queue.schedule(0x5000, skip_at("printf"));

        assert_eq!(queue.service(&mut xc, &mut sys), 2);
        assert_eq!(xc.regs.pc, 0x9000);
    }

    #[test]
    fn test_remove_clears_an_address() {
        let mut queue = PcEventQueue::new();
        queue.schedule(0x5000, skip_at("a"));
        queue.schedule(0x5000, skip_at("b"));
        queue.schedule(0x6000, skip_at("c"));
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.remove(0x5000), 2);
        assert_eq!(queue.remove(0x5000), 0);
        assert_eq!(queue.len(), 1);
        assert!(!queue.is_empty());
    }

    #[test]
    fn test_descriptors_are_address_ordered() {
        let mut queue = PcEventQueue::new();
        queue.schedule(0x6000, skip_at("later"));
        queue.schedule(0x5000, skip_at("earlier"));

        let descs: Vec<EventDescriptor> = queue.descriptors().collect();
        assert_eq!(descs.len(), 2);
        assert_eq!(descs[0].addr, 0x5000);
        assert_eq!(descs[0].description, "earlier");
        assert_eq!(descs[1].addr, 0x6000);
    }
}
