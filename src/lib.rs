//! kern-hooks
//!
//! PC-triggered guest-kernel call interception for a full-system Alpha
//! simulator. When the simulated PC reaches the entry address of a known
//! kernel function, a registered handler runs on the host instead of the
//! function's native code: skipping the body outright, replicating the
//! kernel's address-sanity probe, capturing its logging output, or
//! attributing the entry to a call-path profile.
//!
//! # Usage
//!
//! ```
//! use kern_hooks::context::ExecContext;
//! use kern_hooks::event::{KernelEvent, PcEventQueue, SkipFuncEvent};
//! use kern_hooks::system::{MemValidity, System};
//!
//! struct AllBacked;
//! impl MemValidity for AllBacked {
//!     fn bad_addr(&self, _paddr: u64) -> bool {
//!         false
//!     }
//! }
//!
//! let mut sys = System::new("tlaser", Box::new(AllBacked));
//! let mut xc = ExecContext::new(0, "cpu0");
//! xc.regs.pc = 0xffff_fc00_0030_0000;
//! xc.regs.set_return_address(0xffff_fc00_0020_0000);
//!
//! let mut queue = PcEventQueue::new();
//! queue.schedule(
//!     0xffff_fc00_0030_0000,
//!     KernelEvent::SkipFunc(SkipFuncEvent::new("simple_lock")),
//! );
//!
//! assert_eq!(queue.service(&mut xc, &mut sys), 1);
//! assert_eq!(xc.regs.pc, 0xffff_fc00_0020_0000);
//! ```

pub mod arch;
pub mod args;
pub mod context;
pub mod event;
pub mod system;
pub mod trace;

pub use args::{ArgCursor, GuestPrintf, MbufDumper};
pub use context::{ExecContext, RegFile};
#[cfg(feature = "profiling")]
pub use context::{FnCall, SwContext};
pub use event::{
    BadAddrEvent, DebugPrintfEvent, DumpMbufEvent, EventDescriptor, HookError, KernelEvent,
    PcEventQueue, PrintfEvent, SkipFuncEvent,
};
#[cfg(feature = "profiling")]
pub use event::FnEvent;
#[cfg(feature = "profiling")]
pub use system::{Bin, BinId, CallGraph};
pub use system::{MemValidity, ReturnStack, System};
pub use trace::{TraceCategory, TraceConfig};
