//! Simulated execution state.
//!
//! An [`ExecContext`] represents one simulated hardware thread: its integer
//! register file, PC/NPC pair, and (when call-path profiling is enabled) the
//! lazily-created per-thread [`SwContext`] that tracks nested kernel calls.
//!
//! Handlers mutate the register file in place; they never replace it.

use crate::arch::{ARG_REG_BASE, NUM_ARG_REGS, NUM_INT_REGS, RETURN_ADDRESS_REG, RETURN_VALUE_REG};

#[cfg(feature = "profiling")]
use crate::system::BinId;
#[cfg(feature = "profiling")]
use smallvec::SmallVec;

/// Simulated integer register file plus the PC/NPC pair.
#[derive(Debug, Clone)]
pub struct RegFile {
    /// Integer registers, indexed by the conventions in [`crate::arch`].
    pub int_regs: [u64; NUM_INT_REGS],
    /// Current program counter.
    pub pc: u64,
    /// Next program counter (the pipeline's fetch target).
    pub npc: u64,
}

impl Default for RegFile {
    fn default() -> Self {
        Self {
            int_regs: [0; NUM_INT_REGS],
            pc: 0,
            npc: 0,
        }
    }
}

impl RegFile {
    /// Read integer argument register `n` (a0 is `n == 0`).
    #[inline]
    pub fn arg(&self, n: usize) -> u64 {
        debug_assert!(n < NUM_ARG_REGS);
        self.int_regs[ARG_REG_BASE + n]
    }

    /// Write integer argument register `n`.
    #[inline]
    pub fn set_arg(&mut self, n: usize, value: u64) {
        debug_assert!(n < NUM_ARG_REGS);
        self.int_regs[ARG_REG_BASE + n] = value;
    }

    /// Read the return-address register (ra).
    #[inline]
    pub fn return_address(&self) -> u64 {
        self.int_regs[RETURN_ADDRESS_REG]
    }

    /// Write the return-address register.
    #[inline]
    pub fn set_return_address(&mut self, value: u64) {
        self.int_regs[RETURN_ADDRESS_REG] = value;
    }

    /// Read the return-value register (v0).
    #[inline]
    pub fn return_value(&self) -> u64 {
        self.int_regs[RETURN_VALUE_REG]
    }

    /// Write the return-value register.
    #[inline]
    pub fn set_return_value(&mut self, value: u64) {
        self.int_regs[RETURN_VALUE_REG] = value;
    }
}

/// One simulated hardware thread.
#[derive(Debug)]
pub struct ExecContext {
    /// The thread's register file.
    pub regs: RegFile,
    /// Hardware thread number within the owning processor.
    pub thread_num: usize,
    /// Owning processor name, used to prefix diagnostic output.
    pub cpu_name: String,
    /// Set while the thread executes down a not-yet-confirmed control path.
    /// Handlers must not make durable state changes while this is set.
    pub misspeculating: bool,
    /// Per-thread call-path state, created on the first legitimate profiled
    /// kernel entry. At most one per context.
    #[cfg(feature = "profiling")]
    pub sw_ctx: Option<SwContext>,
}

impl ExecContext {
    /// Create a context for the given hardware thread.
    pub fn new(thread_num: usize, cpu_name: impl Into<String>) -> Self {
        Self {
            regs: RegFile::default(),
            thread_num,
            cpu_name: cpu_name.into(),
            misspeculating: false,
            #[cfg(feature = "profiling")]
            sw_ctx: None,
        }
    }
}

/// One entry on a thread's profiled call stack.
#[cfg(feature = "profiling")]
#[derive(Debug, Clone)]
pub struct FnCall {
    /// Name of the entered kernel function.
    pub name: String,
    /// Aggregation bin attributed to this call.
    pub bin: BinId,
}

/// Per-thread transient state tracking kernel-call nesting.
///
/// Lifetime is tied to the owning [`ExecContext`]; this core never destroys
/// one once created.
#[cfg(feature = "profiling")]
#[derive(Debug, Default)]
pub struct SwContext {
    /// Stack of currently-open profiled calls, innermost last.
    pub call_stack: SmallVec<[FnCall; 8]>,
    /// Count of currently-active guest calls (nested-call bookkeeping).
    pub calls: u64,
}

#[cfg(feature = "profiling")]
impl SwContext {
    /// The innermost open call, if any.
    pub fn top(&self) -> Option<&FnCall> {
        self.call_stack.last()
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.call_stack.len()
    }
}
