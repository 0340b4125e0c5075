//! Trace category configuration.
//!
//! Handlers gate every piece of optional work on a named trace category, so a
//! disabled category costs one flag check and nothing else. Categories load
//! from TOML and can be overridden from the environment:
//!
//! ```toml
//! # trace.toml
//! printf = true
//! bad_addr = true
//! ```
//!
//! Environment override: `KERN_HOOKS_TRACE=printf,callpath` (or `all`)
//! enables the listed categories on top of whatever the files configured.

use serde::{Deserialize, Serialize};

/// Environment variable holding a comma-separated category list.
pub const TRACE_ENV_VAR: &str = "KERN_HOOKS_TRACE";

/// Named trace categories, independently toggleable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceCategory {
    /// PC-event dispatch diagnostics (function skips).
    PcEvent,
    /// Address-validation diagnostics.
    BadAddr,
    /// Guest printf output.
    Printf,
    /// Guest debug-printf and mbuf-dump output.
    DebugPrintf,
    /// Call-path profiling diagnostics.
    CallPath,
}

impl TraceCategory {
    /// Log target used for this category's diagnostics.
    pub fn target(self) -> &'static str {
        match self {
            TraceCategory::PcEvent => "pcevent",
            TraceCategory::BadAddr => "badaddr",
            TraceCategory::Printf => "printf",
            TraceCategory::DebugPrintf => "debugprintf",
            TraceCategory::CallPath => "callpath",
        }
    }

    /// Parse a category name as it appears in `KERN_HOOKS_TRACE`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "pcevent" | "pc_event" => Some(TraceCategory::PcEvent),
            "badaddr" | "bad_addr" => Some(TraceCategory::BadAddr),
            "printf" => Some(TraceCategory::Printf),
            "debugprintf" | "debug_printf" => Some(TraceCategory::DebugPrintf),
            "callpath" | "call_path" => Some(TraceCategory::CallPath),
            _ => None,
        }
    }
}

/// Enabled/disabled state for every trace category.
///
/// All categories default to off.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// PC-event dispatch diagnostics.
    pub pc_event: bool,
    /// Address-validation diagnostics.
    pub bad_addr: bool,
    /// Guest printf output.
    pub printf: bool,
    /// Guest debug-printf and mbuf-dump output.
    pub debug_printf: bool,
    /// Call-path profiling diagnostics.
    pub call_path: bool,
}

impl TraceConfig {
    /// A config with every category enabled.
    pub fn all() -> Self {
        Self {
            pc_event: true,
            bad_addr: true,
            printf: true,
            debug_printf: true,
            call_path: true,
        }
    }

    /// Check whether a category is enabled.
    #[inline]
    pub fn enabled(&self, cat: TraceCategory) -> bool {
        match cat {
            TraceCategory::PcEvent => self.pc_event,
            TraceCategory::BadAddr => self.bad_addr,
            TraceCategory::Printf => self.printf,
            TraceCategory::DebugPrintf => self.debug_printf,
            TraceCategory::CallPath => self.call_path,
        }
    }

    /// Enable a single category.
    pub fn enable(&mut self, cat: TraceCategory) {
        match cat {
            TraceCategory::PcEvent => self.pc_event = true,
            TraceCategory::BadAddr => self.bad_addr = true,
            TraceCategory::Printf => self.printf = true,
            TraceCategory::DebugPrintf => self.debug_printf = true,
            TraceCategory::CallPath => self.call_path = true,
        }
    }

    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Merge another layer into this one.
    ///
    /// A category enabled by any layer stays enabled.
    pub fn merge(&mut self, other: Self) {
        self.pc_event |= other.pc_event;
        self.bad_addr |= other.bad_addr;
        self.printf |= other.printf;
        self.debug_printf |= other.debug_printf;
        self.call_path |= other.call_path;
    }

    /// Apply the `KERN_HOOKS_TRACE` environment override.
    ///
    /// The variable holds a comma-separated category list; `all` enables
    /// everything. Unknown names are reported and skipped.
    pub fn apply_env_overrides(&mut self) {
        let Ok(value) = std::env::var(TRACE_ENV_VAR) else {
            return;
        };
        self.apply_list(&value);
    }

    /// Enable the categories named in a comma-separated list.
    pub fn apply_list(&mut self, list: &str) {
        for name in list.split(',').filter(|s| !s.trim().is_empty()) {
            if name.trim().eq_ignore_ascii_case("all") {
                *self = Self::all();
                return;
            }
            match TraceCategory::parse(name) {
                Some(cat) => self.enable(cat),
                None => log::warn!("unknown trace category {:?} in {}", name.trim(), TRACE_ENV_VAR),
            }
        }
    }
}
