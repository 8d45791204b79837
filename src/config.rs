//! Runtime configuration.
//!
//! ## Environment Variables
//!
//! - `REFBRIDGE_MAX_REGION_LEN`: minimum byte length of a region created over foreign memory.
//!   Views over that address are framed inside this window.
//! - `REFBRIDGE_SCAN_BOUND`: upper bound in bytes for `reinterpretUntilZeros` scans.
//!
//! Both accept decimal or `0x`-prefixed hexadecimal values.
use std::env;

/// Mirrors the largest buffer length the host runtime historically allowed.
pub const DEFAULT_MAX_REGION_LEN: usize = 0x3fff_ffff;
pub const DEFAULT_SCAN_BOUND: usize = 0x3fff_ffff;

pub const MAX_REGION_LEN_VAR: &str = "REFBRIDGE_MAX_REGION_LEN";
pub const SCAN_BOUND_VAR: &str = "REFBRIDGE_SCAN_BOUND";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub max_region_len: usize,
    pub scan_bound: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_region_len: DEFAULT_MAX_REGION_LEN,
            scan_bound: DEFAULT_SCAN_BOUND,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_region_len: read_var(MAX_REGION_LEN_VAR).unwrap_or(defaults.max_region_len),
            scan_bound: read_var(SCAN_BOUND_VAR).unwrap_or(defaults.scan_bound),
        }
    }

    pub fn with_scan_bound(mut self, scan_bound: usize) -> Self {
        self.scan_bound = scan_bound;
        self
    }

    pub fn with_max_region_len(mut self, max_region_len: usize) -> Self {
        self.max_region_len = max_region_len;
        self
    }
}

fn read_var(name: &str) -> Option<usize> {
    let raw = env::var(name).ok()?;
    match parse_size(&raw) {
        Some(v) => Some(v),
        None => {
            tracing::warn!("ignoring {name}={raw:?}: not a size");
            None
        }
    }
}

pub(crate) fn parse_size(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(&hex.replace('_', ""), 16).ok(),
        None => raw.replace('_', "").parse().ok(),
    }
}
