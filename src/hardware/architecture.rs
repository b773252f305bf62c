//! Architecture denylist
//!
//! Some GPU families are not supported by the serving runtime regardless of
//! how much memory they have. They are recognised by markers in the device
//! name reported by nvidia-smi.

use once_cell::sync::Lazy;
use regex::Regex;

/// A family of GPUs the serving runtime cannot run on
#[derive(Debug)]
pub struct BlockedFamily {
    pub family: &'static str,
    pattern: Regex,
}

impl BlockedFamily {
    /// `pattern` is matched case-insensitively against device names
    pub fn new(family: &'static str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            family,
            pattern: Regex::new(&format!("(?i){pattern}"))?,
        })
    }
}

/// Result of [`classify_architecture`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchitectureClass {
    Compatible,
    Blocked {
        family: &'static str,
        /// The part of the device name that matched
        marker: String,
    },
}

impl ArchitectureClass {
    pub fn is_blocked(&self) -> bool {
        matches!(self, ArchitectureClass::Blocked { .. })
    }
}

pub static ARCHITECTURE_DENYLIST: Lazy<Vec<BlockedFamily>> = Lazy::new(|| {
    let blackwell = BlockedFamily::new(
        "Blackwell",
        r"\bblackwell\b|\brtx\s*50[5-9]0\b|\bg?b(?:[123]00|10)\b",
    )
    .unwrap_or_else(|e| panic!("invalid Blackwell denylist pattern: {e}"));

    vec![blackwell]
});

/// Case-insensitive match of a device name against the denylist
pub fn classify_architecture(name: &str) -> ArchitectureClass {
    classify_with(name, &ARCHITECTURE_DENYLIST)
}

pub fn classify_with(name: &str, denylist: &[BlockedFamily]) -> ArchitectureClass {
    for blocked in denylist {
        if let Some(found) = blocked.pattern.find(name) {
            return ArchitectureClass::Blocked {
                family: blocked.family,
                marker: found.as_str().to_string(),
            };
        }
    }
    ArchitectureClass::Compatible
}
