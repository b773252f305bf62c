//! Launch tuning profiles
//!
//! GPU memory utilization and context length per (model variant, memory tier).
//! The values were tuned by hand on real cards and are not derived from a
//! formula: a larger card can leave relatively less headroom for the
//! runtime's buffers, so utilization does not simply grow with memory.

use crate::catalog::ModelVariant;
use crate::selection::SelectionError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Lower bound of the large tier (80 GB class cards)
pub const LARGE_TIER_MIB: u64 = 70_000;
/// Lower bound of the mid tier (40/48 GB class cards)
pub const MID_TIER_MIB: u64 = 35_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTier {
    Compact,
    Mid,
    Large,
}

impl MemoryTier {
    pub fn from_memory_mib(memory_mib: u64) -> Self {
        if memory_mib >= LARGE_TIER_MIB {
            MemoryTier::Large
        } else if memory_mib >= MID_TIER_MIB {
            MemoryTier::Mid
        } else {
            MemoryTier::Compact
        }
    }
}

impl fmt::Display for MemoryTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MemoryTier::Compact => "compact",
            MemoryTier::Mid => "mid",
            MemoryTier::Large => "large",
        };
        f.write_str(label)
    }
}

/// One cell of the tuning table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningEntry {
    pub gpu_memory_utilization: f32,
    pub context_length_tokens: u32,
}

/// Parameters handed to the serving process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchParameters {
    pub context_length_tokens: u32,
    pub gpu_memory_utilization: f32,
    pub quantization: Option<String>,
}

/// Tuning table indexed by (variant id, tier)
pub static LAUNCH_TUNING: Lazy<HashMap<(String, MemoryTier), TuningEntry>> =
    Lazy::new(|| {
        let mut table = HashMap::new();
        let mut tune = |id: &str, tier: MemoryTier, utilization: f32, context: u32| {
            table.insert(
                (id.to_string(), tier),
                TuningEntry {
                    gpu_memory_utilization: utilization,
                    context_length_tokens: context,
                },
            );
        };

        tune("14b-awq", MemoryTier::Large, 0.85, 32768);
        tune("14b-awq", MemoryTier::Mid, 0.90, 32768);
        tune("14b-awq", MemoryTier::Compact, 0.92, 16384);

        tune("32b-awq", MemoryTier::Large, 0.85, 32768);
        tune("32b-awq", MemoryTier::Mid, 0.90, 16384);
        tune("32b-awq", MemoryTier::Compact, 0.95, 8192);

        // Full precision only fits on large cards
        tune("32b", MemoryTier::Large, 0.92, 16384);

        table
    });

/// Look up serving parameters for a variant on a card with `memory_mib`.
///
/// Combinations missing from the table are an error: a new tier or variant
/// has to be measured, not extrapolated.
pub fn derive_launch_parameters(
    variant: &ModelVariant,
    memory_mib: u64,
) -> Result<LaunchParameters, SelectionError> {
    derive_with(&LAUNCH_TUNING, variant, memory_mib)
}

pub fn derive_with(
    table: &HashMap<(String, MemoryTier), TuningEntry>,
    variant: &ModelVariant,
    memory_mib: u64,
) -> Result<LaunchParameters, SelectionError> {
    let tier = MemoryTier::from_memory_mib(memory_mib);
    let entry = table
        .get(&(variant.id.clone(), tier))
        .ok_or_else(|| SelectionError::UntunedConfiguration {
            variant: variant.id.clone(),
            tier: tier.to_string(),
            detected_mib: memory_mib,
        })?;

    Ok(LaunchParameters {
        context_length_tokens: entry.context_length_tokens,
        gpu_memory_utilization: entry.gpu_memory_utilization,
        quantization: variant.quantization.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MODEL_CATALOG;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(MemoryTier::from_memory_mib(24564), MemoryTier::Compact);
        assert_eq!(MemoryTier::from_memory_mib(34999), MemoryTier::Compact);
        assert_eq!(MemoryTier::from_memory_mib(35000), MemoryTier::Mid);
        assert_eq!(MemoryTier::from_memory_mib(49140), MemoryTier::Mid);
        assert_eq!(MemoryTier::from_memory_mib(70000), MemoryTier::Large);
        assert_eq!(MemoryTier::from_memory_mib(81920), MemoryTier::Large);
    }

    #[test]
    fn test_table_values_are_literal() {
        let variant = MODEL_CATALOG.get("32b-awq").unwrap();

        let compact = derive_launch_parameters(variant, 24564).unwrap();
        assert_eq!(compact.context_length_tokens, 8192);
        assert_eq!(compact.gpu_memory_utilization, 0.95);
        assert_eq!(compact.quantization.as_deref(), Some("awq"));

        let mid = derive_launch_parameters(variant, 46068).unwrap();
        assert_eq!(mid.context_length_tokens, 16384);
        assert_eq!(mid.gpu_memory_utilization, 0.90);

        let large = derive_launch_parameters(variant, 81920).unwrap();
        assert_eq!(large.context_length_tokens, 32768);
        assert_eq!(large.gpu_memory_utilization, 0.85);
    }

    #[test]
    fn test_full_precision_has_no_quantization_flag() {
        let variant = MODEL_CATALOG.get("32b").unwrap();
        let params = derive_launch_parameters(variant, 81559).unwrap();
        assert_eq!(params.quantization, None);
        assert_eq!(params.gpu_memory_utilization, 0.92);
    }

    #[test]
    fn test_missing_cell_is_untuned() {
        let variant = MODEL_CATALOG.get("32b").unwrap();
        let err = derive_launch_parameters(variant, 48000).unwrap_err();
        assert!(matches!(
            err,
            SelectionError::UntunedConfiguration { ref tier, .. } if tier == "mid"
        ));
    }

    #[test]
    fn test_every_reachable_cell_is_tuned() {
        for variant in MODEL_CATALOG.variants() {
            for memory_mib in [variant.min_memory_mib, MID_TIER_MIB, LARGE_TIER_MIB] {
                if memory_mib >= variant.min_memory_mib {
                    assert!(
                        derive_launch_parameters(variant, memory_mib).is_ok(),
                        "{} at {} MiB has no tuning",
                        variant.id,
                        memory_mib
                    );
                }
            }
        }
    }
}
