//! Model catalog
//!
//! The catalog is an ordered list of structured variant records, fixed at
//! build time. Each variant carries an explicit `quality_rank` so the
//! recommendation never depends on where an entry happens to sit in the list.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("model catalog is empty")]
    Empty,

    #[error("duplicate model id in catalog: {0}")]
    DuplicateId(String),

    #[error("duplicate quality rank {rank} (used by {first} and {second})")]
    DuplicateRank {
        rank: u32,
        first: String,
        second: String,
    },

    #[error(
        "{higher} (rank {higher_rank}) requires {higher_mib} MiB, less than {lower} \
         (rank {lower_rank}) which requires {lower_mib} MiB"
    )]
    RankThresholdMismatch {
        higher: String,
        higher_rank: u32,
        higher_mib: u64,
        lower: String,
        lower_rank: u32,
        lower_mib: u64,
    },
}

/// One servable model variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVariant {
    /// Unique key, e.g. `32b-awq`
    pub id: String,
    /// Hugging Face repository the weights are fetched from
    pub source: String,
    /// Directory name under the models directory
    pub local_dir: String,
    pub display_label: String,
    pub approx_download: String,
    pub quality_note: String,
    /// Smallest accelerator memory this variant can be served on
    pub min_memory_mib: u64,
    /// `None` means full precision
    pub quantization: Option<String>,
    /// Higher is better
    pub quality_rank: u32,
}

impl ModelVariant {
    pub fn is_quantized(&self) -> bool {
        self.quantization.is_some()
    }

    /// Quantization scheme, or `bf16` for full precision
    pub fn precision_label(&self) -> &str {
        self.quantization.as_deref().unwrap_or("bf16")
    }
}

/// Validated, ordered collection of model variants
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    variants: Vec<ModelVariant>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate ids/ranks and any pair of variants
    /// where the better one declares a smaller memory threshold.
    pub fn new(variants: Vec<ModelVariant>) -> Result<Self, CatalogError> {
        if variants.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut ids = HashSet::new();
        for variant in &variants {
            if !ids.insert(variant.id.as_str()) {
                return Err(CatalogError::DuplicateId(variant.id.clone()));
            }
        }

        let mut by_rank: Vec<&ModelVariant> = variants.iter().collect();
        by_rank.sort_by_key(|v| v.quality_rank);

        for pair in by_rank.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            if lower.quality_rank == higher.quality_rank {
                return Err(CatalogError::DuplicateRank {
                    rank: lower.quality_rank,
                    first: lower.id.clone(),
                    second: higher.id.clone(),
                });
            }
            if higher.min_memory_mib < lower.min_memory_mib {
                return Err(CatalogError::RankThresholdMismatch {
                    higher: higher.id.clone(),
                    higher_rank: higher.quality_rank,
                    higher_mib: higher.min_memory_mib,
                    lower: lower.id.clone(),
                    lower_rank: lower.quality_rank,
                    lower_mib: lower.min_memory_mib,
                });
            }
        }

        Ok(Self { variants })
    }

    pub fn variants(&self) -> &[ModelVariant] {
        &self.variants
    }

    pub fn get(&self, id: &str) -> Option<&ModelVariant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.id.as_str()).collect()
    }

    /// Smallest threshold across the catalog; nothing fits below it.
    pub fn memory_floor_mib(&self) -> u64 {
        self.variants
            .iter()
            .map(|v| v.min_memory_mib)
            .min()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

fn variant(
    id: &str,
    source: &str,
    display_label: &str,
    approx_download: &str,
    quality_note: &str,
    min_memory_mib: u64,
    quantization: Option<&str>,
    quality_rank: u32,
) -> ModelVariant {
    ModelVariant {
        id: id.to_string(),
        source: source.to_string(),
        local_dir: source.rsplit('/').next().unwrap_or(source).to_string(),
        display_label: display_label.to_string(),
        approx_download: approx_download.to_string(),
        quality_note: quality_note.to_string(),
        min_memory_mib,
        quantization: quantization.map(str::to_string),
        quality_rank,
    }
}

/// Built-in catalog, declared in ascending quality order
pub static MODEL_CATALOG: Lazy<Catalog> = Lazy::new(|| {
    let variants = vec![
        variant(
            "14b-awq",
            "Qwen/Qwen2.5-Coder-14B-Instruct-AWQ",
            "Qwen2.5-Coder 14B (AWQ 4-bit)",
            "~10 GB",
            "Good - fast, catches common issues",
            18000,
            Some("awq"),
            1,
        ),
        variant(
            "32b-awq",
            "Qwen/Qwen2.5-Coder-32B-Instruct-AWQ",
            "Qwen2.5-Coder 32B (AWQ 4-bit)",
            "~19 GB",
            "Better - stronger reasoning across files",
            22000,
            Some("awq"),
            2,
        ),
        variant(
            "32b",
            "Qwen/Qwen2.5-Coder-32B-Instruct",
            "Qwen2.5-Coder 32B (full precision)",
            "~65 GB",
            "Best - no quantization loss",
            70000,
            None,
            3,
        ),
    ];

    Catalog::new(variants).unwrap_or_else(|e| panic!("built-in model catalog is invalid: {e}"))
});
