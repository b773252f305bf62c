//! Model and resource selection policy
//!
//! Decides, for one detected GPU, which catalog variants can be served, which
//! one to recommend, and which parameters to launch the server with.
//!
//! The flow is a straight line with an abort exit at every step:
//!
//! ```text
//! Start -> AcceleratorDetected -> ArchitectureChecked -> CapacityChecked
//!       -> CatalogFiltered -> VariantSelected -> ParametersDerived -> Launch
//! ```
//!
//! Nothing is retried; every failure is a hardware or configuration mismatch.

mod error;

pub use error::SelectionError;

use crate::catalog::{Catalog, ModelVariant, MODEL_CATALOG};
use crate::hardware::architecture::{
    classify_with, ArchitectureClass, BlockedFamily, ARCHITECTURE_DENYLIST,
};
use crate::hardware::detection::{detect_accelerator, AcceleratorDescriptor, DeviceProbe};
use crate::hardware::profiles::{
    derive_with, LaunchParameters, MemoryTier, TuningEntry, LAUNCH_TUNING,
};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info};

/// Stages of the selection flow, used for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStage {
    Start,
    AcceleratorDetected,
    ArchitectureChecked,
    CapacityChecked,
    CatalogFiltered,
    VariantSelected,
    ParametersDerived,
    Launch,
}

impl fmt::Display for SelectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

fn enter(stage: SelectionStage) {
    debug!(stage = %stage, "selection");
}

/// Fail when `memory_mib` is below the smallest threshold in the catalog
pub fn check_minimum_capacity(
    catalog: &Catalog,
    accelerator: &AcceleratorDescriptor,
) -> Result<(), SelectionError> {
    let floor = catalog.memory_floor_mib();
    if accelerator.memory_mib < floor {
        return Err(SelectionError::InsufficientMemory {
            name: accelerator.name.clone(),
            detected_mib: accelerator.memory_mib,
            required_mib: floor,
        });
    }
    Ok(())
}

/// Variants that fit in `memory_mib`, in catalog order
pub fn compatible_variants(catalog: &Catalog, memory_mib: u64) -> Vec<&ModelVariant> {
    catalog
        .variants()
        .iter()
        .filter(|v| v.min_memory_mib <= memory_mib)
        .collect()
}

/// Best variant of a non-empty compatible set (highest quality rank)
pub fn recommend<'a>(
    compatible: &[&'a ModelVariant],
) -> Result<&'a ModelVariant, SelectionError> {
    compatible
        .iter()
        .copied()
        .max_by_key(|v| v.quality_rank)
        .ok_or_else(|| {
            SelectionError::Internal(
                "recommendation requested for an empty compatible set".to_string(),
            )
        })
}

/// Honour an explicit model choice if it is known and fits, otherwise
/// fall back to the recommendation.
///
/// An explicit choice that does not fit is an error; another variant is
/// never substituted for it.
pub fn resolve_selection<'a>(
    catalog: &'a Catalog,
    explicit: Option<&str>,
    compatible: &[&'a ModelVariant],
    memory_mib: u64,
) -> Result<&'a ModelVariant, SelectionError> {
    let Some(id) = explicit else {
        return recommend(compatible);
    };

    let variant = catalog
        .get(id)
        .ok_or_else(|| SelectionError::UnknownIdentifier {
            id: id.to_string(),
            available: catalog.ids().iter().map(|s| s.to_string()).collect(),
        })?;

    if !compatible.iter().any(|v| v.id == variant.id) {
        return Err(SelectionError::IncompatibleExplicitChoice {
            id: variant.id.clone(),
            required_mib: variant.min_memory_mib,
            detected_mib: memory_mib,
            compatible: compatible.iter().map(|v| v.id.clone()).collect(),
        });
    }

    Ok(variant)
}

/// Outcome of the hardware checks: what fits and what is recommended
#[derive(Debug, Clone)]
pub struct Assessment<'a> {
    pub accelerator: AcceleratorDescriptor,
    pub compatible: Vec<&'a ModelVariant>,
    pub recommended: &'a ModelVariant,
}

/// Terminal `Launch` state of the flow
#[derive(Debug, Clone, Serialize)]
pub struct LaunchPlan {
    pub accelerator: AcceleratorDescriptor,
    pub variant: ModelVariant,
    pub recommended_id: String,
    pub compatible_ids: Vec<String>,
    pub tier: MemoryTier,
    pub parameters: LaunchParameters,
}

impl LaunchPlan {
    pub fn is_recommended(&self) -> bool {
        self.variant.id == self.recommended_id
    }
}

/// The catalog, denylist and tuning table the flow runs against
pub struct SelectionPolicy<'a> {
    catalog: &'a Catalog,
    denylist: &'a [BlockedFamily],
    tuning: &'a HashMap<(String, MemoryTier), TuningEntry>,
}

impl Default for SelectionPolicy<'static> {
    fn default() -> Self {
        Self {
            catalog: &MODEL_CATALOG,
            denylist: &ARCHITECTURE_DENYLIST,
            tuning: &LAUNCH_TUNING,
        }
    }
}

impl<'a> SelectionPolicy<'a> {
    pub fn new(
        catalog: &'a Catalog,
        denylist: &'a [BlockedFamily],
        tuning: &'a HashMap<(String, MemoryTier), TuningEntry>,
    ) -> Self {
        Self {
            catalog,
            denylist,
            tuning,
        }
    }

    /// Detect the GPU, then assess it
    pub fn detect_and_assess(
        &self,
        probe: &dyn DeviceProbe,
    ) -> Result<Assessment<'a>, SelectionError> {
        enter(SelectionStage::Start);
        let accelerator = detect_accelerator(probe)?;
        info!(
            "Detected GPU: {} ({} MiB)",
            accelerator.name, accelerator.memory_mib
        );
        self.assess(accelerator)
    }

    /// Architecture check, capacity check and catalog filtering.
    ///
    /// The architecture check comes first: a blocked family is rejected no
    /// matter how much memory it has.
    pub fn assess(
        &self,
        accelerator: AcceleratorDescriptor,
    ) -> Result<Assessment<'a>, SelectionError> {
        enter(SelectionStage::AcceleratorDetected);

        if let ArchitectureClass::Blocked { family, marker } =
            classify_with(&accelerator.name, self.denylist)
        {
            return Err(SelectionError::ArchitectureBlocked {
                name: accelerator.name,
                family: family.to_string(),
                marker,
            });
        }
        enter(SelectionStage::ArchitectureChecked);

        check_minimum_capacity(self.catalog, &accelerator)?;
        enter(SelectionStage::CapacityChecked);

        let compatible = compatible_variants(self.catalog, accelerator.memory_mib);
        let recommended = recommend(&compatible)?;
        enter(SelectionStage::CatalogFiltered);
        let compatible_ids: Vec<&str> = compatible.iter().map(|v| v.id.as_str()).collect();
        debug!(compatible = ?compatible_ids, recommended = %recommended.id, "catalog filtered");

        Ok(Assessment {
            accelerator,
            compatible,
            recommended,
        })
    }

    /// Resolve the variant and derive its launch parameters
    pub fn finalize(
        &self,
        assessment: &Assessment<'a>,
        explicit: Option<&str>,
    ) -> Result<LaunchPlan, SelectionError> {
        let memory_mib = assessment.accelerator.memory_mib;
        let variant =
            resolve_selection(self.catalog, explicit, &assessment.compatible, memory_mib)?;
        enter(SelectionStage::VariantSelected);

        let parameters = derive_with(self.tuning, variant, memory_mib)?;
        enter(SelectionStage::ParametersDerived);

        let plan = LaunchPlan {
            accelerator: assessment.accelerator.clone(),
            variant: variant.clone(),
            recommended_id: assessment.recommended.id.clone(),
            compatible_ids: assessment.compatible.iter().map(|v| v.id.clone()).collect(),
            tier: MemoryTier::from_memory_mib(memory_mib),
            parameters,
        };
        enter(SelectionStage::Launch);
        Ok(plan)
    }

    /// Whole flow for an already detected accelerator
    pub fn plan(
        &self,
        accelerator: AcceleratorDescriptor,
        explicit: Option<&str>,
    ) -> Result<LaunchPlan, SelectionError> {
        let assessment = self.assess(accelerator)?;
        self.finalize(&assessment, explicit)
    }
}
