use qa_serve::catalog::{Catalog, ModelVariant};
use qa_serve::hardware::architecture::ARCHITECTURE_DENYLIST;
use qa_serve::hardware::profiles::LAUNCH_TUNING;
use qa_serve::hardware::{detect_accelerator, AcceleratorDescriptor, DeviceListing, DeviceProbe};
use qa_serve::selection::{
    check_minimum_capacity, compatible_variants, recommend, resolve_selection, SelectionError,
    SelectionPolicy,
};
use std::cell::Cell;

fn variant(
    id: &str,
    min_memory_mib: u64,
    quality_rank: u32,
    quantization: Option<&str>,
) -> ModelVariant {
    ModelVariant {
        id: id.to_string(),
        source: format!("org/{id}"),
        local_dir: id.to_string(),
        display_label: id.to_string(),
        approx_download: "1 GB".to_string(),
        quality_note: String::new(),
        min_memory_mib,
        quantization: quantization.map(str::to_string),
        quality_rank,
    }
}

/// small (18000) < medium-quant (22000) < large (70000)
fn scenario_catalog() -> Catalog {
    Catalog::new(vec![
        variant("small", 18000, 1, None),
        variant("medium-quant", 22000, 2, Some("awq")),
        variant("large", 70000, 3, None),
    ])
    .unwrap()
}

fn ids(variants: &[&ModelVariant]) -> Vec<String> {
    variants.iter().map(|v| v.id.clone()).collect()
}

#[test]
fn test_scenario_a_recommends_best_fitting_variant() {
    let catalog = scenario_catalog();
    let compatible = compatible_variants(&catalog, 24000);

    assert_eq!(ids(&compatible), vec!["small", "medium-quant"]);
    assert_eq!(recommend(&compatible).unwrap().id, "medium-quant");
}

#[test]
fn test_scenario_b_below_floor_is_insufficient() {
    let catalog = scenario_catalog();
    let gpu = AcceleratorDescriptor::new("NVIDIA GeForce RTX 4080", 16000);

    let err = check_minimum_capacity(&catalog, &gpu).unwrap_err();
    assert_eq!(
        err,
        SelectionError::InsufficientMemory {
            name: "NVIDIA GeForce RTX 4080".to_string(),
            detected_mib: 16000,
            required_mib: 18000,
        }
    );

    let policy = SelectionPolicy::new(&catalog, &ARCHITECTURE_DENYLIST, &LAUNCH_TUNING);
    assert!(matches!(
        policy.plan(gpu, None),
        Err(SelectionError::InsufficientMemory { .. })
    ));
}

#[test]
fn test_scenario_c_blocked_architecture_despite_memory() {
    let catalog = scenario_catalog();
    let policy = SelectionPolicy::new(&catalog, &ARCHITECTURE_DENYLIST, &LAUNCH_TUNING);

    let err = policy
        .plan(
            AcceleratorDescriptor::new("NVIDIA RTX PRO 6000 Blackwell Workstation Edition", 96000),
            None,
        )
        .unwrap_err();

    match err {
        SelectionError::ArchitectureBlocked { family, marker, .. } => {
            assert_eq!(family, "Blackwell");
            assert_eq!(marker, "Blackwell");
        }
        other => panic!("expected ArchitectureBlocked, got {other:?}"),
    }
}

#[test]
fn test_blocked_architecture_wins_over_insufficient_memory() {
    let policy = SelectionPolicy::default();
    let err = policy
        .plan(AcceleratorDescriptor::new("NVIDIA GeForce RTX 5060", 8000), None)
        .unwrap_err();
    assert!(matches!(err, SelectionError::ArchitectureBlocked { .. }));
}

#[test]
fn test_scenario_d_explicit_choice_too_large() {
    let catalog = scenario_catalog();
    let compatible = compatible_variants(&catalog, 24000);

    let err = resolve_selection(&catalog, Some("large"), &compatible, 24000).unwrap_err();
    assert_eq!(
        err,
        SelectionError::IncompatibleExplicitChoice {
            id: "large".to_string(),
            required_mib: 70000,
            detected_mib: 24000,
            compatible: vec!["small".to_string(), "medium-quant".to_string()],
        }
    );
    let msg = err.to_string();
    assert!(msg.contains("70000") && msg.contains("24000"));
}

#[test]
fn test_unknown_identifier_lists_catalog() {
    let catalog = scenario_catalog();
    let compatible = compatible_variants(&catalog, 96000);

    let err = resolve_selection(&catalog, Some("huge"), &compatible, 96000).unwrap_err();
    match err {
        SelectionError::UnknownIdentifier { id, available } => {
            assert_eq!(id, "huge");
            assert_eq!(available, vec!["small", "medium-quant", "large"]);
        }
        other => panic!("expected UnknownIdentifier, got {other:?}"),
    }
}

#[test]
fn test_explicit_choice_is_never_substituted() {
    let catalog = scenario_catalog();
    for memory_mib in [18000, 21999, 22000, 69999] {
        let compatible = compatible_variants(&catalog, memory_mib);
        let result = resolve_selection(&catalog, Some("large"), &compatible, memory_mib);
        assert!(
            matches!(result, Err(SelectionError::IncompatibleExplicitChoice { .. })),
            "large at {memory_mib} MiB"
        );
    }

    let compatible = compatible_variants(&catalog, 70000);
    let chosen = resolve_selection(&catalog, Some("small"), &compatible, 70000).unwrap();
    assert_eq!(chosen.id, "small");
}

#[test]
fn test_compatible_is_ordered_subset() {
    let catalog = scenario_catalog();
    for memory_mib in (0..100_000).step_by(500) {
        let compatible = compatible_variants(&catalog, memory_mib);
        let expected: Vec<String> = catalog
            .variants()
            .iter()
            .filter(|v| v.min_memory_mib <= memory_mib)
            .map(|v| v.id.clone())
            .collect();
        assert_eq!(ids(&compatible), expected);
    }
}

#[test]
fn test_recommend_uses_quality_rank_not_position() {
    // Declared out of order; rank decides
    let catalog = Catalog::new(vec![
        variant("best", 30000, 3, None),
        variant("worst", 10000, 1, None),
        variant("middle", 20000, 2, None),
    ])
    .unwrap();

    let compatible = compatible_variants(&catalog, 25000);
    assert_eq!(ids(&compatible), vec!["worst", "middle"]);
    assert_eq!(recommend(&compatible).unwrap().id, "middle");
    assert_eq!(recommend(&compatible).unwrap().id, "middle");
}

struct FakeProbe {
    tool: bool,
    vendor: Option<&'static str>,
    listing: DeviceListing,
    queried: Cell<bool>,
}

impl FakeProbe {
    fn nvidia(output: &str) -> Self {
        Self {
            tool: true,
            vendor: None,
            listing: DeviceListing::Output(output.to_string()),
            queried: Cell::new(false),
        }
    }
}

impl DeviceProbe for FakeProbe {
    fn primary_tool_available(&self) -> bool {
        self.tool
    }

    fn foreign_vendor(&self) -> Option<String> {
        self.vendor.map(str::to_string)
    }

    fn query_devices(&self) -> anyhow::Result<DeviceListing> {
        self.queried.set(true);
        Ok(self.listing.clone())
    }
}

#[test]
fn test_detect_single_gpu() {
    let probe = FakeProbe::nvidia("NVIDIA L40S, 46068\n");
    let gpu = detect_accelerator(&probe).unwrap();
    assert_eq!(gpu, AcceleratorDescriptor::new("NVIDIA L40S", 46068));
}

#[test]
fn test_detect_uses_first_of_several() {
    let probe = FakeProbe::nvidia("NVIDIA A100-SXM4-80GB, 81920\nNVIDIA A100-SXM4-40GB, 40960\n");
    assert_eq!(detect_accelerator(&probe).unwrap().memory_mib, 81920);
}

#[test]
fn test_foreign_vendor_is_reported_before_query() {
    let probe = FakeProbe {
        tool: false,
        vendor: Some("AMD"),
        listing: DeviceListing::Output(String::new()),
        queried: Cell::new(false),
    };

    let err = detect_accelerator(&probe).unwrap_err();
    assert_eq!(
        err,
        SelectionError::UnsupportedVendor {
            vendor: "AMD".to_string()
        }
    );
    assert!(!probe.queried.get());
}

#[test]
fn test_missing_tool_and_empty_listing_are_distinct() {
    let missing = FakeProbe {
        tool: false,
        vendor: None,
        listing: DeviceListing::Output(String::new()),
        queried: Cell::new(false),
    };
    let SelectionError::NoAcceleratorFound { reason: missing_reason } =
        detect_accelerator(&missing).unwrap_err()
    else {
        panic!("expected NoAcceleratorFound");
    };
    assert!(missing_reason.contains("not installed"));

    let empty = FakeProbe::nvidia("");
    let SelectionError::NoAcceleratorFound { reason: empty_reason } =
        detect_accelerator(&empty).unwrap_err()
    else {
        panic!("expected NoAcceleratorFound");
    };
    assert!(empty_reason.contains("no devices"));
}

#[test]
fn test_failed_query_is_no_accelerator() {
    let probe = FakeProbe {
        listing: DeviceListing::Failed(
            "NVIDIA-SMI has failed because it couldn't communicate with the NVIDIA driver".into(),
        ),
        ..FakeProbe::nvidia("")
    };
    let err = detect_accelerator(&probe).unwrap_err();
    assert!(err.to_string().contains("couldn't communicate"));
}

#[test]
fn test_full_flow_from_probe() {
    let policy = SelectionPolicy::default();
    let probe = FakeProbe::nvidia("NVIDIA RTX A6000, 49140\n");

    let assessment = policy.detect_and_assess(&probe).unwrap();
    assert_eq!(assessment.recommended.id, "32b-awq");

    let plan = policy.finalize(&assessment, None).unwrap();
    assert_eq!(plan.parameters.context_length_tokens, 16384);
    assert_eq!(plan.parameters.gpu_memory_utilization, 0.90);
    assert_eq!(plan.parameters.quantization.as_deref(), Some("awq"));

    let err = policy.finalize(&assessment, Some("32b")).unwrap_err();
    assert!(matches!(
        err,
        SelectionError::IncompatibleExplicitChoice {
            required_mib: 70000,
            detected_mib: 49140,
            ..
        }
    ));
}
