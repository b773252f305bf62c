//! CLI command implementations

use anyhow::Result;
use qa_serve::hardware::{detect_accelerator, SystemProbe};
use qa_serve::selection::Assessment;
use qa_serve::serving::{
    verify_model_path, ArtifactStore, HealthProbe, HuggingFaceCli, InstallOutcome, ServerLaunch,
    VULNERABLE_SNIPPET,
};
use qa_serve::{AcceleratorDescriptor, Config, LaunchPlan, SelectionPolicy, MODEL_CATALOG};
use std::io::{self, IsTerminal};
use std::time::Duration;

use super::menu::prompt_for_variant;

fn print_banner(title: &str) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════════════╗");
    println!("║  {:<68}║", title);
    println!("╚══════════════════════════════════════════════════════════════════════╝");
    println!();
}

fn print_assessment(assessment: &Assessment<'_>) {
    let gpu = &assessment.accelerator;
    println!(
        "  GPU: {} ({} MiB, {:.1} GiB)",
        gpu.name,
        gpu.memory_mib,
        gpu.memory_gib()
    );
    println!();

    for variant in &assessment.compatible {
        let status = if variant.id == assessment.recommended.id {
            "✅ RECOMMENDED"
        } else {
            "   OK         "
        };
        println!("  {} - {} ({})", status, variant.id, variant.display_label);
        println!(
            "    Needs: {} MiB | Headroom: {} MiB | Download: {}",
            variant.min_memory_mib,
            gpu.memory_mib - variant.min_memory_mib,
            variant.approx_download
        );
    }
    println!();
}

fn print_plan(plan: &LaunchPlan) {
    let params = &plan.parameters;
    println!("  Model:              {} ({})", plan.variant.id, plan.variant.source);
    println!("  Memory tier:        {}", plan.tier);
    println!("  Context length:     {} tokens", params.context_length_tokens);
    println!(
        "  GPU memory util:    {:.2}",
        params.gpu_memory_utilization
    );
    let quantization = if plan.variant.is_quantized() {
        plan.variant.precision_label()
    } else {
        "none (bf16)"
    };
    println!("  Quantization:       {}", quantization);
    println!();
}

pub fn detect(json: bool) -> Result<()> {
    let policy = SelectionPolicy::default();
    let assessment = policy.detect_and_assess(&SystemProbe::default())?;

    if json {
        let plan = policy.finalize(&assessment, None)?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    print_banner("GPU DETECTION");
    print_assessment(&assessment);
    Ok(())
}

pub fn models() -> Result<()> {
    print_banner("MODEL CATALOG");

    for variant in MODEL_CATALOG.variants() {
        println!("  {} - {}", variant.id, variant.display_label);
        println!("    Source:   {}", variant.source);
        println!(
            "    Needs:    {} MiB | Precision: {} | Download: {}",
            variant.min_memory_mib,
            variant.precision_label(),
            variant.approx_download
        );
        println!("    Quality:  {}", variant.quality_note);
    }

    println!();
    Ok(())
}

pub fn recommend(memory_mib: Option<u64>, name: Option<String>) -> Result<()> {
    let accelerator = match memory_mib {
        Some(memory_mib) => {
            AcceleratorDescriptor::new(name.unwrap_or_else(|| "manual".to_string()), memory_mib)
        }
        None => detect_accelerator(&SystemProbe::default())?,
    };

    let policy = SelectionPolicy::default();
    let assessment = policy.assess(accelerator)?;
    let plan = policy.finalize(&assessment, None)?;

    print_banner("MODEL RECOMMENDATIONS");
    print_assessment(&assessment);
    println!("  Launch parameters for the recommended model:");
    print_plan(&plan);
    Ok(())
}

pub fn serve(
    config: &Config,
    model: Option<String>,
    yes: bool,
    dry_run: bool,
    skip_download: bool,
) -> Result<()> {
    let policy = SelectionPolicy::default();
    let assessment = policy.detect_and_assess(&SystemProbe::default())?;

    print_banner("QA BOT MODEL SERVER");

    let choice = match model {
        Some(id) => Some(id),
        None if yes || !io::stdin().is_terminal() => None,
        None => {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();
            let variant = prompt_for_variant(
                &assessment.compatible,
                assessment.recommended,
                &mut input,
                &mut output,
            )?;
            println!();
            Some(variant.id.clone())
        }
    };

    let plan = policy.finalize(&assessment, choice.as_deref())?;
    println!(
        "  GPU: {} ({} MiB)",
        plan.accelerator.name, plan.accelerator.memory_mib
    );
    print_plan(&plan);

    let store = ArtifactStore::from_config(config);
    let model_path = store.model_path(&plan.variant);

    if dry_run {
        let state = if store.is_installed(&plan.variant) {
            "installed"
        } else {
            "not installed"
        };
        println!("  Weights: {} ({})", model_path.display(), state);
    } else if skip_download {
        verify_model_path(&model_path)?;
    } else {
        let fetcher = HuggingFaceCli::new(config.fetch.binary.clone());
        if store.ensure_installed(&plan.variant, &fetcher)? == InstallOutcome::Fetched {
            println!("  Downloaded {} to {}", plan.variant.source, model_path.display());
        }
    }

    let launch = ServerLaunch::new(&config.server, &plan, &model_path);
    if dry_run {
        println!("  Command: {}", launch.command_line());
        println!();
        return Ok(());
    }

    println!("  Starting server on {}", config.server.base_url());
    println!("  Check readiness with: qa-serve status --wait 600");
    println!();
    launch.hand_off()
}

pub fn status(
    config: &Config,
    url: Option<String>,
    wait: Option<u64>,
    smoke: bool,
) -> Result<()> {
    let probe = HealthProbe::new(url.unwrap_or_else(|| config.server.base_url()))?;

    let model = match wait {
        Some(secs) => {
            probe.wait_until_ready(Duration::from_secs(secs), Duration::from_secs(3))?
        }
        None => probe.loaded_model()?,
    };

    println!("Server at {} is up", probe.base_url());
    println!("Model loaded: {}", model);

    if smoke {
        print_banner("SMOKE REVIEW");
        println!("{}", VULNERABLE_SNIPPET);
        println!();

        let review = probe.smoke_review()?;
        println!("{}", review.content);
        println!();
        println!(
            "  Tokens: {} prompt + {} completion",
            review.prompt_tokens, review.completion_tokens
        );
        if review.caught_injection {
            println!("  ✓ Model caught the SQL injection");
        } else {
            println!("  ⚠ Model may have missed the SQL injection, review the output");
        }
        println!();
    }
    Ok(())
}
