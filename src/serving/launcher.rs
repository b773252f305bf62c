//! Hand-off to the inference server process

use crate::config::ServerConfig;
use crate::selection::LaunchPlan;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Fully resolved server command line
#[derive(Debug, Clone)]
pub struct ServerLaunch {
    binary: String,
    args: Vec<String>,
}

impl ServerLaunch {
    pub fn new(server: &ServerConfig, plan: &LaunchPlan, model_path: &Path) -> Self {
        let params = &plan.parameters;
        let mut args = vec![
            "serve".to_string(),
            model_path.display().to_string(),
            "--host".to_string(),
            server.host.clone(),
            "--port".to_string(),
            server.port.to_string(),
            "--max-model-len".to_string(),
            params.context_length_tokens.to_string(),
            "--gpu-memory-utilization".to_string(),
            format!("{:.2}", params.gpu_memory_utilization),
        ];
        if let Some(quantization) = &params.quantization {
            args.push("--quantization".to_string());
            args.push(quantization.clone());
        }
        args.push("--served-model-name".to_string());
        args.push(plan.variant.id.clone());
        args.extend(server.extra_args.iter().cloned());

        Self {
            binary: server.binary.clone(),
            args,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Shell-like rendering for dry runs and logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.binary.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.args(&self.args);
        command
    }

    /// Replace this process with the server. Only returns on failure.
    #[cfg(unix)]
    pub fn hand_off(self) -> Result<()> {
        use std::os::unix::process::CommandExt;

        info!("exec: {}", self.command_line());
        let err = self.command().exec();
        Err(err).with_context(|| format!("Failed to start {}", self.binary))
    }

    /// Run the server in the foreground until it exits
    #[cfg(not(unix))]
    pub fn hand_off(self) -> Result<()> {
        info!("spawn: {}", self.command_line());
        let status = self
            .command()
            .status()
            .with_context(|| format!("Failed to start {}", self.binary))?;
        if !status.success() {
            bail!("{} exited with {}", self.binary, status);
        }
        Ok(())
    }
}

/// Check that the model directory exists before launching
pub fn verify_model_path(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        bail!(
            "Model directory {} does not exist. Run without --skip-download to fetch it.",
            path.display()
        );
    }
    Ok(path.to_path_buf())
}
