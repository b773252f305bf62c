//! GPU detection through nvidia-smi

use crate::selection::SelectionError;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Name and total memory of one detected GPU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceleratorDescriptor {
    pub name: String,
    pub memory_mib: u64,
}

impl AcceleratorDescriptor {
    pub fn new(name: impl Into<String>, memory_mib: u64) -> Self {
        Self {
            name: name.into(),
            memory_mib,
        }
    }

    pub fn memory_gib(&self) -> f64 {
        self.memory_mib as f64 / 1024.0
    }
}

/// Output of a device listing query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceListing {
    /// The query tool ran and printed these lines
    Output(String),
    /// The query tool ran but exited unsuccessfully
    Failed(String),
}

/// Source of device information. Implemented over the real system tools and
/// by fakes in tests.
pub trait DeviceProbe {
    /// Whether the primary query tool is installed
    fn primary_tool_available(&self) -> bool;

    /// A GPU vendor that is known to be incompatible, if one is present
    fn foreign_vendor(&self) -> Option<String>;

    /// Run the primary query
    fn query_devices(&self) -> anyhow::Result<DeviceListing>;
}

pub const NVIDIA_SMI: &str = "nvidia-smi";
/// Vendor label for any Mac, Intel or Apple Silicon
pub const APPLE_VENDOR: &str = "Apple";

/// Probe backed by `nvidia-smi` and the host's device files
#[derive(Debug, Clone)]
pub struct SystemProbe {
    tool: String,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self {
            tool: NVIDIA_SMI.to_string(),
        }
    }
}

impl DeviceProbe for SystemProbe {
    fn primary_tool_available(&self) -> bool {
        find_on_path(&self.tool).is_some()
    }

    fn foreign_vendor(&self) -> Option<String> {
        if cfg!(target_os = "macos") {
            return Some(APPLE_VENDOR.to_string());
        }
        if find_on_path("rocm-smi").is_some() || Path::new("/dev/kfd").exists() {
            return Some("AMD".to_string());
        }
        None
    }

    fn query_devices(&self) -> anyhow::Result<DeviceListing> {
        let output = Command::new(&self.tool)
            .arg("--query-gpu=name,memory.total")
            .arg("--format=csv,noheader,nounits")
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let reason = if stderr.is_empty() { stdout } else { stderr };
            return Ok(DeviceListing::Failed(reason));
        }

        Ok(DeviceListing::Output(String::from_utf8(output.stdout)?))
    }
}

/// Locate an executable on `PATH`
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|path| path.is_file())
}

/// Parse `name, memory` CSV lines as printed by
/// `nvidia-smi --query-gpu=name,memory.total --format=csv,noheader,nounits`.
///
/// Lines that do not parse are skipped.
pub fn parse_device_listing(listing: &str) -> Vec<AcceleratorDescriptor> {
    listing
        .lines()
        .filter_map(|line| {
            let (name, memory) = line.rsplit_once(',')?;
            let name = name.trim();
            let memory = memory.trim().trim_end_matches("MiB").trim();
            if name.is_empty() {
                return None;
            }
            let memory_mib = memory.parse::<u64>().ok()?;
            Some(AcceleratorDescriptor::new(name, memory_mib))
        })
        .collect()
}

/// Detect the single GPU to serve on.
///
/// The vendor check runs before the query: on a machine without
/// `nvidia-smi` but with another vendor's GPU, running the query would only
/// report a confusing "command not found".
pub fn detect_accelerator(
    probe: &dyn DeviceProbe,
) -> Result<AcceleratorDescriptor, SelectionError> {
    if !probe.primary_tool_available() {
        if let Some(vendor) = probe.foreign_vendor() {
            return Err(SelectionError::UnsupportedVendor { vendor });
        }
        return Err(SelectionError::NoAcceleratorFound {
            reason: format!("{NVIDIA_SMI} is not installed or not on PATH"),
        });
    }

    let listing = probe
        .query_devices()
        .map_err(|e| SelectionError::NoAcceleratorFound {
            reason: format!("{NVIDIA_SMI} could not be run: {e}"),
        })?;

    let output = match listing {
        DeviceListing::Output(output) => output,
        DeviceListing::Failed(reason) => {
            return Err(SelectionError::NoAcceleratorFound {
                reason: format!("{NVIDIA_SMI} failed: {reason}"),
            })
        }
    };

    let mut devices = parse_device_listing(&output);
    debug!("nvidia-smi reported {} device(s)", devices.len());

    if devices.is_empty() {
        return Err(SelectionError::NoAcceleratorFound {
            reason: format!("{NVIDIA_SMI} reported no devices"),
        });
    }
    if devices.len() > 1 {
        warn!(
            "{} GPUs detected, sizing for the first one ({})",
            devices.len(),
            devices[0].name
        );
    }

    Ok(devices.swap_remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device_listing() {
        let devices = parse_device_listing(
            "NVIDIA GeForce RTX 4090, 24564\nNVIDIA A100-SXM4-80GB, 81920 MiB\n",
        );
        assert_eq!(
            devices,
            vec![
                AcceleratorDescriptor::new("NVIDIA GeForce RTX 4090", 24564),
                AcceleratorDescriptor::new("NVIDIA A100-SXM4-80GB", 81920),
            ]
        );
    }

    #[test]
    fn test_parse_skips_garbage() {
        let devices = parse_device_listing("No devices were found\n, 1024\nTesla T4, [N/A]\n");
        assert!(devices.is_empty());
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_mac_is_reported_as_apple() {
        assert_eq!(
            SystemProbe::default().foreign_vendor().as_deref(),
            Some(APPLE_VENDOR)
        );
        assert!(!APPLE_VENDOR.contains("Silicon"));
    }

    #[test]
    fn test_memory_gib() {
        let gpu = AcceleratorDescriptor::new("L40S", 46080);
        assert!((gpu.memory_gib() - 45.0).abs() < 1e-9);
    }
}
