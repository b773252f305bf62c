use thiserror::Error;

/// Reasons the selection flow aborts.
///
/// Every variant except [`SelectionError::Internal`] is a user-actionable
/// hardware or configuration mismatch and is never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SelectionError {
    #[error("unsupported GPU vendor: {vendor} detected, but only NVIDIA GPUs (nvidia-smi) are supported")]
    UnsupportedVendor { vendor: String },

    #[error("no NVIDIA GPU found: {reason}")]
    NoAcceleratorFound { reason: String },

    #[error(
        "GPU '{name}' belongs to the {family} architecture family (matched '{marker}'), \
         which the serving runtime does not support yet"
    )]
    ArchitectureBlocked {
        name: String,
        family: String,
        marker: String,
    },

    #[error(
        "GPU '{name}' has {detected_mib} MiB of memory; at least {required_mib} MiB is needed \
         for the smallest model"
    )]
    InsufficientMemory {
        name: String,
        detected_mib: u64,
        required_mib: u64,
    },

    #[error("unknown model '{id}'. Available: {}", .available.join(", "))]
    UnknownIdentifier { id: String, available: Vec<String> },

    #[error(
        "model '{id}' needs {required_mib} MiB of GPU memory but only {detected_mib} MiB \
         was detected. Compatible: {}",
        .compatible.join(", ")
    )]
    IncompatibleExplicitChoice {
        id: String,
        required_mib: u64,
        detected_mib: u64,
        compatible: Vec<String>,
    },

    #[error(
        "no launch tuning for model '{variant}' on a {tier} GPU ({detected_mib} MiB); \
         this combination needs to be tuned before it can be served"
    )]
    UntunedConfiguration {
        variant: String,
        tier: String,
        detected_mib: u64,
    },

    #[error("internal selection fault: {0}")]
    Internal(String),
}

impl SelectionError {
    /// Logic faults, as opposed to problems the operator can fix
    pub fn is_internal(&self) -> bool {
        matches!(self, SelectionError::Internal(_))
    }

    /// Process exit code for this failure (EX_SOFTWARE for internal faults)
    pub fn exit_code(&self) -> i32 {
        if self.is_internal() {
            70
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_detected_values() {
        let err = SelectionError::IncompatibleExplicitChoice {
            id: "32b".to_string(),
            required_mib: 70000,
            detected_mib: 24000,
            compatible: vec!["14b-awq".to_string(), "32b-awq".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("70000"));
        assert!(msg.contains("24000"));
        assert!(msg.contains("14b-awq, 32b-awq"));
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(SelectionError::Internal("x".into()).exit_code(), 70);
        assert_eq!(
            SelectionError::NoAcceleratorFound {
                reason: "none".into()
            }
            .exit_code(),
            1
        );
    }
}
