//! Exit codes for the CLI

use gantry_core::ConfigError;
use gantry_pipeline::{ExecError, PartitionError, RegistryError, ResolveError};

/// Success
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error
pub const CONFIG_ERROR: i32 = 2;

/// Plan resolution error (unknown task, cycle)
pub const RESOLVE_ERROR: i32 = 3;

/// Invalid partition parameters
pub const PARTITION_ERROR: i32 = 4;

/// A task failed during execution
pub const TASK_FAILED: i32 = 5;

/// Map an error to its exit code
pub fn for_error(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<ConfigError>().is_some() {
        CONFIG_ERROR
    } else if error.downcast_ref::<ResolveError>().is_some()
        || error.downcast_ref::<RegistryError>().is_some()
    {
        RESOLVE_ERROR
    } else if error.downcast_ref::<PartitionError>().is_some() {
        PARTITION_ERROR
    } else if matches!(
        error.downcast_ref::<ExecError>(),
        Some(ExecError::TaskFailed { .. })
    ) {
        TASK_FAILED
    } else {
        ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_mapping() {
        let cycle: anyhow::Error =
            ResolveError::CyclicDependency(vec!["a".to_string(), "b".to_string()]).into();
        assert_eq!(for_error(&cycle), RESOLVE_ERROR);

        let partition: anyhow::Error =
            PartitionError::InvalidPartition { index: 3, total: 2 }.into();
        assert_eq!(for_error(&partition), PARTITION_ERROR);

        let failed: anyhow::Error = ExecError::TaskFailed {
            task: "compile".to_string(),
            cause: "exit status 1".to_string(),
        }
        .into();
        assert_eq!(for_error(&failed), TASK_FAILED);

        assert_eq!(for_error(&anyhow::anyhow!("boom")), ERROR);
    }
}
