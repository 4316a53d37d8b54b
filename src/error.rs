//! Crate-level error with fix suggestions

use thiserror::Error;

use crate::config::ConfigError;
use crate::pipeline::{PipelineError, TaskError};
use crate::platform::PlatformError;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum TestrigError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl FixSuggestion for TestrigError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            TestrigError::Config(err) => match err {
                ConfigError::Io { .. } => Some("Check file path and permissions"),
                ConfigError::Yaml(_) => Some("Check YAML syntax: indentation and quoting"),
                ConfigError::InvalidSchema { .. } => Some("Use 'schema: testrig/run@0.1'"),
                ConfigError::DuplicateModule(_) => Some("Give every module a unique name"),
                ConfigError::InvalidModuleName(_) => {
                    Some("Module names are dotted identifiers, e.g. Game.Tests")
                }
                ConfigError::EmptyMarkers => {
                    Some("Remove 'markers:' to use the default test markers")
                }
                ConfigError::ZeroFrameInterval => Some("Set pipeline.frame_ms to 1 or more"),
            },
            TestrigError::Pipeline(err) => match err {
                PipelineError::TaskFailed { source, .. } => match source {
                    TaskError::MissingInput { .. } => {
                        Some("Keep the standard task order: classify, bootstrap, player, cleanup")
                    }
                    TaskError::BuildFailed { .. } => Some("Fix the build errors listed above"),
                    TaskError::LaunchFailed { .. } => {
                        Some("Check that a device for the target platform is connected")
                    }
                    TaskError::Platform(_) => Some("Check the device tooling for the target"),
                    TaskError::Scene { .. } => {
                        Some("Check that the bootstrap scene can be created in the project")
                    }
                    TaskError::Other(_) => None,
                },
                PipelineError::NotResumable { .. } => {
                    Some("Restart the run; this task cannot continue mid-sequence")
                }
                PipelineError::Finished => Some("Start a new run"),
                PipelineError::TaskListMismatch { .. } => {
                    Some("Resume with the same task list the run was started with")
                }
            },
            TestrigError::Platform(PlatformError::UnknownTarget(_)) => {
                Some("Use a target such as android, ios, tvos, switch or standalone-windows64")
            }
            TestrigError::Platform(_) => Some("Check the device tooling for the target"),
            TestrigError::Io(_) => Some("Check file path and permissions"),
            TestrigError::Json(_) => None,
            TestrigError::Yaml(_) => Some("Check YAML syntax: indentation and quoting"),
        }
    }
}

pub type Result<T, E = TestrigError> = std::result::Result<T, E>;
