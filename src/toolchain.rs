//! External collaborators of the pipeline tasks
//!
//! - [`BuildToolchain`]: compiles and launches the test player
//! - [`SceneBuilder`]: creates the bootstrap environment the player starts in
//!
//! Only dry-run implementations live here; real toolchains plug in through the traits.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::{BootstrapEnvironment, BuildOptions, RunnerSettings, SceneSetup};
use crate::pipeline::TaskError;
use crate::platform::BuildTarget;

/// Everything the toolchain needs to produce a test player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub target: BuildTarget,
    pub output_path: PathBuf,
    /// Scenes to include, bootstrap scene first
    pub scenes: Vec<String>,
    pub runner_settings: RunnerSettings,
    /// Play-mode test modules compiled into the player
    pub test_modules: Vec<String>,
    pub options: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub succeeded: bool,
    pub options: BuildOptions,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReport {
    pub launched: bool,
    pub details: Option<String>,
}

pub trait BuildToolchain {
    fn build(&mut self, request: &BuildRequest) -> Result<BuildReport, TaskError>;

    /// Start the built player; it must report back within `heartbeat`
    fn launch(
        &mut self,
        options: &BuildOptions,
        heartbeat: Duration,
    ) -> Result<LaunchReport, TaskError>;
}

/// Toolchain that pretends every build and launch works, unless told otherwise
#[derive(Debug, Clone, Default)]
pub struct DryRunToolchain {
    build_errors: Vec<String>,
    launch_error: Option<String>,
    builds: Vec<BuildRequest>,
    launches: usize,
}

impl DryRunToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: every build fails with these errors
    pub fn failing_build<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_errors = errors.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: every launch fails
    pub fn failing_launch(mut self, details: impl Into<String>) -> Self {
        self.launch_error = Some(details.into());
        self
    }

    pub fn builds(&self) -> &[BuildRequest] {
        &self.builds
    }

    pub fn launches(&self) -> usize {
        self.launches
    }
}

impl BuildToolchain for DryRunToolchain {
    fn build(&mut self, request: &BuildRequest) -> Result<BuildReport, TaskError> {
        self.builds.push(request.clone());
        let succeeded = self.build_errors.is_empty();
        info!(
            target = %request.target,
            output = %request.output_path.display(),
            succeeded,
            "dry-run player build"
        );
        Ok(BuildReport {
            succeeded,
            options: BuildOptions {
                target: request.target,
                output_path: request.output_path.clone(),
                scenes: request.scenes.clone(),
                development: true,
                options: request.options.clone(),
            },
            errors: self.build_errors.clone(),
        })
    }

    fn launch(
        &mut self,
        options: &BuildOptions,
        heartbeat: Duration,
    ) -> Result<LaunchReport, TaskError> {
        self.launches += 1;
        info!(
            player = %options.output_path.display(),
            heartbeat_secs = heartbeat.as_secs(),
            "dry-run player launch"
        );
        Ok(match &self.launch_error {
            Some(details) => LaunchReport {
                launched: false,
                details: Some(details.clone()),
            },
            None => LaunchReport {
                launched: true,
                details: None,
            },
        })
    }
}

// ============================================================================
// SCENES
// ============================================================================

pub trait SceneBuilder {
    fn new_environment(&mut self, setup: SceneSetup) -> Result<BootstrapEnvironment, TaskError>;
}

/// Creates environments in memory, numbering them from 1
#[derive(Debug, Clone, Default)]
pub struct InMemorySceneBuilder {
    created: u64,
    error: Option<String>,
}

impl InMemorySceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: every environment request fails
    pub fn failing(mut self, details: impl Into<String>) -> Self {
        self.error = Some(details.into());
        self
    }
}

impl SceneBuilder for InMemorySceneBuilder {
    fn new_environment(&mut self, setup: SceneSetup) -> Result<BootstrapEnvironment, TaskError> {
        if let Some(details) = &self.error {
            return Err(TaskError::Scene {
                details: details.clone(),
            });
        }
        self.created += 1;
        let objects = match setup {
            SceneSetup::Empty => Vec::new(),
            SceneSetup::DefaultObjects => {
                vec!["Main Camera".to_string(), "Directional Light".to_string()]
            }
        };
        Ok(BootstrapEnvironment {
            id: self.created,
            setup,
            objects,
        })
    }
}
