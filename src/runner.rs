//! Test run orchestration
//!
//! Assembles the standard pipeline from a [`RunConfig`] and drives it one step
//! per frame:
//!
//! ```text
//! Classify Test Modules -> Create Bootstrap Environment -> Build Test Player -> Clean Up Platform
//! ```
//!
//! When a task fails, the platform handler still gets `CleanUp` before the
//! error is reported.

use tracing::{info, instrument, warn};

use crate::config::RunConfig;
use crate::context::RunContext;
use crate::error::TestrigError;
use crate::event_log::EventLog;
use crate::pipeline::{drive, Pipeline, PipelineError, Task};
use crate::platform::{InMemoryHost, PlatformHost};
use crate::tasks::{ClassifyModulesTask, CleanupTask, CreateBootstrapTask, PlayerRunTask};
use crate::toolchain::{BuildToolchain, DryRunToolchain, InMemorySceneBuilder, SceneBuilder};

/// The four tasks of a standard run, freshly built
///
/// Call again with new collaborators to resume a suspended run.
pub fn standard_tasks(
    config: &RunConfig,
    toolchain: Box<dyn BuildToolchain>,
    scenes: Box<dyn SceneBuilder>,
) -> Vec<Box<dyn Task>> {
    let classify = ClassifyModulesTask::new(config.module_set(), config.classifier())
        .with_flags(config.flag_source());

    let mut bootstrap =
        CreateBootstrapTask::new(scenes).with_scene_setup(config.pipeline.scene_setup);
    if !config.pipeline.include_controller {
        bootstrap = bootstrap.without_controller();
    }

    let player = PlayerRunTask::new(toolchain, config.pipeline.output_dir.clone())
        .with_product_name(config.pipeline.product_name.clone());

    vec![
        Box::new(classify),
        Box::new(bootstrap),
        Box::new(player),
        Box::new(CleanupTask::new()),
    ]
}

/// What a finished run leaves behind
#[derive(Debug)]
pub struct RunReport {
    pub context: RunContext,
    pub outcome: Result<(), PipelineError>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn events(&self) -> &EventLog {
        self.context.events()
    }

    pub fn into_result(self) -> Result<RunContext, TestrigError> {
        match self.outcome {
            Ok(()) => Ok(self.context),
            Err(err) => Err(err.into()),
        }
    }
}

pub struct TestRun {
    config: RunConfig,
    host: Box<dyn PlatformHost>,
    toolchain: Box<dyn BuildToolchain>,
    scenes: Box<dyn SceneBuilder>,
    events: EventLog,
}

impl TestRun {
    /// Run against an in-memory host with the dry-run toolchain
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            host: Box::new(InMemoryHost::new()),
            toolchain: Box::new(DryRunToolchain::new()),
            scenes: Box::new(InMemorySceneBuilder::new()),
            events: EventLog::new(),
        }
    }

    pub fn with_host(mut self, host: Box<dyn PlatformHost>) -> Self {
        self.host = host;
        self
    }

    pub fn with_toolchain(mut self, toolchain: Box<dyn BuildToolchain>) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn with_scene_builder(mut self, scenes: Box<dyn SceneBuilder>) -> Self {
        self.scenes = scenes;
        self
    }

    /// Log shared with the run context
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Build the pipeline without running it
    pub fn pipeline(self) -> Pipeline {
        let tasks = standard_tasks(&self.config, self.toolchain, self.scenes);
        let ctx = RunContext::new(self.config.settings.clone(), self.host)
            .with_event_log(self.events);
        Pipeline::new(tasks, ctx)
    }

    /// Drive the pipeline to the end, cleaning up the platform on failure
    #[instrument(skip(self), fields(target = %self.config.settings.target_platform))]
    pub async fn execute(self) -> RunReport {
        let frame = self.config.pipeline.frame();
        let mut pipeline = self.pipeline();

        let outcome = drive(&mut pipeline, frame, None).await.map(|_| ());
        match &outcome {
            Ok(()) => info!(events = pipeline.events().len(), "test run finished"),
            Err(err) => {
                warn!(error = %err, "test run failed, cleaning up platform");
                if let Err(cleanup) = pipeline.clean_up() {
                    warn!(error = %cleanup, "platform clean up failed");
                }
            }
        }

        RunReport {
            context: pipeline.into_context(),
            outcome,
        }
    }
}

impl std::fmt::Debug for TestRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestRun")
            .field("target", &self.config.settings.target_platform)
            .field("modules", &self.config.modules.len())
            .field("events", &self.events)
            .finish()
    }
}
