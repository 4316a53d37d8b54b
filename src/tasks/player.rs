//! Build the test player, launch it, and drive the platform hooks around both
//!
//! ```text
//! step 0  yield                       (context re-attached after resume)
//! step 1  Setup                       -> yield
//! step 2  build, PostBuildAction,
//!         PostSuccessfulBuildAction   -> yield
//! step 3  launch,
//!         PostSuccessfulLaunchAction  -> done
//! ```

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::classifier::TestPlatform;
use crate::context::RunContext;
use crate::platform::LifecycleEvent;
use crate::pipeline::{Step, Task, TaskError};
use crate::toolchain::{BuildRequest, BuildToolchain};

pub const DEFAULT_PRODUCT_NAME: &str = "TestPlayer";

pub struct PlayerRunTask {
    toolchain: Box<dyn BuildToolchain>,
    output_dir: PathBuf,
    product_name: String,
}

impl PlayerRunTask {
    pub fn new(toolchain: Box<dyn BuildToolchain>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            toolchain,
            output_dir: output_dir.into(),
            product_name: DEFAULT_PRODUCT_NAME.to_string(),
        }
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = name.into();
        self
    }

    fn request(&self, ctx: &RunContext) -> Result<BuildRequest, TaskError> {
        let bootstrap = ctx.bootstrap.as_ref().ok_or(TaskError::MissingInput {
            field: "bootstrap",
        })?;
        let runner_settings = ctx
            .runner_settings
            .clone()
            .ok_or(TaskError::MissingInput {
                field: "runner_settings",
            })?;
        let target = ctx.target();

        let mut options: BTreeSet<String> = ["ConnectToHost", "IncludeTestAssemblies"]
            .into_iter()
            .map(String::from)
            .collect();
        if ctx.controller.is_some() {
            options.insert("AutoRunPlayer".to_string());
        }
        if ctx.settings().automated {
            options.insert("Headless".to_string());
        }

        Ok(BuildRequest {
            target,
            output_path: self
                .output_dir
                .join(target.as_str())
                .join(format!("{}.{}", self.product_name, target.artifact_extension())),
            scenes: vec![format!("bootstrap-{}", bootstrap.id)],
            runner_settings,
            test_modules: ctx
                .classification
                .as_ref()
                .map(|c| c.names(TestPlatform::PlayMode))
                .unwrap_or_default(),
            options,
        })
    }
}

impl Task for PlayerRunTask {
    fn name(&self) -> &str {
        "Build Test Player"
    }

    fn supports_resuming(&self) -> bool {
        true
    }

    fn step(&mut self, step: usize, ctx: &mut RunContext) -> Result<Step, TaskError> {
        match step {
            0 => Ok(Step::Yield),
            1 => {
                ctx.dispatch(LifecycleEvent::Setup)?;
                Ok(Step::Yield)
            }
            2 => {
                let request = self.request(ctx)?;
                info!(
                    target = %request.target,
                    output = %request.output_path.display(),
                    "building test player"
                );
                let report = self.toolchain.build(&request)?;
                ctx.dispatch(LifecycleEvent::PostBuildAction)?;
                if !report.succeeded {
                    warn!(errors = report.errors.len(), "player build failed");
                    return Err(TaskError::BuildFailed {
                        target: request.target,
                        errors: report.errors,
                    });
                }
                ctx.dispatch(LifecycleEvent::PostSuccessfulBuildAction)?;
                ctx.build_options = Some(report.options);
                Ok(Step::Yield)
            }
            _ => {
                let options = ctx.build_options.as_ref().ok_or(TaskError::MissingInput {
                    field: "build_options",
                })?;
                let launch = self
                    .toolchain
                    .launch(options, ctx.settings().heartbeat_timeout())?;
                if !launch.launched {
                    return Err(TaskError::LaunchFailed {
                        details: launch
                            .details
                            .unwrap_or_else(|| "player did not start".to_string()),
                    });
                }
                ctx.dispatch(LifecycleEvent::PostSuccessfulLaunchAction)?;
                info!("test player running");
                Ok(Step::Done)
            }
        }
    }
}
