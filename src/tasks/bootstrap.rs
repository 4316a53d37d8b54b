//! Create the environment the test player boots into

use tracing::{debug, info};

use crate::classifier::TestPlatform;
use crate::context::{RunContext, RunnerSettings, SceneSetup, TestController, CONTROLLER_NAME};
use crate::pipeline::{Step, Task, TaskError};
use crate::toolchain::SceneBuilder;

pub struct CreateBootstrapTask {
    include_controller: bool,
    setup: SceneSetup,
    scenes: Box<dyn SceneBuilder>,
}

impl CreateBootstrapTask {
    pub fn new(scenes: Box<dyn SceneBuilder>) -> Self {
        Self {
            include_controller: true,
            setup: SceneSetup::default(),
            scenes,
        }
    }

    /// Builder: leave the test controller out of the environment
    pub fn without_controller(mut self) -> Self {
        self.include_controller = false;
        self
    }

    pub fn with_scene_setup(mut self, setup: SceneSetup) -> Self {
        self.setup = setup;
        self
    }
}

impl Task for CreateBootstrapTask {
    fn name(&self) -> &str {
        "Create Bootstrap Environment"
    }

    fn step(&mut self, _step: usize, ctx: &mut RunContext) -> Result<Step, TaskError> {
        let runner_settings = RunnerSettings::from_execution(ctx.settings());

        let controller = if self.include_controller {
            let classification = ctx
                .classification
                .as_ref()
                .ok_or(TaskError::MissingInput {
                    field: "classification",
                })?;
            Some(TestController {
                name: CONTROLLER_NAME.to_string(),
                modules_with_tests: classification.names(TestPlatform::PlayMode),
                settings: runner_settings.clone(),
            })
        } else {
            None
        };

        let mut environment = self.scenes.new_environment(self.setup)?;
        if let Some(controller) = &controller {
            debug!(
                modules = controller.modules_with_tests.len(),
                "placing test controller"
            );
            environment.objects.push(controller.name.clone());
        }
        info!(
            environment = environment.id,
            objects = environment.objects.len(),
            "bootstrap environment created"
        );

        ctx.bootstrap = Some(environment);
        ctx.runner_settings = Some(runner_settings);
        ctx.controller = controller;
        Ok(Step::Done)
    }
}
