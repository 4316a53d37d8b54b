use tracing::debug;

use crate::context::RunContext;
use crate::platform::LifecycleEvent;
use crate::pipeline::{Step, Task, TaskError};

/// Last task of a run: hands `CleanUp` to the platform handler
#[derive(Debug, Default)]
pub struct CleanupTask;

impl CleanupTask {
    pub fn new() -> Self {
        Self
    }
}

impl Task for CleanupTask {
    fn name(&self) -> &str {
        "Clean Up Platform"
    }

    fn step(&mut self, _step: usize, ctx: &mut RunContext) -> Result<Step, TaskError> {
        let outcome = ctx.dispatch(LifecycleEvent::CleanUp)?;
        debug!(?outcome, "platform cleaned up");
        Ok(Step::Done)
    }
}
