//! # Task Pipeline
//!
//! Cooperative, single-threaded execution of an ordered list of [`Task`]s over
//! one [`RunContext`].
//!
//! ## Step model
//!
//! A task is an explicit state machine. The engine calls
//! [`Task::step`] with the index of the next step; the task answers
//! [`Step::Yield`] ("suspend here, continue with the next index") or
//! [`Step::Done`]. The engine keeps the index, so a task needs no coroutine
//! machinery to be re-entered.
//!
//! ```text
//!   tick ─> task[n].step(k, ctx) ─┬─ Yield ─> k += 1
//!                                 ├─ Done  ─> n += 1, k = 0
//!                                 └─ Err   ─> Failed (task n+1.. never run)
//! ```
//!
//! ## Suspend / resume
//!
//! [`Pipeline::suspend`] turns a pipeline into a [`SuspendedRun`]: the context
//! plus a [`Checkpoint`]. [`SuspendedRun::resume`] takes a freshly built task
//! list and continues from the checkpoint. A task interrupted mid-sequence is
//! only re-entered if it declares [`Task::supports_resuming`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::context::RunContext;
use crate::event_log::{EventKind, EventLog};
use crate::platform::{BuildTarget, Dispatch, LifecycleEvent, PlatformError};

/// Label for tasks that do not name themselves
pub const DEFAULT_TASK_NAME: &str = "Task";

// ============================================================================
// ERRORS
// ============================================================================

/// Error raised by a task step
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("'{field}' was not produced by an earlier task")]
    MissingInput { field: &'static str },

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Player build for {target} failed: {}", .errors.join("; "))]
    BuildFailed {
        target: BuildTarget,
        errors: Vec<String>,
    },

    #[error("Player launch failed: {details}")]
    LaunchFailed { details: String },

    #[error("Bootstrap environment could not be created: {details}")]
    Scene { details: String },

    #[error("{0}")]
    Other(String),
}

/// Error surfaced by the engine
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Task '{task}' failed at step {step}: {source}")]
    TaskFailed {
        task: String,
        step: usize,
        #[source]
        source: TaskError,
    },

    #[error("Task '{task}' cannot be resumed at step {step}")]
    NotResumable { task: String, step: usize },

    #[error("Pipeline has already finished")]
    Finished,

    #[error("Checkpoint was taken with {expected} tasks, resumed with {found}")]
    TaskListMismatch { expected: usize, found: usize },
}

// ============================================================================
// TASK
// ============================================================================

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Suspend here; the next call gets the following step index
    Yield,
    /// End of the step sequence
    Done,
}

/// One named step of the run pipeline
pub trait Task {
    /// Display name for progress reporting
    fn name(&self) -> &str {
        DEFAULT_TASK_NAME
    }

    /// Whether the task can be re-entered mid-sequence after a suspend
    fn supports_resuming(&self) -> bool {
        false
    }

    /// Run step `step` (0-based) of the task
    fn step(&mut self, step: usize, ctx: &mut RunContext) -> Result<Step, TaskError>;
}

/// Position of the engine in the task list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub task: usize,
    /// Next step index of `task`
    pub step: usize,
    pub task_count: usize,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Yielded { task: usize, step: usize },
    TaskCompleted { task: usize },
    /// The last task completed
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Ready,
    Running,
    Completed,
    Failed,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct Pipeline {
    tasks: Vec<Box<dyn Task>>,
    ctx: RunContext,
    cursor: Checkpoint,
    state: PipelineState,
    started_at: Option<Instant>,
    task_started_at: Option<Instant>,
}

impl Pipeline {
    pub fn new(tasks: Vec<Box<dyn Task>>, ctx: RunContext) -> Self {
        let cursor = Checkpoint {
            task_count: tasks.len(),
            ..Default::default()
        };
        Self {
            tasks,
            ctx,
            cursor,
            state: PipelineState::Ready,
            started_at: None,
            task_started_at: None,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn into_context(self) -> RunContext {
        self.ctx
    }

    pub fn events(&self) -> &EventLog {
        self.ctx.events()
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, PipelineState::Completed | PipelineState::Failed)
    }

    /// Name of the task the cursor points at
    pub fn current_task(&self) -> Option<&str> {
        self.tasks.get(self.cursor.task).map(|t| t.name())
    }

    /// Advance exactly one step of the current task
    pub fn tick(&mut self) -> Result<Progress, PipelineError> {
        if self.is_finished() {
            return Err(PipelineError::Finished);
        }
        if self.state == PipelineState::Ready {
            self.state = PipelineState::Running;
            self.started_at = Some(Instant::now());
            self.ctx.events().emit(EventKind::PipelineStarted {
                task_count: self.tasks.len(),
            });
        }
        if self.cursor.task >= self.tasks.len() {
            return Ok(self.complete());
        }

        let index = self.cursor.task;
        let step = self.cursor.step;
        let name: Arc<str> = Arc::from(self.tasks[index].name());

        if step == 0 {
            info!(task = %name, index, "starting task");
            self.task_started_at = Some(Instant::now());
            self.ctx.events().emit(EventKind::TaskStarted {
                task: Arc::clone(&name),
                index,
            });
        }

        match self.tasks[index].step(step, &mut self.ctx) {
            Ok(Step::Yield) => {
                debug!(task = %name, step, "task yielded");
                self.cursor.step += 1;
                self.ctx.events().emit(EventKind::TaskYielded { task: name, step });
                Ok(Progress::Yielded { task: index, step })
            }
            Ok(Step::Done) => {
                let duration_ms = self
                    .task_started_at
                    .take()
                    .map(|t| t.elapsed().as_millis() as u64)
                    .unwrap_or(0);
                info!(task = %name, steps = step + 1, duration_ms, "task completed");
                self.ctx.events().emit(EventKind::TaskCompleted {
                    task: name,
                    steps: step + 1,
                    duration_ms,
                });
                self.cursor.task += 1;
                self.cursor.step = 0;

                if self.cursor.task == self.tasks.len() {
                    Ok(self.complete())
                } else {
                    Ok(Progress::TaskCompleted { task: index })
                }
            }
            Err(source) => {
                warn!(task = %name, step, error = %source, "task failed");
                self.state = PipelineState::Failed;
                self.ctx.events().emit(EventKind::TaskFailed {
                    task: Arc::clone(&name),
                    step,
                    error: source.to_string(),
                });
                self.ctx.events().emit(EventKind::PipelineFailed {
                    error: source.to_string(),
                    failed_task: Some(name.clone()),
                });
                Err(PipelineError::TaskFailed {
                    task: name.to_string(),
                    step,
                    source,
                })
            }
        }
    }

    fn complete(&mut self) -> Progress {
        self.state = PipelineState::Completed;
        let total_duration_ms = self
            .started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        info!(tasks = self.tasks.len(), total_duration_ms, "pipeline completed");
        self.ctx
            .events()
            .emit(EventKind::PipelineCompleted { total_duration_ms });
        Progress::Finished
    }

    /// Tick until every task is done or one fails
    #[instrument(skip(self), fields(tasks = self.tasks.len()))]
    pub fn run(&mut self) -> Result<(), PipelineError> {
        loop {
            if self.tick()? == Progress::Finished {
                return Ok(());
            }
        }
    }

    /// Tick until the current task yields, the pipeline finishes, or a task fails
    pub fn run_until_yield(&mut self) -> Result<Progress, PipelineError> {
        loop {
            match self.tick()? {
                Progress::TaskCompleted { .. } => continue,
                other => return Ok(other),
            }
        }
    }

    /// Dispatch `CleanUp` to the platform handler, whatever state the run is in
    pub fn clean_up(&mut self) -> Result<Dispatch, PlatformError> {
        self.ctx.dispatch(LifecycleEvent::CleanUp)
    }

    /// Stop here and keep only what is needed to continue later
    pub fn suspend(self) -> SuspendedRun {
        let finished = self.is_finished();
        if !finished {
            info!(task = self.cursor.task, step = self.cursor.step, "pipeline suspended");
            self.ctx.events().emit(EventKind::PipelineSuspended {
                task_index: self.cursor.task,
                step: self.cursor.step,
            });
        }
        SuspendedRun {
            checkpoint: self.cursor,
            ctx: self.ctx,
            finished,
            started: self.state != PipelineState::Ready,
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("tasks", &self.tasks.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .finish()
    }
}

/// A pipeline taken apart at a checkpoint
#[derive(Debug)]
pub struct SuspendedRun {
    checkpoint: Checkpoint,
    ctx: RunContext,
    finished: bool,
    started: bool,
}

impl SuspendedRun {
    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Give up on the run
    pub fn into_context(self) -> RunContext {
        self.ctx
    }

    /// Rebuild the pipeline around `tasks` and continue from the checkpoint
    pub fn resume(self, tasks: Vec<Box<dyn Task>>) -> Result<Pipeline, PipelineError> {
        if self.finished {
            return Err(PipelineError::Finished);
        }
        if tasks.len() != self.checkpoint.task_count {
            return Err(PipelineError::TaskListMismatch {
                expected: self.checkpoint.task_count,
                found: tasks.len(),
            });
        }
        let Checkpoint { task, step, .. } = self.checkpoint;
        if let Some(current) = tasks.get(task) {
            if step > 0 && !current.supports_resuming() {
                return Err(PipelineError::NotResumable {
                    task: current.name().to_string(),
                    step,
                });
            }
        }

        info!(task, step, "pipeline resumed");
        self.ctx.events().emit(EventKind::PipelineResumed {
            task_index: task,
            step,
        });

        Ok(Pipeline {
            tasks,
            ctx: self.ctx,
            cursor: self.checkpoint,
            state: if self.started {
                PipelineState::Running
            } else {
                PipelineState::Ready
            },
            started_at: Some(Instant::now()),
            task_started_at: (step > 0).then(Instant::now),
        })
    }
}

// ============================================================================
// FRAME DRIVER
// ============================================================================

/// How a [`drive`] call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    Finished,
    /// Frame budget ran out; the pipeline can be ticked again or suspended
    Paused,
}

/// Tick the pipeline once per frame, like an engine update loop
///
/// With a `budget`, stops after that many frames without finishing.
pub async fn drive(
    pipeline: &mut Pipeline,
    frame: Duration,
    budget: Option<usize>,
) -> Result<Drive, PipelineError> {
    let mut ticker = tokio::time::interval(frame);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut frames = 0usize;
    loop {
        if budget.is_some_and(|b| frames >= b) {
            return Ok(Drive::Paused);
        }
        ticker.tick().await;
        frames += 1;
        if pipeline.tick()? == Progress::Finished {
            return Ok(Drive::Finished);
        }
    }
}
