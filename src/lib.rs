//! Testrig - automated test run orchestration
//!
//! - [`classifier`]: finds test modules in a reference graph
//! - [`pipeline`]: resumable, frame-ticked task execution
//! - [`platform`]: per-target lifecycle hooks around build and launch

pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod event_log;
pub mod module;
pub mod pipeline;
pub mod platform;
pub mod runner;
pub mod tasks;
pub mod toolchain;

pub use classifier::{classify, Classification, Classifier, PlatformFilter, TestPlatform};
pub use config::{RunConfig, SettingsOverride};
pub use context::{ExecutionSettings, RunContext};
pub use error::{FixSuggestion, TestrigError};
pub use event_log::{Event, EventKind, EventLog};
pub use module::{CompilationCatalog, FlagSource, Module, ModuleSet};
pub use pipeline::{Pipeline, PipelineError, Step, SuspendedRun, Task, TaskError};
pub use platform::{BuildTarget, LifecycleEvent, PlatformSpecificSetup};
pub use runner::{standard_tasks, RunReport, TestRun};
