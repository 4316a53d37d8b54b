//! # Run Context
//!
//! The single mutable record a test run threads through its pipeline tasks.
//!
//! ```text
//! ExecutionSettings ──┐ (read-only input)
//!                     v
//!   ClassifyModulesTask  -> classification
//!   CreateBootstrapTask  -> bootstrap, runner_settings, controller
//!   PlayerRunTask        -> build_options   (dispatches lifecycle events)
//!   CleanupTask          -> (dispatches CleanUp)
//! ```
//!
//! Tasks never talk to each other directly; whatever a later task needs is
//! written here by an earlier one.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::Classification;
use crate::event_log::{EventKind, EventLog};
use crate::platform::{
    BuildTarget, Dispatch, LifecycleEvent, PlatformError, PlatformHost, PlatformSpecificSetup,
};

/// Name of the in-environment supervisor object
pub const CONTROLLER_NAME: &str = "Code-based tests runner";

const DEFAULT_HEARTBEAT_SECS: u64 = 600;

fn default_heartbeat() -> u64 {
    DEFAULT_HEARTBEAT_SECS
}

// ============================================================================
// EXECUTION SETTINGS
// ============================================================================

/// Selection of tests to run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFilter {
    #[serde(default)]
    pub test_names: Vec<String>,
    #[serde(default)]
    pub group_names: Vec<String>,
    #[serde(default)]
    pub category_names: Vec<String>,
    #[serde(default)]
    pub module_names: Vec<String>,
}

impl TestFilter {
    /// Filter as understood by the runtime test runner
    pub fn to_runtime_filter(&self, run_synchronously: bool) -> RuntimeFilter {
        RuntimeFilter {
            test_names: self.test_names.clone(),
            group_names: self.group_names.clone(),
            category_names: self.category_names.clone(),
            module_names: self.module_names.clone(),
            synchronous_only: run_synchronously,
        }
    }
}

/// Run configuration, fixed for the duration of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    #[serde(default)]
    pub target_platform: BuildTarget,
    #[serde(default)]
    pub filters: Vec<TestFilter>,
    #[serde(default)]
    pub ordered_test_names: Vec<String>,
    /// 0 keeps declaration order
    #[serde(default)]
    pub random_order_seed: i32,
    #[serde(default)]
    pub feature_flags: BTreeSet<String>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub repeat_count: u32,
    /// Headless run started by automation rather than a person
    #[serde(default)]
    pub automated: bool,
    #[serde(default)]
    pub run_synchronously: bool,
    #[serde(default = "default_heartbeat")]
    pub player_heartbeat_timeout_secs: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            target_platform: BuildTarget::default(),
            filters: Vec::new(),
            ordered_test_names: Vec::new(),
            random_order_seed: 0,
            feature_flags: BTreeSet::new(),
            retry_count: 0,
            repeat_count: 0,
            automated: false,
            run_synchronously: false,
            player_heartbeat_timeout_secs: DEFAULT_HEARTBEAT_SECS,
        }
    }
}

impl ExecutionSettings {
    pub fn for_target(target: BuildTarget) -> Self {
        Self {
            target_platform: target,
            ..Default::default()
        }
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.player_heartbeat_timeout_secs)
    }
}

// ============================================================================
// TASK OUTPUTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeFilter {
    pub test_names: Vec<String>,
    pub group_names: Vec<String>,
    pub category_names: Vec<String>,
    pub module_names: Vec<String>,
    pub synchronous_only: bool,
}

/// Settings handed to the runtime test runner inside the player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSettings {
    pub filters: Vec<RuntimeFilter>,
    pub ordered_test_names: Vec<String>,
    pub random_order_seed: i32,
    pub feature_flags: BTreeSet<String>,
    pub retry_count: u32,
    pub repeat_count: u32,
    pub automated: bool,
}

impl RunnerSettings {
    pub fn from_execution(settings: &ExecutionSettings) -> Self {
        Self {
            filters: settings
                .filters
                .iter()
                .map(|f| f.to_runtime_filter(settings.run_synchronously))
                .collect(),
            ordered_test_names: settings.ordered_test_names.clone(),
            random_order_seed: settings.random_order_seed,
            feature_flags: settings.feature_flags.clone(),
            retry_count: settings.retry_count,
            repeat_count: settings.repeat_count,
            automated: settings.automated,
        }
    }
}

/// How a fresh bootstrap environment is populated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneSetup {
    #[default]
    Empty,
    DefaultObjects,
}

/// Runnable environment the player boots into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapEnvironment {
    pub id: u64,
    pub setup: SceneSetup,
    pub objects: Vec<String>,
}

/// Supervisor placed in the bootstrap environment when the player runs tests itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestController {
    pub name: String,
    pub modules_with_tests: Vec<String>,
    pub settings: RunnerSettings,
}

/// Output of the player build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    pub target: BuildTarget,
    pub output_path: PathBuf,
    pub scenes: Vec<String>,
    pub development: bool,
    pub options: BTreeSet<String>,
}

// ============================================================================
// RUN CONTEXT
// ============================================================================

/// Shared state of one run
#[derive(Debug)]
pub struct RunContext {
    settings: ExecutionSettings,
    pub classification: Option<Classification>,
    pub bootstrap: Option<BootstrapEnvironment>,
    pub runner_settings: Option<RunnerSettings>,
    pub controller: Option<TestController>,
    pub build_options: Option<BuildOptions>,
    platform: PlatformSpecificSetup,
    host: Box<dyn PlatformHost>,
    events: EventLog,
}

impl RunContext {
    pub fn new(settings: ExecutionSettings, host: Box<dyn PlatformHost>) -> Self {
        let platform = PlatformSpecificSetup::new(settings.target_platform);
        Self {
            settings,
            classification: None,
            bootstrap: None,
            runner_settings: None,
            controller: None,
            build_options: None,
            platform,
            host,
            events: EventLog::new(),
        }
    }

    /// Builder: share an existing event log
    pub fn with_event_log(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    pub fn target(&self) -> BuildTarget {
        self.settings.target_platform
    }

    pub fn platform(&self) -> &PlatformSpecificSetup {
        &self.platform
    }

    pub fn host(&self) -> &dyn PlatformHost {
        self.host.as_ref()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Forward a lifecycle event to the platform handler of this run
    ///
    /// Targets without a handler are left untouched, event log included.
    pub fn dispatch(&mut self, event: LifecycleEvent) -> Result<Dispatch, PlatformError> {
        let outcome = self.platform.dispatch(event, self.host.as_mut())?;
        if outcome == Dispatch::Handled {
            debug!(target = %self.target(), %event, "lifecycle event handled");
            self.events.emit(EventKind::LifecycleDispatched {
                target: self.target(),
                event,
            });
        }
        Ok(outcome)
    }
}
