//! # Platform Lifecycle Dispatcher
//!
//! Routes the five lifecycle events of a test run to the handler registered for
//! the run's [`BuildTarget`].
//!
//! ## Registration
//!
//! | Target    | Handler                  |
//! |-----------|--------------------------|
//! | `ios`     | [`ApplePlatformSetup`]   |
//! | `tvos`    | [`ApplePlatformSetup`]   |
//! | `android` | [`AndroidPlatformSetup`] |
//! | `switch`  | [`SwitchPlatformSetup`]  |
//!
//! Every other target has no handler and every event sent to it is a no-op.
//!
//! ## Lifecycle
//!
//! ```text
//! Unconfigured -> Setup -> Configured -> PostBuildAction -> BuildChecked
//!   -> PostSuccessfulBuildAction -> BuildConfirmed
//!   -> PostSuccessfulLaunchAction -> LaunchConfirmed -> CleanUp -> Unconfigured
//! ```
//!
//! Any event may be skipped. `CleanUp` is accepted from every state and
//! releases everything the handler allocated on the host.

pub mod android;
pub mod apple;
pub mod host;
pub mod switch;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

pub use android::AndroidPlatformSetup;
pub use apple::ApplePlatformSetup;
pub use host::{InMemoryHost, PlatformHost, ProcessHandle, SettingsGuard};
pub use switch::SwitchPlatformSetup;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Unknown build target '{0}'")]
    UnknownTarget(String),

    #[error("Failed to start '{program}': {details}")]
    Spawn { program: String, details: String },

    #[error("No running process with handle {0}")]
    NoSuchProcess(u32),

    #[error("{target} handler failed during {event}: {details}")]
    Handler {
        target: BuildTarget,
        event: LifecycleEvent,
        details: String,
    },
}

// ============================================================================
// BUILD TARGET
// ============================================================================

/// Platform a test player is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BuildTarget {
    #[default]
    StandaloneWindows64,
    StandaloneOsx,
    StandaloneLinux64,
    Ios,
    #[serde(rename = "tvos", alias = "tv-os")]
    TvOs,
    Android,
    Switch,
    #[serde(rename = "webgl", alias = "web-gl")]
    WebGl,
    Ps4,
    Ps5,
    XboxOne,
}

impl BuildTarget {
    pub const ALL: [BuildTarget; 11] = [
        BuildTarget::StandaloneWindows64,
        BuildTarget::StandaloneOsx,
        BuildTarget::StandaloneLinux64,
        BuildTarget::Ios,
        BuildTarget::TvOs,
        BuildTarget::Android,
        BuildTarget::Switch,
        BuildTarget::WebGl,
        BuildTarget::Ps4,
        BuildTarget::Ps5,
        BuildTarget::XboxOne,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildTarget::StandaloneWindows64 => "standalone-windows64",
            BuildTarget::StandaloneOsx => "standalone-osx",
            BuildTarget::StandaloneLinux64 => "standalone-linux64",
            BuildTarget::Ios => "ios",
            BuildTarget::TvOs => "tvos",
            BuildTarget::Android => "android",
            BuildTarget::Switch => "switch",
            BuildTarget::WebGl => "webgl",
            BuildTarget::Ps4 => "ps4",
            BuildTarget::Ps5 => "ps5",
            BuildTarget::XboxOne => "xbox-one",
        }
    }

    /// Extension of the player artifact produced for this target
    pub fn artifact_extension(self) -> &'static str {
        match self {
            BuildTarget::StandaloneWindows64 => "exe",
            BuildTarget::StandaloneOsx => "app",
            BuildTarget::Android => "apk",
            BuildTarget::Switch => "nsp",
            BuildTarget::Ios | BuildTarget::TvOs => "xcodeproj",
            _ => "bin",
        }
    }
}

impl fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildTarget {
    type Err = PlatformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_ascii_lowercase().replace('-', "");
        BuildTarget::ALL
            .into_iter()
            .find(|t| t.as_str().replace('-', "") == wanted)
            .ok_or_else(|| PlatformError::UnknownTarget(s.to_string()))
    }
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// The five events a platform handler reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Setup,
    PostBuildAction,
    PostSuccessfulBuildAction,
    PostSuccessfulLaunchAction,
    CleanUp,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleEvent::Setup => "Setup",
            LifecycleEvent::PostBuildAction => "PostBuildAction",
            LifecycleEvent::PostSuccessfulBuildAction => "PostSuccessfulBuildAction",
            LifecycleEvent::PostSuccessfulLaunchAction => "PostSuccessfulLaunchAction",
            LifecycleEvent::CleanUp => "CleanUp",
        };
        f.write_str(name)
    }
}

/// Where a handler is in its per-run lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Unconfigured,
    Configured,
    BuildChecked,
    BuildConfirmed,
    LaunchConfirmed,
}

impl LifecycleState {
    /// State a handler is in after successfully handling `event`
    pub fn after(event: LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::Setup => LifecycleState::Configured,
            LifecycleEvent::PostBuildAction => LifecycleState::BuildChecked,
            LifecycleEvent::PostSuccessfulBuildAction => LifecycleState::BuildConfirmed,
            LifecycleEvent::PostSuccessfulLaunchAction => LifecycleState::LaunchConfirmed,
            LifecycleEvent::CleanUp => LifecycleState::Unconfigured,
        }
    }
}

/// Platform-specific hooks around building and launching a test player
pub trait PlatformSetup: fmt::Debug {
    fn setup(&mut self, host: &mut dyn PlatformHost) -> Result<(), PlatformError>;

    fn post_build_action(&mut self, host: &mut dyn PlatformHost) -> Result<(), PlatformError>;

    fn post_successful_build_action(
        &mut self,
        host: &mut dyn PlatformHost,
    ) -> Result<(), PlatformError>;

    fn post_successful_launch_action(
        &mut self,
        host: &mut dyn PlatformHost,
    ) -> Result<(), PlatformError>;

    /// Must succeed from any state and release every host resource the handler owns
    fn clean_up(&mut self, host: &mut dyn PlatformHost) -> Result<(), PlatformError>;

    fn state(&self) -> LifecycleState;
}

/// Result of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    /// No handler registered for the target
    Unregistered,
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Holds one handler per supported platform and forwards events to the one for `target`
#[derive(Debug)]
pub struct PlatformSpecificSetup {
    target: BuildTarget,
    ios: ApplePlatformSetup,
    tvos: ApplePlatformSetup,
    android: AndroidPlatformSetup,
    switch: SwitchPlatformSetup,
}

impl PlatformSpecificSetup {
    pub fn new(target: BuildTarget) -> Self {
        Self {
            target,
            ios: ApplePlatformSetup::new(BuildTarget::Ios),
            tvos: ApplePlatformSetup::new(BuildTarget::TvOs),
            android: AndroidPlatformSetup::new(),
            switch: SwitchPlatformSetup::new(),
        }
    }

    pub fn target(&self) -> BuildTarget {
        self.target
    }

    /// Whether `target` has a registered handler
    pub fn is_registered(target: BuildTarget) -> bool {
        matches!(
            target,
            BuildTarget::Ios | BuildTarget::TvOs | BuildTarget::Android | BuildTarget::Switch
        )
    }

    /// Lifecycle state of the active handler, `None` when the target has none
    pub fn handler_state(&self) -> Option<LifecycleState> {
        match self.target {
            BuildTarget::Ios => Some(self.ios.state()),
            BuildTarget::TvOs => Some(self.tvos.state()),
            BuildTarget::Android => Some(self.android.state()),
            BuildTarget::Switch => Some(self.switch.state()),
            _ => None,
        }
    }

    pub fn setup(&mut self, host: &mut dyn PlatformHost) -> Result<Dispatch, PlatformError> {
        self.dispatch(LifecycleEvent::Setup, host)
    }

    pub fn post_build_action(
        &mut self,
        host: &mut dyn PlatformHost,
    ) -> Result<Dispatch, PlatformError> {
        self.dispatch(LifecycleEvent::PostBuildAction, host)
    }

    pub fn post_successful_build_action(
        &mut self,
        host: &mut dyn PlatformHost,
    ) -> Result<Dispatch, PlatformError> {
        self.dispatch(LifecycleEvent::PostSuccessfulBuildAction, host)
    }

    pub fn post_successful_launch_action(
        &mut self,
        host: &mut dyn PlatformHost,
    ) -> Result<Dispatch, PlatformError> {
        self.dispatch(LifecycleEvent::PostSuccessfulLaunchAction, host)
    }

    pub fn clean_up(&mut self, host: &mut dyn PlatformHost) -> Result<Dispatch, PlatformError> {
        self.dispatch(LifecycleEvent::CleanUp, host)
    }

    /// Forward `event` to the handler for the configured target
    pub fn dispatch(
        &mut self,
        event: LifecycleEvent,
        host: &mut dyn PlatformHost,
    ) -> Result<Dispatch, PlatformError> {
        let target = self.target;
        let mut registry = self.registry();

        let Some(handler) = registry.get_mut(&target) else {
            trace!(%target, %event, "no platform handler registered");
            return Ok(Dispatch::Unregistered);
        };

        debug!(%target, %event, "dispatching lifecycle event");
        match event {
            LifecycleEvent::Setup => handler.setup(host)?,
            LifecycleEvent::PostBuildAction => handler.post_build_action(host)?,
            LifecycleEvent::PostSuccessfulBuildAction => {
                handler.post_successful_build_action(host)?
            }
            LifecycleEvent::PostSuccessfulLaunchAction => {
                handler.post_successful_launch_action(host)?
            }
            LifecycleEvent::CleanUp => handler.clean_up(host)?,
        }
        Ok(Dispatch::Handled)
    }

    /// Rebuilt on every dispatch from the fixed registration list
    fn registry(&mut self) -> HashMap<BuildTarget, &mut dyn PlatformSetup> {
        let mut registry: HashMap<BuildTarget, &mut dyn PlatformSetup> = HashMap::with_capacity(4);
        registry.insert(BuildTarget::Ios, &mut self.ios);
        registry.insert(BuildTarget::TvOs, &mut self.tvos);
        registry.insert(BuildTarget::Android, &mut self.android);
        registry.insert(BuildTarget::Switch, &mut self.switch);
        registry
    }
}
