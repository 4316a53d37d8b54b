//! Android hooks
//!
//! The player connects back to the orchestrator over a forwarded adb port.
//! The forward is opened once the player is launched and torn down on clean up.

use tracing::{debug, warn};

use super::host::{PlatformHost, ProcessHandle, SettingsGuard};
use super::{LifecycleEvent, LifecycleState, PlatformError, PlatformSetup};

pub const DEFAULT_CONNECTION_PORT: u16 = 34999;

const DEVELOPMENT_BUILD: &str = "android.development_build";
const INTERNET_PERMISSION: &str = "android.force_internet_permission";
const BUNDLE_IDENTIFIER: &str = "player.bundle_identifier";

#[derive(Debug)]
pub struct AndroidPlatformSetup {
    state: LifecycleState,
    guard: SettingsGuard,
    port: u16,
    forward: Option<ProcessHandle>,
}

impl Default for AndroidPlatformSetup {
    fn default() -> Self {
        Self::new()
    }
}

impl AndroidPlatformSetup {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Unconfigured,
            guard: SettingsGuard::new(),
            port: DEFAULT_CONNECTION_PORT,
            forward: None,
        }
    }

    /// Builder: local port the player connects through
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Port-forward process, if one is open
    pub fn forward(&self) -> Option<ProcessHandle> {
        self.forward
    }

    fn forward_args(&self, host: &dyn PlatformHost) -> Vec<String> {
        let bundle = host
            .build_setting(BUNDLE_IDENTIFIER)
            .unwrap_or_else(|| "testrig.player".to_string());
        vec![
            "forward".to_string(),
            format!("tcp:{}", self.port),
            format!("localabstract:testrig-{bundle}"),
        ]
    }
}

impl PlatformSetup for AndroidPlatformSetup {
    fn setup(&mut self, host: &mut dyn PlatformHost) -> Result<(), PlatformError> {
        self.guard.apply(host, DEVELOPMENT_BUILD, "true");
        self.guard.apply(host, INTERNET_PERMISSION, "true");
        self.state = LifecycleState::after(LifecycleEvent::Setup);
        Ok(())
    }

    fn post_build_action(&mut self, _host: &mut dyn PlatformHost) -> Result<(), PlatformError> {
        self.state = LifecycleState::after(LifecycleEvent::PostBuildAction);
        Ok(())
    }

    fn post_successful_build_action(
        &mut self,
        _host: &mut dyn PlatformHost,
    ) -> Result<(), PlatformError> {
        self.state = LifecycleState::after(LifecycleEvent::PostSuccessfulBuildAction);
        Ok(())
    }

    fn post_successful_launch_action(
        &mut self,
        host: &mut dyn PlatformHost,
    ) -> Result<(), PlatformError> {
        if self.forward.is_none() {
            let args = self.forward_args(host);
            let handle = host.spawn("adb", &args)?;
            debug!(%handle, port = self.port, "opened adb port forward");
            self.forward = Some(handle);
        }
        self.state = LifecycleState::after(LifecycleEvent::PostSuccessfulLaunchAction);
        Ok(())
    }

    fn clean_up(&mut self, host: &mut dyn PlatformHost) -> Result<(), PlatformError> {
        // settings go back even when the forward is already gone
        let killed = match self.forward.take() {
            Some(handle) => host.kill(handle),
            None => Ok(()),
        };
        self.guard.restore(host);
        self.state = LifecycleState::Unconfigured;

        if let Err(ref e) = killed {
            warn!(error = %e, "adb port forward was not running");
        }
        killed
    }

    fn state(&self) -> LifecycleState {
        self.state
    }
}
