//! iOS and tvOS hooks
//!
//! Engine code stripping breaks reflection-based test discovery, so it is
//! switched off for the build and put back as soon as the build is done.

use tracing::debug;

use super::host::{PlatformHost, SettingsGuard};
use super::{BuildTarget, LifecycleEvent, LifecycleState, PlatformError, PlatformSetup};

const STRIP_ENGINE_CODE: &str = "player.strip_engine_code";

#[derive(Debug)]
pub struct ApplePlatformSetup {
    target: BuildTarget,
    state: LifecycleState,
    guard: SettingsGuard,
}

impl ApplePlatformSetup {
    pub fn new(target: BuildTarget) -> Self {
        Self {
            target,
            state: LifecycleState::Unconfigured,
            guard: SettingsGuard::new(),
        }
    }

    pub fn target(&self) -> BuildTarget {
        self.target
    }

    fn signing_key(&self) -> String {
        format!("{}.automatic_signing", self.target.as_str())
    }
}

impl PlatformSetup for ApplePlatformSetup {
    fn setup(&mut self, host: &mut dyn PlatformHost) -> Result<(), PlatformError> {
        self.guard.apply(host, STRIP_ENGINE_CODE, "false");
        let signing = self.signing_key();
        self.guard.apply(host, &signing, "true");
        self.state = LifecycleState::after(LifecycleEvent::Setup);
        Ok(())
    }

    fn post_build_action(&mut self, host: &mut dyn PlatformHost) -> Result<(), PlatformError> {
        // the build has consumed the overrides
        self.guard.restore(host);
        debug!(target = %self.target, "restored player settings after build");
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
        _host: &mut dyn PlatformHost,
    ) -> Result<(), PlatformError> {
        self.state = LifecycleState::after(LifecycleEvent::PostSuccessfulLaunchAction);
        Ok(())
    }

    fn clean_up(&mut self, host: &mut dyn PlatformHost) -> Result<(), PlatformError> {
        self.guard.restore(host);
        self.state = LifecycleState::Unconfigured;
        Ok(())
    }

    fn state(&self) -> LifecycleState {
        self.state
    }
}
