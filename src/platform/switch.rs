//! Switch hooks: the test player needs a ROM file, host IO and sockets

use super::host::{PlatformHost, SettingsGuard};
use super::{LifecycleEvent, LifecycleState, PlatformError, PlatformSetup};

const OVERRIDES: &[(&str, &str)] = &[
    ("switch.create_rom_file", "true"),
    ("switch.enable_host_io", "true"),
    ("switch.socket_enabled", "true"),
];

#[derive(Debug, Default)]
pub struct SwitchPlatformSetup {
    state: LifecycleState,
    guard: SettingsGuard,
}

impl SwitchPlatformSetup {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlatformSetup for SwitchPlatformSetup {
    fn setup(&mut self, host: &mut dyn PlatformHost) -> Result<(), PlatformError> {
        for (key, value) in OVERRIDES {
            self.guard.apply(host, key, value);
        }
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
