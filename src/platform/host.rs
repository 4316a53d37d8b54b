//! Host side of the platform hooks
//!
//! The [`PlatformHost`] is what handlers act on: the editor's build settings and
//! the device tooling processes (port forwarders, log readers). The crate only
//! ships [`InMemoryHost`]; real hosts live with the build toolchain.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PlatformError;

/// Handle of a process spawned through a [`PlatformHost`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessHandle(pub u32);

impl fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Build settings store and device tooling used by platform handlers
pub trait PlatformHost: fmt::Debug {
    fn build_setting(&self, key: &str) -> Option<String>;

    /// `None` removes the setting
    fn set_build_setting(&mut self, key: &str, value: Option<String>);

    fn spawn(&mut self, program: &str, args: &[String]) -> Result<ProcessHandle, PlatformError>;

    fn kill(&mut self, handle: ProcessHandle) -> Result<(), PlatformError>;

    /// Processes spawned through this host that are still alive
    fn running_processes(&self) -> Vec<ProcessHandle>;
}

/// In-process host: settings in a map, processes are only recorded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryHost {
    settings: BTreeMap<String, String>,
    running: BTreeMap<ProcessHandle, String>,
    /// Every command line ever spawned, in order
    history: Vec<String>,
    next_handle: u32,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: preset a build setting
    pub fn with_setting(mut self, key: &str, value: &str) -> Self {
        self.settings.insert(key.to_string(), value.to_string());
        self
    }

    pub fn settings(&self) -> &BTreeMap<String, String> {
        &self.settings
    }

    /// Command lines of processes still running
    pub fn running(&self) -> Vec<&str> {
        self.running.values().map(String::as_str).collect()
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }
}

impl PlatformHost for InMemoryHost {
    fn build_setting(&self, key: &str) -> Option<String> {
        self.settings.get(key).cloned()
    }

    fn set_build_setting(&mut self, key: &str, value: Option<String>) {
        match value {
            Some(v) => {
                self.settings.insert(key.to_string(), v);
            }
            None => {
                self.settings.remove(key);
            }
        }
    }

    fn spawn(&mut self, program: &str, args: &[String]) -> Result<ProcessHandle, PlatformError> {
        if program.is_empty() {
            return Err(PlatformError::Spawn {
                program: program.to_string(),
                details: "empty program name".to_string(),
            });
        }
        let handle = ProcessHandle(self.next_handle);
        self.next_handle += 1;

        let command_line = std::iter::once(program)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        debug!(%handle, command = %command_line, "spawned host process");
        self.history.push(command_line.clone());
        self.running.insert(handle, command_line);
        Ok(handle)
    }

    fn kill(&mut self, handle: ProcessHandle) -> Result<(), PlatformError> {
        self.running
            .remove(&handle)
            .map(|_| ())
            .ok_or(PlatformError::NoSuchProcess(handle.0))
    }

    fn running_processes(&self) -> Vec<ProcessHandle> {
        self.running.keys().copied().collect()
    }
}

/// Remembers original build settings so a handler can put them back
///
/// Only the first override of a key is recorded, so repeated `apply` calls
/// still restore the value from before the run.
#[derive(Debug, Clone, Default)]
pub struct SettingsGuard {
    saved: Vec<(String, Option<String>)>,
}

impl SettingsGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, host: &mut dyn PlatformHost, key: &str, value: &str) {
        if !self.saved.iter().any(|(k, _)| k == key) {
            self.saved.push((key.to_string(), host.build_setting(key)));
        }
        host.set_build_setting(key, Some(value.to_string()));
    }

    /// Put back every recorded setting, newest first
    pub fn restore(&mut self, host: &mut dyn PlatformHost) {
        for (key, original) in self.saved.drain(..).rev() {
            host.set_build_setting(&key, original);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.saved.is_empty()
    }
}
