//! Run files
//!
//! A run file is YAML:
//!
//! ```yaml
//! schema: testrig/run@0.1
//! settings:
//!   target_platform: android
//!   random_order_seed: 12
//! modules:
//!   - name: Game.Tests
//!     location: Library/ScriptAssemblies/Game.Tests.dll
//!     references: [Game, nunit.framework]
//! pipeline:
//!   output_dir: Builds
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classifier::Classifier;
use crate::context::{ExecutionSettings, SceneSetup};
use crate::module::{CompilationCatalog, DeclaredFlags, FlagSource, Module, ModuleSet};
use crate::platform::BuildTarget;
use crate::tasks::DEFAULT_PRODUCT_NAME;

pub const SCHEMA: &str = "testrig/run@0.1";

/// Dotted identifier: `Game`, `Game.Tests`, `Unity.PerformanceTesting`
static MODULE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*(\.[A-Za-z0-9_\-]+)*$").unwrap());

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Unsupported schema '{found}' (expected '{}')", SCHEMA)]
    InvalidSchema { found: String },

    #[error("Module '{0}' is declared more than once")]
    DuplicateModule(String),

    #[error("Invalid module name '{0}'")]
    InvalidModuleName(String),

    #[error("Marker list is empty")]
    EmptyMarkers,

    #[error("frame_ms must be greater than zero")]
    ZeroFrameInterval,
}

// ============================================================================
// PIPELINE OPTIONS
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("Builds")
}

fn default_product_name() -> String {
    DEFAULT_PRODUCT_NAME.to_string()
}

fn default_frame_ms() -> u64 {
    16
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Place the test controller in the bootstrap environment
    #[serde(default = "default_true")]
    pub include_controller: bool,
    #[serde(default)]
    pub scene_setup: SceneSetup,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_product_name")]
    pub product_name: String,
    /// Interval between two pipeline ticks
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            include_controller: true,
            scene_setup: SceneSetup::default(),
            output_dir: default_output_dir(),
            product_name: default_product_name(),
            frame_ms: default_frame_ms(),
        }
    }
}

impl PipelineOptions {
    pub fn frame(&self) -> Duration {
        Duration::from_millis(self.frame_ms)
    }
}

// ============================================================================
// RUN CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub schema: String,
    #[serde(default)]
    pub settings: ExecutionSettings,
    #[serde(default)]
    pub modules: Vec<Module>,
    /// When present, edit-time-only flags come from here instead of the modules
    #[serde(default)]
    pub catalog: Option<CompilationCatalog>,
    /// Replaces the default test markers
    #[serde(default)]
    pub markers: Option<Vec<String>>,
    #[serde(default)]
    pub pipeline: PipelineOptions,
}

/// Command-line overrides of the execution settings
#[derive(Debug, Clone, Copy, Default)]
pub struct SettingsOverride {
    pub platform: Option<BuildTarget>,
    pub seed: Option<i32>,
    pub retry: Option<u32>,
    pub repeat: Option<u32>,
}

impl RunConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read, parse and validate a run file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema != SCHEMA {
            return Err(ConfigError::InvalidSchema {
                found: self.schema.clone(),
            });
        }

        let mut seen = HashSet::new();
        for module in &self.modules {
            if !MODULE_NAME.is_match(&module.name) {
                return Err(ConfigError::InvalidModuleName(module.name.clone()));
            }
            if !seen.insert(module.name.as_str()) {
                return Err(ConfigError::DuplicateModule(module.name.clone()));
            }
        }

        if self.markers.as_ref().is_some_and(|m| m.is_empty()) {
            return Err(ConfigError::EmptyMarkers);
        }
        if self.pipeline.frame_ms == 0 {
            return Err(ConfigError::ZeroFrameInterval);
        }
        Ok(())
    }

    pub fn apply(&mut self, overrides: SettingsOverride) {
        if let Some(platform) = overrides.platform {
            self.settings.target_platform = platform;
        }
        if let Some(seed) = overrides.seed {
            self.settings.random_order_seed = seed;
        }
        if let Some(retry) = overrides.retry {
            self.settings.retry_count = retry;
        }
        if let Some(repeat) = overrides.repeat {
            self.settings.repeat_count = repeat;
        }
    }

    pub fn module_set(&self) -> ModuleSet {
        self.modules.iter().cloned().collect()
    }

    pub fn classifier(&self) -> Classifier {
        match &self.markers {
            Some(markers) => Classifier::new(markers.iter().cloned()),
            None => Classifier::default(),
        }
    }

    pub fn flag_source(&self) -> Box<dyn FlagSource> {
        match &self.catalog {
            Some(catalog) => Box::new(catalog.clone()),
            None => Box::new(DeclaredFlags),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::TestPlatform;

    const RUN: &str = r#"
schema: testrig/run@0.1
settings:
  target_platform: switch
  random_order_seed: 12
modules:
  - name: Game
    location: Library/Game.dll
  - name: Game.Tests
    location: Library/Game.Tests.dll
    references: [Game, nunit.framework]
pipeline:
  scene_setup: default_objects
"#;

    #[test]
    fn parses_with_defaults() {
        let config = RunConfig::from_yaml(RUN).unwrap();
        config.validate().unwrap();

        assert_eq!(config.settings.target_platform, BuildTarget::Switch);
        assert_eq!(config.settings.random_order_seed, 12);
        assert_eq!(config.modules.len(), 2);
        assert!(config.pipeline.include_controller);
        assert_eq!(config.pipeline.scene_setup, SceneSetup::DefaultObjects);
        assert_eq!(config.pipeline.output_dir, PathBuf::from("Builds"));
        assert_eq!(config.pipeline.frame(), Duration::from_millis(16));
    }

    #[test]
    fn target_platform_accepts_cli_spellings() {
        for (name, target) in [
            ("tvos", BuildTarget::TvOs),
            ("webgl", BuildTarget::WebGl),
            ("standalone-osx", BuildTarget::StandaloneOsx),
        ] {
            let yaml = RUN.replace("target_platform: switch", &format!("target_platform: {name}"));
            let config = RunConfig::from_yaml(&yaml).unwrap();
            assert_eq!(config.settings.target_platform, target);
            assert_eq!(name.parse::<BuildTarget>().unwrap(), target);
        }
    }

    #[test]
    fn rejects_wrong_schema() {
        let yaml = RUN.replace("testrig/run@0.1", "testrig/run@9");
        let err = RunConfig::from_yaml(&yaml).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSchema { found } if found == "testrig/run@9"));
    }

    #[test]
    fn rejects_duplicate_modules() {
        let yaml = RUN.replace("name: Game.Tests", "name: Game");
        let err = RunConfig::from_yaml(&yaml).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateModule(name) if name == "Game"));
    }

    #[test]
    fn rejects_bad_module_names() {
        for bad in ["1Game", "Game..Tests", "Game Tests", ""] {
            let mut config = RunConfig::from_yaml(RUN).unwrap();
            config.modules[0].name = bad.to_string();
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidModuleName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_zero_frame_and_empty_markers() {
        let mut config = RunConfig::from_yaml(RUN).unwrap();
        config.pipeline.frame_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroFrameInterval)));

        let mut config = RunConfig::from_yaml(RUN).unwrap();
        config.markers = Some(Vec::new());
        assert!(matches!(config.validate(), Err(ConfigError::EmptyMarkers)));
    }

    #[test]
    fn overrides_replace_settings() {
        let mut config = RunConfig::from_yaml(RUN).unwrap();
        config.apply(SettingsOverride {
            platform: Some(BuildTarget::Android),
            retry: Some(3),
            ..Default::default()
        });
        assert_eq!(config.settings.target_platform, BuildTarget::Android);
        assert_eq!(config.settings.retry_count, 3);
        assert_eq!(config.settings.random_order_seed, 12);
    }

    #[test]
    fn custom_markers_drive_the_classifier() {
        let mut config = RunConfig::from_yaml(RUN).unwrap();
        config.markers = Some(vec!["Game".to_string()]);
        let classification = config
            .classifier()
            .classify_with(&config.module_set(), config.flag_source().as_ref());
        assert_eq!(classification.names(TestPlatform::PlayMode), vec!["Game.Tests"]);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = RunConfig::load("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
