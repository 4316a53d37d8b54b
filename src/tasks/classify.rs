//! Classify the loaded modules, one test module per step

use tracing::info;

use crate::classifier::{bucket_for, Classification, Classifier, TestPlatform};
use crate::context::RunContext;
use crate::event_log::EventKind;
use crate::module::{DeclaredFlags, FlagSource, ModuleSet};
use crate::pipeline::{Step, Task, TaskError};

/// Fills `ctx.classification`, yielding after every test module it files
///
/// The relevant module list is recomputed on first use, so a fresh instance
/// can pick up a suspended run at any step.
pub struct ClassifyModulesTask {
    modules: ModuleSet,
    classifier: Classifier,
    flags: Box<dyn FlagSource>,
    relevant: Option<Vec<String>>,
}

impl ClassifyModulesTask {
    pub fn new(modules: ModuleSet, classifier: Classifier) -> Self {
        Self {
            modules,
            classifier,
            flags: Box::new(DeclaredFlags),
            relevant: None,
        }
    }

    /// Builder: take the edit-time-only flag from another source
    pub fn with_flags(mut self, flags: Box<dyn FlagSource>) -> Self {
        self.flags = flags;
        self
    }

    fn relevant(&mut self) -> &[String] {
        let modules = &self.modules;
        let classifier = &self.classifier;
        self.relevant.get_or_insert_with(|| {
            classifier
                .test_relevant(modules)
                .into_iter()
                .map(|m| m.name.clone())
                .collect()
        })
    }
}

impl Task for ClassifyModulesTask {
    fn name(&self) -> &str {
        "Classify Test Modules"
    }

    fn supports_resuming(&self) -> bool {
        true
    }

    fn step(&mut self, step: usize, ctx: &mut RunContext) -> Result<Step, TaskError> {
        if step == 0 {
            ctx.classification = Some(Classification::new());
        }

        let Some(name) = self.relevant().get(step).cloned() else {
            let classification = ctx.classification.get_or_insert_with(Classification::new);
            let edit_mode = classification.bucket(TestPlatform::EditMode).len();
            let play_mode = classification.bucket(TestPlatform::PlayMode).len();
            info!(edit_mode, play_mode, "test modules classified");
            ctx.events()
                .emit(EventKind::ModulesClassified { edit_mode, play_mode });
            return Ok(Step::Done);
        };

        if let Some(module) = self.modules.get(&name) {
            if let Some(platform) = bucket_for(module, self.flags.as_ref()) {
                ctx.classification
                    .get_or_insert_with(Classification::new)
                    .insert(platform, module.clone());
            }
        }
        Ok(Step::Yield)
    }
}
