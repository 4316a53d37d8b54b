//! Loaded modules and the compilation catalog
//!
//! A [`Module`] is a compiled unit as reported by the module source: name,
//! file location, declared references and the edit-time-only flag. Modules are
//! identified by name only.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A compiled unit of code with its declared dependencies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// Path of the compiled artifact
    pub location: String,
    /// Names of the modules this one references, in declaration order
    #[serde(default)]
    pub references: Vec<String>,
    /// Usable only inside the authoring environment
    #[serde(default)]
    pub editor_only: bool,
}

impl Module {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            references: Vec::new(),
            editor_only: false,
        }
    }

    /// Builder: add referenced module names
    pub fn with_references<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.references.extend(references.into_iter().map(Into::into));
        self
    }

    /// Builder: mark as edit-time only
    pub fn editor_only(mut self) -> Self {
        self.editor_only = true;
        self
    }

    /// Last component of `location` (`Library/Foo.Tests.dll` -> `Foo.Tests.dll`)
    pub fn file_name(&self) -> &str {
        Path::new(&self.location)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.location)
    }
}

/// Ordered, name-indexed set of loaded modules
///
/// Insertion order is kept so that classification output is deterministic.
#[derive(Debug, Clone, Default)]
pub struct ModuleSet {
    modules: Vec<Module>,
    index: HashMap<String, usize>,
}

impl ModuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a module; a second module with the same name is the same node and is dropped
    pub fn insert(&mut self, module: Module) -> bool {
        if self.index.contains_key(&module.name) {
            warn!(module = %module.name, "duplicate module name, keeping first");
            return false;
        }
        self.index.insert(module.name.clone(), self.modules.len());
        self.modules.push(module);
        true
    }

    pub fn get(&self, name: &str) -> Option<&Module> {
        self.index.get(name).map(|&i| &self.modules[i])
    }

    /// Position of a module in insertion order
    pub(crate) fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Module> {
        self.modules.iter()
    }

    pub fn as_slice(&self) -> &[Module] {
        &self.modules
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl FromIterator<Module> for ModuleSet {
    fn from_iter<T: IntoIterator<Item = Module>>(iter: T) -> Self {
        let mut set = ModuleSet::new();
        for module in iter {
            set.insert(module);
        }
        set
    }
}

impl<'a> IntoIterator for &'a ModuleSet {
    type Item = &'a Module;
    type IntoIter = std::slice::Iter<'a, Module>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.iter()
    }
}

impl<'de> Deserialize<'de> for ModuleSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Vec::<Module>::deserialize(deserializer)?;
        Ok(raw.into_iter().collect())
    }
}

impl Serialize for ModuleSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.modules.serialize(serializer)
    }
}

// ============================================================================
// FLAG SOURCES
// ============================================================================

/// Where the edit-time-only flag of a test module comes from
pub trait FlagSource {
    /// `None` means the module is unknown to this source and must be skipped
    fn editor_only(&self, module: &Module) -> Option<bool>;
}

/// Uses the flag declared on the module itself
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredFlags;

impl FlagSource for DeclaredFlags {
    fn editor_only(&self, module: &Module) -> Option<bool> {
        Some(module.editor_only)
    }
}

/// One entry of the compiler's module listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// File name or path of the compiled artifact
    pub file: String,
    #[serde(default)]
    pub editor_only: bool,
}

impl CatalogEntry {
    fn file_name(&self) -> &str {
        Path::new(&self.file)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.file)
    }
}

/// Compiler-side listing of script and precompiled modules, matched by file name
///
/// Script modules take precedence over precompiled ones with the same file name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompilationCatalog {
    #[serde(default)]
    pub scripts: Vec<CatalogEntry>,
    #[serde(default)]
    pub precompiled: Vec<CatalogEntry>,
}

impl FlagSource for CompilationCatalog {
    fn editor_only(&self, module: &Module) -> Option<bool> {
        let file = module.file_name();
        self.scripts
            .iter()
            .chain(self.precompiled.iter())
            .find(|entry| entry.file_name() == file)
            .map(|entry| entry.editor_only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_strips_directories() {
        let m = Module::new("Game.Tests", "Library/ScriptAssemblies/Game.Tests.dll");
        assert_eq!(m.file_name(), "Game.Tests.dll");

        let bare = Module::new("Bare", "Bare.dll");
        assert_eq!(bare.file_name(), "Bare.dll");
    }

    #[test]
    fn duplicate_names_keep_first() {
        let mut set = ModuleSet::new();
        assert!(set.insert(Module::new("A", "a1.dll")));
        assert!(!set.insert(Module::new("A", "a2.dll")));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("A").unwrap().location, "a1.dll");
    }

    #[test]
    fn module_set_parses_from_yaml() {
        let yaml = r#"
- name: Game.Tests
  location: Library/Game.Tests.dll
  references: [Game, nunit.framework]
- name: Game
  location: Library/Game.dll
"#;
        let set: ModuleSet = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("Game.Tests").unwrap().references.len(), 2);
        assert!(!set.get("Game").unwrap().editor_only);
        assert_eq!(set.position("Game"), Some(1));
    }

    #[test]
    fn catalog_prefers_script_entries() {
        let catalog = CompilationCatalog {
            scripts: vec![CatalogEntry { file: "Game.Tests.dll".into(), editor_only: true }],
            precompiled: vec![
                CatalogEntry { file: "Plugins/Game.Tests.dll".into(), editor_only: false },
                CatalogEntry { file: "Plugins/Vendor.dll".into(), editor_only: false },
            ],
        };

        let tests = Module::new("Game.Tests", "Library/Game.Tests.dll");
        let vendor = Module::new("Vendor", "Assets/Plugins/Vendor.dll");
        let unknown = Module::new("Unknown", "Unknown.dll");

        assert_eq!(catalog.editor_only(&tests), Some(true));
        assert_eq!(catalog.editor_only(&vendor), Some(false));
        assert_eq!(catalog.editor_only(&unknown), None);
    }
}
