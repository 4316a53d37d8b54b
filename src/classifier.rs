//! Reference graph classifier
//!
//! Finds the modules that reference a test marker directly or through any
//! chain of references, then sorts them into edit-mode and play-mode buckets.
//!
//! The walk is depth-first and iterative. Each module carries one of three
//! marks: unvisited, in progress, or done with a result. Re-entering an
//! in-progress module counts as "not proven" for that edge, so a module in a
//! cycle is only test-relevant through an acyclic path to a marker.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::module::{DeclaredFlags, FlagSource, Module, ModuleSet};

/// Assertion library, runtime test runner and performance testing package
pub const DEFAULT_TEST_MARKERS: &[&str] = &[
    "nunit.framework",
    "UnityEngine.TestRunner",
    "Unity.PerformanceTesting",
];

static DEFAULT_MARKER_SET: Lazy<HashSet<String>> =
    Lazy::new(|| DEFAULT_TEST_MARKERS.iter().map(|s| s.to_string()).collect());

// ============================================================================
// TEST PLATFORM
// ============================================================================

/// Category a test module runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestPlatform {
    /// Edit-time only, runs inside the authoring environment
    EditMode,
    /// Runtime capable, runs in a built player
    PlayMode,
}

impl TestPlatform {
    pub const ALL: [TestPlatform; 2] = [TestPlatform::EditMode, TestPlatform::PlayMode];

    fn from_editor_only(editor_only: bool) -> Self {
        if editor_only {
            TestPlatform::EditMode
        } else {
            TestPlatform::PlayMode
        }
    }
}

impl fmt::Display for TestPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestPlatform::EditMode => write!(f, "EditMode"),
            TestPlatform::PlayMode => write!(f, "PlayMode"),
        }
    }
}

/// Set of [`TestPlatform`]s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformFilter(u8);

impl PlatformFilter {
    pub const EDIT_MODE: PlatformFilter = PlatformFilter(0b01);
    pub const PLAY_MODE: PlatformFilter = PlatformFilter(0b10);
    pub const ALL: PlatformFilter = PlatformFilter(0b11);

    #[inline]
    pub fn includes(self, platform: TestPlatform) -> bool {
        let bit = match platform {
            TestPlatform::EditMode => Self::EDIT_MODE.0,
            TestPlatform::PlayMode => Self::PLAY_MODE.0,
        };
        self.0 & bit == bit
    }
}

impl From<TestPlatform> for PlatformFilter {
    fn from(platform: TestPlatform) -> Self {
        match platform {
            TestPlatform::EditMode => Self::EDIT_MODE,
            TestPlatform::PlayMode => Self::PLAY_MODE,
        }
    }
}

// ============================================================================
// CLASSIFICATION
// ============================================================================

/// Test modules grouped by [`TestPlatform`], each bucket in discovery order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    buckets: BTreeMap<TestPlatform, Vec<Module>>,
}

impl Default for Classification {
    fn default() -> Self {
        let buckets = TestPlatform::ALL.iter().map(|p| (*p, Vec::new())).collect();
        Self { buckets }
    }
}

impl Classification {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bucket(&self, platform: TestPlatform) -> &[Module] {
        self.buckets
            .get(&platform)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Append a module to a bucket; a module already present anywhere is ignored
    pub fn insert(&mut self, platform: TestPlatform, module: Module) -> bool {
        if self.contains(&module.name) {
            return false;
        }
        self.push(platform, module);
        true
    }

    fn push(&mut self, platform: TestPlatform, module: Module) {
        self.buckets.entry(platform).or_default().push(module);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.buckets.values().flatten().any(|m| m.name == name)
    }

    /// Flattened modules of the buckets included in `filter`, edit mode first
    pub fn select(&self, filter: PlatformFilter) -> Vec<&Module> {
        self.buckets
            .iter()
            .filter(|(platform, _)| filter.includes(**platform))
            .flat_map(|(_, modules)| modules.iter())
            .collect()
    }

    /// Module names of one bucket
    pub fn names(&self, platform: TestPlatform) -> Vec<String> {
        self.bucket(platform).iter().map(|m| m.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// CLASSIFIER
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done(bool),
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    module: usize,
    next_ref: usize,
    /// Child we descended into, checked when control comes back
    pending: Option<usize>,
}

/// Classifies loaded modules against a set of test marker names
#[derive(Debug, Clone)]
pub struct Classifier {
    markers: HashSet<String>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            markers: DEFAULT_MARKER_SET.clone(),
        }
    }
}

impl Classifier {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn markers(&self) -> &HashSet<String> {
        &self.markers
    }

    #[inline]
    fn references_marker(&self, module: &Module) -> bool {
        module.references.iter().any(|r| self.markers.contains(r))
    }

    /// Classify using the flag each module declares
    pub fn classify(&self, modules: &ModuleSet) -> Classification {
        self.classify_with(modules, &DeclaredFlags)
    }

    /// Classify using an external flag source; modules it does not know are skipped
    pub fn classify_with(&self, modules: &ModuleSet, flags: &dyn FlagSource) -> Classification {
        let mut result = Classification::new();
        for module in self.test_relevant(modules) {
            if let Some(platform) = bucket_for(module, flags) {
                // test_relevant yields each module once
                result.push(platform, module.clone());
            }
        }
        debug!(
            edit_mode = result.bucket(TestPlatform::EditMode).len(),
            play_mode = result.bucket(TestPlatform::PlayMode).len(),
            "classified test modules"
        );
        result
    }

    /// All test-relevant modules, in the order their relevance was established
    pub fn test_relevant<'a>(&self, modules: &'a ModuleSet) -> Vec<&'a Module> {
        let all = modules.as_slice();
        let mut marks = vec![Mark::Unvisited; all.len()];
        let mut relevant: Vec<usize> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();

        let mut finish = |idx: usize, value: bool, marks: &mut Vec<Mark>| {
            marks[idx] = Mark::Done(value);
            if value {
                relevant.push(idx);
            }
        };

        for root in 0..all.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            marks[root] = Mark::InProgress;
            if self.references_marker(&all[root]) {
                finish(root, true, &mut marks);
                continue;
            }
            stack.push(Frame { module: root, next_ref: 0, pending: None });

            while let Some(top) = stack.len().checked_sub(1) {
                let idx = stack[top].module;
                let mut proven = stack[top]
                    .pending
                    .take()
                    .is_some_and(|child| marks[child] == Mark::Done(true));
                let mut descend = None;

                let refs = &all[idx].references;
                while !proven && stack[top].next_ref < refs.len() {
                    let reference = &refs[stack[top].next_ref];
                    stack[top].next_ref += 1;

                    // absent modules are a graph boundary
                    let Some(child) = modules.position(reference) else {
                        continue;
                    };
                    let mark = marks[child];
                    match mark {
                        Mark::Unvisited => {
                            marks[child] = Mark::InProgress;
                            if self.references_marker(&all[child]) {
                                finish(child, true, &mut marks);
                                proven = true;
                            } else {
                                descend = Some(child);
                                break;
                            }
                        }
                        Mark::Done(true) => proven = true,
                        Mark::InProgress | Mark::Done(false) => {}
                    }
                }

                if let Some(child) = descend {
                    stack[top].pending = Some(child);
                    stack.push(Frame { module: child, next_ref: 0, pending: None });
                    continue;
                }

                finish(idx, proven, &mut marks);
                stack.pop();
            }
        }

        relevant.into_iter().map(|i| &all[i]).collect()
    }
}

/// Bucket for one test-relevant module, `None` if the flag source does not know it
pub fn bucket_for(module: &Module, flags: &dyn FlagSource) -> Option<TestPlatform> {
    flags.editor_only(module).map(TestPlatform::from_editor_only)
}

/// Classify `modules` against `markers` using each module's declared flag
pub fn classify<I, S>(modules: &ModuleSet, markers: I) -> Classification
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Classifier::new(markers).classify(modules)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(name: &str, refs: &[&str]) -> Module {
        Module::new(name, format!("Library/{name}.dll")).with_references(refs.iter().copied())
    }

    fn names(modules: &[&Module]) -> Vec<String> {
        modules.iter().map(|m| m.name.clone()).collect()
    }

    #[test]
    fn chain_reaches_marker() {
        let set: ModuleSet = vec![m("A", &["B"]), m("B", &["C"]), m("C", &["marker"])]
            .into_iter()
            .collect();
        let relevant = Classifier::new(["marker"]).test_relevant(&set);
        // completion order: C resolves first, then B, then A
        assert_eq!(names(&relevant), vec!["C", "B", "A"]);
    }

    #[test]
    fn broken_chain_only_keeps_direct_referrer() {
        let set: ModuleSet = vec![m("A", &["B"]), m("B", &[]), m("C", &["marker"])]
            .into_iter()
            .collect();
        let relevant = Classifier::new(["marker"]).test_relevant(&set);
        assert_eq!(names(&relevant), vec!["C"]);
    }

    #[test]
    fn missing_reference_is_boundary() {
        let set: ModuleSet = vec![m("A", &["NotLoaded", "B"]), m("B", &["marker"])]
            .into_iter()
            .collect();
        let relevant = Classifier::new(["marker"]).test_relevant(&set);
        assert_eq!(names(&relevant), vec!["B", "A"]);
    }

    #[test]
    fn cycle_terminates_and_exits_through_acyclic_path() {
        // A <-> B cycle, B also reaches C which references the marker
        let set: ModuleSet = vec![m("A", &["B"]), m("B", &["A", "C"]), m("C", &["marker"])]
            .into_iter()
            .collect();
        let relevant = Classifier::new(["marker"]).test_relevant(&set);
        assert_eq!(names(&relevant), vec!["C", "B", "A"]);
    }

    #[test]
    fn pure_cycle_is_not_relevant() {
        let set: ModuleSet = vec![m("A", &["B"]), m("B", &["A"])].into_iter().collect();
        assert!(Classifier::new(["marker"]).test_relevant(&set).is_empty());
    }

    #[test]
    fn cyclic_neighbour_is_conservatively_unproven() {
        // B only sees A, which is still in progress, so B resolves to false.
        // A then reaches the marker through C; B stays unproven.
        let set: ModuleSet = vec![
            m("A", &["B", "C"]),
            m("B", &["A"]),
            m("C", &["marker"]),
        ]
        .into_iter()
        .collect();
        let relevant = Classifier::new(["marker"]).test_relevant(&set);
        assert_eq!(names(&relevant), vec!["C", "A"]);
    }

    #[test]
    fn diamond_visits_shared_node_once() {
        let set: ModuleSet = vec![
            m("Top", &["Left", "Right"]),
            m("Left", &["Base"]),
            m("Right", &["Base"]),
            m("Base", &["marker"]),
        ]
        .into_iter()
        .collect();
        let relevant = Classifier::new(["marker"]).test_relevant(&set);
        assert_eq!(names(&relevant), vec!["Base", "Left", "Top", "Right"]);
    }

    #[test]
    fn deep_chain_does_not_overflow() {
        let depth = 50_000;
        let mut modules: Vec<Module> = (0..depth)
            .map(|i| m(&format!("M{i}"), &[format!("M{}", i + 1).as_str()]))
            .collect();
        modules.push(m(&format!("M{depth}"), &["marker"]));
        let set: ModuleSet = modules.into_iter().collect();

        let relevant = Classifier::new(["marker"]).test_relevant(&set);
        assert_eq!(relevant.len(), depth + 1);
    }

    #[test]
    fn buckets_split_by_editor_flag() {
        let set: ModuleSet = vec![
            m("Editor.Tests", &["nunit.framework"]).editor_only(),
            m("Runtime.Tests", &["UnityEngine.TestRunner"]),
            m("Game", &[]),
        ]
        .into_iter()
        .collect();

        let result = Classifier::default().classify(&set);
        assert_eq!(result.names(TestPlatform::EditMode), vec!["Editor.Tests"]);
        assert_eq!(result.names(TestPlatform::PlayMode), vec!["Runtime.Tests"]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn select_respects_filter() {
        let set: ModuleSet = vec![
            m("E", &["marker"]).editor_only(),
            m("P", &["marker"]),
        ]
        .into_iter()
        .collect();
        let result = classify(&set, ["marker"]);

        assert_eq!(names(&result.select(PlatformFilter::ALL)), vec!["E", "P"]);
        assert_eq!(names(&result.select(PlatformFilter::PLAY_MODE)), vec!["P"]);
        assert_eq!(names(&result.select(TestPlatform::EditMode.into())), vec!["E"]);
    }

    #[test]
    fn no_marker_path_gives_empty_buckets() {
        let set: ModuleSet = vec![m("A", &["B"]), m("B", &["System"])].into_iter().collect();
        let result = classify(&set, ["marker"]);
        assert!(result.is_empty());
        assert!(result.bucket(TestPlatform::EditMode).is_empty());
        assert!(result.bucket(TestPlatform::PlayMode).is_empty());
    }

    #[test]
    fn insert_rejects_duplicates_across_buckets() {
        let mut c = Classification::new();
        assert!(c.insert(TestPlatform::EditMode, m("A", &[])));
        assert!(!c.insert(TestPlatform::PlayMode, m("A", &[])));
        assert_eq!(c.len(), 1);
    }
}
