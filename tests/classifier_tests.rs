//! Classifier behaviour on realistic module graphs

use std::collections::HashSet;

use testrig::module::{CatalogEntry, CompilationCatalog};
use testrig::{classify, Classifier, Module, ModuleSet, PlatformFilter, TestPlatform};

fn m(name: &str, refs: &[&str]) -> Module {
    Module::new(name, format!("Library/ScriptAssemblies/{name}.dll"))
        .with_references(refs.iter().copied())
}

fn set(modules: Vec<Module>) -> ModuleSet {
    modules.into_iter().collect()
}

#[test]
fn transitive_reference_makes_every_link_relevant() {
    // A -> B -> C -> marker
    let modules = set(vec![
        m("A", &["B"]),
        m("B", &["C"]),
        m("C", &["nunit.framework"]),
    ]);

    let result = classify(&modules, ["nunit.framework"]);
    let names: HashSet<String> = result.names(TestPlatform::PlayMode).into_iter().collect();
    assert_eq!(names, HashSet::from(["A".into(), "B".into(), "C".into()]));
}

#[test]
fn no_module_lands_in_two_buckets() {
    let modules = set(vec![
        m("Core", &[]),
        m("Core.Tests", &["Core", "nunit.framework"]),
        m("Core.EditorTests", &["Core.Tests"]).editor_only(),
        m("Perf.Tests", &["Unity.PerformanceTesting", "Core.Tests"]),
        m("Cycle.A", &["Cycle.B", "Core.Tests"]),
        m("Cycle.B", &["Cycle.A"]),
    ]);

    let result = Classifier::default().classify(&modules);
    let edit: HashSet<_> = result.names(TestPlatform::EditMode).into_iter().collect();
    let play: HashSet<_> = result.names(TestPlatform::PlayMode).into_iter().collect();

    assert!(edit.is_disjoint(&play));
    assert_eq!(edit.len() + play.len(), result.len());
    assert!(!play.contains("Core"));
    assert!(edit.contains("Core.EditorTests"));
    assert!(play.contains("Cycle.A"));
}

#[test]
fn cycle_classifies_like_graph_without_closing_edge() {
    // (cyclic graph, same graph with the edge that closes the cycle dropped)
    let fixtures = vec![
        (
            // A -> B -> A, B -> C -> marker
            vec![m("A", &["B"]), m("B", &["A", "C"]), m("C", &["nunit.framework"])],
            vec![m("A", &["B"]), m("B", &["C"]), m("C", &["nunit.framework"])],
        ),
        (
            // A -> [B, C], B -> A, C -> marker
            vec![m("A", &["B", "C"]), m("B", &["A"]), m("C", &["nunit.framework"])],
            vec![m("A", &["B", "C"]), m("B", &[]), m("C", &["nunit.framework"])],
        ),
        (
            // A -> B -> C -> A, nothing reaches a marker
            vec![m("A", &["B"]), m("B", &["C"]), m("C", &["A"])],
            vec![m("A", &["B"]), m("B", &["C"]), m("C", &[])],
        ),
    ];

    let classifier = Classifier::default();
    for (cyclic, acyclic) in fixtures {
        let with_cycle = classifier.classify(&set(cyclic));
        let without = classifier.classify(&set(acyclic));
        for platform in TestPlatform::ALL {
            assert_eq!(with_cycle.names(platform), without.names(platform));
        }
    }
}

#[test]
fn second_fixture_leaves_cycle_member_unproven() {
    let modules = set(vec![
        m("A", &["B", "C"]),
        m("B", &["A"]),
        m("C", &["nunit.framework"]),
    ]);

    let result = Classifier::default().classify(&modules);
    assert_eq!(result.names(TestPlatform::PlayMode), vec!["C", "A"]);
}

#[test]
fn long_ring_terminates() {
    let n = 20_000;
    let modules = set(
        (0..n)
            .map(|i| {
                let next = format!("R{}", (i + 1) % n);
                if i == n - 1 {
                    m(&format!("R{i}"), &[next.as_str(), "nunit.framework"])
                } else {
                    m(&format!("R{i}"), &[next.as_str()])
                }
            })
            .collect(),
    );

    let result = Classifier::default().classify(&modules);
    assert_eq!(result.len(), n);
}

#[test]
fn unknown_references_are_skipped() {
    let modules = set(vec![
        m("Game", &["System.Runtime", "UnityEngine.CoreModule"]),
        m("Game.Tests", &["Game", "System.Runtime", "UnityEngine.TestRunner"]),
    ]);

    let result = Classifier::default().classify(&modules);
    assert_eq!(result.names(TestPlatform::PlayMode), vec!["Game.Tests"]);
    assert!(result.bucket(TestPlatform::EditMode).is_empty());
}

#[test]
fn catalog_decides_buckets_and_drops_unknown_modules() {
    let modules = set(vec![
        m("Game.Tests", &["nunit.framework"]),
        m("Plugin.Tests", &["nunit.framework"]),
        m("Orphan.Tests", &["nunit.framework"]),
    ]);
    let catalog = CompilationCatalog {
        scripts: vec![CatalogEntry {
            file: "Assets/Game.Tests.dll".into(),
            editor_only: true,
        }],
        precompiled: vec![
            CatalogEntry {
                file: "Packages/Plugin.Tests.dll".into(),
                editor_only: false,
            },
            CatalogEntry {
                file: "Packages/Game.Tests.dll".into(),
                editor_only: false,
            },
        ],
    };

    let result = Classifier::default().classify_with(&modules, &catalog);
    assert_eq!(result.names(TestPlatform::EditMode), vec!["Game.Tests"]);
    assert_eq!(result.names(TestPlatform::PlayMode), vec!["Plugin.Tests"]);
    assert!(!result.contains("Orphan.Tests"));
}

#[test]
fn select_flattens_requested_buckets() {
    let modules = set(vec![
        m("Play.Tests", &["nunit.framework"]),
        m("Edit.Tests", &["nunit.framework"]).editor_only(),
    ]);
    let result = Classifier::default().classify(&modules);

    let all: Vec<&str> = result
        .select(PlatformFilter::ALL)
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(all, vec!["Edit.Tests", "Play.Tests"]);
    assert_eq!(result.select(TestPlatform::PlayMode.into()).len(), 1);
}

#[test]
fn classification_round_trips_through_json() {
    let modules = set(vec![m("Game.Tests", &["nunit.framework"])]);
    let result = Classifier::default().classify(&modules);

    let json = serde_json::to_string(&result).unwrap();
    let back: testrig::Classification = serde_json::from_str(&json).unwrap();
    assert_eq!(back, result);
}
