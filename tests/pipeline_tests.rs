//! End-to-end pipeline runs against the in-memory host and dry-run toolchain

use std::time::Duration;

use testrig::event_log::EventKind;
use testrig::pipeline::{drive, Drive, PipelineState, Progress};
use testrig::platform::InMemoryHost;
use testrig::toolchain::{DryRunToolchain, InMemorySceneBuilder};
use testrig::{
    standard_tasks, BuildTarget, LifecycleEvent, PipelineError, RunConfig, TestPlatform, TestRun,
};

fn config(target: BuildTarget) -> RunConfig {
    let mut config = RunConfig::from_yaml(
        r#"
schema: testrig/run@0.1
modules:
  - name: Game
    location: Library/Game.dll
  - name: Game.Tests
    location: Library/Game.Tests.dll
    references: [Game, nunit.framework]
  - name: Game.EditorTests
    location: Library/Game.EditorTests.dll
    references: [Game.Tests]
    editor_only: true
pipeline:
  frame_ms: 1
"#,
    )
    .unwrap();
    config.settings.target_platform = target;
    config
}

fn fresh_tasks(config: &RunConfig) -> Vec<Box<dyn testrig::Task>> {
    standard_tasks(
        config,
        Box::new(DryRunToolchain::new()),
        Box::new(InMemorySceneBuilder::new()),
    )
}

#[tokio::test]
async fn android_run_dispatches_full_lifecycle() {
    let host = InMemoryHost::new().with_setting("player.bundle_identifier", "com.studio.game");
    let report = TestRun::new(config(BuildTarget::Android))
        .with_host(Box::new(host))
        .execute()
        .await;
    assert!(report.succeeded(), "{:?}", report.outcome);

    assert_eq!(
        report.events().dispatched(),
        vec![
            LifecycleEvent::Setup,
            LifecycleEvent::PostBuildAction,
            LifecycleEvent::PostSuccessfulBuildAction,
            LifecycleEvent::PostSuccessfulLaunchAction,
            LifecycleEvent::CleanUp,
        ]
    );

    let ctx = &report.context;
    let controller = ctx.controller.as_ref().unwrap();
    assert_eq!(controller.modules_with_tests, vec!["Game.Tests"]);
    assert!(ctx.host().running_processes().is_empty());
    assert_eq!(ctx.host().build_setting("android.development_build"), None);
    assert_eq!(
        ctx.host().build_setting("player.bundle_identifier").as_deref(),
        Some("com.studio.game")
    );
}

#[tokio::test]
async fn unregistered_target_runs_without_hooks() {
    let report = TestRun::new(config(BuildTarget::StandaloneWindows64)).execute().await;
    assert!(report.succeeded());
    assert!(report.events().dispatched().is_empty());
    assert_eq!(
        report.context.build_options.as_ref().unwrap().output_path,
        std::path::PathBuf::from("Builds/standalone-windows64/TestPlayer.exe")
    );
}

#[tokio::test]
async fn failed_launch_cleans_up_and_reports_task() {
    let report = TestRun::new(config(BuildTarget::Ios))
        .with_toolchain(Box::new(DryRunToolchain::new().failing_launch("device locked")))
        .execute()
        .await;

    match &report.outcome {
        Err(PipelineError::TaskFailed { task, step, .. }) => {
            assert_eq!(task, "Build Test Player");
            assert_eq!(*step, 3);
        }
        other => panic!("expected task failure, got {other:?}"),
    }

    // compensating CleanUp ran even though the cleanup task never did
    assert_eq!(report.events().dispatched().last(), Some(&LifecycleEvent::CleanUp));
    assert!(report
        .events()
        .events()
        .iter()
        .all(|e| e.kind.task() != Some("Clean Up Platform")));
    assert_eq!(report.context.host().build_setting("ios.automatic_signing"), None);
}

#[tokio::test]
async fn scene_failure_stops_before_player_build() {
    let report = TestRun::new(config(BuildTarget::Android))
        .with_scene_builder(Box::new(InMemorySceneBuilder::new().failing("scene template missing")))
        .execute()
        .await;

    match &report.outcome {
        Err(PipelineError::TaskFailed { task, source, .. }) => {
            assert_eq!(task, "Create Bootstrap Environment");
            assert!(source.to_string().contains("scene template missing"));
        }
        other => panic!("expected task failure, got {other:?}"),
    }
    assert!(report.context.build_options.is_none());
    assert!(report
        .events()
        .events()
        .iter()
        .all(|e| e.kind.task() != Some("Build Test Player")));
}

#[test]
fn suspended_run_resumes_with_fresh_tasks() {
    let config = config(BuildTarget::Switch);
    let mut pipeline = TestRun::new(config.clone()).pipeline();

    // classify: yields after each of the two test modules
    assert_eq!(pipeline.tick().unwrap(), Progress::Yielded { task: 0, step: 0 });
    let suspended = pipeline.suspend();
    assert_eq!(suspended.checkpoint().step, 1);

    let mut pipeline = suspended.resume(fresh_tasks(&config)).unwrap();
    pipeline.run().unwrap();
    assert_eq!(pipeline.state(), PipelineState::Completed);

    let classification = pipeline.context().classification.as_ref().unwrap();
    assert_eq!(classification.names(TestPlatform::PlayMode), vec!["Game.Tests"]);
    assert_eq!(classification.names(TestPlatform::EditMode), vec!["Game.EditorTests"]);

    let kinds: Vec<_> = pipeline.events().pipeline_events().into_iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EventKind::PipelineSuspended { task_index: 0, step: 1 }));
    assert!(kinds.contains(&EventKind::PipelineResumed { task_index: 0, step: 1 }));
}

#[test]
fn player_task_resumes_mid_build() {
    let config = config(BuildTarget::Android);
    let mut pipeline = TestRun::new(config.clone()).pipeline();

    // run until the player task has dispatched Setup
    while pipeline.context().events().dispatched().is_empty() {
        pipeline.tick().unwrap();
    }
    let suspended = pipeline.suspend();
    assert_eq!(suspended.checkpoint().task, 2);
    assert_eq!(suspended.checkpoint().step, 2);

    let mut pipeline = suspended.resume(fresh_tasks(&config)).unwrap();
    pipeline.run().unwrap();

    let dispatched = pipeline.events().dispatched();
    assert_eq!(dispatched.iter().filter(|e| **e == LifecycleEvent::Setup).count(), 1);
    assert_eq!(dispatched.last(), Some(&LifecycleEvent::CleanUp));
    assert!(pipeline.context().host().running_processes().is_empty());
}

#[test]
fn bootstrap_task_cannot_resume_mid_sequence_but_can_at_boundary() {
    let config = config(BuildTarget::Android);
    let mut pipeline = TestRun::new(config.clone()).pipeline();

    // finish classification, stop at the start of the bootstrap task
    while pipeline.checkpoint().task == 0 {
        pipeline.tick().unwrap();
    }
    let suspended = pipeline.suspend();
    assert_eq!(suspended.checkpoint().step, 0);
    assert!(suspended.resume(fresh_tasks(&config)).is_ok());
}

#[test]
fn resume_with_different_task_list_is_rejected() {
    let config = config(BuildTarget::Android);
    let mut pipeline = TestRun::new(config.clone()).pipeline();
    pipeline.tick().unwrap();

    let mut tasks = fresh_tasks(&config);
    tasks.pop();
    let err = pipeline.suspend().resume(tasks).unwrap_err();
    assert!(matches!(err, PipelineError::TaskListMismatch { expected: 4, found: 3 }));
}

#[tokio::test]
async fn frame_budget_pauses_the_drive() {
    let mut pipeline = TestRun::new(config(BuildTarget::Switch)).pipeline();

    let first = drive(&mut pipeline, Duration::from_millis(1), Some(2)).await.unwrap();
    assert_eq!(first, Drive::Paused);
    assert!(!pipeline.is_finished());

    let rest = drive(&mut pipeline, Duration::from_millis(1), None).await.unwrap();
    assert_eq!(rest, Drive::Finished);
    assert_eq!(pipeline.state(), PipelineState::Completed);
}
