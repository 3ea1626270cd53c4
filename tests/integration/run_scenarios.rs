//! End-to-end runs through `jig::run` with fake collaborators.

use super::test_utils::{project, write_file, Harness};
use jig::RunError;
use tempfile::TempDir;

fn args(extra: &[&str]) -> Vec<String> {
    std::iter::once("jig")
        .chain(extra.iter().copied())
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_single_project_successful_run_exits_zero() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "web", "");
    write_file(&root, "src/app.test.js", "");
    let harness = Harness::new(true, true);

    let plan = jig::run(args(&[]), Some(&root), &harness.collaborators)
        .await
        .unwrap();

    assert_eq!(plan.code, 0);
    assert!(!plan.force);
    let calls = harness.engine.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].projects, vec!["web".to_string()]);
    assert_eq!(calls[0].files, 2);
    assert!(harness
        .output
        .contents()
        .contains("Determining test suites to run..."));
}

#[tokio::test]
async fn test_failing_run_uses_test_failure_exit_code() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "web", "");
    let harness = Harness::new(false, true);

    let plan = jig::run(
        args(&["--testFailureExitCode", "42", "--forceExit"]),
        Some(&root),
        &harness.collaborators,
    )
    .await
    .unwrap();

    assert_eq!(plan.code, 42);
    assert!(plan.force);
}

#[tokio::test]
async fn test_failure_exit_code_can_come_from_config_file() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "web", "test_failure_exit_code = 9\n");
    let harness = Harness::new(false, true);

    let plan = jig::run(args(&[]), Some(&root), &harness.collaborators)
        .await
        .unwrap();
    assert_eq!(plan.code, 9);
}

#[tokio::test]
async fn test_two_roots_sharing_a_config_is_an_error() {
    let temp = TempDir::new().unwrap();
    write_file(temp.path(), "jig.toml", "name = \"repo\"\n");
    let web = temp.path().join("web");
    let api = temp.path().join("api");
    std::fs::create_dir_all(&web).unwrap();
    std::fs::create_dir_all(&api).unwrap();
    let harness = Harness::new(true, true);

    let err = jig::run(
        args(&[
            "--projects",
            web.to_str().unwrap(),
            api.to_str().unwrap(),
        ]),
        None,
        &harness.collaborators,
    )
    .await
    .unwrap_err();

    let run_error = err.downcast_ref::<RunError>().unwrap();
    assert!(matches!(run_error, RunError::Configuration(_)));
    let message = err.to_string();
    assert!(message.contains(web.to_str().unwrap()));
    assert!(message.contains(api.to_str().unwrap()));
    assert_eq!(harness.engine.call_count(), 0);
}

#[tokio::test]
async fn test_distinct_roots_produce_one_context_each() {
    let temp = TempDir::new().unwrap();
    let web = project(&temp.path().join("web"), "web", "");
    let api = project(&temp.path().join("api"), "api", "");
    let harness = Harness::new(true, true);

    let plan = jig::run(
        args(&["--projects", web.to_str().unwrap(), api.to_str().unwrap()]),
        None,
        &harness.collaborators,
    )
    .await
    .unwrap();

    assert_eq!(plan.code, 0);
    let calls = harness.engine.calls.lock();
    assert_eq!(calls[0].projects, vec!["web".to_string(), "api".to_string()]);
}

#[tokio::test]
async fn test_declared_sub_projects_fan_out() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "mono", "projects = [\"packages/*\"]\n");
    project(&root.join("packages").join("a"), "a", "");
    project(&root.join("packages").join("b"), "b", "");
    project(&root.join("packages").join("c"), "c", "");
    let harness = Harness::new(true, true);

    jig::run(args(&[]), Some(&root), &harness.collaborators)
        .await
        .unwrap();

    let calls = harness.engine.calls.lock();
    assert_eq!(
        calls[0].projects,
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );
}

#[tokio::test]
async fn test_clear_cache_removes_caches_without_running() {
    let temp = TempDir::new().unwrap();
    let web = project(&temp.path().join("web"), "web", "");
    let api = project(&temp.path().join("api"), "api", "");
    write_file(&web, ".jig-cache/index.bin", "stale");
    write_file(&api, ".jig-cache/index.bin", "stale");
    let harness = Harness::new(true, true);

    let plan = jig::run(
        args(&[
            "--clearCache",
            "--projects",
            web.to_str().unwrap(),
            api.to_str().unwrap(),
        ]),
        None,
        &harness.collaborators,
    )
    .await
    .unwrap();

    assert_eq!(plan.code, 0);
    assert!(!web.join(".jig-cache").exists());
    assert!(!api.join(".jig-cache").exists());
    assert_eq!(harness.engine.call_count(), 0);
    let output = harness.output.contents();
    assert_eq!(output.matches("Cleared ").count(), 2);
}

#[tokio::test]
async fn test_watch_with_deprecations_declined_exits_zero() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "legacy", "test_path_dirs = [\"src\"]\n");
    std::fs::create_dir_all(root.join("src")).unwrap();
    let harness = Harness::new(true, false);

    let plan = jig::run(args(&["--watch"]), Some(&root), &harness.collaborators)
        .await
        .unwrap();

    assert_eq!(plan.code, 0);
    assert_eq!(*harness.prompter.asked.lock(), 1);
    assert_eq!(*harness.watch.starts.lock(), 0);
    assert_eq!(harness.engine.call_count(), 0);
}

#[tokio::test]
async fn test_watch_with_deprecations_accepted_starts_controller() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "legacy", "test_path_dirs = [\"src\"]\n");
    std::fs::create_dir_all(root.join("src")).unwrap();
    let harness = Harness::new(true, true);

    let err = jig::run(args(&["--watchAll"]), Some(&root), &harness.collaborators)
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<RunError>(), Some(RunError::Watch(_))));
    assert_eq!(*harness.watch.starts.lock(), 1);
}

#[tokio::test]
async fn test_watch_without_deprecations_never_prompts() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "clean", "");
    let harness = Harness::new(true, false);

    let _ = jig::run(args(&["--watch"]), Some(&root), &harness.collaborators).await;

    assert_eq!(*harness.prompter.asked.lock(), 0);
    assert_eq!(*harness.watch.starts.lock(), 1);
}

#[tokio::test]
async fn test_show_config_prints_and_exits_before_running() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "web", "");
    let harness = Harness::new(true, true);

    let plan = jig::run(args(&["--showConfig"]), Some(&root), &harness.collaborators)
        .await
        .unwrap();

    assert_eq!(plan.code, 0);
    assert_eq!(harness.engine.call_count(), 0);
    let dump: serde_json::Value = serde_json::from_str(&harness.output.contents()).unwrap();
    assert_eq!(dump["configs"][0]["config"]["name"], "web");
    assert_eq!(dump["hasDeprecationWarnings"], false);
}

#[tokio::test]
async fn test_debug_prints_projects_and_config_then_runs() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "web", "");
    let harness = Harness::new(true, true);

    let plan = jig::run(args(&["--debug"]), Some(&root), &harness.collaborators)
        .await
        .unwrap();

    assert_eq!(plan.code, 0);
    assert_eq!(harness.engine.call_count(), 1);
    let output = harness.output.contents();
    assert!(output.contains("Project"));
    assert!(output.contains("Config"));
    assert!(output.contains("web"));
    assert!(output.contains("\"hasDeprecationWarnings\": false"));
    assert!(output.contains("Determining test suites to run..."));
}

#[tokio::test]
async fn test_only_changed_is_forwarded_to_the_engine() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "web", "");
    let harness = Harness::new(true, true);

    jig::run(args(&["-o"]), Some(&root), &harness.collaborators)
        .await
        .unwrap();

    assert!(harness.engine.calls.lock()[0].only_changed);
}

#[tokio::test]
async fn test_help_exits_zero_without_touching_collaborators() {
    let harness = Harness::new(true, true);
    let plan = jig::run(args(&["--help"]), None, &harness.collaborators)
        .await
        .unwrap();
    assert_eq!(plan.code, 0);
    assert_eq!(harness.engine.call_count(), 0);
}

#[tokio::test]
async fn test_conflicting_flags_are_rejected() {
    let harness = Harness::new(true, true);
    let err = jig::run(args(&["--onlyChanged", "--watchAll"]), None, &harness.collaborators)
        .await
        .unwrap_err();
    assert!(err.downcast_ref::<jig::ArgvValidationError>().is_some());
}
