//! The default engine driving real commands.

use super::test_utils::{project, write_file};
use jig::cli::OutputSink;
use jig::Collaborators;
use tempfile::TempDir;

fn collaborators() -> (Collaborators, jig::cli::CapturedOutput) {
    let (sink, output) = OutputSink::capture();
    let collaborators = Collaborators {
        output: Some(sink),
        ..Collaborators::default()
    };
    (collaborators, output)
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_command_maps_to_failure_exit_code() {
    let temp = TempDir::new().unwrap();
    let root = project(
        temp.path(),
        "shell",
        "test_command = [\"sh\", \"-c\", \"echo ran $#; exit 3\", \"sh\"]\ntest_failure_exit_code = 5\n",
    );
    write_file(&root, "a.test.sh", "");
    write_file(&root, "b.test.sh", "");
    let (collaborators, output) = collaborators();

    let plan = jig::run(["jig"], Some(&root), &collaborators).await.unwrap();

    assert_eq!(plan.code, 5);
    let printed = output.contents();
    assert!(printed.contains("ran 2"));
    assert!(printed.contains("FAIL"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_passing_command_exits_zero() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "shell", "test_command = [\"true\"]\n");
    write_file(&root, "a.test.sh", "");
    let (collaborators, output) = collaborators();

    let plan = jig::run(["jig"], Some(&root), &collaborators).await.unwrap();

    assert_eq!(plan.code, 0);
    assert!(output.contents().contains("passed, 1 total"));
}

#[tokio::test]
async fn test_list_tests_prints_matches_and_exits_zero() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "web", "");
    let test_file = write_file(&root, "src/widget.test.js", "");
    write_file(&root, "src/widget.js", "");
    let (collaborators, output) = collaborators();

    let plan = jig::run(["jig", "--listTests"], Some(&root), &collaborators)
        .await
        .unwrap();

    assert_eq!(plan.code, 0);
    let printed = output.contents();
    assert_eq!(printed.trim(), test_file.display().to_string());
    assert!(!printed.contains("Determining"));
}

#[tokio::test]
async fn test_no_tests_found_fails_the_run() {
    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "empty", "");
    let (collaborators, output) = collaborators();

    let plan = jig::run(["jig"], Some(&root), &collaborators).await.unwrap();

    assert_eq!(plan.code, 1);
    assert!(output.contents().contains("No tests found"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_pinned_runner_receives_args_and_decides_exit_code() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let root = project(temp.path(), "pinned", "runner_version = \"0.0.1\"\n");
    write_file(&root, "a.test.sh", "");
    let runner = write_file(
        &root,
        ".jig/bin/jig-0.0.1",
        "#!/bin/sh\n[ \"$JIG_DELEGATED\" = 1 ] && [ \"$1\" = \"--listTests\" ] && exit 17\nexit 3\n",
    );
    std::fs::set_permissions(&runner, std::fs::Permissions::from_mode(0o755)).unwrap();
    let (collaborators, output) = collaborators();

    let plan = jig::run(["jig", "--listTests"], Some(&root), &collaborators)
        .await
        .unwrap();

    assert_eq!(plan.code, 17);
    assert!(!plan.force);
    assert!(output.contents().is_empty());
}
