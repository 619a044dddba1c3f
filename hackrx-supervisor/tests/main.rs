//! Run via `cargo test -p hackrx-supervisor --test integration`
use assert_cmd::Command;
use predicates::str::contains;
use std::time::{Duration, Instant};
use testresult::TestResult;

fn supervisor() -> TestResult<Command> {
    let mut cmd = Command::cargo_bin("hackrx-supervisor")?;
    cmd.arg("--no-colors").args(["--grace-ms", "500"]);
    Ok(cmd)
}

#[test_log::test]
fn test_helptext() -> TestResult {
    Command::cargo_bin("hackrx-supervisor")?
        .arg("--help")
        .assert()
        .try_success()?
        .try_stdout(contains("--process"))?
        .try_stdout(contains("--grace-ms"))?
        .try_stdout(contains("--no-colors"))?;

    Ok(())
}

#[test_log::test]
fn test_exits_with_first_failure() -> TestResult {
    let start = Instant::now();

    supervisor()?
        .args(["--process", "web=exit 3"])
        .args(["--process", "worker=exec sleep 30"])
        .assert()
        .try_code(3)?;

    assert!(start.elapsed() < Duration::from_secs(10));

    Ok(())
}

#[test_log::test]
fn test_exits_with_first_success() -> TestResult {
    supervisor()?
        .args(["--process", "web=exec sleep 30"])
        .args(["--process", "worker=exit 0"])
        .assert()
        .try_success()?;

    Ok(())
}

#[test_log::test]
fn test_killed_child_maps_to_shell_code() -> TestResult {
    supervisor()?
        .args(["--process", "web=kill -KILL $$"])
        .args(["--process", "worker=exec sleep 30"])
        .assert()
        .try_code(128 + 9)?;

    Ok(())
}

#[test_log::test]
fn test_missing_command_is_not_found() -> TestResult {
    supervisor()?
        .args(["--process", "web=exec /nonexistent/hackrx-server"])
        .args(["--process", "worker=exec sleep 30"])
        .assert()
        .try_code(127)?;

    Ok(())
}

#[test_log::test]
fn test_rejects_malformed_process() -> TestResult {
    supervisor()?
        .args(["--process", "no-separator"])
        .assert()
        .try_failure()?
        .try_stderr(contains("NAME=COMMAND"))?;

    Ok(())
}
