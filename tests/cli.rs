//! Runs the `execns` binary against this test process or its children.
//!
//! A process always shares its namespaces with itself, so these tests need
//! no privileges: joins resolve as already done and are skipped.

use std::fs;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

const EXECNS: &str = env!("CARGO_BIN_EXE_execns");

// Above the largest pid_max Linux allows, so never a live process.
const VANISHED_PID: &str = "2147483647";

fn execns() -> Command {
    let mut cmd = Command::new(EXECNS);
    cmd.env_remove("EXECNS_LOG");
    cmd
}

fn me() -> String {
    std::process::id().to_string()
}

fn run(args: &[&str]) -> Output {
    execns().args(args).output().expect("failed to run execns")
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

#[test]
fn forwards_the_command_exit_code() {
    let out = run(&["-t", &me(), "-c", "echo hi && exit 7"]);
    assert_eq!(out.status.code(), Some(7));
    assert_eq!(out.stdout, b"hi\n");
}

#[test]
fn successful_command_exits_zero() {
    let out = run(&["-t", &me(), "-c", "true"]);
    assert_eq!(out.status.code(), Some(0), "{}", stderr(&out));
}

#[test]
fn shared_namespaces_are_skipped() {
    let out = run(&["-t", &me(), "-m", "-p", "-u", "-n", "-i", "-c", "exit 3"]);
    assert_eq!(out.status.code(), Some(3), "{}", stderr(&out));
}

#[test]
fn invalid_targets_exit_one_without_running_anything() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    let touch = format!("touch {}", marker.display());

    for target in &["0", "abc", "-3"] {
        let out = run(&["-t", *target, "-e", "-n", "-c", &touch]);
        assert_eq!(out.status.code(), Some(1), "target {:?}", target);
        assert!(!marker.exists());
    }
}

#[test]
fn missing_or_empty_command_exits_one() {
    assert_eq!(run(&["-t", &me()]).status.code(), Some(1));
    assert_eq!(run(&["-t", &me(), "-c", ""]).status.code(), Some(1));
}

#[test]
fn vanished_target_is_a_resolution_error() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    let out = run(&[
        "-t",
        VANISHED_PID,
        "-n",
        "-c",
        &format!("touch {}", marker.display()),
    ]);

    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("net namespace"), "{}", stderr(&out));
    assert!(!marker.exists());
}

#[test]
fn vanished_target_environment_is_a_replication_error() {
    let out = run(&["-t", VANISHED_PID, "-e", "-c", "true"]);
    assert_eq!(out.status.code(), Some(5));
    assert!(stderr(&out).contains("environ"), "{}", stderr(&out));
}

#[test]
fn clones_the_target_environment() {
    let mut target = Command::new("sleep")
        .arg("30")
        .env("EXECNS_ORIGIN", "from-target")
        .env("EXECNS_EXTRA", "a=b")
        .spawn()
        .expect("failed to spawn sleep");
    let pid = target.id().to_string();

    let out = execns()
        .env("EXECNS_ORIGIN", "stale")
        .env_remove("EXECNS_EXTRA")
        .args(&[
            "-t",
            pid.as_str(),
            "-e",
            "-c",
            "test \"$EXECNS_ORIGIN\" = from-target && test \"$EXECNS_EXTRA\" = a=b",
        ])
        .output()
        .expect("failed to run execns");

    target.kill().unwrap();
    target.wait().unwrap();
    assert_eq!(out.status.code(), Some(0), "{}", stderr(&out));
}

#[test]
fn killed_command_reports_its_signal() {
    let out = run(&["-t", &me(), "-c", "kill -KILL $$"]);
    assert_eq!(out.status.code(), Some(128 + 9));
}

#[test]
fn logs_never_reach_stdout() {
    let out = run(&["-v", "-t", &me(), "-n", "-c", "echo out"]);
    assert_eq!(out.status.code(), Some(0));
    assert_eq!(out.stdout, b"out\n");
    assert!(stderr(&out).contains("namespace ready"), "{}", stderr(&out));
}

#[test]
fn captured_logs_carry_no_colour_codes() {
    let out = run(&["-v", "-t", &me(), "-n", "-c", "true"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(!out.stderr.is_empty());
    assert!(!out.stderr.contains(&0x1b), "{:?}", stderr(&out));
}

#[test]
fn unknown_command_keeps_the_shells_127() {
    let out = run(&["-t", &me(), "-c", "no_such_binary_xyz"]);
    assert_eq!(out.status.code(), Some(127));
}

fn process_state(pid: u32) -> Option<char> {
    let stat = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.trim_start().chars().next()
}

fn wait_for_state(pid: u32, state: char) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if process_state(pid) == Some(state) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn stops_before_any_setup_until_continued() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("ran");
    let mut child = execns()
        .args(&[
            "-s",
            "-t",
            me().as_str(),
            "-n",
            "-c",
            format!("touch {}", marker.display()).as_str(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn execns");

    assert!(wait_for_state(child.id(), 'T'), "execns never stopped");
    thread::sleep(Duration::from_millis(100));
    assert!(!marker.exists());

    kill(Pid::from_raw(child.id() as i32), Signal::SIGCONT).unwrap();
    let status = child.wait().unwrap();

    assert_eq!(status.code(), Some(0));
    assert!(marker.exists());
}

#[test]
fn help_exits_zero() {
    let out = run(&["--help"]);
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("--target"));
}
