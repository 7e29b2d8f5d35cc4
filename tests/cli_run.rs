//! Behavioural tests for the `stevedore run` and `stevedore send-file` CLI.
//!
//! The SSH transport is pointed at a shell script standing in for the
//! system `ssh` client, so the binary is exercised end to end without a
//! remote host.
#![cfg(unix)]

use std::fs::{Permissions, set_permissions, write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use rstest::{fixture, rstest};
use tempfile::TempDir;

const FAKE_SSH: &str = "#!/bin/sh
echo fake-stdout
echo fake-stderr >&2
for last; do :; done
echo \"remote: $last\"
exit 7
";

struct FakeClient {
    dir: TempDir,
    script: PathBuf,
}

#[fixture]
fn fake_ssh() -> FakeClient {
    let dir = TempDir::new().expect("temporary directory");
    let script = dir.path().join("ssh");
    write(&script, FAKE_SSH).expect("write fake ssh");
    set_permissions(&script, Permissions::from_mode(0o755)).expect("chmod fake ssh");
    FakeClient { dir, script }
}

fn stevedore_in(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("stevedore");
    cmd.current_dir(dir);
    cmd.env_remove("RUST_LOG");
    cmd
}

#[rstest]
fn run_propagates_exit_code_and_output(fake_ssh: FakeClient) {
    let mut cmd = stevedore_in(fake_ssh.dir.path());
    cmd.env("STEVEDORE_SSH_BIN", &fake_ssh.script);
    cmd.args([
        "run",
        "--address",
        "10.0.0.5",
        "--transport",
        "ssh",
        "--env",
        "GREETING=hi there",
        "--",
        "printenv",
        "GREETING",
    ]);

    cmd.assert()
        .code(7)
        .stdout(contains("fake-stdout"))
        .stdout(contains("remote: export GREETING='hi there'; printenv GREETING"))
        .stderr(contains("fake-stderr"));
}

#[rstest]
fn send_file_reports_missing_local_file(fake_ssh: FakeClient) {
    let mut cmd = stevedore_in(fake_ssh.dir.path());
    cmd.env("STEVEDORE_SSH_SCP_BIN", &fake_ssh.script);
    cmd.args([
        "send-file",
        "--address",
        "10.0.0.5",
        "--transport",
        "ssh",
        "does-not-exist.conf",
        "/etc/app.conf",
    ]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("stevedore: failed to read local file does-not-exist.conf"));
}

#[rstest]
fn send_file_surfaces_scp_failure(fake_ssh: FakeClient) {
    let local = fake_ssh.dir.path().join("app.conf");
    write(&local, "payload").expect("write local file");
    let mut cmd = stevedore_in(fake_ssh.dir.path());
    cmd.env("STEVEDORE_SSH_SCP_BIN", &fake_ssh.script);
    cmd.args(["send-file", "--address", "10.0.0.5", "--transport", "ssh"]);
    cmd.arg(&local);
    cmd.arg("/etc/app.conf");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("failed to write /etc/app.conf on the node"))
        .stderr(contains("fake-stderr"));
}

#[rstest]
fn invalid_ssh_configuration_is_reported(fake_ssh: FakeClient) {
    let mut cmd = stevedore_in(fake_ssh.dir.path());
    cmd.env("STEVEDORE_SSH_PORT", "0");
    cmd.args([
        "run",
        "--address",
        "10.0.0.5",
        "--transport",
        "ssh",
        "--",
        "true",
    ]);

    cmd.assert()
        .failure()
        .code(1)
        .stderr(contains("configuration error"))
        .stderr(contains("STEVEDORE_SSH_PORT"));
}

#[rstest]
fn live_output_is_logged_without_verbose(fake_ssh: FakeClient) {
    let mut cmd = stevedore_in(fake_ssh.dir.path());
    cmd.env("STEVEDORE_SSH_BIN", &fake_ssh.script);
    cmd.args([
        "run",
        "--address",
        "10.0.0.5",
        "--transport",
        "ssh",
        "--log-output-live",
        "--",
        "uptime",
    ]);

    cmd.assert()
        .code(7)
        .stderr(contains("stevedore::output"))
        .stderr(contains("fake-stdout"));
}
