//! BDD scenarios for the container exec transport.

use rstest_bdd_macros::scenario;

use super::test_helpers::{DockerContext, docker_context};

#[scenario(
    path = "tests/features/docker_exec.feature",
    name = "Run a command in the matching container"
)]
fn scenario_run_command(docker_context: DockerContext) {
    let _ = docker_context;
}

#[scenario(
    path = "tests/features/docker_exec.feature",
    name = "Propagate remote exit codes"
)]
fn scenario_exit_codes(docker_context: DockerContext) {
    let _ = docker_context;
}

#[scenario(
    path = "tests/features/docker_exec.feature",
    name = "Log output live while keeping the result"
)]
fn scenario_live_logging(docker_context: DockerContext) {
    let _ = docker_context;
}

#[scenario(
    path = "tests/features/docker_exec.feature",
    name = "Reject an address with no container"
)]
fn scenario_no_match(docker_context: DockerContext) {
    let _ = docker_context;
}

#[scenario(
    path = "tests/features/docker_exec.feature",
    name = "Reject an address shared by two containers"
)]
fn scenario_ambiguous(docker_context: DockerContext) {
    let _ = docker_context;
}

#[scenario(
    path = "tests/features/docker_exec.feature",
    name = "Refuse to open pipes"
)]
fn scenario_popen_unsupported(docker_context: DockerContext) {
    let _ = docker_context;
}

#[scenario(
    path = "tests/features/docker_exec.feature",
    name = "Copy a file into the container"
)]
fn scenario_send_file(docker_context: DockerContext) {
    let _ = docker_context;
}

#[scenario(
    path = "tests/features/docker_exec.feature",
    name = "Fail to copy into a missing directory"
)]
fn scenario_send_file_missing_directory(docker_context: DockerContext) {
    let _ = docker_context;
}
