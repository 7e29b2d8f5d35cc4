//! BDD step definitions for the container exec transport.

use std::collections::BTreeMap;
use std::fs::write;

use camino::Utf8PathBuf;
use rstest_bdd_macros::{given, then, when};
use stevedore::test_support::ScriptedExec;
use stevedore::{
    LocateError, NodeTransport, PopenRequest, RunRequest, SendFileRequest, TransportError,
};

use super::test_helpers::{DockerContext, Outcome, parse_address, split_command};

const MASTER: &str = "master-0";

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
    #[error("scenario setup failed: {0}")]
    Setup(String),
}

#[given("a cluster with a master at \"{address}\"")]
fn cluster_with_master(mut docker_context: DockerContext, address: String) -> DockerContext {
    docker_context.runtime = docker_context
        .runtime
        .clone()
        .with_target(MASTER, address.trim());
    docker_context
}

#[given("another container at \"{address}\"")]
fn another_container(mut docker_context: DockerContext, address: String) -> DockerContext {
    docker_context.runtime = docker_context
        .runtime
        .clone()
        .with_target("master-1", address.trim());
    docker_context
}

#[given("the master prints \"{text}\"")]
fn master_prints(mut docker_context: DockerContext, text: String) -> DockerContext {
    docker_context.runtime = docker_context
        .runtime
        .clone()
        .with_exec(MASTER, ScriptedExec::chunks([format!("{text}\n")]));
    docker_context
}

#[given("the master exits with \"{code}\"")]
fn master_exits(mut docker_context: DockerContext, code: i64) -> DockerContext {
    docker_context.runtime = docker_context
        .runtime
        .clone()
        .with_exec(MASTER, ScriptedExec::chunks(["failing\n"]).exit_code(code));
    docker_context
}

#[given("a local file containing \"{contents}\"")]
fn local_file(mut docker_context: DockerContext, contents: String) -> Result<DockerContext, StepError> {
    let path = docker_context.workdir.path().join("app.conf");
    write(&path, contents.as_bytes()).map_err(|err| StepError::Setup(err.to_string()))?;
    let path = Utf8PathBuf::from_path_buf(path)
        .map_err(|path| StepError::Setup(format!("non UTF-8 path {}", path.display())))?;
    docker_context.local_file = Some(path);
    Ok(docker_context)
}

fn run_command(docker_context: &DockerContext, command: &str, address: &str, live: bool) {
    let request = RunRequest::new(split_command(command), "root", parse_address(address))
        .log_output_live(live);
    let outcome: Outcome = docker_context.transport().run(&request).map(Some);
    docker_context.record(outcome);
}

#[when("I run \"{command}\" on \"{address}\"")]
fn run_on(docker_context: DockerContext, command: String, address: String) -> DockerContext {
    run_command(&docker_context, &command, &address, false);
    docker_context
}

#[when("I run \"{command}\" on \"{address}\" with live logging")]
fn run_live_on(docker_context: DockerContext, command: String, address: String) -> DockerContext {
    run_command(&docker_context, &command, &address, true);
    docker_context
}

#[when("I open a pipe to \"{command}\" on \"{address}\"")]
fn popen_on(docker_context: DockerContext, command: String, address: String) -> DockerContext {
    let request = PopenRequest {
        args: split_command(&command),
        user: String::from("root"),
        env: BTreeMap::new(),
        ssh_key_path: None,
        address: parse_address(&address),
    };
    let outcome: Outcome = docker_context.transport().popen(&request).map(|_| None);
    docker_context.record(outcome);
    docker_context
}

#[when("I send the file to \"{remote}\" on \"{address}\"")]
fn send_file_to(
    docker_context: DockerContext,
    remote: String,
    address: String,
) -> Result<DockerContext, StepError> {
    let local_path = docker_context
        .local_file
        .clone()
        .ok_or_else(|| StepError::Setup(String::from("no local file was prepared")))?;
    let request = SendFileRequest {
        local_path,
        remote_path: Utf8PathBuf::from(remote.trim()),
        user: String::from("root"),
        ssh_key_path: None,
        address: parse_address(&address),
    };
    let outcome: Outcome = docker_context.transport().send_file(&request).map(|()| None);
    docker_context.record(outcome);
    Ok(docker_context)
}

fn expect_error(
    docker_context: &DockerContext,
    matches: impl FnOnce(&TransportError) -> bool,
) -> Result<(), StepError> {
    docker_context.inspect(|outcome| match outcome {
        Some(Err(err)) if matches(err) => Ok(()),
        Some(Err(err)) => Err(StepError::Assertion(format!("unexpected error: {err}"))),
        Some(Ok(_)) => Err(StepError::Assertion(String::from(
            "expected failure, got success",
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    })
}

#[then("the command succeeds with stdout \"{expected}\"")]
fn command_succeeds(docker_context: &DockerContext, expected: String) -> Result<(), StepError> {
    docker_context.inspect(|outcome| match outcome {
        Some(Ok(Some(result))) if result.stdout_lossy().trim_end() == expected => Ok(()),
        Some(Ok(Some(result))) => Err(StepError::Assertion(format!(
            "expected stdout {expected:?}, got {:?}",
            result.stdout_lossy()
        ))),
        Some(Ok(None)) => Err(StepError::Assertion(String::from("no command result"))),
        Some(Err(err)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {err}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    })
}

#[then("the run fails with exit code \"{code}\"")]
fn run_fails_with(docker_context: &DockerContext, code: i32) -> Result<(), StepError> {
    expect_error(docker_context, |err| {
        err.non_zero_exit()
            .is_some_and(|result| result.exit_code() == code)
    })
}

#[then("the live log contains \"{line}\"")]
fn live_log_contains(docker_context: &DockerContext, line: String) -> Result<(), StepError> {
    let lines = docker_context.sink.lines();
    if lines.contains(&line) {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected live line {line:?}, got {lines:?}"
        )))
    }
}

#[then("no container matches the address")]
fn no_container_matches(docker_context: &DockerContext) -> Result<(), StepError> {
    expect_error(docker_context, |err| {
        matches!(err, TransportError::Locate(LocateError::NoMatch { .. }))
    })
}

#[then("the address is ambiguous")]
fn address_is_ambiguous(docker_context: &DockerContext) -> Result<(), StepError> {
    expect_error(docker_context, |err| {
        matches!(
            err,
            TransportError::Locate(LocateError::AmbiguousMatch { matches: 2, .. })
        )
    })
}

#[then("the call is unsupported")]
fn call_is_unsupported(docker_context: &DockerContext) -> Result<(), StepError> {
    expect_error(docker_context, |err| {
        matches!(err, TransportError::Unsupported { .. })
    })?;
    if docker_context.runtime.connections() == 0 {
        Ok(())
    } else {
        Err(StepError::Assertion(String::from(
            "an unsupported call should not contact the runtime",
        )))
    }
}

#[then("the master holds \"{path}\" containing \"{contents}\"")]
fn master_holds(
    docker_context: &DockerContext,
    path: String,
    contents: String,
) -> Result<(), StepError> {
    expect_success(docker_context)?;
    let stored = docker_context
        .runtime
        .file(MASTER, path.trim())
        .ok_or_else(|| StepError::Assertion(format!("{path} was not written")))?;
    if stored.contents == contents.as_bytes() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "unexpected contents {:?}",
            String::from_utf8_lossy(&stored.contents)
        )))
    }
}

fn expect_success(docker_context: &DockerContext) -> Result<(), StepError> {
    docker_context.inspect(|outcome| match outcome {
        Some(Ok(_)) => Ok(()),
        Some(Err(err)) => Err(StepError::Assertion(format!(
            "expected success, got failure: {err}"
        ))),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    })
}

#[then("the remote write fails")]
fn remote_write_fails(docker_context: &DockerContext) -> Result<(), StepError> {
    expect_error(docker_context, |err| {
        matches!(err, TransportError::RemoteWriteFailure { .. })
    })
}
