//! Docker Engine adapter built on `bollard`.
//!
//! `bollard` is asynchronous while the transport contract is blocking, so each
//! [`DockerEngine`] owns a current-thread tokio runtime and drives every API
//! call to completion with `block_on`. Engines are created per operation by
//! [`DockerConnector`] and dropped when the operation returns.

use std::future::Future;
use std::pin::Pin;

use bollard::container::{
    InspectContainerOptions, ListContainersOptions, LogOutput, UploadToContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::{API_DEFAULT_VERSION, Docker};
use bytes::Bytes;
use camino::Utf8Path;
use futures::{Stream, StreamExt};
use tokio::runtime::{Builder, Runtime};

use crate::config::DockerConfig;

use super::{
    ContainerRuntime, ExecId, ExecSpec, ExecutionTarget, OutputStream, RuntimeConnector,
    RuntimeError,
};

/// Connects to the Docker daemon described by a [`DockerConfig`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DockerConnector {
    config: DockerConfig,
}

impl DockerConnector {
    /// Creates a connector for the given daemon settings.
    #[must_use]
    pub const fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    /// Settings used for every connection.
    #[must_use]
    pub const fn config(&self) -> &DockerConfig {
        &self.config
    }
}

impl RuntimeConnector for DockerConnector {
    type Runtime = DockerEngine;

    fn connect(&self) -> Result<Self::Runtime, RuntimeError> {
        DockerEngine::connect(&self.config)
    }
}

/// Blocking client for one Docker daemon.
#[derive(Debug)]
pub struct DockerEngine {
    docker: Docker,
    runtime: Runtime,
}

impl DockerEngine {
    /// Builds a client and its private runtime.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Unreachable`] when the runtime cannot be built
    /// or the daemon address is unusable.
    pub fn connect(config: &DockerConfig) -> Result<Self, RuntimeError> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| RuntimeError::Unreachable {
                message: format!("failed to start async runtime: {err}"),
            })?;
        let docker = {
            let _guard = runtime.enter();
            let connected = match config.host.as_deref() {
                None => Docker::connect_with_local_defaults()
                    .map(|docker| docker.with_timeout(timeout(config))),
                Some(host) => match host.strip_prefix("unix://") {
                    Some(socket) => {
                        Docker::connect_with_socket(socket, config.timeout_secs, API_DEFAULT_VERSION)
                    }
                    None => {
                        Docker::connect_with_http(host, config.timeout_secs, API_DEFAULT_VERSION)
                    }
                },
            };
            connected.map_err(classify)?
        };
        Ok(Self { docker, runtime })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    fn inspect_address(&self, id: &str) -> Result<Option<ExecutionTarget>, RuntimeError> {
        let inspected = match self.block_on(
            self.docker
                .inspect_container(id, None::<InspectContainerOptions>),
        ) {
            Ok(inspected) => inspected,
            // Container exited between listing and inspection.
            Err(err) if is_not_found(&err) => return Ok(None),
            Err(err) => return Err(classify(err)),
        };
        let address = inspected
            .network_settings
            .and_then(|settings| settings.ip_address)
            .filter(|address| !address.is_empty());
        Ok(Some(ExecutionTarget {
            id: id.to_owned(),
            name: inspected
                .name
                .map(|name| name.trim_start_matches('/').to_owned()),
            address,
        }))
    }
}

const fn timeout(config: &DockerConfig) -> std::time::Duration {
    std::time::Duration::from_secs(config.timeout_secs)
}

impl ContainerRuntime for DockerEngine {
    fn list_targets(&self) -> Result<Vec<ExecutionTarget>, RuntimeError> {
        let options = ListContainersOptions::<String> {
            all: false,
            ..Default::default()
        };
        let summaries = self
            .block_on(self.docker.list_containers(Some(options)))
            .map_err(classify)?;

        let mut targets = Vec::with_capacity(summaries.len());
        for id in summaries.into_iter().filter_map(|summary| summary.id) {
            if let Some(target) = self.inspect_address(&id)? {
                targets.push(target);
            }
        }
        Ok(targets)
    }

    fn create_exec(
        &self,
        target: &ExecutionTarget,
        spec: &ExecSpec,
    ) -> Result<ExecId, RuntimeError> {
        let options = CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            tty: Some(spec.tty),
            user: Some(spec.user.clone()),
            env: Some(spec.environment_pairs()),
            cmd: Some(spec.command.clone()),
            ..Default::default()
        };
        let created = self
            .block_on(self.docker.create_exec(&target.id, options))
            .map_err(classify)?;
        Ok(ExecId::new(created.id))
    }

    fn start_exec(&self, exec_id: &ExecId, tty: bool) -> Result<OutputStream<'_>, RuntimeError> {
        let options = StartExecOptions {
            detach: false,
            tty,
            output_capacity: None,
        };
        let started = self
            .block_on(self.docker.start_exec(exec_id.as_str(), Some(options)))
            .map_err(classify)?;
        match started {
            StartExecResults::Attached { output, .. } => Ok(Box::new(BlockingOutput {
                runtime: &self.runtime,
                stream: output,
            })),
            StartExecResults::Detached => Ok(Box::new(std::iter::empty())),
        }
    }

    fn exec_exit_code(&self, exec_id: &ExecId) -> Result<Option<i64>, RuntimeError> {
        let inspected = self
            .block_on(self.docker.inspect_exec(exec_id.as_str()))
            .map_err(classify)?;
        Ok(inspected.exit_code)
    }

    fn put_archive(
        &self,
        target: &ExecutionTarget,
        destination: &Utf8Path,
        archive: Vec<u8>,
    ) -> Result<(), RuntimeError> {
        let options = UploadToContainerOptions {
            path: destination.to_string(),
            ..Default::default()
        };
        self.block_on(self.docker.upload_to_container(
            &target.id,
            Some(options),
            Bytes::from(archive),
        ))
        .map_err(classify)
    }
}

type AttachedOutput = Pin<Box<dyn Stream<Item = Result<LogOutput, BollardError>> + Send>>;

/// Pulls attached exec output one frame at a time on the engine's runtime.
struct BlockingOutput<'a> {
    runtime: &'a Runtime,
    stream: AttachedOutput,
}

impl Iterator for BlockingOutput<'_> {
    type Item = Result<Vec<u8>, RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.runtime.block_on(self.stream.next())?;
        Some(
            frame
                .map(|output| output.into_bytes().to_vec())
                .map_err(|err| RuntimeError::Stream {
                    message: err.to_string(),
                }),
        )
    }
}

fn is_not_found(err: &BollardError) -> bool {
    matches!(
        err,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Maps a `bollard` error onto the runtime taxonomy.
fn classify(err: BollardError) -> RuntimeError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => RuntimeError::NotFound { message },
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => RuntimeError::Rejected {
            message: format!("HTTP {status_code}: {message}"),
        },
        other => RuntimeError::Unreachable {
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(404, "no such container", RuntimeError::NotFound { message: String::from("no such container") })]
    #[case(409, "container is paused", RuntimeError::Rejected { message: String::from("HTTP 409: container is paused") })]
    #[case(500, "boom", RuntimeError::Rejected { message: String::from("HTTP 500: boom") })]
    fn server_errors_are_classified_by_status(
        #[case] status_code: u16,
        #[case] message: &str,
        #[case] expected: RuntimeError,
    ) {
        let err = BollardError::DockerResponseServerError {
            status_code,
            message: message.to_owned(),
        };

        assert_eq!(classify(err), expected);
    }

    #[rstest]
    fn transport_failures_are_unreachable() {
        let err = BollardError::RequestTimeoutError;

        assert!(matches!(classify(err), RuntimeError::Unreachable { .. }));
    }

    #[rstest]
    fn connector_keeps_its_settings() {
        let config = DockerConfig {
            host: Some(String::from("tcp://127.0.0.1:2375")),
            timeout_secs: 5,
        };

        let connector = DockerConnector::new(config.clone());

        assert_eq!(connector.config(), &config);
    }
}
