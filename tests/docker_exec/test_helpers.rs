//! Shared fixtures for container exec BDD scenarios.

use std::cell::RefCell;
use std::net::IpAddr;
use std::rc::Rc;
use std::sync::Arc;

use camino::Utf8PathBuf;
use rstest::fixture;
use stevedore::test_support::{RecordingSink, ScriptedRuntime};
use stevedore::{CommandResult, DockerExecTransport, TransportError};
use tempfile::TempDir;

/// What the last `When` step produced. `popen` results carry no output.
pub type Outcome = Result<Option<CommandResult>, TransportError>;

#[derive(Clone, Debug)]
pub struct DockerContext {
    pub runtime: ScriptedRuntime,
    pub sink: RecordingSink,
    pub workdir: Arc<TempDir>,
    pub local_file: Option<Utf8PathBuf>,
    outcome: Rc<RefCell<Option<Outcome>>>,
}

impl DockerContext {
    pub fn transport(&self) -> DockerExecTransport<ScriptedRuntime, RecordingSink> {
        DockerExecTransport::new(self.runtime.clone()).with_sink(self.sink.clone())
    }

    pub fn record(&self, outcome: Outcome) {
        self.outcome.replace(Some(outcome));
    }

    pub fn inspect<R>(&self, check: impl FnOnce(Option<&Outcome>) -> R) -> R {
        check(self.outcome.borrow().as_ref())
    }
}

#[fixture]
pub fn docker_context() -> DockerContext {
    let workdir = TempDir::new()
        .unwrap_or_else(|err| panic!("temporary directory should be created: {err}"));
    DockerContext {
        runtime: ScriptedRuntime::new(),
        sink: RecordingSink::default(),
        workdir: Arc::new(workdir),
        local_file: None,
        outcome: Rc::new(RefCell::new(None)),
    }
}

pub fn parse_address(raw: &str) -> IpAddr {
    raw.trim()
        .parse()
        .unwrap_or_else(|err| panic!("scenario address `{raw}` should parse: {err}"))
}

pub fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(String::from).collect()
}
