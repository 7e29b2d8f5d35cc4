//! Test doubles shared across unit and integration tests, and usable by
//! harness code that wants to exercise transports without a container
//! runtime or SSH server.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::ffi::OsString;
use std::io::Read;
use std::process::Child;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};

use crate::runtime::{
    ContainerRuntime, ExecId, ExecSpec, ExecutionTarget, OutputStream, RuntimeConnector,
    RuntimeError,
};
use crate::ssh::{CommandOutput, CommandRunner, OutputMode, RunnerError};
use crate::transport::{OutputSink, render_chunk};

/// Directories every scripted container starts with.
pub const DEFAULT_DIRECTORIES: [&str; 4] = ["/", "/etc", "/opt", "/tmp"];

/// Output and exit status of one scripted exec.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScriptedExec {
    chunks: Vec<Result<Vec<u8>, RuntimeError>>,
    exit_code: Option<i64>,
}

impl ScriptedExec {
    /// Exec that prints `chunks` in order and exits with status zero.
    #[must_use]
    pub fn chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Vec<u8>>,
    {
        Self {
            chunks: chunks.into_iter().map(|chunk| Ok(chunk.into())).collect(),
            exit_code: Some(0),
        }
    }

    /// Exec that prints nothing and exits with status zero.
    #[must_use]
    pub const fn silent() -> Self {
        Self {
            chunks: Vec::new(),
            exit_code: Some(0),
        }
    }

    /// Sets the exit code reported once output is exhausted.
    #[must_use]
    pub const fn exit_code(mut self, code: i64) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Never reports an exit code.
    #[must_use]
    pub const fn never_exits(mut self) -> Self {
        self.exit_code = None;
        self
    }

    /// Breaks the output stream after the chunks queued so far.
    #[must_use]
    pub fn stream_error(mut self, err: RuntimeError) -> Self {
        self.chunks.push(Err(err));
        self
    }
}

/// A file written into a scripted container.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoredFile {
    /// File contents.
    pub contents: Vec<u8>,
    /// Permission bits from the archive header.
    pub mode: u32,
}

#[derive(Debug)]
struct ExecRecord {
    script: ScriptedExec,
    finished: bool,
}

#[derive(Debug, Default)]
struct ScriptState {
    targets: Vec<ExecutionTarget>,
    queued: HashMap<String, VecDeque<ScriptedExec>>,
    execs: BTreeMap<u64, ExecRecord>,
    specs: Vec<(String, ExecSpec)>,
    directories: BTreeSet<(String, Utf8PathBuf)>,
    files: BTreeMap<(String, Utf8PathBuf), StoredFile>,
    next_exec: u64,
    connections: usize,
    connect_failure: Option<RuntimeError>,
    inventory_failure: Option<RuntimeError>,
    exec_failure: Option<RuntimeError>,
    upload_failure: Option<RuntimeError>,
}

/// In-memory container runtime driven by scripted execs.
///
/// Clones share state, so a clone handed to a transport as its connector can
/// be inspected afterwards. Each container owns a queue of scripted execs;
/// an exec created with an empty queue prints nothing and exits zero.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRuntime {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedRuntime {
    /// Creates a runtime with no containers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a running container with `address` on its primary network.
    #[must_use]
    pub fn with_target(self, id: &str, address: &str) -> Self {
        self.add_target(ExecutionTarget::new(id, address))
    }

    /// Adds a running container that has no primary network address.
    #[must_use]
    pub fn with_unaddressed_target(self, id: &str) -> Self {
        self.add_target(ExecutionTarget {
            id: id.to_owned(),
            name: None,
            address: None,
        })
    }

    fn add_target(self, target: ExecutionTarget) -> Self {
        {
            let mut state = self.lock();
            for directory in DEFAULT_DIRECTORIES {
                state
                    .directories
                    .insert((target.id.clone(), Utf8PathBuf::from(directory)));
            }
            state.targets.push(target);
        }
        self
    }

    /// Adds a directory inside container `id`.
    #[must_use]
    pub fn with_directory(self, id: &str, path: &str) -> Self {
        self.lock()
            .directories
            .insert((id.to_owned(), Utf8PathBuf::from(path)));
        self
    }

    /// Queues `exec` for the next command run in container `id`.
    #[must_use]
    pub fn with_exec(self, id: &str, exec: ScriptedExec) -> Self {
        self.lock()
            .queued
            .entry(id.to_owned())
            .or_default()
            .push_back(exec);
        self
    }

    /// Makes every connection attempt fail.
    #[must_use]
    pub fn fail_connect(self, err: RuntimeError) -> Self {
        self.lock().connect_failure = Some(err);
        self
    }

    /// Makes container listing fail.
    #[must_use]
    pub fn fail_inventory(self, err: RuntimeError) -> Self {
        self.lock().inventory_failure = Some(err);
        self
    }

    /// Makes exec creation fail.
    #[must_use]
    pub fn fail_exec_create(self, err: RuntimeError) -> Self {
        self.lock().exec_failure = Some(err);
        self
    }

    /// Makes archive uploads fail.
    #[must_use]
    pub fn fail_upload(self, err: RuntimeError) -> Self {
        self.lock().upload_failure = Some(err);
        self
    }

    /// Looks up a container by id.
    #[must_use]
    pub fn target(&self, id: &str) -> Option<ExecutionTarget> {
        self.lock()
            .targets
            .iter()
            .find(|target| target.id == id)
            .cloned()
    }

    /// Number of successful [`RuntimeConnector::connect`] calls.
    #[must_use]
    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    /// Container id and settings of every exec created so far.
    #[must_use]
    pub fn exec_specs(&self) -> Vec<(String, ExecSpec)> {
        self.lock().specs.clone()
    }

    /// Reads a file previously delivered into container `id`.
    #[must_use]
    pub fn file(&self, id: &str, path: &str) -> Option<StoredFile> {
        self.lock()
            .files
            .get(&(id.to_owned(), Utf8PathBuf::from(path)))
            .cloned()
    }

    /// Paths of every file delivered into container `id`.
    #[must_use]
    pub fn files_in(&self, id: &str) -> Vec<Utf8PathBuf> {
        self.lock()
            .files
            .keys()
            .filter(|(owner, _)| owner == id)
            .map(|(_, path)| path.clone())
            .collect()
    }

    fn mark_finished(&self, exec: u64) {
        if let Some(record) = self.lock().execs.get_mut(&exec) {
            record.finished = true;
        }
    }
}

fn parse_exec_id(exec_id: &ExecId) -> Result<u64, RuntimeError> {
    exec_id
        .as_str()
        .strip_prefix("exec-")
        .and_then(|raw| raw.parse().ok())
        .ok_or_else(|| RuntimeError::NotFound {
            message: format!("no such exec: {exec_id}"),
        })
}

fn unpack(archive: &[u8]) -> Result<Vec<(Utf8PathBuf, StoredFile)>, RuntimeError> {
    let rejected = |err: std::io::Error| RuntimeError::Rejected {
        message: format!("invalid archive: {err}"),
    };
    let mut reader = tar::Archive::new(archive);
    let mut unpacked = Vec::new();
    for entry in reader.entries().map_err(rejected)? {
        let mut entry = entry.map_err(rejected)?;
        let path = entry.path().map_err(rejected)?.to_string_lossy().into_owned();
        let mode = entry.header().mode().map_err(rejected)?;
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).map_err(rejected)?;
        unpacked.push((Utf8PathBuf::from(path), StoredFile { contents, mode }));
    }
    Ok(unpacked)
}

impl ContainerRuntime for ScriptedRuntime {
    fn list_targets(&self) -> Result<Vec<ExecutionTarget>, RuntimeError> {
        let state = self.lock();
        if let Some(err) = &state.inventory_failure {
            return Err(err.clone());
        }
        Ok(state.targets.clone())
    }

    fn create_exec(
        &self,
        target: &ExecutionTarget,
        spec: &ExecSpec,
    ) -> Result<ExecId, RuntimeError> {
        let mut state = self.lock();
        if let Some(err) = &state.exec_failure {
            return Err(err.clone());
        }
        if !state.targets.iter().any(|known| known.id == target.id) {
            return Err(RuntimeError::NotFound {
                message: format!("no such container: {}", target.id),
            });
        }
        let script = state
            .queued
            .get_mut(&target.id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(ScriptedExec::silent);
        state.next_exec += 1;
        let exec = state.next_exec;
        state.execs.insert(
            exec,
            ExecRecord {
                script,
                finished: false,
            },
        );
        state.specs.push((target.id.clone(), spec.clone()));
        Ok(ExecId::new(format!("exec-{exec}")))
    }

    fn start_exec(&self, exec_id: &ExecId, _tty: bool) -> Result<OutputStream<'_>, RuntimeError> {
        let exec = parse_exec_id(exec_id)?;
        let chunks = self
            .lock()
            .execs
            .get(&exec)
            .map(|record| record.script.chunks.clone())
            .ok_or_else(|| RuntimeError::NotFound {
                message: format!("no such exec: {exec_id}"),
            })?;
        let mut remaining = chunks.into_iter();
        Ok(Box::new(std::iter::from_fn(move || {
            let next = remaining.next();
            if next.is_none() {
                self.mark_finished(exec);
            }
            next
        })))
    }

    fn exec_exit_code(&self, exec_id: &ExecId) -> Result<Option<i64>, RuntimeError> {
        let exec = parse_exec_id(exec_id)?;
        let state = self.lock();
        let record = state.execs.get(&exec).ok_or_else(|| RuntimeError::NotFound {
            message: format!("no such exec: {exec_id}"),
        })?;
        Ok(if record.finished {
            record.script.exit_code
        } else {
            None
        })
    }

    fn put_archive(
        &self,
        target: &ExecutionTarget,
        destination: &Utf8Path,
        archive: Vec<u8>,
    ) -> Result<(), RuntimeError> {
        let mut state = self.lock();
        if let Some(err) = &state.upload_failure {
            return Err(err.clone());
        }
        if !state
            .directories
            .contains(&(target.id.clone(), destination.to_path_buf()))
        {
            return Err(RuntimeError::NotFound {
                message: format!("could not find the file {destination} in container {}", target.id),
            });
        }
        for (path, file) in unpack(&archive)? {
            state
                .files
                .insert((target.id.clone(), destination.join(path)), file);
        }
        Ok(())
    }
}

impl RuntimeConnector for ScriptedRuntime {
    type Runtime = Self;

    fn connect(&self) -> Result<Self::Runtime, RuntimeError> {
        let mut state = self.lock();
        if let Some(err) = &state.connect_failure {
            return Err(err.clone());
        }
        state.connections += 1;
        drop(state);
        Ok(self.clone())
    }
}

/// Sink that records every emitted line.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl RecordingSink {
    /// Lines emitted so far, in emission order.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl OutputSink for RecordingSink {
    fn emit(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
    }
}

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic client outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Debug rendering of the requested output mode.
    pub mode: String,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Last argument, which is the remote command for `ssh` invocations.
    #[must_use]
    pub fn last_arg(&self) -> Option<String> {
        self.args
            .last()
            .map(|arg| arg.to_string_lossy().into_owned())
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Pushes an explicit client output.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<Vec<u8>>,
        stderr: impl Into<Vec<u8>>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }

    /// Pushes a successful exit with no output.
    pub fn push_success(&self) {
        self.push_output(Some(0), Vec::new(), Vec::new());
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), Vec::new(), "simulated failure");
    }

    fn record(&self, program: &str, args: &[OsString], mode: String) {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            mode,
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(
        &self,
        program: &str,
        args: &[OsString],
        mode: OutputMode<'_>,
    ) -> Result<CommandOutput, RunnerError> {
        self.record(program, args, format!("{mode:?}"));
        let output = self
            .responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| RunnerError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })?;
        if let OutputMode::Live(sink) = mode {
            for line in output.stdout.split_inclusive(|byte| *byte == b'\n') {
                sink.emit(&render_chunk(line));
            }
        }
        Ok(output)
    }

    fn spawn(&self, program: &str, args: &[OsString]) -> Result<Child, RunnerError> {
        self.record(program, args, String::from("Piped"));
        Err(RunnerError::Spawn {
            program: program.to_owned(),
            message: String::from("scripted runner cannot spawn processes"),
        })
    }
}
