use crate::engine::ExecOutput;
use crate::workspace::Workspace;
use crate::RuntimeError;
use octave_bridge_script::{CommandBuffer, InvocationRequest, InvocationResult, ScriptBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Containerized,
    Local,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Containerized => f.write_str("containerized"),
            Self::Local => f.write_str("local"),
        }
    }
}

/// A live connection to one interpreter, able to run invocations against the
/// shared workspace. Persistent commands survive across invocations; transient
/// commands are dropped after every invocation whatever its outcome.
pub trait ExecutionSession: Send {
    fn kind(&self) -> BackendKind;

    fn commands(&self) -> &CommandBuffer;

    fn commands_mut(&mut self) -> &mut CommandBuffer;

    /// Queue a persistent statement, replayed before every invocation.
    fn eval(&mut self, statement: &str) {
        self.commands_mut().eval(statement);
    }

    /// Queue a persistent search-path addition. Accepts a plain directory or
    /// a `genpath(...)` expression.
    fn add_path(&mut self, path_or_genpath: &str) {
        self.commands_mut().add_path(path_or_genpath);
    }

    /// Queue a statement for the next invocation only.
    fn push_transient(&mut self, statement: &str) {
        self.commands_mut().push_transient(statement);
    }

    fn set_verbose(&mut self, verbose: bool);

    fn verbose(&self) -> bool;

    fn invoke(&mut self, request: &InvocationRequest) -> Result<InvocationResult, RuntimeError>;

    /// Interpreter processes still running for this backend. Best-effort:
    /// failures collapse to an empty list.
    fn check_running_processes(&self) -> Vec<String>;

    /// Force-kill interpreter processes. Best-effort: returns `false` when the
    /// kill could not be issued.
    fn kill_running_processes(&self) -> bool;

    /// Release backend resources and clear both command buffers. Never called
    /// implicitly.
    fn teardown(&mut self) -> Result<(), RuntimeError>;

    /// One-line human description, e.g. the container name or binary path.
    fn describe(&self) -> String;
}

/// Session handle shared between callers; the mutex admits one invocation at
/// a time.
pub type SharedSession = Arc<Mutex<Box<dyn ExecutionSession>>>;

pub fn share(session: Box<dyn ExecutionSession>) -> SharedSession {
    Arc::new(Mutex::new(session))
}

/// The invocation protocol common to every backend: lock the shared
/// directory, write the generated script, run it through `execute` (which
/// receives the script path relative to the workspace), and decode the
/// exchange file. The transient buffer is cleared on every path out.
pub(crate) fn run_protocol(
    workspace: &Workspace,
    commands: &mut CommandBuffer,
    session_verbose: bool,
    request: &InvocationRequest,
    execute: impl FnOnce(&str) -> Result<ExecOutput, RuntimeError>,
) -> Result<InvocationResult, RuntimeError> {
    let outcome = run_locked(workspace, commands, session_verbose, request, execute);
    commands.clear_transient();
    outcome
}

fn run_locked(
    workspace: &Workspace,
    commands: &CommandBuffer,
    session_verbose: bool,
    request: &InvocationRequest,
    execute: impl FnOnce(&str) -> Result<ExecOutput, RuntimeError>,
) -> Result<InvocationResult, RuntimeError> {
    let verbose = request.verbose_override.unwrap_or(session_verbose);
    let _lock = workspace.lock()?;

    let script = ScriptBuilder::new(commands, &workspace.exchange_rel()).build(request);
    let summary: Vec<String> = request.arguments.iter().map(|a| a.summary()).collect();
    if verbose {
        info!("calling {}({})", request.function, summary.join(", "));
        info!("generated script:\n{}", script.text);
    } else {
        debug!("calling {}({})", request.function, summary.join(", "));
        debug!("generated script:\n{}", script.text);
    }

    workspace.prepare()?;
    workspace.write_script(&script.text)?;

    let output = execute(&workspace.script_rel())?;
    if verbose {
        info!("interpreter exited with {}:\n{}", output.exit_code, output.output);
    } else {
        debug!("interpreter exited with {}", output.exit_code);
    }
    if !output.succeeded() {
        return Err(RuntimeError::Execution {
            code: output.exit_code,
            output: output.output,
        });
    }

    workspace.read_result(request)
}
