//! Containerized execution: one long-lived container with the workspace
//! bind-mounted, each invocation run as an `exec` of the interpreter.

use crate::config::BridgeConfig;
use crate::docker::DockerCli;
use crate::engine::{ContainerEngine, ContainerSpec, ContainerState, ImageBuild};
use crate::process::parse_process_list;
use crate::session::{run_protocol, BackendKind, ExecutionSession};
use crate::workspace::Workspace;
use crate::RuntimeError;
use octave_bridge_script::{CommandBuffer, InvocationRequest, InvocationResult};
use serde::Serialize;
use tracing::{debug, info, warn};

/// How `ensure_container` obtained a running container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attachment {
    Reused,
    Started,
    Created,
}

/// Build the image unless it already exists. Returns whether a build ran.
pub fn ensure_image<E: ContainerEngine + ?Sized>(
    engine: &E,
    build: &ImageBuild,
    progress: &dyn Fn(&str),
) -> Result<bool, RuntimeError> {
    if engine.image_exists(&build.tag)? {
        debug!("image {} present", build.tag);
        return Ok(false);
    }
    info!("image {} not found, building", build.tag);
    engine.build_image(build, &|line| {
        debug!("build: {line}");
        progress(line);
    })?;
    info!("image {} built", build.tag);
    Ok(true)
}

/// Reuse, start, or create the named container so that it is running.
/// An existing container must mount this workspace.
pub fn ensure_container<E: ContainerEngine + ?Sized>(
    engine: &E,
    spec: &ContainerSpec,
) -> Result<Attachment, RuntimeError> {
    match engine.container_state(&spec.name)? {
        ContainerState::Absent => match engine.create_container(spec) {
            Ok(()) => Ok(Attachment::Created),
            Err(RuntimeError::NameConflict(name)) => {
                info!("container {name} appeared concurrently, attaching");
                match engine.container_state(&name)? {
                    ContainerState::Absent => Err(RuntimeError::ContainerLifecycle(format!(
                        "container {name} reported a name conflict but does not exist"
                    ))),
                    state => attach(engine, spec, state),
                }
            }
            Err(e) => Err(e),
        },
        state => attach(engine, spec, state),
    }
}

fn attach<E: ContainerEngine + ?Sized>(
    engine: &E,
    spec: &ContainerSpec,
    state: ContainerState,
) -> Result<Attachment, RuntimeError> {
    verify_mount(engine, spec)?;
    if state == ContainerState::Stopped {
        engine.start_container(&spec.name)?;
        Ok(Attachment::Started)
    } else {
        Ok(Attachment::Reused)
    }
}

fn verify_mount<E: ContainerEngine + ?Sized>(
    engine: &E,
    spec: &ContainerSpec,
) -> Result<(), RuntimeError> {
    match engine.mount_source(&spec.name, &spec.mount_point)? {
        Some(source) if source == spec.workspace => Ok(()),
        Some(source) => Err(RuntimeError::ContainerLifecycle(format!(
            "container {} mounts {} at {}, not this workspace {}; remove it with `octave-bridge stop` or set another container_name",
            spec.name,
            source.display(),
            spec.mount_point,
            spec.workspace.display()
        ))),
        None => Err(RuntimeError::ContainerLifecycle(format!(
            "container {} has nothing mounted at {}; remove it with `octave-bridge stop` or set another container_name",
            spec.name, spec.mount_point
        ))),
    }
}

pub struct ContainerSession<E: ContainerEngine = DockerCli> {
    engine: E,
    spec: ContainerSpec,
    interpreter: String,
    workspace: Workspace,
    commands: CommandBuffer,
    verbose: bool,
    attachment: Attachment,
}

impl<E: ContainerEngine> ContainerSession<E> {
    /// Make sure the image and container exist and are running, then attach.
    pub fn open(
        engine: E,
        config: &BridgeConfig,
        progress: &dyn Fn(&str),
    ) -> Result<Self, RuntimeError> {
        let root = std::fs::canonicalize(&config.workspace)?;
        let build = ImageBuild {
            tag: config.image_tag.clone(),
            context: config.build_context_path(),
            dockerfile: config.dockerfile.clone(),
        };
        ensure_image(&engine, &build, progress)?;

        let spec = ContainerSpec::new(
            config.container_name.clone(),
            config.image_tag.clone(),
            root.clone(),
            config.mount_point.clone(),
        );
        let attachment = ensure_container(&engine, &spec)?;
        info!("container {} ready ({attachment:?})", spec.name);

        Ok(Self {
            engine,
            spec,
            interpreter: config.interpreter.clone(),
            workspace: Workspace::new(root, &config.shared_dir),
            commands: CommandBuffer::new(),
            verbose: config.verbose,
            attachment,
        })
    }

    /// Attach to the named container if it exists, without building, creating,
    /// or starting anything. Used for hygiene and teardown from a fresh process.
    pub fn attach_existing(engine: E, config: &BridgeConfig) -> Result<Option<Self>, RuntimeError> {
        if engine.container_state(&config.container_name)? == ContainerState::Absent {
            return Ok(None);
        }
        let root = std::fs::canonicalize(&config.workspace)?;
        let spec = ContainerSpec::new(
            config.container_name.clone(),
            config.image_tag.clone(),
            root.clone(),
            config.mount_point.clone(),
        );
        Ok(Some(Self {
            engine,
            spec,
            interpreter: config.interpreter.clone(),
            workspace: Workspace::new(root, &config.shared_dir),
            commands: CommandBuffer::new(),
            verbose: config.verbose,
            attachment: Attachment::Reused,
        }))
    }

    pub fn attachment(&self) -> Attachment {
        self.attachment
    }

    pub fn container_name(&self) -> &str {
        &self.spec.name
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }
}

impl<E: ContainerEngine> ExecutionSession for ContainerSession<E> {
    fn kind(&self) -> BackendKind {
        BackendKind::Containerized
    }

    fn commands(&self) -> &CommandBuffer {
        &self.commands
    }

    fn commands_mut(&mut self) -> &mut CommandBuffer {
        &mut self.commands
    }

    fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn verbose(&self) -> bool {
        self.verbose
    }

    fn invoke(&mut self, request: &InvocationRequest) -> Result<InvocationResult, RuntimeError> {
        let stale = self.check_running_processes();
        if !stale.is_empty() {
            warn!(
                "{} {} process(es) already running in container {}: {}; run `octave-bridge kill` if they are stuck",
                stale.len(),
                self.interpreter,
                self.spec.name,
                stale.join("; ")
            );
        }

        let engine = &self.engine;
        let spec = &self.spec;
        let interpreter = &self.interpreter;
        run_protocol(
            &self.workspace,
            &mut self.commands,
            self.verbose,
            request,
            |script| {
                engine.exec(
                    &spec.name,
                    &spec.mount_point,
                    &[interpreter.clone(), script.to_owned()],
                )
            },
        )
    }

    fn check_running_processes(&self) -> Vec<String> {
        let command = ["pgrep".to_owned(), "-a".to_owned(), self.interpreter.clone()];
        match self.engine.exec(&self.spec.name, &self.spec.mount_point, &command) {
            Ok(out) if out.succeeded() => parse_process_list(&out.output),
            // pgrep exits 1 when nothing matches
            Ok(out) if out.exit_code == 1 => Vec::new(),
            Ok(out) => {
                debug!("pgrep exited with {}: {}", out.exit_code, out.output.trim());
                Vec::new()
            }
            Err(e) => {
                debug!("process check failed: {e}");
                Vec::new()
            }
        }
    }

    fn kill_running_processes(&self) -> bool {
        let command = ["pkill".to_owned(), "-9".to_owned(), self.interpreter.clone()];
        match self.engine.exec(&self.spec.name, &self.spec.mount_point, &command) {
            Ok(out) if out.exit_code == 0 || out.exit_code == 1 => true,
            Ok(out) => {
                warn!("pkill exited with {}: {}", out.exit_code, out.output.trim());
                false
            }
            Err(e) => {
                warn!("could not kill {} processes: {e}", self.interpreter);
                false
            }
        }
    }

    fn teardown(&mut self) -> Result<(), RuntimeError> {
        info!("stopping container {}", self.spec.name);
        self.engine.stop_container(&self.spec.name)?;
        self.engine.remove_container(&self.spec.name)?;
        self.commands.reset();
        Ok(())
    }

    fn describe(&self) -> String {
        format!(
            "container '{}' from image '{}' via {}",
            self.spec.name,
            self.spec.image,
            self.engine.name()
        )
    }
}
