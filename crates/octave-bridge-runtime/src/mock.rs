//! In-memory `ContainerEngine` for tests.
//!
//! Images and containers are bookkeeping entries; `exec` of the interpreter
//! is answered by a caller-supplied responder that can read the generated
//! script from the shared workspace and write the exchange file, standing in
//! for the interpreter.

use crate::engine::{ContainerEngine, ContainerSpec, ContainerState, ExecOutput, ImageBuild};
use crate::RuntimeError;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Mutex;

/// One interpreter exec as seen by the responder.
pub struct MockExec<'a> {
    pub container: &'a ContainerSpec,
    pub workdir: &'a str,
    pub command: &'a [String],
}

impl MockExec<'_> {
    /// Host path of a path given relative to the exec working directory.
    pub fn host_path(&self, rel: &str) -> PathBuf {
        let inside = if rel.starts_with('/') {
            rel.to_owned()
        } else {
            format!("{}/{rel}", self.workdir.trim_end_matches('/'))
        };
        let under_mount = inside
            .strip_prefix(self.container.mount_point.trim_end_matches('/'))
            .unwrap_or(&inside)
            .trim_start_matches('/');
        self.container.workspace.join(under_mount)
    }

    /// Host path of the script passed as the last command argument.
    pub fn script_path(&self) -> Option<PathBuf> {
        self.command.last().map(|s| self.host_path(s))
    }
}

type Responder = Box<dyn Fn(&MockExec<'_>) -> ExecOutput + Send + Sync>;

#[derive(Default)]
struct MockState {
    images: HashSet<String>,
    containers: HashMap<String, (ContainerSpec, ContainerState)>,
    exec_log: Vec<Vec<String>>,
    processes: Vec<String>,
    builds: usize,
    creates: usize,
    /// Containers that appear under the requested name between the state
    /// check and the create, as when another process wins the race.
    race_on_create: HashSet<String>,
    failing_build: Option<String>,
}

pub struct MockEngine {
    state: Mutex<MockState>,
    responder: Responder,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            responder: Box::new(|_| ExecOutput::failure(127, "octave-cli: command not found")),
        }
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_responder(
        mut self,
        responder: impl Fn(&MockExec<'_>) -> ExecOutput + Send + Sync + 'static,
    ) -> Self {
        self.responder = Box::new(responder);
        self
    }

    #[must_use]
    pub fn with_image(self, tag: &str) -> Self {
        self.lock_state().images.insert(tag.to_owned());
        self
    }

    /// Pre-existing container, e.g. one left by an earlier process.
    #[must_use]
    pub fn with_container(self, spec: ContainerSpec, state: ContainerState) -> Self {
        self.lock_state()
            .containers
            .insert(spec.name.clone(), (spec, state));
        self
    }

    #[must_use]
    pub fn with_processes(self, processes: &[&str]) -> Self {
        self.lock_state().processes = processes.iter().map(|p| (*p).to_owned()).collect();
        self
    }

    #[must_use]
    pub fn with_failing_build(self, log: &str) -> Self {
        self.lock_state().failing_build = Some(log.to_owned());
        self
    }

    #[must_use]
    pub fn with_create_race(self, name: &str) -> Self {
        self.lock_state().race_on_create.insert(name.to_owned());
        self
    }

    pub fn build_count(&self) -> usize {
        self.lock_state().builds
    }

    pub fn create_count(&self) -> usize {
        self.lock_state().creates
    }

    /// Number of containers that exist, running or stopped.
    pub fn container_count(&self) -> usize {
        self.lock_state().containers.len()
    }

    pub fn exec_log(&self) -> Vec<Vec<String>> {
        self.lock_state().exec_log.clone()
    }

    pub fn state_of(&self, name: &str) -> ContainerState {
        self.lock_state()
            .containers
            .get(name)
            .map_or(ContainerState::Absent, |(_, s)| *s)
    }

    // Builders and accessors only; engine operations go through `state()`.
    fn lock_state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, MockState>, RuntimeError> {
        self.state
            .lock()
            .map_err(|e| RuntimeError::ContainerLifecycle(format!("mutex poisoned: {e}")))
    }
}

impl ContainerEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    fn image_exists(&self, tag: &str) -> Result<bool, RuntimeError> {
        Ok(self.state()?.images.contains(tag))
    }

    fn build_image(&self, build: &ImageBuild, progress: &dyn Fn(&str)) -> Result<(), RuntimeError> {
        let mut state = self.state()?;
        state.builds += 1;
        progress(&format!("mock build {}", build.tag));
        if let Some(log) = state.failing_build.clone() {
            progress(&log);
            return Err(RuntimeError::ImageBuild {
                tag: build.tag.clone(),
                log,
            });
        }
        state.images.insert(build.tag.clone());
        Ok(())
    }

    fn container_state(&self, name: &str) -> Result<ContainerState, RuntimeError> {
        Ok(self
            .state()?
            .containers
            .get(name)
            .map_or(ContainerState::Absent, |(_, s)| *s))
    }

    fn mount_source(&self, name: &str, mount_point: &str) -> Result<Option<PathBuf>, RuntimeError> {
        match self.state()?.containers.get(name) {
            Some((spec, _)) if spec.mount_point == mount_point => Ok(Some(spec.workspace.clone())),
            Some(_) => Ok(None),
            None => Err(RuntimeError::ContainerLifecycle(format!(
                "no such container: {name}"
            ))),
        }
    }

    fn start_container(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.state()?;
        match state.containers.get_mut(name) {
            Some((_, s)) => {
                *s = ContainerState::Running;
                Ok(())
            }
            None => Err(RuntimeError::ContainerLifecycle(format!(
                "no such container: {name}"
            ))),
        }
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        let mut state = self.state()?;
        if state.race_on_create.remove(&spec.name) {
            state
                .containers
                .insert(spec.name.clone(), (spec.clone(), ContainerState::Running));
            return Err(RuntimeError::NameConflict(spec.name.clone()));
        }
        if state.containers.contains_key(&spec.name) {
            return Err(RuntimeError::NameConflict(spec.name.clone()));
        }
        if !state.images.contains(&spec.image) {
            return Err(RuntimeError::ContainerLifecycle(format!(
                "no such image: {}",
                spec.image
            )));
        }
        state.creates += 1;
        state
            .containers
            .insert(spec.name.clone(), (spec.clone(), ContainerState::Running));
        Ok(())
    }

    fn exec(
        &self,
        name: &str,
        workdir: &str,
        command: &[String],
    ) -> Result<ExecOutput, RuntimeError> {
        let spec = {
            let mut state = self.state()?;
            state.exec_log.push(command.to_vec());
            match state.containers.get(name) {
                Some((spec, ContainerState::Running)) => spec.clone(),
                _ => {
                    return Err(RuntimeError::ContainerLifecycle(format!(
                        "container {name} is not running"
                    )))
                }
            }
        };

        match command.first().map(String::as_str) {
            Some("pgrep") => {
                let state = self.state()?;
                if state.processes.is_empty() {
                    Ok(ExecOutput::failure(1, ""))
                } else {
                    Ok(ExecOutput::success(state.processes.join("\n")))
                }
            }
            Some("pkill") => {
                let mut state = self.state()?;
                let had = !state.processes.is_empty();
                state.processes.clear();
                Ok(if had {
                    ExecOutput::success("")
                } else {
                    ExecOutput::failure(1, "")
                })
            }
            _ => Ok((self.responder)(&MockExec {
                container: &spec,
                workdir,
                command,
            })),
        }
    }

    fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        let mut state = self.state()?;
        match state.containers.get_mut(name) {
            Some((_, s)) => {
                *s = ContainerState::Stopped;
                Ok(())
            }
            None => Err(RuntimeError::ContainerLifecycle(format!(
                "no such container: {name}"
            ))),
        }
    }

    fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.state()?.containers.remove(name);
        Ok(())
    }
}
