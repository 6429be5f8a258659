use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    Running,
    Stopped,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuild {
    pub tag: String,
    pub context: PathBuf,
    /// Relative to `context`.
    pub dockerfile: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Host directory bind-mounted read-write at `mount_point`.
    pub workspace: PathBuf,
    pub mount_point: String,
    /// Long-running no-op that keeps the container alive between execs.
    pub keepalive: Vec<String>,
}

impl ContainerSpec {
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        workspace: impl Into<PathBuf>,
        mount_point: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            workspace: workspace.into(),
            mount_point: mount_point.into(),
            keepalive: vec!["tail".to_owned(), "-f".to_owned(), "/dev/null".to_owned()],
        }
    }
}

/// Exit code and combined output of a command run inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub output: String,
}

impl ExecOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            output: output.into(),
        }
    }

    pub fn failure(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// The operations the containerized session needs from a container engine.
pub trait ContainerEngine: Send + Sync {
    fn name(&self) -> &str;

    fn image_exists(&self, tag: &str) -> Result<bool, RuntimeError>;

    /// Build `build.tag`, passing every log line to `progress` as it arrives.
    /// On failure the error carries the accumulated log.
    fn build_image(&self, build: &ImageBuild, progress: &dyn Fn(&str)) -> Result<(), RuntimeError>;

    fn container_state(&self, name: &str) -> Result<ContainerState, RuntimeError>;

    /// Host directory bind-mounted at `mount_point` in an existing container,
    /// `None` when nothing is mounted there.
    fn mount_source(&self, name: &str, mount_point: &str) -> Result<Option<PathBuf>, RuntimeError>;

    fn start_container(&self, name: &str) -> Result<(), RuntimeError>;

    /// Create and start a detached container. Fails with
    /// [`RuntimeError::NameConflict`] when the name is taken.
    fn create_container(&self, spec: &ContainerSpec) -> Result<(), RuntimeError>;

    /// Run `command` in the container with `workdir` as working directory,
    /// blocking until it exits.
    fn exec(&self, name: &str, workdir: &str, command: &[String])
        -> Result<ExecOutput, RuntimeError>;

    fn stop_container(&self, name: &str) -> Result<(), RuntimeError>;

    fn remove_container(&self, name: &str) -> Result<(), RuntimeError>;
}

impl<E: ContainerEngine + ?Sized> ContainerEngine for Arc<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn image_exists(&self, tag: &str) -> Result<bool, RuntimeError> {
        (**self).image_exists(tag)
    }

    fn build_image(&self, build: &ImageBuild, progress: &dyn Fn(&str)) -> Result<(), RuntimeError> {
        (**self).build_image(build, progress)
    }

    fn container_state(&self, name: &str) -> Result<ContainerState, RuntimeError> {
        (**self).container_state(name)
    }

    fn mount_source(&self, name: &str, mount_point: &str) -> Result<Option<PathBuf>, RuntimeError> {
        (**self).mount_source(name, mount_point)
    }

    fn start_container(&self, name: &str) -> Result<(), RuntimeError> {
        (**self).start_container(name)
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        (**self).create_container(spec)
    }

    fn exec(
        &self,
        name: &str,
        workdir: &str,
        command: &[String],
    ) -> Result<ExecOutput, RuntimeError> {
        (**self).exec(name, workdir, command)
    }

    fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        (**self).stop_container(name)
    }

    fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        (**self).remove_container(name)
    }
}
