//! `ContainerEngine` backed by the `docker` command-line client.

use crate::engine::{ContainerEngine, ContainerSpec, ContainerState, ExecOutput, ImageBuild};
use crate::probe::{AvailabilityProbe, Endpoint};
use crate::process::{combined_output, exit_code, isolate_from_terminal_signals};
use crate::RuntimeError;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use tracing::{debug, info};

pub struct DockerCli {
    binary: PathBuf,
    endpoint: Endpoint,
}

impl DockerCli {
    /// Connect through the first endpoint that answers the probe.
    pub fn connect(probe: &AvailabilityProbe) -> Result<Self, RuntimeError> {
        let binary = probe
            .docker_binary()
            .ok_or_else(|| RuntimeError::BackendUnavailable("docker".to_owned()))?;
        let endpoint = probe.find_container_endpoint().ok_or_else(|| {
            let tried: Vec<String> = probe
                .endpoint_candidates()
                .iter()
                .map(ToString::to_string)
                .collect();
            RuntimeError::ContainerLifecycle(format!(
                "no container engine endpoint answered (tried {})",
                tried.join(", ")
            ))
        })?;
        info!("using container engine endpoint {endpoint}");
        Ok(Self::with_endpoint(binary, endpoint))
    }

    pub fn with_endpoint(binary: impl Into<PathBuf>, endpoint: Endpoint) -> Self {
        Self {
            binary: binary.into(),
            endpoint,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(host) = self.endpoint.host_arg() {
            cmd.arg("--host").arg(host);
        }
        cmd
    }

    fn output(&self, args: &[&str]) -> Result<Output, RuntimeError> {
        debug!("docker {}", args.join(" "));
        self.command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| RuntimeError::ContainerLifecycle(format!("docker {}: {e}", args[0])))
    }

    fn checked(&self, args: &[&str]) -> Result<String, RuntimeError> {
        let output = self.output(args)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(RuntimeError::ContainerLifecycle(format!(
                "docker {} failed: {}",
                args.join(" "),
                combined_output(&output).trim()
            )))
        }
    }
}

impl ContainerEngine for DockerCli {
    fn name(&self) -> &str {
        "docker"
    }

    fn image_exists(&self, tag: &str) -> Result<bool, RuntimeError> {
        let output = self.output(&["image", "inspect", "--format", "{{.Id}}", tag])?;
        Ok(output.status.success())
    }

    fn build_image(&self, build: &ImageBuild, progress: &dyn Fn(&str)) -> Result<(), RuntimeError> {
        let dockerfile = build.context.join(&build.dockerfile);
        info!("building image {} from {}", build.tag, dockerfile.display());
        let mut child = self
            .command()
            .arg("build")
            .arg("-t")
            .arg(&build.tag)
            .arg("-f")
            .arg(&dockerfile)
            .arg("--rm")
            .arg(&build.context)
            .env("BUILDKIT_PROGRESS", "plain")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RuntimeError::ImageBuild {
                tag: build.tag.clone(),
                log: format!("failed to start docker build: {e}"),
            })?;

        let (tx, rx) = mpsc::channel::<String>();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_line_reader(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_line_reader(stderr, tx.clone()));
        }
        drop(tx);

        let mut log = String::new();
        for line in rx {
            progress(&line);
            log.push_str(&line);
            log.push('\n');
        }
        for reader in readers {
            let _ = reader.join();
        }

        let status = child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(RuntimeError::ImageBuild {
                tag: build.tag.clone(),
                log,
            })
        }
    }

    fn container_state(&self, name: &str) -> Result<ContainerState, RuntimeError> {
        let output = self.output(&["container", "inspect", "--format", "{{.State.Running}}", name])?;
        if output.status.success() {
            let running = String::from_utf8_lossy(&output.stdout).trim() == "true";
            return Ok(if running {
                ContainerState::Running
            } else {
                ContainerState::Stopped
            });
        }
        let text = combined_output(&output);
        if text.contains("No such") {
            Ok(ContainerState::Absent)
        } else {
            Err(RuntimeError::ContainerLifecycle(format!(
                "cannot inspect container {name}: {}",
                text.trim()
            )))
        }
    }

    fn mount_source(&self, name: &str, mount_point: &str) -> Result<Option<PathBuf>, RuntimeError> {
        let mounts = self.checked(&[
            "container",
            "inspect",
            "--format",
            "{{range .Mounts}}{{.Source}}|{{.Destination}}\n{{end}}",
            name,
        ])?;
        Ok(mount_source_for(&mounts, mount_point))
    }

    fn start_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.checked(&["start", name]).map(|_| ())
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        let volume = format!("{}:{}:rw", spec.workspace.display(), spec.mount_point);
        let mut args = vec![
            "run",
            "-d",
            "--name",
            spec.name.as_str(),
            "-v",
            volume.as_str(),
            "-w",
            spec.mount_point.as_str(),
            spec.image.as_str(),
        ];
        args.extend(spec.keepalive.iter().map(String::as_str));
        let output = self.output(&args)?;
        if output.status.success() {
            return Ok(());
        }
        let text = combined_output(&output);
        if text.contains("Conflict") || text.contains("already in use") {
            Err(RuntimeError::NameConflict(spec.name.clone()))
        } else {
            Err(RuntimeError::ContainerLifecycle(format!(
                "cannot create container {}: {}",
                spec.name,
                text.trim()
            )))
        }
    }

    fn exec(
        &self,
        name: &str,
        workdir: &str,
        command: &[String],
    ) -> Result<ExecOutput, RuntimeError> {
        let mut args = vec!["exec", "-w", workdir, name];
        args.extend(command.iter().map(String::as_str));
        debug!("docker {}", args.join(" "));
        let mut cmd = self.command();
        cmd.args(&args).stdin(Stdio::null());
        let output = isolate_from_terminal_signals(&mut cmd)
            .output()
            .map_err(|e| RuntimeError::ContainerLifecycle(format!("docker exec: {e}")))?;
        Ok(ExecOutput {
            exit_code: exit_code(output.status),
            output: combined_output(&output),
        })
    }

    fn stop_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.checked(&["stop", name]).map(|_| ())
    }

    fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        self.checked(&["rm", "-f", name]).map(|_| ())
    }
}

/// Host source of the mount at `mount_point` in `Source|Destination` lines.
fn mount_source_for(mounts: &str, mount_point: &str) -> Option<PathBuf> {
    let wanted = mount_point.trim_end_matches('/');
    mounts
        .lines()
        .filter_map(|line| line.trim().split_once('|'))
        .find(|(_, dest)| dest.trim_end_matches('/') == wanted)
        .map(|(source, _)| Path::new(source).to_path_buf())
}

fn spawn_line_reader<R: Read + Send + 'static>(
    source: R,
    tx: mpsc::Sender<String>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for line in BufReader::new(source).lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    })
}
