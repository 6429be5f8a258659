use crate::RuntimeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Optional per-workspace configuration file.
pub const CONFIG_FILE_NAME: &str = "octave-bridge.toml";

/// Environment variable that turns on verbose invocation logging.
pub const VERBOSE_ENV: &str = "OCTAVE_BRIDGE_VERBOSE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Host directory mounted into the container; always set from the caller,
    /// never from the file.
    #[serde(skip)]
    pub workspace: PathBuf,
    pub container_name: String,
    pub image_tag: String,
    /// Build context, relative to the workspace unless absolute.
    pub build_context: PathBuf,
    /// Dockerfile, relative to the build context.
    pub dockerfile: PathBuf,
    pub mount_point: String,
    /// Directory holding the script and exchange files, relative to the workspace.
    pub shared_dir: PathBuf,
    pub interpreter: String,
    pub local_candidates: Vec<String>,
    pub probe_timeout_secs: u64,
    pub verbose: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            container_name: "octave_runner".to_owned(),
            image_tag: "octave-bridge:latest".to_owned(),
            build_context: PathBuf::from("."),
            dockerfile: PathBuf::from("docker/Dockerfile"),
            mount_point: "/workspace".to_owned(),
            shared_dir: PathBuf::from(".octave-bridge"),
            interpreter: "octave-cli".to_owned(),
            local_candidates: vec!["octave-cli".to_owned(), "octave".to_owned()],
            probe_timeout_secs: 5,
            verbose: false,
        }
    }
}

impl BridgeConfig {
    pub fn for_workspace(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            ..Self::default()
        }
    }

    /// Defaults, then `octave-bridge.toml` in the workspace if present, then
    /// the environment.
    pub fn load(workspace: &Path) -> Result<Self, RuntimeError> {
        let path = workspace.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            Self::from_toml_str(&content, workspace)?
        } else {
            Self::for_workspace(workspace)
        };
        config.apply_env();
        Ok(config)
    }

    pub fn from_toml_str(content: &str, workspace: &Path) -> Result<Self, RuntimeError> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| RuntimeError::Config(format!("invalid {CONFIG_FILE_NAME}: {e}")))?;
        config.workspace = workspace.to_path_buf();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if env_flag(VERBOSE_ENV) {
            self.verbose = true;
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn build_context_path(&self) -> PathBuf {
        if self.build_context.is_absolute() {
            self.build_context.clone()
        } else {
            self.workspace.join(&self.build_context)
        }
    }
}

/// True when the variable is set to `1`, `true`, or `yes` (any case).
pub fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
