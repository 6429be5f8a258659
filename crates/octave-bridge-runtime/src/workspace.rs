//! The shared directory visible to both the host and the interpreter.
//!
//! Layout under the workspace root:
//!
//! ```text
//! <shared_dir>/run.m        generated script
//! <shared_dir>/result.json  exchange file written by the script
//! <shared_dir>/.lock        advisory lock serializing invocations
//! ```

use crate::RuntimeError;
use fs2::FileExt;
use octave_bridge_script::{decode, InvocationRequest, InvocationResult};
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const SCRIPT_FILE: &str = "run.m";
pub const EXCHANGE_FILE: &str = "result.json";
pub const LOCK_FILE: &str = ".lock";

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    shared_rel: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, shared_rel: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            shared_rel: shared_rel.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn shared_dir(&self) -> PathBuf {
        self.root.join(&self.shared_rel)
    }

    pub fn script_path(&self) -> PathBuf {
        self.shared_dir().join(SCRIPT_FILE)
    }

    pub fn exchange_path(&self) -> PathBuf {
        self.shared_dir().join(EXCHANGE_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.shared_dir().join(LOCK_FILE)
    }

    /// Script path relative to the workspace root, with forward slashes, as
    /// the interpreter sees it from its working directory.
    pub fn script_rel(&self) -> String {
        slash_join(&self.shared_rel, SCRIPT_FILE)
    }

    pub fn exchange_rel(&self) -> String {
        slash_join(&self.shared_rel, EXCHANGE_FILE)
    }

    /// Create the shared directory and drop any exchange file left by an
    /// earlier run so a stale result can never be decoded.
    pub fn prepare(&self) -> Result<(), RuntimeError> {
        std::fs::create_dir_all(self.shared_dir())?;
        match std::fs::remove_file(self.exchange_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn write_script(&self, text: &str) -> Result<PathBuf, RuntimeError> {
        let path = self.script_path();
        std::fs::write(&path, text)?;
        Ok(path)
    }

    pub fn read_result(&self, request: &InvocationRequest) -> Result<InvocationResult, RuntimeError> {
        let path = self.exchange_path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(RuntimeError::ResultMissing { path });
            }
            Err(e) => {
                return Err(RuntimeError::ResultCorrupt {
                    path,
                    reason: e.to_string(),
                });
            }
        };
        decode(&bytes, request).map_err(|e| RuntimeError::ResultCorrupt {
            path,
            reason: e.to_string(),
        })
    }

    pub fn lock(&self) -> Result<ExchangeLock, RuntimeError> {
        ExchangeLock::acquire(&self.lock_path())
    }
}

fn slash_join(dir: &Path, file: &str) -> String {
    let dir = dir.to_string_lossy().replace('\\', "/");
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() || dir == "." {
        file.to_owned()
    } else {
        format!("{dir}/{file}")
    }
}

/// Exclusive advisory lock on the shared directory, released on drop. Keeps
/// two bridge processes on the same workspace from overwriting each other's
/// script and exchange files.
pub struct ExchangeLock {
    lock_file: File,
}

impl ExchangeLock {
    pub fn acquire(lock_path: &Path) -> Result<Self, RuntimeError> {
        let file = open_lock_file(lock_path)?;
        file.lock_exclusive()
            .map_err(|e| RuntimeError::Lock(format!("{}: {e}", lock_path.display())))?;
        Ok(Self { lock_file: file })
    }

    pub fn try_acquire(lock_path: &Path) -> Result<Option<Self>, RuntimeError> {
        let file = open_lock_file(lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { lock_file: file })),
            Err(_) => Ok(None),
        }
    }
}

fn open_lock_file(lock_path: &Path) -> Result<File, RuntimeError> {
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)?)
}

impl Drop for ExchangeLock {
    fn drop(&mut self) {
        let _ = self.lock_file.unlock();
    }
}
