//! Setup statements replayed in front of generated scripts.
//!
//! The interpreter is spawned fresh for every invocation, so anything a caller
//! wants in effect (search paths, warning state) must be replayed each time.

use crate::marshal::{normalize_text, quote};

/// `genpath(...)` expression for a workspace-relative directory. Pass the
/// result to [`CommandBuffer::add_path`] to add the directory and all of its
/// subdirectories.
pub fn genpath(path: &str) -> String {
    format!("genpath({})", quote(&normalize_text(path)))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandBuffer {
    persistent: Vec<String>,
    transient: Vec<String>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement replayed before every invocation.
    pub fn eval(&mut self, statement: impl Into<String>) {
        self.persistent.push(statement.into());
    }

    /// Append an `addpath` for a plain directory or a [`genpath`] expression.
    pub fn add_path(&mut self, path_or_genpath: &str) {
        let statement = if path_or_genpath.starts_with("genpath(") {
            format!("addpath({path_or_genpath});")
        } else {
            format!("addpath({});", quote(&normalize_text(path_or_genpath)))
        };
        self.persistent.push(statement);
    }

    /// Append a statement valid for the next invocation only.
    pub fn push_transient(&mut self, statement: impl Into<String>) {
        self.transient.push(statement.into());
    }

    pub fn persistent(&self) -> &[String] {
        &self.persistent
    }

    pub fn transient(&self) -> &[String] {
        &self.transient
    }

    pub fn clear_transient(&mut self) {
        self.transient.clear();
    }

    /// Drop everything, persistent statements included. Only session
    /// teardown calls this.
    pub fn reset(&mut self) {
        self.persistent.clear();
        self.transient.clear();
    }
}
