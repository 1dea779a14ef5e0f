//! Tracing for manual fallback probing.
//!
//! Records each decision the manual resolver makes so a failed deep import
//! can be explained after the fact.

use std::path::{Path, PathBuf};

/// Maximum number of probed paths to record.
pub const MAX_TRIED_PATHS: usize = 32;

/// A single step in a probe trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeStep {
    /// Step name (see [`steps`]).
    pub step: &'static str,
    /// Whether this step succeeded
    pub ok: bool,
    /// Human-readable description of what happened
    pub detail: String,
    /// Path involved in this step, if any
    pub path: Option<PathBuf>,
}

impl ProbeStep {
    pub fn new(step: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            step,
            ok,
            detail: detail.into(),
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Complete probe trace for one specifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeTrace {
    /// Ordered list of steps
    pub steps: Vec<ProbeStep>,
    /// Paths checked for existence, capped at [`MAX_TRIED_PATHS`]
    pub tried: Vec<PathBuf>,
}

impl ProbeTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, step: ProbeStep) {
        self.steps.push(step);
    }

    pub fn success(&mut self, step: &'static str, detail: impl Into<String>) {
        self.steps.push(ProbeStep::new(step, true, detail));
    }

    pub fn failure(&mut self, step: &'static str, detail: impl Into<String>) {
        self.steps.push(ProbeStep::new(step, false, detail));
    }

    /// Note that `path` was checked.
    pub fn tried(&mut self, path: &Path) {
        if self.tried.len() < MAX_TRIED_PATHS {
            self.tried.push(path.to_path_buf());
        }
    }

    /// Path recorded by the final successful step, if any.
    #[must_use]
    pub fn final_path(&self) -> Option<&Path> {
        self.steps
            .iter()
            .rev()
            .find(|s| s.step == steps::FINAL_PATH && s.ok)
            .and_then(|s| s.path.as_deref())
    }
}

/// Step names used in probe traces.
pub mod steps {
    pub const CLASSIFY_SPECIFIER: &str = "classify_specifier";
    pub const FIND_PACKAGE_DIR: &str = "find_package_dir";
    pub const READ_MANIFEST: &str = "read_manifest";
    pub const PROBE_ENTRY: &str = "probe_entry";
    pub const PROBE_SUBPATH: &str = "probe_subpath";
    pub const FINAL_PATH: &str = "final_path";
}
