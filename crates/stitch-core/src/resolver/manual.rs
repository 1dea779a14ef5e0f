//! Manual package resolution.
//!
//! Recreates permissive `node_modules` lookups for imports a host rejects
//! only because a package's `exports` map does not list them. The search is
//! an ordered list of candidates evaluated with early exit; the constants
//! below are the precedence order.

use super::trace::{steps, ProbeStep, ProbeTrace};
use serde_json::Value;
use std::path::{Path, PathBuf};
use stitch_util::fs::{first_dir, first_file, read_to_string_lossy};
use stitch_util::path::{ancestors, normalize};
use tracing::{debug, trace, warn};

/// Directories searched for `node_modules/<package>`: the context directory,
/// its parent and its grandparent.
pub const PACKAGE_DIR_SEARCH_DEPTH: usize = 3;

/// Subpath prefixes, most preferred first.
pub const SUBPATH_PREFIXES: &[&str] = &["src/", ""];

/// Forms tried for each prefixed subpath, most preferred first.
pub const SUBPATH_SUFFIXES: &[&str] = &["", ".js", ".ts", "/index.js", "/index.ts"];

/// Manifest fields naming a package entry point, most preferred first.
pub const MANIFEST_ENTRY_FIELDS: &[&str] = &["module", "main"];

/// Entry points tried after the manifest fields.
pub const ENTRY_FALLBACKS: &[&str] = &["src/index.js", "src/index.ts", "index.js", "index.ts"];

/// A bare specifier split into package name and subpath.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageImport<'a> {
    /// `name` or `@scope/name`.
    Root { name: &'a str },
    /// `name/rest...` or `@scope/name/rest...`.
    Subpath { name: &'a str, subpath: &'a str },
}

impl<'a> PackageImport<'a> {
    /// Classify a specifier; `None` for relative, absolute and malformed ones.
    #[must_use]
    pub fn classify(specifier: &'a str) -> Option<Self> {
        if specifier.is_empty()
            || specifier.starts_with('.')
            || specifier.starts_with('/')
            || specifier.contains(':')
            || specifier.contains('\\')
        {
            return None;
        }

        let name_end = if specifier.starts_with('@') {
            // Scoped: the name spans two segments
            let scope_end = specifier.find('/')?;
            if scope_end == 1 {
                return None;
            }
            specifier[scope_end + 1..]
                .find('/')
                .map(|i| scope_end + 1 + i)
        } else {
            specifier.find('/')
        };

        match name_end {
            None if specifier.ends_with('/') => None,
            None => Some(Self::Root { name: specifier }),
            Some(end) => {
                let name = &specifier[..end];
                let subpath = &specifier[end + 1..];
                if name.ends_with('/') {
                    None
                } else if subpath.is_empty() {
                    Some(Self::Root { name })
                } else {
                    Some(Self::Subpath { name, subpath })
                }
            }
        }
    }

    /// Package name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        match self {
            Self::Root { name } | Self::Subpath { name, .. } => name,
        }
    }
}

/// Candidate package directories for `name`, nearest first.
#[must_use]
pub fn package_dir_candidates(context: &Path, name: &str) -> Vec<PathBuf> {
    ancestors(context, PACKAGE_DIR_SEARCH_DEPTH)
        .into_iter()
        .map(|dir| dir.join("node_modules").join(name))
        .collect()
}

/// Candidate files for `subpath` inside a package directory.
///
/// Candidates that normalize to a path outside `pkg_dir` are dropped.
#[must_use]
pub fn subpath_candidates(pkg_dir: &Path, subpath: &str) -> Vec<PathBuf> {
    let root = normalize(pkg_dir);
    SUBPATH_PREFIXES
        .iter()
        .flat_map(|prefix| {
            SUBPATH_SUFFIXES
                .iter()
                .map(move |suffix| normalize(&pkg_dir.join(format!("{prefix}{subpath}{suffix}"))))
        })
        .filter(|candidate| candidate.starts_with(&root))
        .collect()
}

/// Candidate entry points for a package root, limited to `pkg_dir`.
#[must_use]
pub fn entry_candidates(pkg_dir: &Path, manifest: Option<&Value>) -> Vec<PathBuf> {
    let root = normalize(pkg_dir);
    let fields = MANIFEST_ENTRY_FIELDS
        .iter()
        .filter_map(|field| manifest?.get(*field)?.as_str())
        .filter(|entry| !entry.is_empty());

    fields
        .chain(ENTRY_FALLBACKS.iter().copied())
        .map(|entry| normalize(&pkg_dir.join(entry)))
        .filter(|candidate| candidate.starts_with(&root))
        .collect()
}

/// Read a package manifest.
///
/// Unreadable or malformed manifests are logged and treated as absent.
fn read_manifest(pkg_dir: &Path, probe: &mut ProbeTrace) -> Option<Value> {
    let path = pkg_dir.join("package.json");
    if !path.is_file() {
        probe.add_step(ProbeStep::new(steps::READ_MANIFEST, false, "No package.json").with_path(&path));
        return None;
    }

    let parsed = read_to_string_lossy(&path)
        .map_err(|e| e.to_string())
        .and_then(|source| serde_json::from_str::<Value>(&source).map_err(|e| e.to_string()));

    match parsed {
        Ok(value) => {
            probe.add_step(ProbeStep::new(steps::READ_MANIFEST, true, "Read package.json").with_path(&path));
            Some(value)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unusable package.json");
            probe.add_step(
                ProbeStep::new(steps::READ_MANIFEST, false, format!("Unusable package.json: {err}"))
                    .with_path(&path),
            );
            None
        }
    }
}

/// Result of manual probing.
#[derive(Debug, Clone, Default)]
pub struct ManualResolution {
    /// Winning file, if any.
    pub resolved: Option<PathBuf>,
    pub trace: ProbeTrace,
}

/// Resolve a bare `specifier` from `context` by probing the filesystem.
#[must_use]
pub fn probe_package(context: &Path, specifier: &str) -> ManualResolution {
    let mut probe = ProbeTrace::new();
    let resolved = probe_package_traced(context, specifier, &mut probe);
    if let Some(path) = &resolved {
        probe.add_step(ProbeStep::new(steps::FINAL_PATH, true, "Resolved manually").with_path(path));
    }
    debug!(
        specifier,
        context = %context.display(),
        resolved = ?resolved,
        tried = probe.tried.len(),
        "manual package probe finished"
    );
    ManualResolution {
        resolved,
        trace: probe,
    }
}

fn probe_package_traced(context: &Path, specifier: &str, probe: &mut ProbeTrace) -> Option<PathBuf> {
    let Some(import) = PackageImport::classify(specifier) else {
        probe.failure(
            steps::CLASSIFY_SPECIFIER,
            format!("'{specifier}' is not a package import"),
        );
        return None;
    };
    probe.success(steps::CLASSIFY_SPECIFIER, format!("{import:?}"));

    let dirs = package_dir_candidates(context, import.name());
    let Some(pkg_dir) = first_dir(&dirs, |path, exists| {
        trace!(path = %path.display(), exists, "probing package dir");
        probe.tried(path);
    }) else {
        probe.failure(
            steps::FIND_PACKAGE_DIR,
            format!("No node_modules/{} within {PACKAGE_DIR_SEARCH_DEPTH} levels", import.name()),
        );
        return None;
    };
    probe.add_step(ProbeStep::new(steps::FIND_PACKAGE_DIR, true, "Found package").with_path(&pkg_dir));

    let (step, candidates) = match import {
        PackageImport::Subpath { subpath, .. } => {
            (steps::PROBE_SUBPATH, subpath_candidates(&pkg_dir, subpath))
        }
        PackageImport::Root { .. } => {
            let manifest = read_manifest(&pkg_dir, probe);
            (steps::PROBE_ENTRY, entry_candidates(&pkg_dir, manifest.as_ref()))
        }
    };

    if candidates.is_empty() {
        probe.failure(step, "Every candidate escapes the package directory");
        return None;
    }

    let found = first_file(&candidates, |path, exists| {
        trace!(path = %path.display(), exists, "probing candidate");
        probe.tried(path);
    });
    match &found {
        Some(path) => probe.add_step(ProbeStep::new(step, true, "Candidate exists").with_path(path)),
        None => probe.failure(step, format!("None of {} candidates exist", candidates.len())),
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_classify() {
        assert_eq!(PackageImport::classify("lodash"), Some(PackageImport::Root { name: "lodash" }));
        assert_eq!(
            PackageImport::classify("lodash/fp/map"),
            Some(PackageImport::Subpath { name: "lodash", subpath: "fp/map" })
        );
        assert_eq!(
            PackageImport::classify("@scope/pkg"),
            Some(PackageImport::Root { name: "@scope/pkg" })
        );
        assert_eq!(
            PackageImport::classify("@scope/pkg/deep/path"),
            Some(PackageImport::Subpath { name: "@scope/pkg", subpath: "deep/path" })
        );
        assert_eq!(PackageImport::classify("pkg/"), Some(PackageImport::Root { name: "pkg" }));

        assert_eq!(PackageImport::classify("./local"), None);
        assert_eq!(PackageImport::classify("/abs/file.js"), None);
        assert_eq!(PackageImport::classify("node:fs"), None);
        assert_eq!(PackageImport::classify("@scope"), None);
        assert_eq!(PackageImport::classify("@/x"), None);
        assert_eq!(PackageImport::classify("@scope/"), None);
        assert_eq!(PackageImport::classify(""), None);
    }

    #[test]
    fn test_subpath_candidate_order() {
        let got = subpath_candidates(Path::new("/nm/p"), "a/b");
        let want: Vec<PathBuf> = [
            "/nm/p/src/a/b",
            "/nm/p/src/a/b.js",
            "/nm/p/src/a/b.ts",
            "/nm/p/src/a/b/index.js",
            "/nm/p/src/a/b/index.ts",
            "/nm/p/a/b",
            "/nm/p/a/b.js",
            "/nm/p/a/b.ts",
            "/nm/p/a/b/index.js",
            "/nm/p/a/b/index.ts",
        ]
        .iter()
        .map(PathBuf::from)
        .collect();
        assert_eq!(got, want);
    }

    #[test]
    fn test_entry_candidate_order() {
        let manifest = serde_json::json!({ "main": "./lib/main.js", "module": "esm/index.js" });
        let got = entry_candidates(Path::new("/nm/p"), Some(&manifest));
        assert_eq!(got[0], PathBuf::from("/nm/p/esm/index.js"));
        assert_eq!(got[1], PathBuf::from("/nm/p/lib/main.js"));
        assert_eq!(got[2], PathBuf::from("/nm/p/src/index.js"));
        assert_eq!(got.len(), 6);

        // Non-string fields are ignored
        let odd = serde_json::json!({ "main": 42 });
        assert_eq!(entry_candidates(Path::new("/nm/p"), Some(&odd)).len(), 4);
    }

    #[test]
    fn test_candidates_stay_inside_package() {
        // `src/../x` is still inside the package, `../../x` is not
        let got = subpath_candidates(Path::new("/nm/p"), "../x");
        assert!(!got.is_empty());
        assert!(got.iter().all(|p| p.starts_with("/nm/p")));
        assert!(subpath_candidates(Path::new("/nm/p"), "../../x").is_empty());

        let manifest = serde_json::json!({ "main": "../../outside.js" });
        let got = entry_candidates(Path::new("/nm/p"), Some(&manifest));
        assert_eq!(got.len(), ENTRY_FALLBACKS.len());
    }

    #[test]
    fn test_subpath_escaping_package_is_not_resolved() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        write(&dir.path().join("x.js"), "");
        write(&dir.path().join("node_modules/x.js"), "");

        let result = probe_package(dir.path(), "pkg/../../x");
        assert!(result.resolved.is_none());
        assert!(result
            .trace
            .steps
            .iter()
            .any(|s| s.step == steps::PROBE_SUBPATH && !s.ok));
    }

    #[test]
    fn test_scoped_subpath_prefers_src_ts() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("node_modules/@scope/pkg/src/deep/path.ts");
        write(&target, "export {}");

        let result = probe_package(dir.path(), "@scope/pkg/deep/path");
        assert_eq!(result.resolved, Some(target.clone()));
        assert_eq!(result.trace.final_path(), Some(target.as_path()));
    }

    #[test]
    fn test_root_uses_main_when_module_missing() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/@scope/pkg");
        write(&pkg.join("package.json"), r#"{"main": "./index.js"}"#);
        write(&pkg.join("index.js"), "");

        let result = probe_package(dir.path(), "@scope/pkg");
        assert_eq!(result.resolved, Some(pkg.join("index.js")));
    }

    #[test]
    fn test_root_module_field_wins() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/pkg");
        write(&pkg.join("package.json"), r#"{"main": "index.js", "module": "esm.js"}"#);
        write(&pkg.join("index.js"), "");
        write(&pkg.join("esm.js"), "");

        let result = probe_package(dir.path(), "pkg");
        assert_eq!(result.resolved, Some(pkg.join("esm.js")));
    }

    #[test]
    fn test_malformed_manifest_falls_back() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/pkg");
        write(&pkg.join("package.json"), "{ not json");
        write(&pkg.join("src/index.ts"), "");

        let result = probe_package(dir.path(), "pkg");
        assert_eq!(result.resolved, Some(pkg.join("src/index.ts")));
        assert!(result
            .trace
            .steps
            .iter()
            .any(|s| s.step == steps::READ_MANIFEST && !s.ok));
    }

    #[test]
    fn test_searches_up_to_grandparent() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("node_modules/pkg/util.js");
        write(&target, "");

        let context = dir.path().join("a/b");
        fs::create_dir_all(&context).unwrap();
        assert_eq!(probe_package(&context, "pkg/util").resolved, Some(target));

        // Three levels up is out of range
        let deeper = dir.path().join("a/b/c");
        fs::create_dir_all(&deeper).unwrap();
        let result = probe_package(&deeper, "pkg/util");
        assert!(result.resolved.is_none());
        assert_eq!(result.trace.tried.len(), PACKAGE_DIR_SEARCH_DEPTH);
    }

    #[test]
    fn test_only_first_package_dir_is_probed() {
        let dir = tempdir().unwrap();
        // Nearest copy lacks the file, the outer copy has it
        fs::create_dir_all(dir.path().join("app/node_modules/pkg")).unwrap();
        write(&dir.path().join("node_modules/pkg/extra.js"), "");

        let result = probe_package(&dir.path().join("app"), "pkg/extra");
        assert!(result.resolved.is_none());
    }

    #[test]
    fn test_relative_specifier_not_probed() {
        let dir = tempdir().unwrap();
        let result = probe_package(dir.path(), "./x");
        assert!(result.resolved.is_none());
        assert!(result.trace.tried.is_empty());
    }
}
