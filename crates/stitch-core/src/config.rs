//! Plugin options.
//!
//! Options are plain JSON (camelCase keys). Every field has a default so an
//! empty object is a valid configuration.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Module path of the virtual loader when none is configured.
pub const DEFAULT_VIRTUAL_LOADER_NAME: &str = "@stitch/virtual-loader";

/// Options for the resolver plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Root of the application being built.
    pub app_root: String,

    /// Prefix prepended to every virtualized specifier (usually a loader
    /// chain such as `babel-loader?{...}!`).
    pub loader_prefix: String,

    /// Module path that identifies the virtual loader inside specifiers.
    pub virtual_loader_name: String,

    /// File the virtual loader name is aliased to when the plugin is applied.
    pub virtual_loader_path: Option<PathBuf>,

    /// Specifier renames, applied to the exact name or to `name/...` subpaths.
    pub renamed_modules: BTreeMap<String, String>,

    /// Requests issued from files under `dir` are treated as issued by `from_file`.
    pub rehomed_roots: Vec<RehomedRoot>,
}

/// A directory whose requests resolve as if issued from another file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RehomedRoot {
    pub dir: String,
    pub from_file: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            app_root: String::new(),
            loader_prefix: String::new(),
            virtual_loader_name: DEFAULT_VIRTUAL_LOADER_NAME.to_string(),
            virtual_loader_path: None,
            renamed_modules: BTreeMap::new(),
            rehomed_roots: Vec::new(),
        }
    }
}

impl Options {
    /// Create options for the given app root.
    #[must_use]
    pub fn new(app_root: impl Into<String>) -> Self {
        Self {
            app_root: app_root.into(),
            ..Default::default()
        }
    }

    /// Set the loader prefix.
    #[must_use]
    pub fn with_loader_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.loader_prefix = prefix.into();
        self
    }

    /// Add a module rename.
    #[must_use]
    pub fn with_renamed_module(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.renamed_modules.insert(from.into(), to.into());
        self
    }

    /// Add a rehomed root.
    #[must_use]
    pub fn with_rehomed_root(mut self, dir: impl Into<String>, from_file: impl Into<String>) -> Self {
        self.rehomed_roots.push(RehomedRoot {
            dir: dir.into(),
            from_file: from_file.into(),
        });
        self
    }

    /// Load options from a JSON file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let source = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&source).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_empty_object_is_default() {
        let options: Options = serde_json::from_str("{}").unwrap();
        assert_eq!(options, Options::default());
        assert_eq!(options.virtual_loader_name, DEFAULT_VIRTUAL_LOADER_NAME);
    }

    #[test]
    fn test_load_camel_case() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stitch.json");
        fs::write(
            &path,
            r#"{
                "appRoot": "/work/app",
                "loaderPrefix": "babel-loader!",
                "renamedModules": { "old-name": "new-name" },
                "rehomedRoots": [{ "dir": "/work/app/node_modules/.rewritten", "fromFile": "/work/app/package.json" }]
            }"#,
        )
        .unwrap();

        let options = Options::load(&path).unwrap();
        assert_eq!(options.app_root, "/work/app");
        assert_eq!(options.loader_prefix, "babel-loader!");
        assert_eq!(options.renamed_modules["old-name"], "new-name");
        assert_eq!(options.rehomed_roots[0].from_file, "/work/app/package.json");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let err = Options::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_load_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stitch.json");
        fs::write(&path, "{ appRoot: ").unwrap();

        let err = Options::load(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
        assert!(err.to_string().contains("stitch.json"));
    }
}
