//! A small in-process host.
//!
//! [`NodeResolver`] is a strict node_modules resolver playing the part of a
//! bundler's native resolver: it enforces package `exports` maps, which is
//! exactly the strictness the fallback resolver works around. [`LocalHost`]
//! runs registered resolve hooks in order.
//!
//! Supports:
//! - Relative and absolute specifiers with extension and `index` probing
//! - Bare specifiers via ascending `node_modules` search
//! - `exports`: string, `"."`, exact `"./sub"` keys and condition objects
//! - `main` when a package has no `exports`

use crate::plugin::{Host, ResolveHook};
use crate::resolver::{
    NativeError, NativeResolver, PackageImport, ResolveDataRef, ResolveError,
};
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use stitch_util::path::normalize;
use tracing::debug;

/// Extensions probed for extensionless paths, in order.
pub const EXTENSIONS: &[&str] = &["js", "ts", "mjs", "cjs", "json"];

/// Export conditions, most preferred first.
const CONDITIONS: &[&str] = &["import", "default", "require"];

/// Strict resolver honoring package `exports`.
#[derive(Debug, Default)]
pub struct NodeResolver {
    aliases: RwLock<BTreeMap<String, PathBuf>>,
}

impl NodeResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `name` (optionally followed by a `?query`) to `target`.
    pub fn add_alias(&self, name: &str, target: &Path) {
        self.aliases
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), target.to_path_buf());
    }

    fn alias_for(&self, specifier: &str) -> Option<PathBuf> {
        let aliases = self.aliases.read().unwrap_or_else(PoisonError::into_inner);
        aliases.iter().find_map(|(name, target)| {
            let rest = specifier.strip_prefix(name.as_str())?;
            (rest.is_empty() || rest.starts_with('?')).then(|| target.clone())
        })
    }

    /// Resolve synchronously.
    pub fn resolve_sync(&self, context: &Path, specifier: &str) -> Result<PathBuf, NativeError> {
        let not_found = || NativeError::NotFound {
            specifier: specifier.to_string(),
            context: context.display().to_string(),
        };

        if specifier.is_empty() {
            return Err(not_found());
        }
        if let Some(target) = self.alias_for(specifier) {
            return Ok(target);
        }
        if specifier.contains('!') {
            // Loader chains belong to the bundler, not to us
            return Err(NativeError::other(format!(
                "Loader chain '{specifier}' cannot be resolved from {}",
                context.display()
            )));
        }

        let is_relative = specifier == "."
            || specifier == ".."
            || specifier.starts_with("./")
            || specifier.starts_with("../");
        if is_relative || Path::new(specifier).is_absolute() {
            return resolve_path(&context.join(specifier)).ok_or_else(not_found);
        }

        let import = PackageImport::classify(specifier).ok_or_else(not_found)?;
        for dir in context.ancestors() {
            let pkg_dir = dir.join("node_modules").join(import.name());
            if pkg_dir.is_dir() {
                return resolve_package(&pkg_dir, import).ok_or_else(not_found)?;
            }
        }
        Err(not_found())
    }
}

impl NativeResolver for NodeResolver {
    fn resolve<'a>(
        &'a self,
        context: &'a str,
        specifier: &'a str,
    ) -> BoxFuture<'a, Result<String, NativeError>> {
        Box::pin(async move {
            self.resolve_sync(Path::new(context), specifier)
                .map(|path| path.to_string_lossy().into_owned())
        })
    }
}

/// Resolve a file path, probing extensions and directory indexes.
fn resolve_path(path: &Path) -> Option<PathBuf> {
    let path = normalize(path);
    if path.is_file() {
        return Some(path);
    }
    for ext in EXTENSIONS {
        let mut with_ext = path.clone().into_os_string();
        with_ext.push(format!(".{ext}"));
        let with_ext = PathBuf::from(with_ext);
        if with_ext.is_file() {
            return Some(with_ext);
        }
    }
    if path.is_dir() {
        return resolve_directory(&path);
    }
    None
}

/// Resolve a directory via its manifest `main`, then `index.*`.
fn resolve_directory(dir: &Path) -> Option<PathBuf> {
    if let Some(main) = read_manifest(dir)
        .as_ref()
        .and_then(|m| m.get("main"))
        .and_then(Value::as_str)
    {
        let main_path = normalize(&dir.join(main));
        if main_path.is_file() {
            return Some(main_path);
        }
    }
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("index.{ext}")))
        .find(|p| p.is_file())
}

/// Resolve inside a package directory.
///
/// `None` means not found; `Some(Err)` is a definite rejection.
fn resolve_package(
    pkg_dir: &Path,
    import: PackageImport<'_>,
) -> Option<Result<PathBuf, NativeError>> {
    let key = match import {
        PackageImport::Root { .. } => ".".to_string(),
        PackageImport::Subpath { subpath, .. } => format!("./{subpath}"),
    };

    let manifest = read_manifest(pkg_dir);
    if let Some(exports) = manifest.as_ref().and_then(|m| m.get("exports")) {
        let Some(target) = export_target(exports, &key) else {
            debug!(package = %pkg_dir.display(), subpath = %key, "subpath not exported");
            return Some(Err(NativeError::NotExported {
                package: pkg_dir.display().to_string(),
                subpath: key,
            }));
        };
        let target = normalize(&pkg_dir.join(target));
        return target.is_file().then_some(Ok(target));
    }

    match import {
        PackageImport::Root { .. } => resolve_directory(pkg_dir).map(Ok),
        PackageImport::Subpath { subpath, .. } => resolve_path(&pkg_dir.join(subpath)).map(Ok),
    }
}

/// Target of `key` in an `exports` value.
fn export_target<'v>(exports: &'v Value, key: &str) -> Option<&'v str> {
    match exports {
        Value::String(target) => (key == ".").then_some(target.as_str()),
        Value::Object(map) => {
            let has_subpaths = map.keys().any(|k| k.starts_with('.'));
            if has_subpaths {
                condition_target(map.get(key)?)
            } else if key == "." {
                condition_target(exports)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn condition_target(value: &Value) -> Option<&str> {
    match value {
        Value::String(target) => Some(target.as_str()),
        Value::Object(map) => CONDITIONS
            .iter()
            .find_map(|c| map.get(*c).and_then(condition_target)),
        _ => None,
    }
}

fn read_manifest(dir: &Path) -> Option<Value> {
    let source = std::fs::read_to_string(dir.join("package.json")).ok()?;
    serde_json::from_str(&source).ok()
}

/// An in-process host that runs registered hooks in order.
pub struct LocalHost {
    native: Arc<NodeResolver>,
    hooks: Vec<(&'static str, Arc<dyn ResolveHook>)>,
}

impl std::fmt::Debug for LocalHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalHost")
            .field("native", &self.native)
            .field("hooks", &self.hooks.iter().map(|(n, _)| *n).collect::<Vec<_>>())
            .finish()
    }
}

impl LocalHost {
    #[must_use]
    pub fn new(native: Arc<NodeResolver>) -> Self {
        Self {
            native,
            hooks: Vec::new(),
        }
    }

    /// Names of registered hooks, in registration order.
    pub fn hook_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.hooks.iter().map(|(name, _)| *name)
    }

    /// Resolve a record through the hooks, first success wins.
    ///
    /// Without hooks the native resolver handles the record directly.
    pub async fn resolve(&self, data: ResolveDataRef) -> Result<(), ResolveError> {
        if self.hooks.is_empty() {
            let snapshot = data.snapshot();
            let specifier = snapshot.request.unwrap_or_default();
            let context = snapshot.context.unwrap_or_default();
            return match self.native.resolve(&context, &specifier).await {
                Ok(resolved) => {
                    data.update(|d| d.resolved = Some(resolved));
                    Ok(())
                }
                Err(source) => Err(ResolveError::Native {
                    specifier,
                    from_file: snapshot.issuer,
                    source,
                }),
            };
        }

        let mut last_err = None;
        for (name, hook) in &self.hooks {
            match hook.resolve(data.clone()).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    debug!(hook = *name, error = %err, "resolve hook failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ResolveError::ModuleNotFound {
            specifier: data.snapshot().request.unwrap_or_default(),
            from_file: data.snapshot().issuer,
        }))
    }
}

impl Host for LocalHost {
    fn register_loader_alias(&mut self, name: &str, target: &Path) {
        self.native.add_alias(name, target);
    }

    fn register_resolve_hook(&mut self, plugin: &'static str, hook: Arc<dyn ResolveHook>) {
        self.hooks.push((plugin, hook));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::plugin::StitchPlugin;
    use crate::resolver::ResolveData;
    use std::fs;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_relative_extension_probing() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("src/dep.ts"), "");

        let resolver = NodeResolver::new();
        let resolved = resolver.resolve_sync(&dir.path().join("src"), "./dep").unwrap();
        assert_eq!(resolved, dir.path().join("src/dep.ts"));
    }

    #[test]
    fn test_directory_index() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("lib/index.js"), "");

        let resolver = NodeResolver::new();
        assert_eq!(
            resolver.resolve_sync(dir.path(), "./lib").unwrap(),
            dir.path().join("lib/index.js")
        );
    }

    #[test]
    fn test_bare_main_without_exports() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/lodash");
        write(&pkg.join("package.json"), r#"{"main": "./lodash.js"}"#);
        write(&pkg.join("lodash.js"), "");
        write(&pkg.join("fp.js"), "");

        let resolver = NodeResolver::new();
        let nested = dir.path().join("src/deep");
        fs::create_dir_all(&nested).unwrap();
        assert_eq!(resolver.resolve_sync(&nested, "lodash").unwrap(), pkg.join("lodash.js"));
        assert_eq!(resolver.resolve_sync(&nested, "lodash/fp").unwrap(), pkg.join("fp.js"));
    }

    #[test]
    fn test_exports_restrict_subpaths() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/@scope/pkg");
        write(
            &pkg.join("package.json"),
            r#"{"exports": {".": {"import": "./esm/index.js", "require": "./cjs/index.js"}, "./public": "./public.js"}}"#,
        );
        write(&pkg.join("esm/index.js"), "");
        write(&pkg.join("public.js"), "");
        write(&pkg.join("src/deep/path.ts"), "");

        let resolver = NodeResolver::new();
        assert_eq!(
            resolver.resolve_sync(dir.path(), "@scope/pkg").unwrap(),
            pkg.join("esm/index.js")
        );
        assert_eq!(
            resolver.resolve_sync(dir.path(), "@scope/pkg/public").unwrap(),
            pkg.join("public.js")
        );

        let err = resolver.resolve_sync(dir.path(), "@scope/pkg/deep/path").unwrap_err();
        assert!(err.is_export_restricted());
        assert!(err.to_string().contains("./deep/path"));
    }

    #[test]
    fn test_exports_string_root_only() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/solo");
        write(&pkg.join("package.json"), r#"{"exports": "./main.js"}"#);
        write(&pkg.join("main.js"), "");

        let resolver = NodeResolver::new();
        assert_eq!(resolver.resolve_sync(dir.path(), "solo").unwrap(), pkg.join("main.js"));
        assert!(resolver
            .resolve_sync(dir.path(), "solo/main.js")
            .unwrap_err()
            .is_export_restricted());
    }

    #[test]
    fn test_missing_package() {
        let dir = tempdir().unwrap();
        let err = NodeResolver::new().resolve_sync(dir.path(), "nope").unwrap_err();
        assert!(matches!(err, NativeError::NotFound { .. }));
        assert!(!err.is_export_restricted());
    }

    #[test]
    fn test_alias() {
        let resolver = NodeResolver::new();
        resolver.add_alias("@stitch/virtual-loader", Path::new("/opt/loader.js"));

        assert_eq!(
            resolver
                .resolve_sync(Path::new("/app"), "@stitch/virtual-loader?f=%2Fa.js")
                .unwrap(),
            PathBuf::from("/opt/loader.js")
        );
        assert!(resolver
            .resolve_sync(Path::new("/app"), "@stitch/virtual-loader-extra")
            .is_err());
    }

    #[tokio::test]
    async fn test_plugin_recovers_export_restricted_import() {
        let dir = tempdir().unwrap();
        let pkg = dir.path().join("node_modules/@scope/pkg");
        write(&pkg.join("package.json"), r#"{"exports": {".": "./index.js"}}"#);
        write(&pkg.join("index.js"), "");
        write(&pkg.join("src/deep/path.ts"), "");

        let native = Arc::new(NodeResolver::new());
        let mut host = LocalHost::new(native.clone());
        let app_root = dir.path().to_string_lossy().into_owned();
        Arc::new(StitchPlugin::new(Options::new(app_root), native)).apply(&mut host);
        assert_eq!(host.hook_names().collect::<Vec<_>>(), vec!["stitch"]);

        let issuer = dir.path().join("app.js").to_string_lossy().into_owned();
        let data = ResolveDataRef::new(ResolveData::new("@scope/pkg/deep/path", issuer));
        host.resolve(data.clone()).await.unwrap();

        let expected = pkg.join("src/deep/path.ts").to_string_lossy().into_owned();
        assert_eq!(data.snapshot().request.as_deref(), Some(expected.as_str()));
    }

    #[tokio::test]
    async fn test_host_without_hooks_uses_native() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("a.js"), "");

        let host = LocalHost::new(Arc::new(NodeResolver::new()));
        let issuer = dir.path().join("main.js").to_string_lossy().into_owned();
        let data = ResolveDataRef::new(ResolveData::new("./a", issuer));
        host.resolve(data.clone()).await.unwrap();
        assert_eq!(
            data.snapshot().resolved,
            Some(dir.path().join("a.js").to_string_lossy().into_owned())
        );
    }
}
