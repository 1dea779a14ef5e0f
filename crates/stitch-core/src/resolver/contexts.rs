//! Virtual-module context tracking.
//!
//! Requests made *by* a virtual module reach the host without an issuer. The
//! virtual module does announce its real filename (the loader's own request
//! carries it), so we remember `dirname(filename) -> filename` and use that to
//! repair the issuer of later requests that start from the same directory.

use super::virtual_loader::parse_virtual_specifier;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, trace};

/// Append-only map from a virtual module's directory to its filename.
///
/// One instance lives for one build session. Entries are never removed; a
/// later filename recorded for the same directory replaces the earlier one.
#[derive(Debug, Default)]
pub struct VirtualContexts {
    by_dir: RwLock<BTreeMap<String, String>>,
}

impl VirtualContexts {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `filename` as the virtual module living in its directory.
    pub fn record(&self, filename: &str) {
        let dir = stitch_util::path::dirname(filename);
        debug!(dir = %dir, filename, "recording virtual module context");
        self.by_dir
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dir, filename.to_string());
    }

    /// Record the filename carried by a virtual-loader specifier, if any.
    ///
    /// Returns the recorded filename.
    pub fn record_specifier(&self, specifier: &str, loader_name: &str) -> Option<String> {
        let params = parse_virtual_specifier(specifier, loader_name)?;
        self.record(&params.filename);
        Some(params.filename)
    }

    /// Virtual filename previously recorded for `dir`.
    #[must_use]
    pub fn lookup(&self, dir: &str) -> Option<String> {
        let found = self
            .by_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dir)
            .cloned();
        trace!(dir, hit = found.is_some(), "virtual context lookup");
        found
    }

    /// First recorded filename (ordered by directory) matching `predicate`.
    pub fn find(&self, mut predicate: impl FnMut(&str) -> bool) -> Option<String> {
        self.by_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .find(|filename| predicate(filename))
            .cloned()
    }

    /// Number of directories with a recorded virtual module.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_dir
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::virtual_loader::encode_virtual_specifier;

    #[test]
    fn test_record_and_lookup() {
        let contexts = VirtualContexts::new();
        contexts.record("/app/foo.js");

        assert_eq!(contexts.lookup("/app").as_deref(), Some("/app/foo.js"));
        assert!(contexts.lookup("/other").is_none());
        assert_eq!(contexts.len(), 1);
    }

    #[test]
    fn test_later_record_replaces_same_dir() {
        let contexts = VirtualContexts::new();
        contexts.record("/app/a.js");
        contexts.record("/app/b.js");

        assert_eq!(contexts.lookup("/app").as_deref(), Some("/app/b.js"));
        assert_eq!(contexts.len(), 1);
    }

    #[test]
    fn test_record_specifier() {
        let contexts = VirtualContexts::new();
        let spec = encode_virtual_specifier("", "vl", "/app/x/y.js", "/app");

        assert_eq!(
            contexts.record_specifier(&spec, "vl").as_deref(),
            Some("/app/x/y.js")
        );
        assert_eq!(contexts.lookup("/app/x").as_deref(), Some("/app/x/y.js"));

        assert!(contexts.record_specifier("./plain", "vl").is_none());
        assert_eq!(contexts.len(), 1);
    }

    #[test]
    fn test_find() {
        let contexts = VirtualContexts::new();
        contexts.record("/lib/z.js");
        contexts.record("/app/assets/app.js");

        let hit = contexts.find(|f| f.starts_with("/app/"));
        assert_eq!(hit.as_deref(), Some("/app/assets/app.js"));
        assert!(contexts.find(|f| f.ends_with(".ts")).is_none());
    }

    #[test]
    fn test_concurrent_writers() {
        let contexts = std::sync::Arc::new(VirtualContexts::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let contexts = contexts.clone();
                std::thread::spawn(move || contexts.record(&format!("/app/d{i}/m.js")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(contexts.len(), 8);
    }
}
