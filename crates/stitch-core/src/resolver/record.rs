//! The host-owned resolution record.
//!
//! A host hands us one mutable record per import it encounters and reads the
//! same record back once we report completion. Everything in this crate that
//! changes a request writes through a [`ResolveDataRef`] so the host sees it.

use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Opaque metadata attached to an issuer.
pub type Meta = Map<String, Value>;

/// Mutable resolution record, shaped like the one a bundler passes to its
/// resolve hooks.
///
/// `request` and `context` are `None` when the host supplied something other
/// than a string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolveData {
    /// Specifier being resolved.
    pub request: Option<String>,
    /// Directory resolution starts from.
    pub context: Option<String>,
    /// File that performed the import; empty when unknown.
    pub issuer: String,
    /// Metadata associated with the issuer rather than this request.
    pub issuer_meta: Option<Meta>,
    /// Resolved target, written on successful native resolution.
    pub resolved: Option<String>,
}

impl ResolveData {
    /// Record for `request` issued from `issuer`, resolving from the issuer's directory.
    #[must_use]
    pub fn new(request: impl Into<String>, issuer: impl Into<String>) -> Self {
        let issuer = issuer.into();
        let context = stitch_util::path::dirname(&issuer);
        Self {
            request: Some(request.into()),
            context: Some(context),
            issuer,
            issuer_meta: None,
            resolved: None,
        }
    }

    /// Record with no issuer, as emitted for requests made by synthetic modules.
    #[must_use]
    pub fn without_issuer(request: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            request: Some(request.into()),
            context: Some(context.into()),
            ..Default::default()
        }
    }
}

/// Shared handle to a [`ResolveData`].
///
/// Cloning the handle shares the record. The lock is only ever held for the
/// duration of a single read or write, never across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct ResolveDataRef(Arc<Mutex<ResolveData>>);

impl ResolveDataRef {
    #[must_use]
    pub fn new(data: ResolveData) -> Self {
        Self(Arc::new(Mutex::new(data)))
    }

    fn lock(&self) -> MutexGuard<'_, ResolveData> {
        // A panic elsewhere cannot leave a half-written record behind: every
        // write is a plain field assignment.
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the record's current state.
    #[must_use]
    pub fn snapshot(&self) -> ResolveData {
        self.lock().clone()
    }

    /// Apply a mutation to the record.
    pub fn update<R>(&self, f: impl FnOnce(&mut ResolveData) -> R) -> R {
        f(&mut self.lock())
    }

    /// Whether two handles share the same record.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<ResolveData> for ResolveDataRef {
    fn from(data: ResolveData) -> Self {
        Self::new(data)
    }
}
