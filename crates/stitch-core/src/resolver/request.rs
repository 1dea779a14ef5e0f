//! The request model.
//!
//! [`ModuleRequest`] is an immutable snapshot of a host record plus the
//! operations that change it. Each operation writes through to the shared
//! record (the host reads it back directly) and returns a *new* snapshot; the
//! instance it was called on keeps describing the state it was created with.

use super::contexts::VirtualContexts;
use super::record::{Meta, ResolveDataRef};
use super::virtual_loader::{encode_virtual_specifier, references_loader};
use crate::config::Options;
use std::sync::Arc;
use stitch_util::path::{dirname, is_within, join_normalized};
use tracing::debug;

/// Marker shared by the synthetic modules that aggregate an app's implicit imports.
pub const IMPLICIT_MODULES_MARKER: &str = "-embroider-implicit-";

/// Prefix of specifiers that belong to the host's own internal resolution.
const INTERNAL_ESCAPE: char = '!';

/// Whether a specifier or filename names an implicit-modules aggregate.
#[must_use]
pub fn is_implicit_modules(specifier: &str) -> bool {
    specifier.contains(IMPLICIT_MODULES_MARKER)
}

/// Result of trying to build a [`ModuleRequest`] from a host record.
#[derive(Debug, Clone)]
pub enum Admission {
    /// Not ours: the host should resolve the record unmodified.
    Declined,
    /// Ours: resolve through the engine.
    Admitted(ModuleRequest),
}

impl Admission {
    #[must_use]
    pub fn into_request(self) -> Option<ModuleRequest> {
        match self {
            Self::Declined => None,
            Self::Admitted(request) => Some(request),
        }
    }
}

/// Immutable view of one resolution step.
#[derive(Debug, Clone)]
pub struct ModuleRequest {
    specifier: String,
    from_file: String,
    context: String,
    meta: Option<Meta>,
    is_virtual: bool,
    data: ResolveDataRef,
    options: Arc<Options>,
}

impl ModuleRequest {
    /// Build a request from a host record, or decline it.
    ///
    /// Declining never modifies the record. Observing a virtual-loader
    /// specifier records its filename in `contexts` before declining.
    pub fn from(
        data: &ResolveDataRef,
        options: &Arc<Options>,
        contexts: &VirtualContexts,
    ) -> Admission {
        let snapshot = data.snapshot();
        let (Some(specifier), Some(context)) = (snapshot.request, snapshot.context) else {
            debug!("declining request without string specifier/context");
            return Admission::Declined;
        };

        if references_loader(&specifier, &options.virtual_loader_name) {
            // A virtual module announcing its real filename
            contexts.record_specifier(&specifier, &options.virtual_loader_name);
            return Admission::Declined;
        }

        if specifier.starts_with(INTERNAL_ESCAPE) {
            return Admission::Declined;
        }

        let mut issuer = snapshot.issuer;
        if issuer.is_empty() {
            match repair_issuer(&specifier, &context, options, contexts) {
                Some(repaired) => {
                    debug!(specifier = %specifier, issuer = %repaired, "repaired missing issuer");
                    data.update(|d| d.issuer.clone_from(&repaired));
                    issuer = repaired;
                }
                // Implicit-modules requests may proceed without an issuer
                None if is_implicit_modules(&specifier) => {}
                None => {
                    debug!(specifier = %specifier, context = %context, "declining issuer-less request");
                    return Admission::Declined;
                }
            }
        }

        Admission::Admitted(Self {
            specifier,
            from_file: issuer,
            context,
            meta: snapshot.issuer_meta,
            is_virtual: false,
            data: data.clone(),
            options: options.clone(),
        })
    }

    /// Specifier being resolved.
    #[must_use]
    pub fn specifier(&self) -> &str {
        &self.specifier
    }

    /// File the request is issued from; empty only for implicit-modules requests.
    #[must_use]
    pub fn from_file(&self) -> &str {
        &self.from_file
    }

    /// Directory resolution starts from: the issuer's directory, or the
    /// record's context when there is no issuer.
    #[must_use]
    pub fn context_dir(&self) -> String {
        if self.from_file.is_empty() {
            self.context.clone()
        } else {
            dirname(&self.from_file)
        }
    }

    /// Metadata attached to the issuer.
    #[must_use]
    pub fn meta(&self) -> Option<&Meta> {
        self.meta.as_ref()
    }

    /// Whether this request was redirected to the virtual loader.
    #[must_use]
    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    /// The shared host record.
    #[must_use]
    pub fn data(&self) -> &ResolveDataRef {
        &self.data
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Snapshot of the record as it is now.
    fn successor(&self) -> Self {
        let data = self.data.snapshot();
        Self {
            specifier: data.request.unwrap_or_default(),
            from_file: data.issuer,
            context: data.context.unwrap_or_default(),
            meta: data.issuer_meta,
            is_virtual: false,
            data: self.data.clone(),
            options: self.options.clone(),
        }
    }

    /// Resolve `new_specifier` instead.
    #[must_use]
    pub fn alias(&self, new_specifier: impl Into<String>) -> Self {
        let new_specifier = new_specifier.into();
        self.data.update(|d| d.request = Some(new_specifier));
        self.successor()
    }

    /// Resolve as if issued from `new_from_file`.
    ///
    /// Returns an equivalent request without touching the record when the
    /// issuer is already `new_from_file`.
    #[must_use]
    pub fn rehome(&self, new_from_file: impl Into<String>) -> Self {
        let new_from_file = new_from_file.into();
        if self.from_file == new_from_file {
            return self.clone();
        }
        self.data.update(|d| {
            d.context = Some(dirname(&new_from_file));
            d.issuer = new_from_file;
        });
        self.successor()
    }

    /// Redirect this request to generated content for `filename`.
    #[must_use]
    pub fn virtualize(&self, filename: &str) -> Self {
        let specifier = encode_virtual_specifier(
            &self.options.loader_prefix,
            &self.options.virtual_loader_name,
            filename,
            &self.options.app_root,
        );
        let mut next = self.alias(specifier);
        next.is_virtual = true;
        next
    }

    /// Attach metadata to the issuer's context.
    #[must_use]
    pub fn with_meta(&self, meta: Meta) -> Self {
        self.data.update(|d| d.issuer_meta = Some(meta));
        self.successor()
    }
}

/// Find a plausible issuer for a request that arrived without one.
fn repair_issuer(
    specifier: &str,
    context: &str,
    options: &Options,
    contexts: &VirtualContexts,
) -> Option<String> {
    if is_implicit_modules(specifier) {
        if let Some(filename) = contexts.find(|f| is_within(f, &options.app_root)) {
            return Some(filename);
        }
        if is_within(context, &options.app_root) {
            return Some(join_normalized(context, "package.json"));
        }
        return None;
    }
    contexts.lookup(context)
}
