//! Fallback resolution.
//!
//! Adapts the host's native resolver to the two-outcome [`Resolution`]
//! contract. The one native failure we try to recover from is an
//! export-restricted deep import; every other failure passes through as-is.

use super::contexts::VirtualContexts;
use super::manual::probe_package;
use super::native::NativeResolver;
use super::outcome::{NativeError, ResolveError, Resolution};
use super::request::ModuleRequest;
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Resolution primitive handed to a [`ResolverEngine`](super::engine::ResolverEngine).
pub trait Fallback: Send + Sync {
    fn resolve(&self, request: ModuleRequest) -> BoxFuture<'_, Resolution>;
}

/// Native resolution plus manual probing for export-restricted packages.
#[derive(Clone)]
pub struct FallbackResolver {
    native: Arc<dyn NativeResolver>,
    contexts: Arc<VirtualContexts>,
}

impl std::fmt::Debug for FallbackResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackResolver")
            .field("native", &"<dyn NativeResolver>")
            .field("contexts", &self.contexts.len())
            .finish()
    }
}

impl FallbackResolver {
    #[must_use]
    pub fn new(native: Arc<dyn NativeResolver>, contexts: Arc<VirtualContexts>) -> Self {
        Self { native, contexts }
    }

    /// Resolve the request's current specifier from its issuer's directory.
    pub async fn resolve_request(&self, request: &ModuleRequest) -> Resolution {
        let context = request.context_dir();
        let specifier = request.specifier();

        if specifier.contains('!') {
            // Loader chains are already resolved; only note virtual modules
            self.contexts
                .record_specifier(specifier, &request.options().virtual_loader_name);
            return Resolution::Found;
        }

        match self.native.resolve(&context, specifier).await {
            Ok(resolved) => {
                request.data().update(|d| d.resolved = Some(resolved));
                Resolution::Found
            }
            Err(err) if err.is_export_restricted() => resolve_manually(request, &context, err),
            Err(err) => {
                debug!(specifier, from = request.from_file(), error = %err, "native resolution failed");
                Resolution::NotFound(native_error(request, err))
            }
        }
    }
}

impl Fallback for FallbackResolver {
    fn resolve(&self, request: ModuleRequest) -> BoxFuture<'_, Resolution> {
        Box::pin(async move { self.resolve_request(&request).await })
    }
}

fn native_error(request: &ModuleRequest, source: NativeError) -> ResolveError {
    ResolveError::Native {
        specifier: request.specifier().to_string(),
        from_file: request.from_file().to_string(),
        source,
    }
}

/// Probe `node_modules` ourselves after an export-restricted failure.
fn resolve_manually(request: &ModuleRequest, context: &str, original: NativeError) -> Resolution {
    debug!(
        specifier = request.specifier(),
        context,
        "export-restricted import, probing manually"
    );
    let outcome = probe_package(Path::new(context), request.specifier());
    match outcome.resolved {
        Some(path) => {
            let resolved = path.to_string_lossy().into_owned();
            request.data().update(|d| {
                d.request = Some(resolved.clone());
                d.resolved = Some(resolved);
            });
            Resolution::Found
        }
        None => Resolution::NotFound(native_error(request, original)),
    }
}
