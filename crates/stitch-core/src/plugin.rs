//! Plugin entry point.
//!
//! Registers the virtual loader alias and the resolve hook with a host, and
//! wires request construction, the engine and the fallback together.

use crate::config::Options;
use crate::resolver::{
    Admission, DefaultEngine, FallbackResolver, ModuleRequest, NativeResolver, ResolveDataRef,
    ResolveError, ResolverEngine, VirtualContexts,
};
use futures::future::BoxFuture;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Name the plugin registers its hook under.
pub const PLUGIN_NAME: &str = "stitch";

/// A resolve hook as seen by the host.
///
/// Completes with `Ok(())` once the record holds the resolution, or with the
/// error the host should report (or recover from).
pub trait ResolveHook: Send + Sync {
    fn resolve(&self, data: ResolveDataRef) -> BoxFuture<'_, Result<(), ResolveError>>;
}

/// Registration surface a build host exposes to plugins.
pub trait Host {
    /// Make `name` resolve to the file at `target`.
    fn register_loader_alias(&mut self, name: &str, target: &Path);

    /// Route resolution of every import through `hook`.
    fn register_resolve_hook(&mut self, plugin: &'static str, hook: Arc<dyn ResolveHook>);
}

/// The resolver plugin: one instance per build session.
pub struct StitchPlugin {
    options: Arc<Options>,
    contexts: Arc<VirtualContexts>,
    engine: Arc<dyn ResolverEngine>,
    native: Arc<dyn NativeResolver>,
    fallback: FallbackResolver,
}

impl std::fmt::Debug for StitchPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StitchPlugin")
            .field("options", &self.options)
            .field("contexts", &self.contexts)
            .field("engine", &"<dyn ResolverEngine>")
            .field("native", &"<dyn NativeResolver>")
            .finish()
    }
}

impl StitchPlugin {
    /// Create a plugin using the [`DefaultEngine`].
    pub fn new(options: Options, native: Arc<dyn NativeResolver>) -> Self {
        let contexts = Arc::new(VirtualContexts::new());
        Self {
            options: Arc::new(options),
            fallback: FallbackResolver::new(native.clone(), contexts.clone()),
            contexts,
            engine: Arc::new(DefaultEngine::new()),
            native,
        }
    }

    /// Replace the resolver engine.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn ResolverEngine>) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Virtual-module contexts observed during this session.
    #[must_use]
    pub fn contexts(&self) -> &Arc<VirtualContexts> {
        &self.contexts
    }

    /// Register the loader alias (when configured) and the resolve hook.
    pub fn apply(self: &Arc<Self>, host: &mut dyn Host) {
        if let Some(path) = &self.options.virtual_loader_path {
            host.register_loader_alias(&self.options.virtual_loader_name, path);
        }
        host.register_resolve_hook(PLUGIN_NAME, self.clone());
    }

    /// Resolve one host record.
    pub async fn handle(&self, data: ResolveDataRef) -> Result<(), ResolveError> {
        match ModuleRequest::from(&data, &self.options, &self.contexts) {
            Admission::Admitted(request) => {
                self.engine
                    .resolve(request, &self.fallback)
                    .await
                    .into_result()
            }
            Admission::Declined => self.resolve_natively(&data).await,
        }
    }

    /// Let the host's resolver handle a record we declined.
    async fn resolve_natively(&self, data: &ResolveDataRef) -> Result<(), ResolveError> {
        let snapshot = data.snapshot();
        let specifier = snapshot.request.unwrap_or_default();
        let context = snapshot.context.unwrap_or_default();
        debug!(specifier = %specifier, "declined, using native resolution");

        match self.native.resolve(&context, &specifier).await {
            Ok(resolved) => {
                data.update(|d| d.resolved = Some(resolved));
                Ok(())
            }
            Err(source) => Err(ResolveError::Native {
                specifier,
                from_file: snapshot.issuer,
                source,
            }),
        }
    }
}

impl ResolveHook for StitchPlugin {
    fn resolve(&self, data: ResolveDataRef) -> BoxFuture<'_, Result<(), ResolveError>> {
        Box::pin(self.handle(data))
    }
}
