//! Resolver engines.
//!
//! An engine decides what a request should become (renamed, rehomed,
//! virtualized) and calls the [`Fallback`] to finish the job.

use super::fallback::Fallback;
use super::outcome::Resolution;
use super::request::{is_implicit_modules, ModuleRequest};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use stitch_util::path::{is_within, join_normalized};
use tracing::debug;

/// Decides how a request is resolved.
pub trait ResolverEngine: Send + Sync {
    fn resolve<'a>(
        &'a self,
        request: ModuleRequest,
        fallback: &'a dyn Fallback,
    ) -> BoxFuture<'a, Resolution>;
}

/// Engine driven by the request's [`Options`](crate::config::Options).
///
/// Applied in order: renamed modules, rehomed roots, implicit-modules
/// virtualization, then the fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultEngine;

impl DefaultEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Rewrite a renamed package (or a subpath of one), longest match first.
    fn handle_renaming(request: ModuleRequest) -> ModuleRequest {
        let specifier = request.specifier();
        let renamed = request
            .options()
            .renamed_modules
            .iter()
            .filter_map(|(from, to)| {
                let rest = specifier.strip_prefix(from.as_str())?;
                (rest.is_empty() || rest.starts_with('/')).then(|| (from.len(), format!("{to}{rest}")))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, target)| target);

        match renamed {
            Some(target) => {
                debug!(from = specifier, to = %target, "renaming module");
                request.alias(target)
            }
            None => request,
        }
    }

    /// Move requests issued under a rehomed root to that root's file.
    fn handle_rehoming(request: ModuleRequest) -> ModuleRequest {
        let from_file = request.from_file();
        let Some(root) = request
            .options()
            .rehomed_roots
            .iter()
            .find(|root| is_within(from_file, &root.dir))
        else {
            return request;
        };
        if root.from_file == from_file {
            return request;
        }

        debug!(from = from_file, to = %root.from_file, "rehoming request");
        let mut meta = request.meta().cloned().unwrap_or_else(Map::new);
        meta.insert("rehomedFrom".to_string(), Value::String(from_file.to_string()));
        let target = root.from_file.clone();
        request.rehome(target).with_meta(meta)
    }

    /// Serve implicit-modules aggregates from the virtual loader.
    fn handle_implicit_modules(request: ModuleRequest) -> ModuleRequest {
        let specifier = request.specifier();
        if !is_implicit_modules(specifier) || !specifier.starts_with('.') {
            return request;
        }
        let filename = join_normalized(&request.context_dir(), specifier);
        debug!(specifier, filename = %filename, "virtualizing implicit modules");
        request.virtualize(&filename)
    }
}

impl ResolverEngine for DefaultEngine {
    fn resolve<'a>(
        &'a self,
        request: ModuleRequest,
        fallback: &'a dyn Fallback,
    ) -> BoxFuture<'a, Resolution> {
        Box::pin(async move {
            if request.is_virtual() {
                return fallback.resolve(request).await;
            }
            let request = Self::handle_renaming(request);
            let request = Self::handle_rehoming(request);
            let request = Self::handle_implicit_modules(request);
            fallback.resolve(request).await
        })
    }
}
