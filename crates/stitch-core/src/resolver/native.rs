//! Contract for the host's native resolution primitive.

use super::outcome::NativeError;
use futures::future::BoxFuture;

/// The host's own resolver.
///
/// Implementations resolve `specifier` starting at `context` (a directory)
/// and return the resolved target. They may suspend (and resolve other
/// modules) before completing.
pub trait NativeResolver: Send + Sync {
    fn resolve<'a>(
        &'a self,
        context: &'a str,
        specifier: &'a str,
    ) -> BoxFuture<'a, Result<String, NativeError>>;
}
