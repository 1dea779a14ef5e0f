#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod config;
pub mod error;
pub mod host;
pub mod plugin;
pub mod resolver;
pub mod version;

pub use config::Options;
pub use error::Error;
pub use host::{LocalHost, NodeResolver};
pub use plugin::{Host, ResolveHook, StitchPlugin, PLUGIN_NAME};
pub use resolver::{
    Admission, DefaultEngine, Fallback, FallbackResolver, ModuleRequest, NativeError,
    NativeResolver, ResolveData, ResolveDataRef, ResolveError, Resolution, ResolverEngine,
    VirtualContexts,
};
pub use version::VERSION;
