//! Module-resolution adapter.
//!
//! Turns host resolution records into [`ModuleRequest`]s, tracks virtual
//! module contexts, and layers manual package probing over native resolution.

mod contexts;
mod engine;
mod fallback;
pub mod manual;
mod native;
mod outcome;
mod record;
mod request;
pub mod trace;
mod virtual_loader;

pub use contexts::VirtualContexts;
pub use engine::{DefaultEngine, ResolverEngine};
pub use fallback::{Fallback, FallbackResolver};
pub use manual::{probe_package, ManualResolution, PackageImport};
pub use native::NativeResolver;
pub use outcome::{NativeError, ResolveError, Resolution};
pub use record::{Meta, ResolveData, ResolveDataRef};
pub use request::{is_implicit_modules, Admission, ModuleRequest, IMPLICIT_MODULES_MARKER};
pub use trace::{steps as probe_steps, ProbeStep, ProbeTrace};
pub use virtual_loader::{
    encode_virtual_specifier, parse_virtual_specifier, references_loader, VirtualParams,
};
