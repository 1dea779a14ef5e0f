//! Resolution outcomes and the errors they carry.

use thiserror::Error;

/// Failure reported by the host's native resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    /// The package manifest does not list the subpath as importable.
    #[error("Package path {subpath} is not exported from package {package} (see exports field in package.json)")]
    NotExported { package: String, subpath: String },

    #[error("Can't resolve '{specifier}' in '{context}'")]
    NotFound { specifier: String, context: String },

    #[error("{0}")]
    Other(String),
}

/// Message fragments hosts use for export-restricted failures.
const EXPORT_RESTRICTED_SIGNATURES: &[&str] = &[
    "is not exported from package",
    "is not defined by \"exports\"",
];

impl NativeError {
    #[must_use]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Whether this failure only reflects a package's `exports` restriction.
    #[must_use]
    pub fn is_export_restricted(&self) -> bool {
        match self {
            Self::NotExported { .. } => true,
            Self::NotFound { .. } => false,
            Self::Other(msg) => EXPORT_RESTRICTED_SIGNATURES
                .iter()
                .any(|sig| msg.contains(sig)),
        }
    }
}

/// Error carried by [`Resolution::NotFound`].
///
/// The host may still recover from it through its own remaining resolvers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Can't resolve '{specifier}' from '{from_file}': {source}")]
    Native {
        specifier: String,
        from_file: String,
        #[source]
        source: NativeError,
    },

    #[error("Can't resolve '{specifier}' from '{from_file}': module not found")]
    ModuleNotFound { specifier: String, from_file: String },
}

impl ResolveError {
    /// Specifier that failed to resolve.
    #[must_use]
    pub fn specifier(&self) -> &str {
        match self {
            Self::Native { specifier, .. } | Self::ModuleNotFound { specifier, .. } => specifier,
        }
    }

    /// File that performed the import.
    #[must_use]
    pub fn from_file(&self) -> &str {
        match self {
            Self::Native { from_file, .. } | Self::ModuleNotFound { from_file, .. } => from_file,
        }
    }

    /// The host error this failure wraps, if any.
    #[must_use]
    pub fn native(&self) -> Option<&NativeError> {
        match self {
            Self::Native { source, .. } => Some(source),
            Self::ModuleNotFound { .. } => None,
        }
    }
}

/// Outcome of one resolution attempt.
///
/// On `Found` the host record already holds the target; there is no payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found,
    NotFound(ResolveError),
}

impl Resolution {
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found)
    }

    /// Convert into the hook completion shape.
    pub fn into_result(self) -> Result<(), ResolveError> {
        match self {
            Self::Found => Ok(()),
            Self::NotFound(err) => Err(err),
        }
    }
}
