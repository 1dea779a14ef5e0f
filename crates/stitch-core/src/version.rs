/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema version for JSON emitted by the CLI.
/// Bump this when changing the output shape incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

/// Returns a formatted version string including build metadata if available.
#[must_use]
pub fn version_string() -> String {
    match option_env!("STITCH_BUILD_GIT_HASH") {
        Some(hash) => format!("stitch {VERSION} ({hash})"),
        None => format!("stitch {VERSION}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_string_contains_version() {
        let vs = version_string();
        assert!(vs.contains(VERSION));
        assert!(vs.starts_with("stitch "));
    }
}
