//! Virtual-loader specifier codec.
//!
//! A virtualized request points at the virtual loader with the real filename
//! and the app root carried as form-encoded query parameters:
//!
//! ```text
//! <loaderPrefix><virtualLoaderName>?f=<filename>&a=<appRoot>!
//! ```

use url::form_urlencoded;

/// Query key carrying the virtual module's filename.
const FILENAME_PARAM: &str = "f";
/// Query key carrying the app root.
const APP_ROOT_PARAM: &str = "a";

/// Parameters recovered from a virtualized specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualParams {
    pub filename: String,
    pub app_root: Option<String>,
}

/// Build the specifier that routes `filename` through the virtual loader.
#[must_use]
pub fn encode_virtual_specifier(
    loader_prefix: &str,
    loader_name: &str,
    filename: &str,
    app_root: &str,
) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(FILENAME_PARAM, filename)
        .append_pair(APP_ROOT_PARAM, app_root)
        .finish();
    format!("{loader_prefix}{loader_name}?{query}!")
}

/// Whether `specifier` mentions the virtual loader at all.
#[must_use]
pub fn references_loader(specifier: &str, loader_name: &str) -> bool {
    !loader_name.is_empty() && specifier.contains(loader_name)
}

/// Recover the filename (and app root, if present) from a specifier that
/// references the virtual loader.
///
/// Returns `None` when the loader is not referenced or carries no `f` parameter.
#[must_use]
pub fn parse_virtual_specifier(specifier: &str, loader_name: &str) -> Option<VirtualParams> {
    if !references_loader(specifier, loader_name) {
        return None;
    }
    let start = specifier.find(loader_name)? + loader_name.len();
    let rest = specifier[start..].strip_prefix('?')?;
    // The query ends where the next loader in the chain begins
    let query = rest.split('!').next().unwrap_or_default();

    let mut filename = None;
    let mut app_root = None;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            FILENAME_PARAM => filename = Some(value.into_owned()),
            APP_ROOT_PARAM => app_root = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(VirtualParams {
        filename: filename.filter(|f| !f.is_empty())?,
        app_root,
    })
}
