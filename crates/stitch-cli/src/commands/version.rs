use miette::{IntoDiagnostic, Result};
use stitch_core::version::{version_string, SCHEMA_VERSION};
use stitch_core::VERSION;

pub fn run(json: bool) -> Result<()> {
    if json {
        let out = serde_json::json!({
            "schema_version": SCHEMA_VERSION,
            "version": VERSION,
        });
        println!("{}", serde_json::to_string_pretty(&out).into_diagnostic()?);
    } else {
        println!("{}", version_string());
    }
    Ok(())
}
