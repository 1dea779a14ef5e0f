use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use stitch_core::resolver::probe_package;
use stitch_core::version::SCHEMA_VERSION;

#[derive(Serialize)]
struct StepOutput {
    step: &'static str,
    ok: bool,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

#[derive(Serialize)]
struct ProbeOutput {
    schema_version: u32,
    specifier: String,
    context: String,
    resolved: Option<String>,
    steps: Vec<StepOutput>,
    tried: Vec<String>,
}

fn display(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Explain how the manual fallback would resolve `specifier` from `context`.
pub fn run(specifier: &str, context: &Path, json: bool) -> Result<()> {
    let result = probe_package(context, specifier);

    let output = ProbeOutput {
        schema_version: SCHEMA_VERSION,
        specifier: specifier.to_string(),
        context: display(context),
        resolved: result.resolved.as_deref().map(display),
        steps: result
            .trace
            .steps
            .iter()
            .map(|s| StepOutput {
                step: s.step,
                ok: s.ok,
                detail: s.detail.clone(),
                path: s.path.as_deref().map(display),
            })
            .collect(),
        tried: result.trace.tried.iter().map(PathBuf::as_path).map(display).collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
    } else {
        for step in &output.steps {
            let mark = if step.ok { "ok  " } else { "fail" };
            match &step.path {
                Some(path) => println!("[{mark}] {}: {} ({path})", step.step, step.detail),
                None => println!("[{mark}] {}: {}", step.step, step.detail),
            }
        }
        match &output.resolved {
            Some(path) => println!("resolved: {path}"),
            None => println!("unresolved ({} paths tried)", output.tried.len()),
        }
    }

    if output.resolved.is_none() {
        std::process::exit(1);
    }
    Ok(())
}
