use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use stitch_core::version::SCHEMA_VERSION;
use stitch_core::{LocalHost, NodeResolver, Options, ResolveData, ResolveDataRef, StitchPlugin};

/// Inputs for `stitch resolve`.
#[derive(Debug)]
pub struct ResolveAction {
    pub specifier: String,
    /// Importing file; requests without one are treated as issued by a synthetic module.
    pub from: Option<PathBuf>,
    /// Directory override for the record's context.
    pub context: Option<PathBuf>,
    pub cwd: PathBuf,
}

/// Resolve result for JSON output.
#[derive(Serialize)]
struct ResolveOutput {
    schema_version: u32,
    ok: bool,
    specifier: String,
    /// Specifier held by the record after resolution (rewritten by aliasing,
    /// virtualization or manual fallback).
    request: Option<String>,
    issuer: String,
    context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<String>,
    virtual_contexts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn to_host_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Run one resolution through the plugin against the reference host resolver.
pub fn run(action: ResolveAction, options: Options, json: bool) -> Result<()> {
    let context = action.context.as_deref().unwrap_or(&action.cwd);
    let mut record = match &action.from {
        Some(from) => ResolveData::new(&action.specifier, to_host_string(from)),
        None => ResolveData::without_issuer(&action.specifier, to_host_string(context)),
    };
    if action.context.is_some() {
        record.context = Some(to_host_string(context));
    }
    let data = ResolveDataRef::new(record);

    let native = Arc::new(NodeResolver::new());
    let mut host = LocalHost::new(native.clone());
    let plugin = Arc::new(StitchPlugin::new(options, native));
    plugin.apply(&mut host);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .into_diagnostic()?;
    let outcome = runtime.block_on(host.resolve(data.clone()));

    let snapshot = data.snapshot();
    let output = ResolveOutput {
        schema_version: SCHEMA_VERSION,
        ok: outcome.is_ok(),
        specifier: action.specifier,
        request: snapshot.request,
        issuer: snapshot.issuer,
        context: snapshot.context,
        resolved: snapshot.resolved,
        virtual_contexts: plugin.contexts().len(),
        error: outcome.as_ref().err().map(ToString::to_string),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&output).into_diagnostic()?);
    } else if let Some(err) = &output.error {
        eprintln!("error: {err}");
    } else {
        // Loader chains are found without a file; show the rewritten request
        let shown = output.resolved.as_ref().or(output.request.as_ref());
        println!("{}", shown.map_or("", String::as_str));
    }

    if !output.ok {
        std::process::exit(1);
    }
    Ok(())
}
