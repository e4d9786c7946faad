//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire an in-memory host to `exception_tracking_core` end to end.
//! - Print a deterministic JSON summary for quick local sanity checks.

use exception_tracking_core::host::memory::{InMemoryHost, StaticHttpContext};
use exception_tracking_core::{
    default_log_level, init_logging, ExceptionContext, ExceptionFilter, HostException,
    InMemoryTelemetry, Injector,
};
use log::{info, warn};
use std::error::Error;
use std::sync::Arc;

fn main() {
    if let Err(err) = run() {
        eprintln!("exception_tracking_cli error={err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let log_dir = std::env::temp_dir().join("exception_tracking_cli");
    if let Some(log_dir) = log_dir.to_str() {
        if let Err(err) = init_logging(default_log_level(), log_dir) {
            eprintln!("exception_tracking_cli logging disabled: {err}");
        }
    }

    let host = InMemoryHost::compatible()?;
    let telemetry = Arc::new(InMemoryTelemetry::new());
    let injector = Injector::new(host.catalog(), telemetry.clone());

    injector.inject();
    injector.inject();
    info!(
        "event=cli_inject module=cli status=ok filters={} loggers={}",
        host.global_filters().len(),
        host.exception_loggers().len()
    );

    let exception = HostException::shared("InvalidOperation", "smoke test exception");
    let mut context = ExceptionContext::new(
        Some(StaticHttpContext::shared(true)),
        Some(Arc::clone(&exception)),
    );
    for filter in host.global_filters().entries() {
        filter.on_exception(Some(&mut context));
    }
    if telemetry.is_empty() {
        warn!("event=cli_trigger module=cli status=error reason=no_telemetry_recorded");
    }

    let report = injector.last_report().unwrap_or_default();
    let tracked = telemetry
        .records()
        .iter()
        .map(|record| record.summary())
        .collect::<Vec<_>>();
    let output = serde_json::json!({
        "version": exception_tracking_core::core_version(),
        "gate": injector.state(),
        "kinds": injector.config().kinds,
        "outcomes": report.summaries(),
        "registries": {
            "global_filters": host.global_filters().len(),
            "exception_loggers": host.exception_loggers().len(),
        },
        "exception_handled": context.is_exception_handled(),
        "tracked": tracked,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
