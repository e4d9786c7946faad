//! Exception tracking auto-injection for request-pipeline hosts.
//!
//! Probes a host catalog for its error filter and error logger extension
//! points and installs telemetry wrappers into them, at most once per
//! registry and cooperatively with other marker-aware providers.

pub mod config;
pub mod diagnostics;
pub mod host;
pub mod inject;
pub mod logging;
pub mod telemetry;

pub use config::{ConfigError, InjectorConfig};
pub use diagnostics::{
    ContainedSink, DiagnosticSink, InjectorEvent, LogDiagnosticSink, RecordingDiagnostics,
};
pub use host::memory::InMemoryHost;
pub use host::{
    ExceptionContext, ExceptionFilter, ExceptionLogger, ExceptionLoggerContext, ExceptionRef,
    ExtensionObject, ExtensionRegistry, HostCatalog, HostException, InstrumentationMarker,
};
pub use inject::{
    force_inject, inject, inject_with, ExtensionPointKind, GateState, InjectError,
    InjectionOutcome, InjectionReport, Injector, OutcomeSummary,
};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use telemetry::{
    ExceptionTelemetry, InMemoryTelemetry, LogTelemetryClient, TelemetryClient, TelemetrySummary,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
