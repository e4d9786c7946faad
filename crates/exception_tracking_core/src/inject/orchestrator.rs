//! Injection orchestration.
//!
//! # Responsibility
//! - Run resolver, guard, synthesizer and registrar for every configured kind.
//! - Convert every per-kind failure, panics included, into a typed outcome.
//! - Gate `inject` to one run per injector (and one per process for the
//!   global entry points).
//!
//! # Invariants
//! - No error or panic from a kind's pipeline, or from the diagnostic sink,
//!   reaches the caller.
//! - A failing kind never prevents the next kind from running.
//! - Once a gated run completes, the gate reports `Initialized` forever.

use crate::config::{ConfigError, InjectorConfig};
use crate::diagnostics::{ContainedSink, DiagnosticSink, InjectorEvent, LogDiagnosticSink};
use crate::host::{ExceptionFilter, ExceptionLogger, HostCatalog};
use crate::inject::error::{InjectError, ResolutionError};
use crate::inject::guard::needs_injection;
use crate::inject::kind::ExtensionPointKind;
use crate::inject::registrar::{register, Registration};
use crate::inject::resolver::{probe_mvc, probe_webapi};
use crate::inject::wrapper::{synthesize_filter, synthesize_logger};
use crate::logging::{panic_message, sanitize_message};
use crate::telemetry::TelemetryClient;
use log::{error, info};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

const STATE_UNINITIALIZED: u8 = 0;
const STATE_INITIALIZING: u8 = 1;
const STATE_INITIALIZED: u8 = 2;
const MAX_PANIC_CHARS: usize = 512;

static GLOBAL_GATE: InjectionGate = InjectionGate::new();

/// Terminal result of one kind's pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectionOutcome {
    Installed,
    SkippedAlreadyPresent,
    SkippedUnsupportedVersion,
    Failed(InjectError),
}

impl InjectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::SkippedAlreadyPresent => "skipped_already_present",
            Self::SkippedUnsupportedVersion => "skipped_unsupported_version",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed)
    }
}

/// Outcome of one kind within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindOutcome {
    pub kind: ExtensionPointKind,
    pub outcome: InjectionOutcome,
}

/// Serializable view of one kind outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub kind: ExtensionPointKind,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Aggregated outcomes of one pipeline run, in configured kind order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InjectionReport {
    outcomes: Vec<KindOutcome>,
    duration_ms: u128,
}

impl InjectionReport {
    pub fn outcomes(&self) -> &[KindOutcome] {
        &self.outcomes
    }

    pub fn outcome(&self, kind: ExtensionPointKind) -> Option<&InjectionOutcome> {
        self.outcomes
            .iter()
            .find(|entry| entry.kind == kind)
            .map(|entry| &entry.outcome)
    }

    pub fn installed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|entry| entry.outcome.is_installed())
            .count()
    }

    pub fn duration_ms(&self) -> u128 {
        self.duration_ms
    }

    pub fn summaries(&self) -> Vec<OutcomeSummary> {
        self.outcomes
            .iter()
            .map(|entry| OutcomeSummary {
                kind: entry.kind,
                outcome: entry.outcome.as_str(),
                detail: match &entry.outcome {
                    InjectionOutcome::Failed(err) => Some(err.to_string()),
                    _ => None,
                },
            })
            .collect()
    }
}

/// Lifecycle of an exactly-once gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Uninitialized,
    Initializing,
    Initialized,
}

/// Exactly-once gate using double-checked locking.
pub struct InjectionGate {
    state: AtomicU8,
    lock: Mutex<()>,
}

impl InjectionGate {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(STATE_UNINITIALIZED),
            lock: Mutex::new(()),
        }
    }

    pub fn state(&self) -> GateState {
        match self.state.load(Ordering::Acquire) {
            STATE_UNINITIALIZED => GateState::Uninitialized,
            STATE_INITIALIZING => GateState::Initializing,
            _ => GateState::Initialized,
        }
    }

    /// Runs `work` if no earlier call has; returns `None` for later callers.
    ///
    /// Concurrent first callers block until the winner finishes.
    pub fn run_once<R>(&self, work: impl FnOnce() -> R) -> Option<R> {
        if self.state.load(Ordering::Acquire) == STATE_INITIALIZED {
            return None;
        }
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.state.load(Ordering::Acquire) == STATE_INITIALIZED {
            return None;
        }

        self.state.store(STATE_INITIALIZING, Ordering::Release);
        let _finish = MarkInitialized(&self.state);
        Some(work())
    }
}

impl Default for InjectionGate {
    fn default() -> Self {
        Self::new()
    }
}

struct MarkInitialized<'a>(&'a AtomicU8);

impl Drop for MarkInitialized<'_> {
    fn drop(&mut self) {
        self.0.store(STATE_INITIALIZED, Ordering::Release);
    }
}

/// Auto-instrumentation engine bound to one host catalog.
pub struct Injector {
    catalog: Arc<HostCatalog>,
    telemetry: Arc<dyn TelemetryClient>,
    diagnostics: Arc<dyn DiagnosticSink>,
    config: InjectorConfig,
    gate: InjectionGate,
    last_report: Mutex<Option<InjectionReport>>,
}

impl Injector {
    /// Creates an injector with the default config and log diagnostics.
    pub fn new(catalog: Arc<HostCatalog>, telemetry: Arc<dyn TelemetryClient>) -> Self {
        Self {
            catalog,
            telemetry,
            diagnostics: Arc::new(ContainedSink::new(Arc::new(LogDiagnosticSink))),
            config: InjectorConfig::default(),
            gate: InjectionGate::new(),
            last_report: Mutex::new(None),
        }
    }

    pub fn builder(
        catalog: Arc<HostCatalog>,
        telemetry: Arc<dyn TelemetryClient>,
    ) -> InjectorBuilder {
        InjectorBuilder {
            catalog,
            telemetry,
            diagnostics: None,
            config: InjectorConfig::default(),
        }
    }

    /// Instruments the host once; later calls return immediately.
    pub fn inject(&self) {
        let _ = self.gate.run_once(|| self.run_pipeline());
    }

    /// Re-runs the pipeline regardless of earlier calls.
    ///
    /// The guard still prevents a second wrapper in any registry.
    pub fn force_inject(&self) {
        let _ = self.run_pipeline();
    }

    pub fn state(&self) -> GateState {
        self.gate.state()
    }

    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    /// Report of the most recent pipeline run, gated or forced.
    pub fn last_report(&self) -> Option<InjectionReport> {
        self.last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs every configured kind once, without consulting the gate.
    ///
    /// Never unwinds; a panic escaping the per-kind boundary is logged and the
    /// outcomes gathered so far are kept.
    pub fn run_pipeline(&self) -> InjectionReport {
        let started_at = Instant::now();
        let mut outcomes = Vec::with_capacity(self.config.kinds.len());
        let run = catch_unwind(AssertUnwindSafe(|| self.run_kinds(&mut outcomes)));
        let report = InjectionReport {
            outcomes,
            duration_ms: started_at.elapsed().as_millis(),
        };
        *self
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(report.clone());

        match run {
            Ok(()) => self.diagnostics.emit(&InjectorEvent::InjectionCompleted {
                installed: report.installed_count(),
                duration_ms: report.duration_ms,
            }),
            Err(payload) => error!(
                "event=unknown_error module=inject status=error completed_kinds={} error={}",
                report.outcomes.len(),
                sanitize_message(&panic_message(payload.as_ref()), MAX_PANIC_CHARS)
            ),
        }
        report
    }

    fn run_kinds(&self, outcomes: &mut Vec<KindOutcome>) {
        self.diagnostics.emit(&InjectorEvent::InjectionStarted);
        for kind in &self.config.kinds {
            outcomes.push(KindOutcome {
                kind: *kind,
                outcome: self.run_kind(*kind),
            });
        }
    }

    fn run_kind(&self, kind: ExtensionPointKind) -> InjectionOutcome {
        let result = catch_unwind(AssertUnwindSafe(|| match kind {
            ExtensionPointKind::MvcErrorFilter => self.inject_mvc(),
            ExtensionPointKind::WebApiErrorLogger => self.inject_webapi(),
        }));

        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(InjectError::Resolution(ResolutionError::UnsupportedVersion {
                component,
                version,
                ..
            }))) => {
                self.diagnostics.emit(&InjectorEvent::VersionNotSupported {
                    version: version.to_string(),
                    component,
                });
                InjectionOutcome::SkippedUnsupportedVersion
            }
            Ok(Err(err)) => {
                self.diagnostics.emit(&InjectorEvent::InjectionFailed {
                    component: kind.component(),
                    error: err.to_string(),
                });
                InjectionOutcome::Failed(err)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                self.diagnostics.emit(&InjectorEvent::UnknownError {
                    error: format!("{}: {}", kind.component(), message),
                });
                InjectionOutcome::Failed(InjectError::Panicked(message))
            }
        }
    }

    fn inject_mvc(&self) -> Result<InjectionOutcome, InjectError> {
        let kind = ExtensionPointKind::MvcErrorFilter;
        let handles = probe_mvc(&self.catalog, self.config.minimum_major(kind)).into_result()?;
        if !needs_injection::<dyn ExceptionFilter>(
            handles.registry.as_ref(),
            kind,
            self.diagnostics.as_ref(),
        )? {
            return Ok(InjectionOutcome::SkippedAlreadyPresent);
        }

        let wrapper = synthesize_filter(&handles, Arc::clone(&self.telemetry))?;
        let registration = register::<dyn ExceptionFilter>(handles.registry.as_ref(), wrapper)?;
        Ok(self.finish(kind, &handles.version.to_string(), registration))
    }

    fn inject_webapi(&self) -> Result<InjectionOutcome, InjectError> {
        let kind = ExtensionPointKind::WebApiErrorLogger;
        let handles =
            probe_webapi(&self.catalog, self.config.minimum_major(kind)).into_result()?;
        if !needs_injection::<dyn ExceptionLogger>(
            handles.registry.as_ref(),
            kind,
            self.diagnostics.as_ref(),
        )? {
            return Ok(InjectionOutcome::SkippedAlreadyPresent);
        }

        let wrapper = synthesize_logger(&handles, Arc::clone(&self.telemetry))?;
        let registration = register::<dyn ExceptionLogger>(handles.registry.as_ref(), wrapper)?;
        Ok(self.finish(kind, &handles.version.to_string(), registration))
    }

    fn finish(
        &self,
        kind: ExtensionPointKind,
        version: &str,
        registration: Registration,
    ) -> InjectionOutcome {
        match registration {
            Registration::Registered => {
                info!(
                    "event=wrapper_registered module=inject status=ok component={} registry={} version={}",
                    kind.component(),
                    kind.registry_symbol(),
                    version
                );
                InjectionOutcome::Installed
            }
            Registration::AlreadyPresent { type_name } => {
                self.diagnostics.emit(&InjectorEvent::AlreadyInjected {
                    type_name: type_name.to_string(),
                    component: kind.component(),
                });
                InjectionOutcome::SkippedAlreadyPresent
            }
        }
    }
}

/// Builder for [`Injector`].
pub struct InjectorBuilder {
    catalog: Arc<HostCatalog>,
    telemetry: Arc<dyn TelemetryClient>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
    config: InjectorConfig,
}

impl InjectorBuilder {
    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn config(mut self, config: InjectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<Injector, ConfigError> {
        self.config.validate()?;
        Ok(Injector {
            catalog: self.catalog,
            telemetry: self.telemetry,
            diagnostics: Arc::new(ContainedSink::new(
                self.diagnostics
                    .unwrap_or_else(|| Arc::new(LogDiagnosticSink)),
            )),
            config: self.config,
            gate: InjectionGate::new(),
            last_report: Mutex::new(None),
        })
    }
}

/// Instruments `catalog` once per process.
///
/// Every later call, from any thread and with any catalog, returns
/// immediately.
pub fn inject(catalog: Arc<HostCatalog>, telemetry: Arc<dyn TelemetryClient>) {
    let _ = GLOBAL_GATE.run_once(|| Injector::new(catalog, telemetry).run_pipeline());
}

/// Runs a caller-built injector under the process gate.
///
/// Returns the report when this call performed the run, `None` when the
/// process was already instrumented.
pub fn inject_with(injector: &Injector) -> Option<InjectionReport> {
    GLOBAL_GATE.run_once(|| injector.run_pipeline())
}

/// Re-runs instrumentation of `catalog`, bypassing the process gate.
pub fn force_inject(catalog: Arc<HostCatalog>, telemetry: Arc<dyn TelemetryClient>) {
    let _ = Injector::new(catalog, telemetry).run_pipeline();
}

/// State of the process-wide gate used by [`inject`].
pub fn global_state() -> GateState {
    GLOBAL_GATE.state()
}

#[cfg(test)]
mod tests {
    use super::{GateState, InjectionGate, InjectionOutcome, Injector};
    use crate::diagnostics::{DiagnosticSink, InjectorEvent, RecordingDiagnostics};
    use crate::host::memory::InMemoryHost;
    use crate::inject::error::InjectError;
    use crate::inject::kind::ExtensionPointKind;
    use crate::telemetry::InMemoryTelemetry;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Sink that panics on the named event, or on every event when `None`.
    struct PanickingSink {
        on: Option<&'static str>,
    }

    impl DiagnosticSink for PanickingSink {
        fn emit(&self, event: &InjectorEvent) {
            if self.on.map_or(true, |name| name == event.name()) {
                panic!("sink rejected {}", event.name());
            }
        }
    }

    #[test]
    fn gate_runs_work_once() {
        let gate = InjectionGate::new();
        let runs = AtomicUsize::new(0);
        assert_eq!(gate.state(), GateState::Uninitialized);
        assert_eq!(gate.run_once(|| runs.fetch_add(1, Ordering::SeqCst)), Some(0));
        assert_eq!(gate.run_once(|| runs.fetch_add(1, Ordering::SeqCst)), None);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(gate.state(), GateState::Initialized);
    }

    #[test]
    fn gate_reports_initializing_while_work_runs() {
        let gate = InjectionGate::new();
        let observed = gate.run_once(|| gate.state());
        assert_eq!(observed, Some(GateState::Initializing));
    }

    #[test]
    fn gate_ends_initialized_even_if_work_panics() {
        let gate = InjectionGate::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            gate.run_once(|| panic!("work failed"))
        }));
        assert!(result.is_err());
        assert_eq!(gate.state(), GateState::Initialized);
        assert_eq!(gate.run_once(|| 1), None);
    }

    #[test]
    fn report_summaries_carry_failure_detail() {
        let host = InMemoryHost::builder().without_webapi().build().expect("host");
        let injector = Injector::builder(host.catalog(), Arc::new(InMemoryTelemetry::new()))
            .diagnostics(Arc::new(RecordingDiagnostics::new()))
            .build()
            .expect("injector");

        let report = injector.run_pipeline();
        assert_eq!(report.installed_count(), 1);
        assert!(matches!(
            report.outcome(ExtensionPointKind::WebApiErrorLogger),
            Some(InjectionOutcome::Failed(InjectError::Resolution(_)))
        ));

        let summaries = report.summaries();
        assert_eq!(summaries[0].outcome, "installed");
        assert!(summaries[0].detail.is_none());
        assert_eq!(summaries[1].outcome, "failed");
        assert!(summaries[1]
            .detail
            .as_deref()
            .expect("failure detail")
            .contains("web_http"));
        assert_eq!(injector.last_report(), Some(report));
    }

    #[test]
    fn panicking_sink_does_not_unwind_into_caller() {
        let host = InMemoryHost::builder().without_webapi().build().expect("host");
        let injector = Injector::builder(host.catalog(), Arc::new(InMemoryTelemetry::new()))
            .diagnostics(Arc::new(PanickingSink {
                on: Some("injection_failed"),
            }))
            .build()
            .expect("injector");

        let outcome = catch_unwind(AssertUnwindSafe(|| injector.inject()));

        assert!(outcome.is_ok());
        assert_eq!(injector.state(), GateState::Initialized);
        assert_eq!(host.global_filters().len(), 1);
        let report = injector.last_report().expect("report is kept");
        assert_eq!(report.outcomes().len(), 2);
        assert!(matches!(
            report.outcome(ExtensionPointKind::WebApiErrorLogger),
            Some(InjectionOutcome::Failed(InjectError::Resolution(_)))
        ));
    }

    #[test]
    fn sink_panicking_on_every_event_still_runs_every_kind() {
        let host = InMemoryHost::compatible().expect("host");
        let injector = Injector::builder(host.catalog(), Arc::new(InMemoryTelemetry::new()))
            .diagnostics(Arc::new(PanickingSink { on: None }))
            .build()
            .expect("injector");

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            injector.force_inject();
            injector.force_inject();
        }));

        assert!(outcome.is_ok());
        assert_eq!(host.global_filters().len(), 1);
        assert_eq!(host.exception_loggers().len(), 1);
        let report = injector.last_report().expect("report");
        assert_eq!(
            report.outcome(ExtensionPointKind::MvcErrorFilter),
            Some(&InjectionOutcome::SkippedAlreadyPresent)
        );
    }
}
