//! Injection diagnostics.
//!
//! # Responsibility
//! - Define the leveled events the injector reports about its own progress.
//! - Route them to the `log` facade, or collect them for inspection.
//! - Contain panics raised by embedder-provided sinks.
//!
//! # Invariants
//! - Emitting through [`ContainedSink`] never fails and never unwinds.
//! - Error text is sanitized before it reaches log output.

use crate::host::AUTO_INJECTED_MARKER_NAME;
use crate::logging::{panic_message, sanitize_message};
use log::{error, log, Level};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

const MAX_ERROR_CHARS: usize = 512;

/// One diagnostic event emitted by the injector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectorEvent {
    InjectionStarted,
    InjectionCompleted {
        installed: usize,
        duration_ms: u128,
    },
    InjectionFailed {
        component: &'static str,
        error: String,
    },
    VersionNotSupported {
        version: String,
        component: &'static str,
    },
    /// A marked wrapper from this or another provider is already installed.
    AlreadyInjected {
        type_name: String,
        component: &'static str,
    },
    UnknownError {
        error: String,
    },
}

impl InjectorEvent {
    /// Stable event name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InjectionStarted => "injection_started",
            Self::InjectionCompleted { .. } => "injection_completed",
            Self::InjectionFailed { .. } => "injection_failed",
            Self::VersionNotSupported { .. } => "version_not_supported",
            Self::AlreadyInjected { .. } => "already_injected",
            Self::UnknownError { .. } => "unknown_error",
        }
    }

    pub fn level(&self) -> Level {
        match self {
            Self::InjectionStarted | Self::InjectionCompleted { .. } => Level::Debug,
            Self::AlreadyInjected { .. } => Level::Debug,
            Self::VersionNotSupported { .. }
            | Self::InjectionFailed { .. }
            | Self::UnknownError { .. } => Level::Error,
        }
    }

    fn render(&self) -> String {
        match self {
            Self::InjectionStarted => {
                format!("event={} module=inject status=start", self.name())
            }
            Self::InjectionCompleted {
                installed,
                duration_ms,
            } => format!(
                "event={} module=inject status=ok installed={} duration_ms={}",
                self.name(),
                installed,
                duration_ms
            ),
            Self::InjectionFailed { component, error } => format!(
                "event={} module=inject status=error component={} error={}",
                self.name(),
                component,
                sanitize_message(error, MAX_ERROR_CHARS)
            ),
            Self::VersionNotSupported { version, component } => format!(
                "event={} module=inject status=skip component={} version={}",
                self.name(),
                component,
                version
            ),
            Self::AlreadyInjected {
                type_name,
                component,
            } => format!(
                "event={} module=inject status=skip component={} type={} marker={}",
                self.name(),
                component,
                type_name,
                AUTO_INJECTED_MARKER_NAME
            ),
            Self::UnknownError { error } => format!(
                "event={} module=inject status=error error={}",
                self.name(),
                sanitize_message(error, MAX_ERROR_CHARS)
            ),
        }
    }
}

/// Observability sink for injector events.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, event: &InjectorEvent);
}

/// Sink writing events to the `log` facade at their own level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnosticSink;

impl DiagnosticSink for LogDiagnosticSink {
    fn emit(&self, event: &InjectorEvent) {
        log!(event.level(), "{}", event.render());
    }
}

/// Adapter that keeps a panicking sink from unwinding into the injector.
///
/// A dropped event is reported straight to the `log` facade.
pub struct ContainedSink {
    inner: Arc<dyn DiagnosticSink>,
}

impl ContainedSink {
    pub fn new(inner: Arc<dyn DiagnosticSink>) -> Self {
        Self { inner }
    }
}

impl DiagnosticSink for ContainedSink {
    fn emit(&self, event: &InjectorEvent) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.inner.emit(event))) {
            error!(
                "event=diagnostic_sink module=inject status=error dropped={} error={}",
                event.name(),
                sanitize_message(&panic_message(payload.as_ref()), MAX_ERROR_CHARS)
            );
        }
    }
}

/// Sink keeping every event in memory, then forwarding it to the log.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<InjectorEvent>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InjectorEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events with the given name.
    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| event.name() == name)
            .count()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn emit(&self, event: &InjectorEvent) {
        LogDiagnosticSink.emit(event);
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
