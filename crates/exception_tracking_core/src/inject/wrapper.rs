//! Telemetry wrappers installed into host registries.
//!
//! # Responsibility
//! - Decorate the host's base error filter and base error logger with one
//!   guarded telemetry step.
//! - Declare the instrumentation marker on both wrapper types.
//!
//! # Invariants
//! - The base method is always invoked, with the original context, after the
//!   telemetry step; the wrapper never suppresses or replaces host behavior.
//! - Telemetry is recorded at most once per invocation.
//! - A panicking telemetry client never prevents the base call.

use crate::host::{
    ExceptionContext, ExceptionFilter, ExceptionLogger, ExceptionLoggerContext, ExceptionRef,
    InstrumentationMarker,
};
use crate::inject::error::SynthesisError;
use crate::inject::kind::ExtensionPointKind;
use crate::inject::resolver::{MvcFilterHandles, WebApiLoggerHandles};
use crate::logging::panic_message;
use crate::telemetry::TelemetryClient;
use log::warn;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Error filter reporting exceptions to telemetry before the host filter runs.
pub struct TelemetryExceptionFilter {
    base: Arc<dyn ExceptionFilter>,
    telemetry: Arc<dyn TelemetryClient>,
}

impl TelemetryExceptionFilter {
    pub fn new(base: Arc<dyn ExceptionFilter>, telemetry: Arc<dyn TelemetryClient>) -> Self {
        Self { base, telemetry }
    }

    pub fn base(&self) -> &Arc<dyn ExceptionFilter> {
        &self.base
    }
}

impl InstrumentationMarker for TelemetryExceptionFilter {
    const IS_AUTO_INJECTED: Option<bool> = Some(true);
}

impl ExceptionFilter for TelemetryExceptionFilter {
    fn on_exception(&self, context: Option<&mut ExceptionContext>) {
        if let Some(exception) = filter_exception_to_report(context.as_deref()) {
            record_exception(
                self.telemetry.as_ref(),
                ExtensionPointKind::MvcErrorFilter,
                exception,
            );
        }
        self.base.on_exception(context);
    }

    fn allow_multiple(&self) -> bool {
        true
    }
}

// context -> host context -> exception -> custom errors enabled
fn filter_exception_to_report(context: Option<&ExceptionContext>) -> Option<ExceptionRef> {
    let context = context?;
    let http_context = context.http_context()?;
    let exception = context.exception()?;
    if !http_context.is_custom_error_enabled() {
        return None;
    }
    Some(Arc::clone(exception))
}

/// Error logger reporting exceptions to telemetry before the host logger runs.
pub struct TelemetryExceptionLogger {
    base: Arc<dyn ExceptionLogger>,
    telemetry: Arc<dyn TelemetryClient>,
}

impl TelemetryExceptionLogger {
    pub fn new(base: Arc<dyn ExceptionLogger>, telemetry: Arc<dyn TelemetryClient>) -> Self {
        Self { base, telemetry }
    }

    pub fn base(&self) -> &Arc<dyn ExceptionLogger> {
        &self.base
    }
}

impl InstrumentationMarker for TelemetryExceptionLogger {
    const IS_AUTO_INJECTED: Option<bool> = Some(true);
}

impl ExceptionLogger for TelemetryExceptionLogger {
    fn log(&self, context: Option<&ExceptionLoggerContext>) {
        if let Some(exception) = context.and_then(ExceptionLoggerContext::exception) {
            record_exception(
                self.telemetry.as_ref(),
                ExtensionPointKind::WebApiErrorLogger,
                Arc::clone(exception),
            );
        }
        self.base.log(context);
    }
}

fn record_exception(
    telemetry: &dyn TelemetryClient,
    kind: ExtensionPointKind,
    exception: ExceptionRef,
) {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let record = telemetry.exception_record(exception);
        telemetry.track_exception(record);
    }));
    if let Err(payload) = outcome {
        warn!(
            "event=exception_track module=inject status=error component={} error={}",
            kind.component(),
            panic_message(payload.as_ref())
        );
    }
}

/// One wrapper instance built for a kind, ready for registration.
pub struct SynthesizedWrapper<T: ?Sized> {
    kind: ExtensionPointKind,
    instance: Arc<T>,
}

impl<T: ?Sized> SynthesizedWrapper<T> {
    pub fn kind(&self) -> ExtensionPointKind {
        self.kind
    }

    pub fn into_instance(self) -> Arc<T> {
        self.instance
    }
}

/// Builds the MVC filter wrapper around a freshly constructed base filter.
pub fn synthesize_filter(
    handles: &MvcFilterHandles,
    telemetry: Arc<dyn TelemetryClient>,
) -> Result<SynthesizedWrapper<dyn ExceptionFilter>, SynthesisError> {
    let kind = ExtensionPointKind::MvcErrorFilter;
    let base = (handles.base)().map_err(|message| SynthesisError::BaseConstruction {
        symbol: kind.base_symbol(),
        message,
    })?;
    Ok(SynthesizedWrapper {
        kind,
        instance: Arc::new(TelemetryExceptionFilter::new(base, telemetry)),
    })
}

/// Builds the Web API logger wrapper around a freshly constructed base logger.
pub fn synthesize_logger(
    handles: &WebApiLoggerHandles,
    telemetry: Arc<dyn TelemetryClient>,
) -> Result<SynthesizedWrapper<dyn ExceptionLogger>, SynthesisError> {
    let kind = ExtensionPointKind::WebApiErrorLogger;
    let base = (handles.base)().map_err(|message| SynthesisError::BaseConstruction {
        symbol: kind.base_symbol(),
        message,
    })?;
    Ok(SynthesizedWrapper {
        kind,
        instance: Arc::new(TelemetryExceptionLogger::new(base, telemetry)),
    })
}

#[cfg(test)]
mod tests {
    use super::{TelemetryExceptionFilter, TelemetryExceptionLogger};
    use crate::host::memory::{HandleErrorFilter, StaticHttpContext};
    use crate::host::{
        ExceptionContext, ExceptionFilter, ExceptionLogger, ExceptionLoggerContext,
        ExtensionObject, HostException, InstrumentationMarker,
    };
    use crate::telemetry::{ExceptionTelemetry, InMemoryTelemetry, TelemetryClient};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct CountingLogger {
        calls: AtomicUsize,
    }
    impl InstrumentationMarker for CountingLogger {}
    impl ExceptionLogger for CountingLogger {
        fn log(&self, _context: Option<&ExceptionLoggerContext>) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct PanickingTelemetry;
    impl TelemetryClient for PanickingTelemetry {
        fn track_exception(&self, _record: ExceptionTelemetry) {
            panic!("sink unavailable");
        }
    }

    fn filter_with(telemetry: Arc<InMemoryTelemetry>) -> TelemetryExceptionFilter {
        TelemetryExceptionFilter::new(Arc::new(HandleErrorFilter::default()), telemetry)
    }

    #[test]
    fn filter_reports_then_runs_base() {
        let telemetry = Arc::new(InMemoryTelemetry::new());
        let filter = filter_with(telemetry.clone());
        let exception = HostException::shared("Invalid", "boom");
        let mut context =
            ExceptionContext::new(Some(StaticHttpContext::shared(true)), Some(exception.clone()));

        filter.on_exception(Some(&mut context));

        let records = telemetry.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].is_for(&exception));
        assert!(context.is_exception_handled());
        assert_eq!(context.result_view(), Some("Error"));
    }

    #[test]
    fn filter_skips_telemetry_when_any_guard_fails() {
        let telemetry = Arc::new(InMemoryTelemetry::new());
        let filter = filter_with(telemetry.clone());

        let mut no_http = ExceptionContext::new(None, Some(HostException::shared("E", "m")));
        filter.on_exception(Some(&mut no_http));

        let mut no_exception = ExceptionContext::new(Some(StaticHttpContext::shared(true)), None);
        filter.on_exception(Some(&mut no_exception));

        let mut custom_off = ExceptionContext::new(
            Some(StaticHttpContext::shared(false)),
            Some(HostException::shared("E", "m")),
        );
        filter.on_exception(Some(&mut custom_off));

        filter.on_exception(None);

        assert!(telemetry.is_empty());
    }

    #[test]
    fn filter_declares_marker_and_allows_multiple() {
        let filter = filter_with(Arc::new(InMemoryTelemetry::new()));
        assert_eq!(filter.auto_injected_marker(), Some(true));
        assert!(filter.allow_multiple());
        assert!(!filter.base().allow_multiple());
    }

    #[test]
    fn logger_reports_and_always_calls_base() {
        let telemetry = Arc::new(InMemoryTelemetry::new());
        let base = Arc::new(CountingLogger::default());
        let logger = TelemetryExceptionLogger::new(base.clone(), telemetry.clone());
        let exception = HostException::shared("Invalid", "boom");

        logger.log(Some(&ExceptionLoggerContext::new(
            Some(exception.clone()),
            "HttpServer",
            true,
        )));
        logger.log(Some(&ExceptionLoggerContext::new(None, "HttpServer", true)));
        logger.log(None);

        assert_eq!(telemetry.len(), 1);
        assert!(telemetry.records()[0].is_for(&exception));
        assert_eq!(base.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn panicking_telemetry_does_not_block_base() {
        let base = Arc::new(CountingLogger::default());
        let logger = TelemetryExceptionLogger::new(base.clone(), Arc::new(PanickingTelemetry));
        logger.log(Some(&ExceptionLoggerContext::new(
            Some(HostException::shared("Invalid", "boom")),
            "HttpServer",
            true,
        )));
        assert_eq!(base.calls.load(Ordering::SeqCst), 1);
    }
}
