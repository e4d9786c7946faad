use exception_tracking_core::host::memory::{handle_error_factory, InMemoryHost};
use exception_tracking_core::host::{
    symbols, HostCatalog, HostLibrary, HostSymbol, LibraryVersion, RegistryError, TypeShape,
};
use exception_tracking_core::inject::ResolutionError;
use exception_tracking_core::{
    ExceptionFilter, ExtensionPointKind, ExtensionRegistry, InMemoryTelemetry, InjectError,
    InjectionOutcome, Injector, InjectorConfig, InjectorEvent, RecordingDiagnostics,
};
use std::sync::Arc;

struct UnreadableFilters;

impl ExtensionRegistry<dyn ExceptionFilter> for UnreadableFilters {
    fn snapshot(&self) -> Result<Vec<Arc<dyn ExceptionFilter>>, RegistryError> {
        Err(RegistryError::UnexpectedShape(
            "GlobalFilters is not enumerable".to_string(),
        ))
    }

    fn add(&self, _entry: Arc<dyn ExceptionFilter>) -> Result<(), RegistryError> {
        panic!("add must not be reached for an unreadable registry");
    }
}

fn mvc_catalog(global_filters: HostSymbol) -> HostCatalog {
    let mut catalog = HostCatalog::new();
    catalog
        .register_library(
            HostLibrary::new(symbols::CORE_LIBRARY, LibraryVersion::new(4, 0, 0, 0)).with_symbol(
                "HttpContext",
                HostSymbol::Type(TypeShape::with_members(["is_custom_error_enabled"])),
            ),
        )
        .expect("core library");
    catalog
        .register_library(
            HostLibrary::new(symbols::MVC_LIBRARY, LibraryVersion::new(5, 2, 3, 0))
                .with_symbol(
                    "HandleErrorFilter",
                    HostSymbol::FilterBase(handle_error_factory()),
                )
                .with_symbol("GlobalFilters", global_filters)
                .with_symbol(
                    "ExceptionContext",
                    HostSymbol::Type(TypeShape::with_members(["exception", "http_context"])),
                ),
        )
        .expect("mvc library");
    catalog
}

fn run(
    catalog: Arc<HostCatalog>,
    config: InjectorConfig,
) -> (Injector, Arc<RecordingDiagnostics>) {
    let diagnostics = Arc::new(RecordingDiagnostics::new());
    let injector = Injector::builder(catalog, Arc::new(InMemoryTelemetry::new()))
        .diagnostics(diagnostics.clone())
        .config(config)
        .build()
        .expect("injector");
    injector.inject();
    (injector, diagnostics)
}

fn mvc_outcome(injector: &Injector) -> InjectionOutcome {
    injector
        .last_report()
        .expect("report")
        .outcome(ExtensionPointKind::MvcErrorFilter)
        .cloned()
        .expect("mvc outcome")
}

#[test]
fn absent_host_type_leaves_registry_empty_with_one_failure() {
    let host = InMemoryHost::builder()
        .without(symbols::MVC_HANDLE_ERROR_FILTER)
        .build()
        .expect("host");
    let config = InjectorConfig::from_kind_names(&["mvc-error-filter"]).expect("config");

    let (injector, diagnostics) = run(host.catalog(), config);

    assert!(host.global_filters().is_empty());
    assert_eq!(diagnostics.count("injection_failed"), 1);
    assert_eq!(
        mvc_outcome(&injector),
        InjectionOutcome::Failed(InjectError::Resolution(ResolutionError::SymbolNotFound(
            symbols::MVC_HANDLE_ERROR_FILTER.to_string()
        )))
    );
}

#[test]
fn unsupported_mvc_version_does_not_block_webapi() {
    let host = InMemoryHost::builder()
        .mvc_version(LibraryVersion::new(4, 0, 0, 0))
        .build()
        .expect("host");

    let (injector, diagnostics) = run(host.catalog(), InjectorConfig::default());

    assert!(host.global_filters().is_empty());
    assert_eq!(host.exception_loggers().len(), 1);
    assert!(diagnostics
        .events()
        .contains(&InjectorEvent::VersionNotSupported {
            version: "4.0.0.0".to_string(),
            component: "MVC",
        }));
    assert_eq!(diagnostics.count("injection_failed"), 0);
    assert_eq!(
        mvc_outcome(&injector),
        InjectionOutcome::SkippedUnsupportedVersion
    );
}

#[test]
fn configured_minimum_version_is_honored() {
    let host = InMemoryHost::compatible().expect("host");
    let config =
        InjectorConfig::default().with_minimum_major(ExtensionPointKind::WebApiErrorLogger, 6);

    let (injector, diagnostics) = run(host.catalog(), config);

    assert!(host.exception_loggers().is_empty());
    assert_eq!(host.global_filters().len(), 1);
    assert_eq!(diagnostics.count("version_not_supported"), 1);
    assert_eq!(
        injector
            .last_report()
            .expect("report")
            .outcome(ExtensionPointKind::WebApiErrorLogger),
        Some(&InjectionOutcome::SkippedUnsupportedVersion)
    );
}

#[test]
fn missing_member_aborts_the_kind() {
    let host = InMemoryHost::builder()
        .without(symbols::MVC_CONTEXT_HTTP_CONTEXT)
        .build()
        .expect("host");

    let (injector, diagnostics) = run(host.catalog(), InjectorConfig::default());

    assert!(host.global_filters().is_empty());
    assert_eq!(host.exception_loggers().len(), 1);
    assert_eq!(diagnostics.count("injection_failed"), 1);
    assert_eq!(
        mvc_outcome(&injector),
        InjectionOutcome::Failed(InjectError::Resolution(ResolutionError::MemberNotFound(
            symbols::MVC_CONTEXT_HTTP_CONTEXT.to_string()
        )))
    );
}

#[test]
fn unreadable_registry_is_a_failure_not_an_injection() {
    let catalog = mvc_catalog(HostSymbol::FilterRegistry(Arc::new(UnreadableFilters)));
    let config = InjectorConfig::from_kind_names(&["mvc-error-filter"]).expect("config");

    let (injector, diagnostics) = run(Arc::new(catalog), config);

    assert_eq!(diagnostics.count("injection_failed"), 1);
    assert!(matches!(
        mvc_outcome(&injector),
        InjectionOutcome::Failed(InjectError::Resolution(ResolutionError::RegistryShape(_)))
    ));
}

#[test]
fn registry_symbol_with_wrong_shape_is_rejected() {
    let catalog = mvc_catalog(HostSymbol::Type(TypeShape::with_members(["add"])));
    let config = InjectorConfig::from_kind_names(&["mvc-error-filter"]).expect("config");

    let (injector, _diagnostics) = run(Arc::new(catalog), config);

    assert_eq!(
        mvc_outcome(&injector),
        InjectionOutcome::Failed(InjectError::Resolution(ResolutionError::ShapeMismatch {
            name: symbols::MVC_GLOBAL_FILTERS.to_string(),
            expected: "filter_registry",
            found: "type",
        }))
    );
}
