//! In-process host stand-ins.
//!
//! # Responsibility
//! - Provide default host behaviors for both extension-point kinds.
//! - Assemble a complete, compatible [`HostCatalog`] for embedding hosts,
//!   smoke binaries and tests, with knobs to drop symbols or lower versions.
//!
//! # Invariants
//! - The global filter registry refuses a second instance of a filter type
//!   unless that type allows multiple instances.

use crate::host::catalog::{
    CatalogError, FilterFactory, HostCatalog, HostLibrary, HostSymbol, LibraryVersion,
    LoggerFactory, QualifiedName, TypeShape,
};
use crate::host::registry::{InMemoryRegistry, RegistryError};
use crate::host::symbols;
use crate::host::{
    ExceptionContext, ExceptionFilter, ExceptionLogger, ExceptionLoggerContext, ExtensionObject,
    HttpContext, InstrumentationMarker,
};
use log::trace;
use std::sync::Arc;

/// Version reported for both pipelines unless overridden.
pub const DEFAULT_PIPELINE_VERSION: LibraryVersion = LibraryVersion::new(5, 2, 3, 0);
const CORE_LIBRARY_VERSION: LibraryVersion = LibraryVersion::new(4, 0, 0, 0);
const DEFAULT_ERROR_VIEW: &str = "Error";

/// Host default error filter.
///
/// Renders the error view and marks the exception handled when custom errors
/// are enabled for the request.
#[derive(Debug, Clone)]
pub struct HandleErrorFilter {
    view: String,
}

impl HandleErrorFilter {
    pub fn new(view: impl Into<String>) -> Self {
        Self { view: view.into() }
    }
}

impl Default for HandleErrorFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_VIEW)
    }
}

impl InstrumentationMarker for HandleErrorFilter {}

impl ExceptionFilter for HandleErrorFilter {
    fn on_exception(&self, context: Option<&mut ExceptionContext>) {
        let Some(context) = context else {
            return;
        };
        if context.is_exception_handled() || context.exception().is_none() {
            return;
        }
        let custom_errors = context
            .http_context()
            .map(|http| http.is_custom_error_enabled())
            .unwrap_or(false);
        if !custom_errors {
            return;
        }

        context.set_result_view(self.view.clone());
        context.set_exception_handled(true);
    }
}

/// Host default error logger. Traces where the exception was caught.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExceptionLogger;

impl InstrumentationMarker for DefaultExceptionLogger {}

impl ExceptionLogger for DefaultExceptionLogger {
    fn log(&self, context: Option<&ExceptionLoggerContext>) {
        let Some(context) = context else {
            return;
        };
        trace!(
            "event=host_exception_logged module=host status=ok catch_block={} top_level={}",
            context.catch_block(),
            context.is_top_level()
        );
    }
}

/// Fixed per-request host state.
#[derive(Debug, Clone, Copy)]
pub struct StaticHttpContext {
    custom_errors_enabled: bool,
}

impl StaticHttpContext {
    pub fn new(custom_errors_enabled: bool) -> Self {
        Self {
            custom_errors_enabled,
        }
    }

    pub fn shared(custom_errors_enabled: bool) -> Arc<dyn HttpContext> {
        Arc::new(Self::new(custom_errors_enabled))
    }
}

impl HttpContext for StaticHttpContext {
    fn is_custom_error_enabled(&self) -> bool {
        self.custom_errors_enabled
    }
}

/// Factory producing [`HandleErrorFilter`] with the default view.
pub fn handle_error_factory() -> FilterFactory {
    Arc::new(|| Ok(Arc::new(HandleErrorFilter::default()) as Arc<dyn ExceptionFilter>))
}

/// Factory producing [`DefaultExceptionLogger`].
pub fn default_logger_factory() -> LoggerFactory {
    Arc::new(|| Ok(Arc::new(DefaultExceptionLogger) as Arc<dyn ExceptionLogger>))
}

fn single_use_filter_admission(
    current: &[Arc<dyn ExceptionFilter>],
    entry: &Arc<dyn ExceptionFilter>,
) -> Result<(), RegistryError> {
    if entry.allow_multiple() {
        return Ok(());
    }
    if current
        .iter()
        .any(|existing| existing.type_name() == entry.type_name())
    {
        return Err(RegistryError::Rejected {
            registry: symbols::MVC_GLOBAL_FILTERS.to_string(),
            reason: format!("{} does not allow multiple instances", entry.type_name()),
        });
    }
    Ok(())
}

/// Complete in-memory host: catalog plus direct handles to its registries.
pub struct InMemoryHost {
    catalog: Arc<HostCatalog>,
    global_filters: Arc<InMemoryRegistry<dyn ExceptionFilter>>,
    exception_loggers: Arc<InMemoryRegistry<dyn ExceptionLogger>>,
}

impl InMemoryHost {
    pub fn builder() -> InMemoryHostBuilder {
        InMemoryHostBuilder::default()
    }

    /// Builds a host exposing both pipelines at the default version.
    pub fn compatible() -> Result<Self, CatalogError> {
        Self::builder().build()
    }

    pub fn catalog(&self) -> Arc<HostCatalog> {
        Arc::clone(&self.catalog)
    }

    pub fn global_filters(&self) -> &Arc<InMemoryRegistry<dyn ExceptionFilter>> {
        &self.global_filters
    }

    pub fn exception_loggers(&self) -> &Arc<InMemoryRegistry<dyn ExceptionLogger>> {
        &self.exception_loggers
    }
}

/// Builder for [`InMemoryHost`].
pub struct InMemoryHostBuilder {
    mvc_version: Option<LibraryVersion>,
    webapi_version: Option<LibraryVersion>,
    filter_base: FilterFactory,
    logger_base: LoggerFactory,
    removed: Vec<String>,
}

impl Default for InMemoryHostBuilder {
    fn default() -> Self {
        Self {
            mvc_version: Some(DEFAULT_PIPELINE_VERSION),
            webapi_version: Some(DEFAULT_PIPELINE_VERSION),
            filter_base: handle_error_factory(),
            logger_base: default_logger_factory(),
            removed: Vec::new(),
        }
    }
}

impl InMemoryHostBuilder {
    pub fn mvc_version(mut self, version: LibraryVersion) -> Self {
        self.mvc_version = Some(version);
        self
    }

    /// Leaves the MVC library out of the catalog entirely.
    pub fn without_mvc(mut self) -> Self {
        self.mvc_version = None;
        self
    }

    pub fn webapi_version(mut self, version: LibraryVersion) -> Self {
        self.webapi_version = Some(version);
        self
    }

    /// Leaves the Web API libraries out of the catalog entirely.
    pub fn without_webapi(mut self) -> Self {
        self.webapi_version = None;
        self
    }

    pub fn filter_base(mut self, factory: FilterFactory) -> Self {
        self.filter_base = factory;
        self
    }

    pub fn logger_base(mut self, factory: LoggerFactory) -> Self {
        self.logger_base = factory;
        self
    }

    /// Removes one symbol (`library::Type`) or one member
    /// (`library::Type::member`) from the built catalog.
    pub fn without(mut self, qualified_name: &str) -> Self {
        self.removed.push(qualified_name.to_string());
        self
    }

    pub fn build(self) -> Result<InMemoryHost, CatalogError> {
        let global_filters: Arc<InMemoryRegistry<dyn ExceptionFilter>> =
            Arc::new(InMemoryRegistry::with_admission(
                symbols::MVC_GLOBAL_FILTERS,
                Box::new(single_use_filter_admission),
            ));
        let exception_loggers: Arc<InMemoryRegistry<dyn ExceptionLogger>> =
            Arc::new(InMemoryRegistry::new(symbols::WEBAPI_EXCEPTION_LOGGERS));

        let mut catalog = HostCatalog::new();
        catalog.register_library(
            HostLibrary::new(symbols::CORE_LIBRARY, CORE_LIBRARY_VERSION).with_symbol(
                "HttpContext",
                HostSymbol::Type(TypeShape::with_members(["is_custom_error_enabled"])),
            ),
        )?;

        if let Some(version) = self.mvc_version {
            catalog.register_library(
                HostLibrary::new(symbols::MVC_LIBRARY, version)
                    .with_symbol(
                        "HandleErrorFilter",
                        HostSymbol::FilterBase(Arc::clone(&self.filter_base)),
                    )
                    .with_symbol(
                        "GlobalFilters",
                        HostSymbol::FilterRegistry(global_filters.clone()),
                    )
                    .with_symbol(
                        "ExceptionContext",
                        HostSymbol::Type(TypeShape::with_members(["exception", "http_context"])),
                    ),
            )?;
        }

        if let Some(version) = self.webapi_version {
            catalog.register_library(
                HostLibrary::new(symbols::WEBAPI_LIBRARY, version)
                    .with_symbol(
                        "ExceptionLogger",
                        HostSymbol::LoggerBase(Arc::clone(&self.logger_base)),
                    )
                    .with_symbol(
                        "ExceptionLoggerContext",
                        HostSymbol::Type(TypeShape::with_members(["exception"])),
                    ),
            )?;
            catalog.register_library(
                HostLibrary::new(symbols::WEBAPI_HOST_LIBRARY, version).with_symbol(
                    "ExceptionLoggers",
                    HostSymbol::LoggerRegistry(exception_loggers.clone()),
                ),
            )?;
        }

        for removed in &self.removed {
            let name = QualifiedName::parse(removed)?;
            let Some(library) = catalog.library_mut(name.library()) else {
                continue;
            };
            match name.member() {
                Some(member) => {
                    if let Some(HostSymbol::Type(shape)) = library.symbol_mut(name.type_name()) {
                        shape.remove_member(member);
                    }
                }
                None => {
                    library.remove_symbol(name.type_name());
                }
            }
        }

        Ok(InMemoryHost {
            catalog: Arc::new(catalog),
            global_filters,
            exception_loggers,
        })
    }
}
