//! Abstract host model probed by the injector.
//!
//! # Responsibility
//! - Describe the two host extension-point shapes (error filter, error logger)
//!   and the request contexts they receive.
//! - Define the instrumentation marker contract shared by cooperating
//!   instrumentation providers.
//! - Expose the host catalog and registry abstractions consulted at startup.
//!
//! # Invariants
//! - The marker is a type-level constant; reading it never needs instance state
//!   and an object cannot report a marker its type does not declare.
//! - Exceptions travel as shared references so telemetry reports the exact
//!   value the host raised.

pub mod catalog;
pub mod memory;
pub mod registry;
pub mod symbols;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

pub use catalog::{
    CatalogError, FilterFactory, HostCatalog, HostLibrary, HostSymbol, LibraryVersion,
    LoggerFactory, QualifiedName, TypeShape,
};
pub use registry::{ExtensionRegistry, InMemoryRegistry, RegistryError};

/// Name of the marker constant every cooperating wrapper type declares.
pub const AUTO_INJECTED_MARKER_NAME: &str = "IS_AUTO_INJECTED";

/// Shared handle to one exception raised by the host.
pub type ExceptionRef = Arc<HostException>;

/// Exception value raised inside the host request pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostException {
    type_name: String,
    message: String,
}

impl HostException {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    /// Creates a shared exception handle.
    pub fn shared(type_name: impl Into<String>, message: impl Into<String>) -> ExceptionRef {
        Arc::new(Self::new(type_name, message))
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HostException {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_name, self.message)
    }
}

impl Error for HostException {}

/// Type-level instrumentation marker.
///
/// Every type installed into a host registry implements this trait; it is the
/// only way to obtain [`ExtensionObject`]. A wrapper type that reports
/// exceptions on behalf of an instrumentation provider declares
/// `IS_AUTO_INJECTED = Some(true)`. Independent providers check for it before
/// installing their own wrapper, so two providers never double report the
/// same exception. Plain host types keep the `None` default.
pub trait InstrumentationMarker {
    const IS_AUTO_INJECTED: Option<bool> = None;
}

mod sealed {
    pub trait Sealed {}

    impl<T: super::InstrumentationMarker> Sealed for T {}
}

/// Object installed into a host extension-point registry.
///
/// Implemented only through [`InstrumentationMarker`], so the runtime marker
/// always equals the type's constant.
pub trait ExtensionObject: sealed::Sealed + Send + Sync {
    /// Concrete runtime type name, used in diagnostics.
    fn type_name(&self) -> &'static str;

    /// Reads the marker constant of the object's type.
    fn auto_injected_marker(&self) -> Option<bool>;
}

impl<T> ExtensionObject for T
where
    T: InstrumentationMarker + Send + Sync,
{
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn auto_injected_marker(&self) -> Option<bool> {
        T::IS_AUTO_INJECTED
    }
}

/// Per-request host state reachable from an error context.
pub trait HttpContext: Send + Sync {
    /// Whether the host renders custom error pages for this request.
    fn is_custom_error_enabled(&self) -> bool;
}

/// Context handed to request-pipeline error filters.
pub struct ExceptionContext {
    http_context: Option<Arc<dyn HttpContext>>,
    exception: Option<ExceptionRef>,
    exception_handled: bool,
    result_view: Option<String>,
}

impl ExceptionContext {
    pub fn new(
        http_context: Option<Arc<dyn HttpContext>>,
        exception: Option<ExceptionRef>,
    ) -> Self {
        Self {
            http_context,
            exception,
            exception_handled: false,
            result_view: None,
        }
    }

    pub fn http_context(&self) -> Option<&Arc<dyn HttpContext>> {
        self.http_context.as_ref()
    }

    pub fn exception(&self) -> Option<&ExceptionRef> {
        self.exception.as_ref()
    }

    pub fn is_exception_handled(&self) -> bool {
        self.exception_handled
    }

    pub fn set_exception_handled(&mut self, handled: bool) {
        self.exception_handled = handled;
    }

    /// View selected by the filter that handled the exception, if any.
    pub fn result_view(&self) -> Option<&str> {
        self.result_view.as_deref()
    }

    pub fn set_result_view(&mut self, view: impl Into<String>) {
        self.result_view = Some(view.into());
    }
}

/// Context handed to request-pipeline error loggers.
#[derive(Debug, Clone)]
pub struct ExceptionLoggerContext {
    exception: Option<ExceptionRef>,
    catch_block: String,
    is_top_level: bool,
}

impl ExceptionLoggerContext {
    pub fn new(
        exception: Option<ExceptionRef>,
        catch_block: impl Into<String>,
        is_top_level: bool,
    ) -> Self {
        Self {
            exception,
            catch_block: catch_block.into(),
            is_top_level,
        }
    }

    pub fn exception(&self) -> Option<&ExceptionRef> {
        self.exception.as_ref()
    }

    /// Name of the host catch block that observed the exception.
    pub fn catch_block(&self) -> &str {
        &self.catch_block
    }

    pub fn is_top_level(&self) -> bool {
        self.is_top_level
    }
}

/// Request-pipeline error filter extension point.
pub trait ExceptionFilter: ExtensionObject {
    /// Invoked by the host when a request raised an unhandled exception.
    fn on_exception(&self, context: Option<&mut ExceptionContext>);

    /// Whether several filters of this type may coexist in one registry.
    fn allow_multiple(&self) -> bool {
        false
    }
}

/// Request-pipeline error logger extension point.
pub trait ExceptionLogger: ExtensionObject {
    fn log(&self, context: Option<&ExceptionLoggerContext>);
}
