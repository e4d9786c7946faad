//! Extension-point kinds the injector knows how to instrument.

use crate::host::symbols;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Oldest host pipeline major version the wrappers are built against.
pub const DEFAULT_MINIMUM_MAJOR_VERSION: u32 = 5;

/// Symbolic name of the MVC error filter kind.
pub const KIND_MVC_ERROR_FILTER: &str = "mvc-error-filter";
/// Symbolic name of the Web API error logger kind.
pub const KIND_WEBAPI_ERROR_LOGGER: &str = "webapi-error-logger";

const SUPPORTED_KIND_STRINGS: &[&str] = &[KIND_MVC_ERROR_FILTER, KIND_WEBAPI_ERROR_LOGGER];

/// One integration surface of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ExtensionPointKind {
    /// Request-pipeline error filter registered in the MVC global filters.
    #[serde(rename = "mvc-error-filter")]
    MvcErrorFilter,
    /// Request-pipeline error logger registered in the Web API services.
    #[serde(rename = "webapi-error-logger")]
    WebApiErrorLogger,
}

impl ExtensionPointKind {
    /// Every kind, in injection order.
    pub const ALL: [ExtensionPointKind; 2] = [Self::MvcErrorFilter, Self::WebApiErrorLogger];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MvcErrorFilter => KIND_MVC_ERROR_FILTER,
            Self::WebApiErrorLogger => KIND_WEBAPI_ERROR_LOGGER,
        }
    }

    /// Component label used in diagnostics.
    pub fn component(self) -> &'static str {
        match self {
            Self::MvcErrorFilter => "MVC",
            Self::WebApiErrorLogger => "WebApi",
        }
    }

    /// Library whose version gates this kind.
    pub fn version_library(self) -> &'static str {
        match self {
            Self::MvcErrorFilter => symbols::MVC_LIBRARY,
            Self::WebApiErrorLogger => symbols::WEBAPI_LIBRARY,
        }
    }

    /// Qualified name of the base behavior the wrapper preserves.
    pub fn base_symbol(self) -> &'static str {
        match self {
            Self::MvcErrorFilter => symbols::MVC_HANDLE_ERROR_FILTER,
            Self::WebApiErrorLogger => symbols::WEBAPI_EXCEPTION_LOGGER,
        }
    }

    /// Qualified name of the global registry the wrapper is installed into.
    pub fn registry_symbol(self) -> &'static str {
        match self {
            Self::MvcErrorFilter => symbols::MVC_GLOBAL_FILTERS,
            Self::WebApiErrorLogger => symbols::WEBAPI_EXCEPTION_LOGGERS,
        }
    }

    /// Context accessors the wrapper's guard sequence reads.
    pub fn required_members(self) -> &'static [&'static str] {
        match self {
            Self::MvcErrorFilter => &[
                symbols::MVC_CONTEXT_HTTP_CONTEXT,
                symbols::MVC_CONTEXT_EXCEPTION,
                symbols::HTTP_CONTEXT_CUSTOM_ERRORS,
            ],
            Self::WebApiErrorLogger => &[symbols::WEBAPI_CONTEXT_EXCEPTION],
        }
    }
}

impl Display for ExtensionPointKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns supported kind names.
pub fn supported_kind_strings() -> &'static [&'static str] {
    SUPPORTED_KIND_STRINGS
}

/// Parses one kind from its symbolic name.
pub fn parse_extension_point_kind(value: &str) -> Result<ExtensionPointKind, KindParseError> {
    let normalized = value.trim();
    if normalized.is_empty() {
        return Err(KindParseError::EmptyKind);
    }

    match normalized {
        KIND_MVC_ERROR_FILTER => Ok(ExtensionPointKind::MvcErrorFilter),
        KIND_WEBAPI_ERROR_LOGGER => Ok(ExtensionPointKind::WebApiErrorLogger),
        other => Err(KindParseError::UnsupportedKind(other.to_string())),
    }
}

/// Kind name parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindParseError {
    EmptyKind,
    UnsupportedKind(String),
}

impl Display for KindParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyKind => write!(f, "extension point kind must not be empty"),
            Self::UnsupportedKind(value) => {
                write!(f, "extension point kind is unsupported: {value}")
            }
        }
    }
}

impl Error for KindParseError {}
