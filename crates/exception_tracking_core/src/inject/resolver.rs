//! Capability resolution against the host catalog.
//!
//! # Responsibility
//! - Locate every host symbol a kind's wrapper needs, by qualified name.
//! - Gate each kind on the major version of its host library.
//!
//! # Invariants
//! - All-or-nothing: the first missing symbol or member yields `Unavailable`
//!   naming it; partial handle sets are never returned.
//! - The base symbol is located before the version is read, so an absent
//!   pipeline reports "not found" rather than "unsupported version".
//! - Resolution is read-only and produces a fresh probe per call.

use crate::host::{
    ExceptionFilter, ExceptionLogger, ExtensionRegistry, FilterFactory, HostCatalog, HostSymbol,
    LibraryVersion, LoggerFactory, QualifiedName,
};
use crate::inject::error::ResolutionError;
use crate::inject::kind::ExtensionPointKind;
use std::sync::Arc;

/// Result of probing the host for one kind.
pub enum CapabilityProbe<H> {
    Resolved(H),
    Unavailable(ResolutionError),
}

impl<H> CapabilityProbe<H> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn into_result(self) -> Result<H, ResolutionError> {
        match self {
            Self::Resolved(handles) => Ok(handles),
            Self::Unavailable(reason) => Err(reason),
        }
    }
}

impl<H> From<Result<H, ResolutionError>> for CapabilityProbe<H> {
    fn from(value: Result<H, ResolutionError>) -> Self {
        match value {
            Ok(handles) => Self::Resolved(handles),
            Err(reason) => Self::Unavailable(reason),
        }
    }
}

/// Resolved handles for the MVC error filter kind.
#[derive(Clone)]
pub struct MvcFilterHandles {
    pub version: LibraryVersion,
    pub base: FilterFactory,
    pub registry: Arc<dyn ExtensionRegistry<dyn ExceptionFilter>>,
}

/// Resolved handles for the Web API error logger kind.
#[derive(Clone)]
pub struct WebApiLoggerHandles {
    pub version: LibraryVersion,
    pub base: LoggerFactory,
    pub registry: Arc<dyn ExtensionRegistry<dyn ExceptionLogger>>,
}

/// Probes the catalog for the MVC error filter kind.
pub fn probe_mvc(catalog: &HostCatalog, minimum_major: u32) -> CapabilityProbe<MvcFilterHandles> {
    resolve_mvc(catalog, minimum_major).into()
}

/// Probes the catalog for the Web API error logger kind.
pub fn probe_webapi(
    catalog: &HostCatalog,
    minimum_major: u32,
) -> CapabilityProbe<WebApiLoggerHandles> {
    resolve_webapi(catalog, minimum_major).into()
}

fn resolve_mvc(
    catalog: &HostCatalog,
    minimum_major: u32,
) -> Result<MvcFilterHandles, ResolutionError> {
    let kind = ExtensionPointKind::MvcErrorFilter;
    let base = match symbol_or_fail(catalog, kind.base_symbol())? {
        HostSymbol::FilterBase(factory) => Arc::clone(factory),
        other => return Err(shape_mismatch(kind.base_symbol(), "filter_base", other)),
    };
    let version = check_version(catalog, kind, minimum_major)?;

    let registry = match symbol_or_fail(catalog, kind.registry_symbol())? {
        HostSymbol::FilterRegistry(registry) => Arc::clone(registry),
        other => return Err(shape_mismatch(kind.registry_symbol(), "filter_registry", other)),
    };
    for member in kind.required_members() {
        member_or_fail(catalog, member)?;
    }

    Ok(MvcFilterHandles {
        version,
        base,
        registry,
    })
}

fn resolve_webapi(
    catalog: &HostCatalog,
    minimum_major: u32,
) -> Result<WebApiLoggerHandles, ResolutionError> {
    let kind = ExtensionPointKind::WebApiErrorLogger;
    let base = match symbol_or_fail(catalog, kind.base_symbol())? {
        HostSymbol::LoggerBase(factory) => Arc::clone(factory),
        other => return Err(shape_mismatch(kind.base_symbol(), "logger_base", other)),
    };
    let version = check_version(catalog, kind, minimum_major)?;

    let registry = match symbol_or_fail(catalog, kind.registry_symbol())? {
        HostSymbol::LoggerRegistry(registry) => Arc::clone(registry),
        other => return Err(shape_mismatch(kind.registry_symbol(), "logger_registry", other)),
    };
    for member in kind.required_members() {
        member_or_fail(catalog, member)?;
    }

    Ok(WebApiLoggerHandles {
        version,
        base,
        registry,
    })
}

fn parse_name(value: &str) -> Result<QualifiedName, ResolutionError> {
    QualifiedName::parse(value).map_err(|_| ResolutionError::InvalidName(value.to_string()))
}

fn symbol_or_fail<'c>(
    catalog: &'c HostCatalog,
    qualified: &str,
) -> Result<&'c HostSymbol, ResolutionError> {
    let name = parse_name(qualified)?;
    let library = catalog
        .library(name.library())
        .ok_or_else(|| ResolutionError::LibraryNotFound(name.library().to_string()))?;
    library
        .symbol(name.type_name())
        .ok_or_else(|| ResolutionError::SymbolNotFound(name.type_path()))
}

fn member_or_fail(catalog: &HostCatalog, qualified: &str) -> Result<(), ResolutionError> {
    let name = parse_name(qualified)?;
    let Some(member) = name.member() else {
        return Err(ResolutionError::InvalidName(qualified.to_string()));
    };
    match symbol_or_fail(catalog, &name.type_path())? {
        HostSymbol::Type(shape) if shape.has_member(member) => Ok(()),
        HostSymbol::Type(_) => Err(ResolutionError::MemberNotFound(qualified.to_string())),
        other => Err(shape_mismatch(&name.type_path(), "type", other)),
    }
}

fn check_version(
    catalog: &HostCatalog,
    kind: ExtensionPointKind,
    minimum_major: u32,
) -> Result<LibraryVersion, ResolutionError> {
    let library = catalog
        .library(kind.version_library())
        .ok_or_else(|| ResolutionError::LibraryNotFound(kind.version_library().to_string()))?;
    let version = library.version();
    if version.major < minimum_major {
        return Err(ResolutionError::UnsupportedVersion {
            component: kind.component(),
            version,
            minimum: minimum_major,
        });
    }
    Ok(version)
}

fn shape_mismatch(name: &str, expected: &'static str, found: &HostSymbol) -> ResolutionError {
    ResolutionError::ShapeMismatch {
        name: name.to_string(),
        expected,
        found: found.shape(),
    }
}
