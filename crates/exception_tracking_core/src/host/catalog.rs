//! Host symbol catalog.
//!
//! # Responsibility
//! - Hold the libraries a host has loaded, with their versions.
//! - Resolve qualified names (`library::Type` or `library::Type::member`) to
//!   typed host symbols.
//!
//! # Invariants
//! - Library names are unique within one catalog.
//! - Lookups are read-only; registries reachable through symbols carry their
//!   own interior mutability.

use crate::host::registry::ExtensionRegistry;
use crate::host::{ExceptionFilter, ExceptionLogger};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

static QUALIFIED_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z][a-z0-9_]*)::([A-Z][A-Za-z0-9]*)(?:::([a-z][a-z0-9_]*))?$")
        .expect("valid qualified name regex")
});
static LIBRARY_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid library name regex"));

/// Constructs the host's base error filter.
pub type FilterFactory =
    Arc<dyn Fn() -> Result<Arc<dyn ExceptionFilter>, String> + Send + Sync>;
/// Constructs the host's base error logger.
pub type LoggerFactory =
    Arc<dyn Fn() -> Result<Arc<dyn ExceptionLogger>, String> + Send + Sync>;

/// Four-part library version (`major.minor.build.revision`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LibraryVersion {
    pub major: u32,
    pub minor: u32,
    pub build: u32,
    pub revision: u32,
}

impl LibraryVersion {
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parses `major.minor[.build[.revision]]`; omitted parts default to zero.
    pub fn parse(value: &str) -> Result<Self, CatalogError> {
        let trimmed = value.trim();
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(CatalogError::InvalidVersion(value.to_string()));
        }

        let mut numbers = [0_u32; 4];
        for (slot, part) in numbers.iter_mut().zip(parts.iter()) {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(CatalogError::InvalidVersion(value.to_string()));
            }
            *slot = part
                .parse::<u32>()
                .map_err(|_| CatalogError::InvalidVersion(value.to_string()))?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2], numbers[3]))
    }
}

impl Display for LibraryVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// Parsed `library::Type[::member]` name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifiedName {
    library: String,
    type_name: String,
    member: Option<String>,
}

impl QualifiedName {
    pub fn parse(value: &str) -> Result<Self, CatalogError> {
        let captures = QUALIFIED_NAME_RE
            .captures(value.trim())
            .ok_or_else(|| CatalogError::InvalidQualifiedName(value.to_string()))?;
        Ok(Self {
            library: captures[1].to_string(),
            type_name: captures[2].to_string(),
            member: captures.get(3).map(|m| m.as_str().to_string()),
        })
    }

    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }

    /// Name of the owning type, without the member part.
    pub fn type_path(&self) -> String {
        format!("{}::{}", self.library, self.type_name)
    }
}

impl Display for QualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{}::{}::{}", self.library, self.type_name, member),
            None => write!(f, "{}::{}", self.library, self.type_name),
        }
    }
}

/// Public member surface of one host type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeShape {
    members: BTreeSet<String>,
}

impl TypeShape {
    pub fn with_members<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn has_member(&self, member: &str) -> bool {
        self.members.contains(member)
    }

    pub fn remove_member(&mut self, member: &str) -> bool {
        self.members.remove(member)
    }
}

/// One named item exported by a host library.
#[derive(Clone)]
pub enum HostSymbol {
    /// Base error filter behavior, constructed on demand.
    FilterBase(FilterFactory),
    /// Base error logger behavior, constructed on demand.
    LoggerBase(LoggerFactory),
    /// Global error filter registry.
    FilterRegistry(Arc<dyn ExtensionRegistry<dyn ExceptionFilter>>),
    /// Global error logger registry.
    LoggerRegistry(Arc<dyn ExtensionRegistry<dyn ExceptionLogger>>),
    /// Plain type with a member surface.
    Type(TypeShape),
}

impl HostSymbol {
    /// Short shape label used in diagnostics.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::FilterBase(_) => "filter_base",
            Self::LoggerBase(_) => "logger_base",
            Self::FilterRegistry(_) => "filter_registry",
            Self::LoggerRegistry(_) => "logger_registry",
            Self::Type(_) => "type",
        }
    }
}

/// One loaded host library.
#[derive(Clone)]
pub struct HostLibrary {
    name: String,
    version: LibraryVersion,
    symbols: BTreeMap<String, HostSymbol>,
}

impl HostLibrary {
    pub fn new(name: impl Into<String>, version: LibraryVersion) -> Self {
        Self {
            name: name.into(),
            version,
            symbols: BTreeMap::new(),
        }
    }

    /// Builder-style symbol registration.
    pub fn with_symbol(mut self, type_name: impl Into<String>, symbol: HostSymbol) -> Self {
        self.insert_symbol(type_name, symbol);
        self
    }

    /// Registers or replaces one exported symbol.
    pub fn insert_symbol(&mut self, type_name: impl Into<String>, symbol: HostSymbol) {
        self.symbols.insert(type_name.into(), symbol);
    }

    pub fn remove_symbol(&mut self, type_name: &str) -> Option<HostSymbol> {
        self.symbols.remove(type_name)
    }

    pub fn symbol(&self, type_name: &str) -> Option<&HostSymbol> {
        self.symbols.get(type_name)
    }

    pub(crate) fn symbol_mut(&mut self, type_name: &str) -> Option<&mut HostSymbol> {
        self.symbols.get_mut(type_name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> LibraryVersion {
        self.version
    }
}

/// Name-addressable view over the host's loaded libraries.
#[derive(Clone, Default)]
pub struct HostCatalog {
    libraries: BTreeMap<String, HostLibrary>,
}

impl HostCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one library.
    pub fn register_library(&mut self, library: HostLibrary) -> Result<(), CatalogError> {
        if !LIBRARY_NAME_RE.is_match(library.name()) {
            return Err(CatalogError::InvalidLibraryName(library.name().to_string()));
        }
        if self.libraries.contains_key(library.name()) {
            return Err(CatalogError::DuplicateLibrary(library.name().to_string()));
        }
        self.libraries.insert(library.name().to_string(), library);
        Ok(())
    }

    pub fn library(&self, name: &str) -> Option<&HostLibrary> {
        self.libraries.get(name)
    }

    pub(crate) fn library_mut(&mut self, name: &str) -> Option<&mut HostLibrary> {
        self.libraries.get_mut(name)
    }

    /// Returns the symbol for the type part of `name`, ignoring any member.
    pub fn lookup(&self, name: &QualifiedName) -> Option<&HostSymbol> {
        self.library(name.library())?.symbol(name.type_name())
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Returns sorted library names.
    pub fn library_names(&self) -> Vec<String> {
        self.libraries.keys().cloned().collect()
    }
}

/// Catalog construction and name parsing errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    InvalidQualifiedName(String),
    InvalidLibraryName(String),
    InvalidVersion(String),
    DuplicateLibrary(String),
}

impl Display for CatalogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQualifiedName(value) => write!(
                f,
                "qualified name is invalid: {value} (expected library::Type[::member])"
            ),
            Self::InvalidLibraryName(value) => write!(f, "library name is invalid: {value}"),
            Self::InvalidVersion(value) => write!(
                f,
                "library version is invalid: {value} (expected major.minor[.build[.revision]])"
            ),
            Self::DuplicateLibrary(value) => write!(f, "library already registered: {value}"),
        }
    }
}

impl Error for CatalogError {}
