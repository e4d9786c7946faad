//! Error types for the per-kind injection pipeline.

use crate::host::{LibraryVersion, RegistryError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Why a kind's extension point could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// A well-known name failed to parse.
    InvalidName(String),
    /// The library owning a required symbol is not loaded.
    LibraryNotFound(String),
    /// A required type is not present in its library.
    SymbolNotFound(String),
    /// A required type is present but lacks the named member.
    MemberNotFound(String),
    /// A required symbol exists with a different shape than expected.
    ShapeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
    /// The library is older than the kind's minimum major version.
    UnsupportedVersion {
        component: &'static str,
        version: LibraryVersion,
        minimum: u32,
    },
    /// The registry could not be enumerated.
    RegistryShape(RegistryError),
}

impl ResolutionError {
    /// Whether this is the separately reported version gate.
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self, Self::UnsupportedVersion { .. })
    }
}

impl Display for ResolutionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "host symbol name is invalid: {value}"),
            Self::LibraryNotFound(value) => write!(f, "host library not found: {value}"),
            Self::SymbolNotFound(value) => write!(f, "host type not found: {value}"),
            Self::MemberNotFound(value) => write!(f, "host member not found: {value}"),
            Self::ShapeMismatch {
                name,
                expected,
                found,
            } => write!(f, "host symbol {name} has shape {found}, expected {expected}"),
            Self::UnsupportedVersion {
                component,
                version,
                minimum,
            } => write!(
                f,
                "{component} version {version} is below supported major version {minimum}"
            ),
            Self::RegistryShape(err) => write!(f, "registry cannot be enumerated: {err}"),
        }
    }
}

impl Error for ResolutionError {}

/// Failure while building a wrapper instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisError {
    /// The host base behavior could not be constructed.
    BaseConstruction {
        symbol: &'static str,
        message: String,
    },
}

impl Display for SynthesisError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BaseConstruction { symbol, message } => {
                write!(f, "failed to construct base {symbol}: {message}")
            }
        }
    }
}

impl Error for SynthesisError {}

/// Terminal failure of one kind's pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectError {
    Resolution(ResolutionError),
    Registry(RegistryError),
    Synthesis(SynthesisError),
    /// A stage panicked; carries the sanitized panic payload.
    Panicked(String),
}

impl Display for InjectError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolution(err) => write!(f, "resolution failed: {err}"),
            Self::Registry(err) => write!(f, "registration failed: {err}"),
            Self::Synthesis(err) => write!(f, "synthesis failed: {err}"),
            Self::Panicked(message) => write!(f, "pipeline panicked: {message}"),
        }
    }
}

impl Error for InjectError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Resolution(err) => Some(err),
            Self::Registry(err) => Some(err),
            Self::Synthesis(err) => Some(err),
            Self::Panicked(_) => None,
        }
    }
}

impl From<ResolutionError> for InjectError {
    fn from(value: ResolutionError) -> Self {
        Self::Resolution(value)
    }
}

impl From<RegistryError> for InjectError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

impl From<SynthesisError> for InjectError {
    fn from(value: SynthesisError) -> Self {
        Self::Synthesis(value)
    }
}
