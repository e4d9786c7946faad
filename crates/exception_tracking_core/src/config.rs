//! Injector configuration and validation.

use crate::inject::kind::{
    parse_extension_point_kind, ExtensionPointKind, KindParseError, DEFAULT_MINIMUM_MAJOR_VERSION,
};
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Which kinds the injector instruments, and how old a host it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectorConfig {
    /// Kinds to instrument, in pipeline order.
    pub kinds: Vec<ExtensionPointKind>,
    /// Per-kind minimum major version overrides.
    pub minimum_versions: BTreeMap<ExtensionPointKind, u32>,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            kinds: ExtensionPointKind::ALL.to_vec(),
            minimum_versions: BTreeMap::new(),
        }
    }
}

impl InjectorConfig {
    /// Builds a config enabling the named kinds only.
    pub fn from_kind_names(names: &[&str]) -> Result<Self, ConfigError> {
        let kinds = names
            .iter()
            .map(|name| parse_extension_point_kind(name))
            .collect::<Result<Vec<_>, _>>()?;
        let config = Self {
            kinds,
            minimum_versions: BTreeMap::new(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Overrides the minimum supported major version for `kind`.
    pub fn with_minimum_major(mut self, kind: ExtensionPointKind, major: u32) -> Self {
        self.minimum_versions.insert(kind, major);
        self
    }

    /// Effective minimum major version for `kind`.
    pub fn minimum_major(&self, kind: ExtensionPointKind) -> u32 {
        self.minimum_versions
            .get(&kind)
            .copied()
            .unwrap_or(DEFAULT_MINIMUM_MAJOR_VERSION)
    }

    /// Validates config invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kinds.is_empty() {
            return Err(ConfigError::EmptyKinds);
        }
        let mut dedup = BTreeSet::new();
        for kind in &self.kinds {
            if !dedup.insert(*kind) {
                return Err(ConfigError::DuplicateKind(*kind));
            }
        }
        for (kind, major) in &self.minimum_versions {
            if *major == 0 {
                return Err(ConfigError::ZeroMinimumVersion(*kind));
            }
        }
        Ok(())
    }
}

/// Config validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyKinds,
    DuplicateKind(ExtensionPointKind),
    ZeroMinimumVersion(ExtensionPointKind),
    InvalidKind(KindParseError),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyKinds => write!(f, "at least one extension point kind must be enabled"),
            Self::DuplicateKind(kind) => write!(f, "extension point kind enabled twice: {kind}"),
            Self::ZeroMinimumVersion(kind) => {
                write!(f, "minimum major version for {kind} must be positive")
            }
            Self::InvalidKind(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConfigError {}

impl From<KindParseError> for ConfigError {
    fn from(value: KindParseError) -> Self {
        Self::InvalidKind(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, InjectorConfig};
    use crate::inject::kind::{ExtensionPointKind, KindParseError};

    #[test]
    fn default_enables_both_kinds_at_major_five() {
        let config = InjectorConfig::default();
        config.validate().expect("default config is valid");
        assert_eq!(config.kinds, ExtensionPointKind::ALL.to_vec());
        for kind in ExtensionPointKind::ALL {
            assert_eq!(config.minimum_major(kind), 5);
        }
    }

    #[test]
    fn overrides_minimum_per_kind() {
        let config =
            InjectorConfig::default().with_minimum_major(ExtensionPointKind::MvcErrorFilter, 6);
        assert_eq!(config.minimum_major(ExtensionPointKind::MvcErrorFilter), 6);
        assert_eq!(config.minimum_major(ExtensionPointKind::WebApiErrorLogger), 5);
    }

    #[test]
    fn parses_kind_names() {
        let config = InjectorConfig::from_kind_names(&["webapi-error-logger"]).expect("config");
        assert_eq!(config.kinds, vec![ExtensionPointKind::WebApiErrorLogger]);

        assert_eq!(
            InjectorConfig::from_kind_names(&["soap-fault-handler"]).expect_err("unknown kind"),
            ConfigError::InvalidKind(KindParseError::UnsupportedKind(
                "soap-fault-handler".to_string()
            ))
        );
    }

    #[test]
    fn rejects_empty_duplicate_or_zero_minimum() {
        assert_eq!(
            InjectorConfig::from_kind_names(&[]).expect_err("empty"),
            ConfigError::EmptyKinds
        );
        assert_eq!(
            InjectorConfig::from_kind_names(&["mvc-error-filter", "mvc-error-filter"])
                .expect_err("duplicate"),
            ConfigError::DuplicateKind(ExtensionPointKind::MvcErrorFilter)
        );
        let zero = InjectorConfig::default()
            .with_minimum_major(ExtensionPointKind::WebApiErrorLogger, 0);
        assert_eq!(
            zero.validate().expect_err("zero minimum"),
            ConfigError::ZeroMinimumVersion(ExtensionPointKind::WebApiErrorLogger)
        );
    }
}
