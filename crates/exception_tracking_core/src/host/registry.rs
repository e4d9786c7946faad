//! Host extension-point registries.
//!
//! # Responsibility
//! - Abstract the host's global, mutable extension-point collections behind
//!   an enumerate + add contract.
//! - Provide an in-memory registry for embedding hosts and tests.
//!
//! # Invariants
//! - Registries only grow; nothing in this crate removes an installed entry.
//! - `add_unless` on [`InMemoryRegistry`] evaluates its predicate and appends
//!   under one write lock.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, PoisonError, RwLock};

/// Admission policy run before an entry is appended.
pub type Admission<T> =
    Box<dyn Fn(&[Arc<T>], &Arc<T>) -> Result<(), RegistryError> + Send + Sync>;

/// Enumerable, append-only extension-point collection owned by the host.
pub trait ExtensionRegistry<T: ?Sized>: Send + Sync {
    /// Returns the currently installed entries in registration order.
    fn snapshot(&self) -> Result<Vec<Arc<T>>, RegistryError>;

    /// Appends one entry using the registry's native add operation.
    fn add(&self, entry: Arc<T>) -> Result<(), RegistryError>;

    /// Appends `entry` unless `reject` matches the current entries.
    ///
    /// Returns `Ok(true)` when the entry was added. The default
    /// implementation reads then writes without holding a lock in between;
    /// registries that can do better override it.
    fn add_unless(
        &self,
        entry: Arc<T>,
        reject: &dyn Fn(&[Arc<T>]) -> bool,
    ) -> Result<bool, RegistryError> {
        let current = self.snapshot()?;
        if reject(current.as_slice()) {
            return Ok(false);
        }
        self.add(entry)?;
        Ok(true)
    }
}

/// Lock-protected registry living in process memory.
pub struct InMemoryRegistry<T: ?Sized> {
    name: String,
    entries: RwLock<Vec<Arc<T>>>,
    admission: Option<Admission<T>>,
}

impl<T: ?Sized> InMemoryRegistry<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Vec::new()),
            admission: None,
        }
    }

    /// Creates a registry that runs `admission` before every append.
    pub fn with_admission(name: impl Into<String>, admission: Admission<T>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(Vec::new()),
            admission: Some(admission),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns installed entries, recovering from a poisoned lock.
    pub fn entries(&self) -> Vec<Arc<T>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes every entry. Host-side reset used between test cases.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn admit(&self, current: &[Arc<T>], entry: &Arc<T>) -> Result<(), RegistryError> {
        match &self.admission {
            Some(admission) => admission(current, entry),
            None => Ok(()),
        }
    }
}

impl<T: ?Sized + Send + Sync> ExtensionRegistry<T> for InMemoryRegistry<T> {
    fn snapshot(&self) -> Result<Vec<Arc<T>>, RegistryError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RegistryError::Poisoned(self.name.clone()))?;
        Ok(entries.clone())
    }

    fn add(&self, entry: Arc<T>) -> Result<(), RegistryError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RegistryError::Poisoned(self.name.clone()))?;
        self.admit(entries.as_slice(), &entry)?;
        entries.push(entry);
        Ok(())
    }

    fn add_unless(
        &self,
        entry: Arc<T>,
        reject: &dyn Fn(&[Arc<T>]) -> bool,
    ) -> Result<bool, RegistryError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RegistryError::Poisoned(self.name.clone()))?;
        if reject(entries.as_slice()) {
            return Ok(false);
        }
        self.admit(entries.as_slice(), &entry)?;
        entries.push(entry);
        Ok(true)
    }
}

/// Registry enumeration and mutation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry could not be enumerated as the expected collection.
    UnexpectedShape(String),
    /// The registry refused the entry.
    Rejected { registry: String, reason: String },
    /// A previous writer panicked while holding the registry lock.
    Poisoned(String),
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedShape(value) => write!(f, "registry has unexpected shape: {value}"),
            Self::Rejected { registry, reason } => {
                write!(f, "registry {registry} rejected entry: {reason}")
            }
            Self::Poisoned(value) => write!(f, "registry lock is poisoned: {value}"),
        }
    }
}

impl Error for RegistryError {}
