//! Installs synthesized wrappers into host registries.
//!
//! # Invariants
//! - Exactly one instance is added per successful registration.
//! - The marker check is repeated together with the add, so a wrapper
//!   installed by a racing caller since the guard ran is honored.
//! - Nothing is ever removed.

use crate::host::{ExtensionObject, ExtensionRegistry, RegistryError};
use crate::inject::guard::find_marked;
use crate::inject::wrapper::SynthesizedWrapper;
use log::debug;
use std::cell::Cell;

/// Result of one registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Registered,
    /// A marked entry appeared between the guard and the add.
    AlreadyPresent { type_name: &'static str },
}

/// Adds `wrapper` to `registry` unless a marked entry is already installed.
pub fn register<T>(
    registry: &dyn ExtensionRegistry<T>,
    wrapper: SynthesizedWrapper<T>,
) -> Result<Registration, RegistryError>
where
    T: ExtensionObject + ?Sized,
{
    let kind = wrapper.kind();
    let existing = Cell::new(None);
    let added = registry.add_unless(wrapper.into_instance(), &|entries| {
        existing.set(find_marked(entries));
        existing.get().is_some()
    })?;
    if added {
        debug!(
            "event=wrapper_add module=inject status=ok component={}",
            kind.component()
        );
        return Ok(Registration::Registered);
    }
    let type_name = existing.get().unwrap_or("unknown");
    debug!(
        "event=wrapper_add module=inject status=skip component={} type={}",
        kind.component(),
        type_name
    );
    Ok(Registration::AlreadyPresent { type_name })
}
