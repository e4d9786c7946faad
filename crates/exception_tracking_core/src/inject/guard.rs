//! Cooperative idempotency check.
//!
//! # Responsibility
//! - Decide whether a registry still needs a wrapper, by looking for any
//!   installed object that declares the instrumentation marker.
//!
//! # Invariants
//! - The decision depends only on the registry's current contents.
//! - An unreadable registry is a resolution failure, never "needs injection".

use crate::diagnostics::{DiagnosticSink, InjectorEvent};
use crate::host::{ExtensionObject, ExtensionRegistry};
use crate::inject::error::ResolutionError;
use crate::inject::kind::ExtensionPointKind;
use std::sync::Arc;

/// Returns the type name of the first entry whose marker reads `true`.
pub fn find_marked<T>(entries: &[Arc<T>]) -> Option<&'static str>
where
    T: ExtensionObject + ?Sized,
{
    entries
        .iter()
        .find(|entry| entry.auto_injected_marker() == Some(true))
        .map(|entry| entry.type_name())
}

/// Decides whether `registry` needs a wrapper for `kind`.
///
/// Emits [`InjectorEvent::AlreadyInjected`] when a marked entry is found.
pub fn needs_injection<T>(
    registry: &dyn ExtensionRegistry<T>,
    kind: ExtensionPointKind,
    diagnostics: &dyn DiagnosticSink,
) -> Result<bool, ResolutionError>
where
    T: ExtensionObject + ?Sized,
{
    let entries = registry
        .snapshot()
        .map_err(ResolutionError::RegistryShape)?;
    match find_marked(entries.as_slice()) {
        Some(type_name) => {
            diagnostics.emit(&InjectorEvent::AlreadyInjected {
                type_name: type_name.to_string(),
                component: kind.component(),
            });
            Ok(false)
        }
        None => Ok(true),
    }
}
