//! Auto-injection pipeline.
//!
//! Per configured kind: [`resolver`] locates the host symbols, [`guard`]
//! checks for an already installed marked wrapper, [`wrapper`] builds the
//! decorator and [`registrar`] installs it. [`orchestrator`] sequences the
//! kinds and owns the exactly-once gate.

pub mod error;
pub mod guard;
pub mod kind;
pub mod orchestrator;
pub mod registrar;
pub mod resolver;
pub mod wrapper;

pub use error::{InjectError, ResolutionError, SynthesisError};
pub use kind::{parse_extension_point_kind, ExtensionPointKind, KindParseError};
pub use orchestrator::{
    force_inject, global_state, inject, inject_with, GateState, InjectionGate,
    InjectionOutcome, InjectionReport, Injector, InjectorBuilder, KindOutcome, OutcomeSummary,
};
pub use resolver::CapabilityProbe;
pub use wrapper::{TelemetryExceptionFilter, TelemetryExceptionLogger};
