//! Telemetry sink capability consumed by installed wrappers.
//!
//! # Responsibility
//! - Construct exception records from host exceptions.
//! - Record them through a pluggable client.
//!
//! # Invariants
//! - A record keeps the exact exception handle it was built from.

use crate::host::ExceptionRef;
use crate::logging::sanitize_message;
use log::info;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

const MAX_LOGGED_MESSAGE_CHARS: usize = 200;

/// Exception record handed to the telemetry client.
#[derive(Debug, Clone)]
pub struct ExceptionTelemetry {
    id: Uuid,
    exception: ExceptionRef,
}

impl ExceptionTelemetry {
    /// Creates a record with a generated id.
    pub fn new(exception: ExceptionRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            exception,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn exception(&self) -> &ExceptionRef {
        &self.exception
    }

    /// Whether this record carries exactly `exception` (same allocation).
    pub fn is_for(&self, exception: &ExceptionRef) -> bool {
        Arc::ptr_eq(&self.exception, exception)
    }

    pub fn summary(&self) -> TelemetrySummary {
        TelemetrySummary {
            id: self.id,
            exception_type: self.exception.type_name().to_string(),
            message: sanitize_message(self.exception.message(), MAX_LOGGED_MESSAGE_CHARS),
        }
    }
}

/// Serializable view of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetrySummary {
    pub id: Uuid,
    pub exception_type: String,
    pub message: String,
}

/// Telemetry client capability.
pub trait TelemetryClient: Send + Sync {
    /// Builds one exception record.
    fn exception_record(&self, exception: ExceptionRef) -> ExceptionTelemetry {
        ExceptionTelemetry::new(exception)
    }

    /// Records one exception record.
    fn track_exception(&self, record: ExceptionTelemetry);
}

/// Client that keeps every record in memory.
#[derive(Debug, Default)]
pub struct InMemoryTelemetry {
    records: Mutex<Vec<ExceptionTelemetry>>,
}

impl InMemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ExceptionTelemetry> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes and returns every record.
    pub fn drain(&self) -> Vec<ExceptionTelemetry> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl TelemetryClient for InMemoryTelemetry {
    fn track_exception(&self, record: ExceptionTelemetry) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}

/// Client that writes records to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTelemetryClient;

impl TelemetryClient for LogTelemetryClient {
    fn track_exception(&self, record: ExceptionTelemetry) {
        info!(
            "event=exception_tracked module=telemetry status=ok id={} exception_type={} message={}",
            record.id(),
            record.exception().type_name(),
            sanitize_message(record.exception().message(), MAX_LOGGED_MESSAGE_CHARS)
        );
    }
}
