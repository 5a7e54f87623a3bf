//! Diagnostic sink for user-visible build failures.
//!
//! Front-ends report warnings and errors here while lowering; the driver
//! asks for [`DiagnosticSink::exit_code`] when it shuts down and exits
//! with status 1 if any error was emitted. Messages are forwarded to the
//! `tracing` subscriber installed by the driver.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// Counts and forwards diagnostics.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    warnings: usize,
    errors: usize,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        DiagnosticSink::default()
    }

    pub fn warning(&mut self, message: impl Display) {
        self.warnings += 1;
        tracing::warn!("{message}");
    }

    pub fn error(&mut self, message: impl Display) {
        self.errors += 1;
        tracing::error!("{message}");
    }

    pub fn report(&mut self, severity: Severity, message: impl Display) {
        match severity {
            Severity::Warning => self.warning(message),
            Severity::Error => self.error(message),
        }
    }

    pub fn num_warnings(&self) -> usize {
        self.warnings
    }

    pub fn num_errors(&self) -> usize {
        self.errors
    }

    pub fn had_error(&self) -> bool {
        self.errors > 0
    }

    /// Process exit status the driver should terminate with: 1 if any
    /// error was reported, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.had_error())
    }
}
