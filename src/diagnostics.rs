//! Diagnostics interface.
//!
//! The passes never fail on user input; they report through a
//! [`DiagnosticSink`] and carry on with a best-effort default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::dom::SourceSpan;

pub trait DiagnosticSink {
    fn warning(&mut self, message: &str, span: SourceSpan, file: &Path);
    fn error(&mut self, message: &str, span: SourceSpan, file: &Path);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: PathBuf,
    pub span: SourceSpan,
}

/// Buffering sink. Keeps diagnostics in emission order and logs each one at
/// `debug` level.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Messages {
    diagnostics: Vec<Diagnostic>,
    #[serde(skip)]
    silent: bool,
}

impl Messages {
    pub fn new() -> Self {
        Self::default()
    }

    /// A buffer that does not log. Its contents are logged by whichever
    /// sink they are replayed into.
    pub fn silent() -> Self {
        Self {
            diagnostics: Vec::new(),
            silent: true,
        }
    }

    fn push(&mut self, severity: Severity, message: &str, span: SourceSpan, file: &Path) {
        if !self.silent {
            debug!(
                severity = ?severity,
                file = %file.display(),
                line = span.line,
                column = span.column,
                "{}",
                message
            );
        }
        self.diagnostics.push(Diagnostic {
            severity,
            message: message.to_string(),
            file: file.to_path_buf(),
            span,
        });
    }

    pub fn all(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Forward everything buffered here into `sink`, in order.
    pub fn replay_into(&self, sink: &mut dyn DiagnosticSink) {
        for d in &self.diagnostics {
            match d.severity {
                Severity::Warning => sink.warning(&d.message, d.span, &d.file),
                Severity::Error => sink.error(&d.message, d.span, &d.file),
            }
        }
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl DiagnosticSink for Messages {
    fn warning(&mut self, message: &str, span: SourceSpan, file: &Path) {
        self.push(Severity::Warning, message, span, file);
    }

    fn error(&mut self, message: &str, span: SourceSpan, file: &Path) {
        self.push(Severity::Error, message, span, file);
    }
}
