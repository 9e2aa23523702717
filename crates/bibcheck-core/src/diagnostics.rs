//! Run-scoped diagnostic log.
//!
//! Every issue found while processing an entry is recorded here against the
//! entry's key. The log is append-only for the duration of a run and handed
//! out exactly once at the end via [`Diagnostics::finish`].

use std::fmt;

/// How serious a diagnostic is. `Error` is blocking: it makes the run exit
/// with a failure status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        })
    }
}

/// What went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// The database could not be reached or answered with an error.
    LookupFailure,
    /// The database returned no usable candidate.
    NoMatch,
    /// Several candidates were found and a human picked one.
    AmbiguousMatch,
    /// A single candidate was found but it is an informal/other record.
    TypeMismatch,
    /// The entry needs a human decision that was not made during the run.
    ManualReview,
    /// A required field is absent or blank.
    SchemaViolation { field: String },
    /// The entry type has no schema.
    UnrecognizedType { tag: String },
    /// The entry is a preprint or cites an eprint server.
    InformalVenue,
    /// The AI revision of a field failed; the original value was kept.
    RevisionServiceFailure { field: String },
    /// The entry has no title to search by.
    MissingTitle,
    /// The full record export for a matched candidate could not be fetched.
    RecordFetchFailure,
    /// A block of the input file, starting at `line`, could not be parsed.
    ParseFailure { line: usize },
    /// Processing stopped at this entry.
    Halted,
}

impl DiagnosticKind {
    /// Short label used when printing.
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::LookupFailure => "lookup-failed",
            DiagnosticKind::NoMatch => "no-hits",
            DiagnosticKind::AmbiguousMatch => "ambiguous",
            DiagnosticKind::TypeMismatch => "type=misc",
            DiagnosticKind::ManualReview => "manual-review",
            DiagnosticKind::SchemaViolation { .. } => "missing-field",
            DiagnosticKind::UnrecognizedType { .. } => "unrecognized-type",
            DiagnosticKind::InformalVenue => "informal",
            DiagnosticKind::RevisionServiceFailure { .. } => "revision-failed",
            DiagnosticKind::MissingTitle => "missing-title",
            DiagnosticKind::RecordFetchFailure => "fetch-failed",
            DiagnosticKind::ParseFailure { .. } => "parse-failed",
            DiagnosticKind::Halted => "halted",
        }
    }
}

/// A single issue attached to an entry key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub key: String,
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        key: impl Into<String>,
        severity: Severity,
        kind: DiagnosticKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            severity,
            kind,
            message: message.into(),
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} @ key {}: {}",
            self.severity,
            self.kind.label(),
            self.key,
            self.message
        )
    }
}

/// Append-only collection of diagnostics for one run.
///
/// Recording the same `(key, kind)` twice keeps only the first message, so
/// independent stages can report the same problem without duplicating it.
#[derive(Debug, Default)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        let duplicate = self
            .items
            .iter()
            .any(|d| d.key == diagnostic.key && d.kind == diagnostic.kind);
        if duplicate {
            return;
        }
        match diagnostic.severity {
            Severity::Error => tracing::error!(key = %diagnostic.key, kind = diagnostic.kind.label(), "{}", diagnostic.message),
            Severity::Warning => tracing::warn!(key = %diagnostic.key, kind = diagnostic.kind.label(), "{}", diagnostic.message),
            Severity::Info => tracing::info!(key = %diagnostic.key, kind = diagnostic.kind.label(), "{}", diagnostic.message),
        }
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for d in diagnostics {
            self.push(d);
        }
    }

    pub fn info(&mut self, key: &str, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::new(key, Severity::Info, kind, message));
    }

    pub fn warn(&mut self, key: &str, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::new(key, Severity::Warning, kind, message));
    }

    pub fn error(&mut self, key: &str, kind: DiagnosticKind, message: impl Into<String>) {
        self.push(Diagnostic::new(key, Severity::Error, kind, message));
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn has_blocking(&self) -> bool {
        self.items.iter().any(Diagnostic::is_blocking)
    }

    /// Consume the log, yielding diagnostics in recording order.
    pub fn finish(self) -> Vec<Diagnostic> {
        self.items
    }
}
