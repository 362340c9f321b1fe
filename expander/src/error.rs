use std::ops::Range;
use std::path::PathBuf;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use splice::format::FormatError;
use splice::scanner::ScanError;
use splice::units::UnitError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalErrorKind {
    #[error("{0}")]
    Raised(String),
    #[error(transparent)]
    Unit(#[from] UnitError),
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// An error raised by a script evaluator. `span` is relative to the
/// evaluated fragment.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub span: Option<Range<usize>>,
}

impl EvalError {
    pub fn raised(message: impl Into<String>) -> Self {
        EvalError {
            kind: EvalErrorKind::Raised(message.into()),
            span: None,
        }
    }

    /// Attach a location unless one is already known.
    pub fn at(mut self, span: Range<usize>) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }
}

impl From<UnitError> for EvalError {
    fn from(err: UnitError) -> Self {
        EvalError {
            kind: EvalErrorKind::Unit(err),
            span: None,
        }
    }
}

impl From<FormatError> for EvalError {
    fn from(err: FormatError) -> Self {
        EvalError {
            kind: EvalErrorKind::Format(err),
            span: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InclusionError {
    #[error("included file `{path}` not found")]
    NotFound {
        path: String,
        /// Directory that was listed for the note.
        searched: Option<PathBuf>,
        nearby: Vec<String>,
    },
    #[error("include cycle: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },
    #[error("cannot read `{path}`: {message}")]
    Io { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("{0}")]
    Eval(String),
    #[error(transparent)]
    Unit(UnitError),
    #[error(transparent)]
    Format(FormatError),
    #[error(transparent)]
    Inclusion(#[from] InclusionError),
}

impl From<EvalErrorKind> for ErrorKind {
    fn from(kind: EvalErrorKind) -> Self {
        match kind {
            EvalErrorKind::Raised(message) => ErrorKind::Eval(message),
            EvalErrorKind::Unit(err) => ErrorKind::Unit(err),
            EvalErrorKind::Format(err) => ErrorKind::Format(err),
        }
    }
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Scan(_) => "scan",
            ErrorKind::Eval(_) => "eval",
            ErrorKind::Unit(_) => "unit",
            ErrorKind::Format(_) => "format",
            ErrorKind::Inclusion(_) => "include",
        }
    }
}

/// A fatal expansion error located in one of the session's files.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}")]
pub struct ExpandError {
    pub kind: ErrorKind,
    pub span: Range<usize>,
    pub file_id: usize,
    pub notes: Vec<String>,
}

impl ExpandError {
    pub fn new(kind: impl Into<ErrorKind>, span: Range<usize>, file_id: usize) -> Self {
        ExpandError {
            kind: kind.into(),
            span,
            file_id,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self) -> Diagnostic<usize> {
        Diagnostic::error()
            .with_message(self.kind.to_string())
            .with_code(self.kind.code())
            .with_labels(vec![Label::primary(self.file_id, self.span.clone())])
            .with_notes(self.notes.clone())
    }
}
