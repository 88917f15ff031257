use std::fmt;

use thiserror::Error;

/// Classification of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Malformed indentation, unterminated block, unparsable statement or expression.
    Parse,
    /// Undefined variable or function reference.
    Name,
    /// Wrong value kind passed to a built-in or operator.
    Type,
    /// Malformed or operator-incompatible expression at run time.
    Evaluation,
    /// Missing or unreadable file, missing module folder.
    Io,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Parse => "ParseError",
            DiagnosticKind::Name => "NameError",
            DiagnosticKind::Type => "TypeError",
            DiagnosticKind::Evaluation => "EvaluationError",
            DiagnosticKind::Io => "IOError",
        };
        f.write_str(name)
    }
}

/// Rich diagnostic information surfaced to end users.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// 1-based source line of the statement that failed.
    pub line: Option<usize>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            notes: Vec::new(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Parse, message)
    }

    pub fn name(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Name, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Type, message)
    }

    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Evaluation, message)
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Io, message)
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Unified error type for the Forge interpreter.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),
}

impl ForgeError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ForgeError::Diagnostic(diag) => diag.kind,
            ForgeError::Io(_) => DiagnosticKind::Io,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            ForgeError::Diagnostic(diag) => diag.line,
            ForgeError::Io(_) => None,
        }
    }

    /// Attaches `line` unless a deeper statement already claimed the error.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            ForgeError::Diagnostic(diag) if diag.line.is_none() => {
                ForgeError::Diagnostic(diag.with_line(line))
            }
            ForgeError::Io(err) => {
                ForgeError::Diagnostic(Diagnostic::io(err.to_string()).with_line(line))
            }
            other => other,
        }
    }

    pub fn with_note(self, note: impl Into<String>) -> Self {
        match self {
            ForgeError::Diagnostic(diag) => ForgeError::Diagnostic(diag.with_note(note)),
            ForgeError::Io(err) => {
                ForgeError::Diagnostic(Diagnostic::io(err.to_string()).with_note(note))
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ForgeError>;
