use std::cell::RefCell;
use std::fmt::{self, Display, Formatter};
use std::rc::Rc;

/// How severe a diagnostic is.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.pad(match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Note => "note",
        })
    }
}

/// A rendered message about a request.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Diagnostic {
    /// How serious the message is.
    pub severity: Severity,
    /// The message text.
    pub message: String,
}

impl Diagnostic {
    /// An error with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, message: message.into() }
    }

    /// A warning with the given message.
    pub fn warning(message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, message: message.into() }
    }

    /// A note with the given message.
    pub fn note(message: impl Into<String>) -> Self {
        Self { severity: Severity::Note, message: message.into() }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

/// Receives diagnostics, most notably explanations of cyclic requests.
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.push(diagnostic);
    }
}

/// Forwards diagnostics to the `tracing` subscriber.
///
/// This is the sink an evaluator uses unless it is given another one.
#[derive(Debug, Default, Copy, Clone)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => tracing::error!("{}", diagnostic.message),
            Severity::Warning => tracing::warn!("{}", diagnostic.message),
            Severity::Note => tracing::info!("{}", diagnostic.message),
        }
    }
}

/// Collects diagnostics in memory.
///
/// Clones share the same buffer, so one clone can be handed to an evaluator
/// while another one is kept for inspection.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticBuffer(Rc<RefCell<Vec<Diagnostic>>>);

impl DiagnosticBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of everything emitted so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.0.borrow().clone()
    }

    /// Remove and return everything emitted so far.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

impl DiagnosticSink for DiagnosticBuffer {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.0.borrow_mut().push(diagnostic);
    }
}

/// What an evaluator reports when it detects a cyclic request.
///
/// In every mode, the evaluation itself fails with
/// [`EvaluationError::Cycle`](crate::EvaluationError::Cycle).
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq, Hash)]
pub enum CycleDiagnostics {
    /// Report nothing.
    Silent,
    /// Let the repeated request explain the cycle and every other request on
    /// the cycle add a note to the diagnostic sink.
    #[default]
    Full,
    /// Dump the dependency tree of the active requests, with the cycle
    /// highlighted, to the evaluator's debug output.
    DebugDump,
}
