//! A small diagnostic handler. Downstream crates log through `tracing`
//! for developer-facing traces, but user-facing compiler diagnostics
//! (the ones a `cm` invocation prints) go through this collector so the
//! driver can decide to treat warnings as errors, count them, etc.

use std::fmt;

use crate::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
    Note,
    Help,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Note => "note",
            Level::Help => "help",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub span: Span,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.level, self.message)
    }
}

#[derive(Debug, Default)]
pub struct Handler {
    diagnostics: Vec<Diagnostic>,
}

impl Handler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, level: Level, message: impl Into<String>, span: Span) {
        self.diagnostics.push(Diagnostic { level, message: message.into(), span });
    }

    pub fn error(&mut self, message: impl Into<String>, span: Span) {
        self.emit(Level::Error, message, span);
    }

    pub fn warning(&mut self, message: impl Into<String>, span: Span) {
        self.emit(Level::Warning, message, span);
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == Level::Error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}
