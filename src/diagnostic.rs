use std::{
    collections::HashSet,
    fmt::{self, Display, Formatter},
};

pub const SOURCE: &str = "beebasm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Information => "info",
            Severity::Hint => "hint",
        };
        write!(f, "{name}")
    }
}

/// Zero-based line with a half-open column span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub severity: Severity,
    pub span: Span,
    pub message: String,
    pub source: &'static str,
}

impl Diagnostic {
    pub fn error(span: Span, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            span,
            message: message.into(),
            source: SOURCE,
        }
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}: {}",
            self.span.line + 1,
            self.span.start + 1,
            self.severity,
            self.message
        )
    }
}

/// Drops repeats of the same diagnostic, keeping first-seen order.
pub fn dedup_diagnostics(input: &[Diagnostic]) -> Vec<Diagnostic> {
    let mut seen = HashSet::new();
    input
        .iter()
        .filter(|diag| seen.insert(*diag))
        .cloned()
        .collect()
}
