//! Errors and diagnostics produced while compiling a grammar.
//!
//! Two distinct failure shapes exist. [`CompileError`] is for conditions
//! that stop compilation before any pass can run at all — a malformed wire
//! AST, or an empty grammar. Everything a pass itself finds wrong with an
//! otherwise well-formed grammar is a [`Diagnostic`], collected across all
//! passes and returned together rather than stopping at the first one.

use std::fmt;

use thiserror::Error;

use crate::location::Location;

/// Top-level failure returned by [`crate::compile`].
#[derive(Debug, Error)]
pub enum CompileError {
    /// The input JSON did not match the external AST schema contract.
    #[error("malformed grammar AST: {0}")]
    MalformedAst(String),

    /// One or more passes reported a fatal diagnostic. Warnings alone never
    /// produce this variant; [`crate::CompiledGrammar::warnings`] carries
    /// them instead.
    #[error("{} diagnostic(s) reported, {} fatal", .0.len(), .0.iter().filter(|d| d.severity == Severity::Error).count())]
    Diagnostics(Vec<Diagnostic>),

    /// A requested [`crate::options::CompileOptions`] combination this
    /// crate's emitter cannot honor (currently: `tokenizer: true` —
    /// streaming-tokenizer codegen is out of scope; see `DESIGN.md`).
    #[error("unsupported compile option: {0}")]
    UnsupportedOption(String),
}

impl CompileError {
    /// The diagnostics carried by this error, if it is the [`CompileError::Diagnostics`] variant.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::MalformedAst(_) | CompileError::UnsupportedOption(_) => &[],
            CompileError::Diagnostics(diagnostics) => diagnostics,
        }
    }
}

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Compilation cannot proceed to code generation.
    Error,
    /// Compilation proceeds; the condition is worth a grammar author's
    /// attention.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

/// A stable identifier for one kind of diagnostic condition.
///
/// Kept distinct from the human-readable message so callers (an editor
/// integration, a test assertion) can match on the condition without
/// parsing prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticCode {
    /// A `ruleRef` names a rule that is not declared anywhere in the grammar.
    UndefinedRule,
    /// Two rules in the same grammar share a name.
    DuplicateRule,
    /// An annotation name the compiler does not recognize.
    UnknownAnnotation,
    /// A grammar with zero rules has no start rule to compile from.
    EmptyGrammar,
    /// A character class range's end precedes its start.
    InvalidRange,
    /// Type inference reached a node from two paths with incompatible fixed types.
    TypeConflict,
    /// A rule is never reachable by any path from the start rule.
    UnreachableRule,
}

impl DiagnosticCode {
    /// The stable string form of this code, e.g. `"E-UNDEFINED-RULE"`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticCode::UndefinedRule => "E-UNDEFINED-RULE",
            DiagnosticCode::DuplicateRule => "E-DUPLICATE-RULE",
            DiagnosticCode::UnknownAnnotation => "E-UNKNOWN-ANNOTATION",
            DiagnosticCode::EmptyGrammar => "E-EMPTY-GRAMMAR",
            DiagnosticCode::InvalidRange => "E-INVALID-RANGE",
            DiagnosticCode::TypeConflict => "E-TYPE-CONFLICT",
            DiagnosticCode::UnreachableRule => "W-UNREACHABLE-RULE",
        }
    }

    /// The default severity for this code.
    ///
    /// Every code is fatal except [`DiagnosticCode::UnreachableRule`], which
    /// is informational — an unreachable rule does not change the meaning
    /// of anything reachable from the start rule.
    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            DiagnosticCode::UnreachableRule => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One condition reported by a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Which condition this is.
    pub code: DiagnosticCode,
    /// Error or warning. Usually [`DiagnosticCode::default_severity`], but
    /// callers may downgrade/upgrade via [`crate::options::CompileOptions`].
    pub severity: Severity,
    /// Human-readable explanation, already filled in with the specific
    /// names/values involved (e.g. the undefined rule's name).
    pub message: String,
    /// Where in the grammar source this was found, if it has a location.
    pub location: Option<Location>,
}

impl Diagnostic {
    /// Builds a diagnostic at that code's default severity.
    #[must_use]
    pub fn new(code: DiagnosticCode, message: impl Into<String>, location: Location) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
            location: Some(location),
        }
    }

    /// Builds a diagnostic with no associated source span (e.g. an empty
    /// grammar, which has no single offending node).
    #[must_use]
    pub fn without_location(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: code.default_severity(),
            message: message.into(),
            location: None,
        }
    }

    /// Whether this diagnostic stops compilation from proceeding.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.code, self.message)?;
        if let Some(location) = self.location {
            write!(
                f,
                " at {}:{}",
                location.start.line, location.start.column
            )?;
        }
        Ok(())
    }
}

/// Partitions diagnostics into fatal errors and everything else, returning
/// `Err` iff any are fatal.
///
/// This is the single point where pass output (a flat `Vec<Diagnostic>`)
/// turns into the `Result` shape [`crate::compile`] returns.
pub fn finish(diagnostics: Vec<Diagnostic>) -> Result<Vec<Diagnostic>, CompileError> {
    if diagnostics.iter().any(Diagnostic::is_fatal) {
        Err(CompileError::Diagnostics(diagnostics))
    } else {
        Ok(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_diagnostics_short_circuit_finish() {
        let warning = Diagnostic::without_location(DiagnosticCode::UnreachableRule, "rule `x`");
        assert!(finish(vec![warning.clone()]).is_ok());

        let error = Diagnostic::without_location(DiagnosticCode::EmptyGrammar, "no rules");
        match finish(vec![warning, error]) {
            Err(CompileError::Diagnostics(ds)) => assert_eq!(ds.len(), 2),
            other => panic!("expected Err(Diagnostics(_)), got {other:?}"),
        }
    }

    #[test]
    fn codes_format_as_their_stable_string() {
        assert_eq!(DiagnosticCode::UndefinedRule.to_string(), "E-UNDEFINED-RULE");
        assert_eq!(
            DiagnosticCode::UnreachableRule.default_severity(),
            Severity::Warning
        );
    }
}
