//! A Rust-native PEG compiler.
#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(clippy::multiple_crate_versions)]

/// Source locations carried on every AST node and diagnostic.
pub mod location;

/// The external AST-schema JSON contract with the bootstrap parser.
///
/// `wire` mirrors that contract's flat, serializable shape exactly; it
/// exists only to be [`ast::lower`]ed into the typed tree the rest of the
/// crate works with, and is never re-derived from.
pub mod wire;

/// The typed grammar AST every pass operates on.
pub mod ast;

/// Errors and diagnostics produced while compiling a grammar.
pub mod diagnostics;

/// Compile-time configuration.
pub mod options;

/// Per-node metadata computed by passes, stored alongside the AST.
pub mod metadata;

/// The compiler pass pipeline: reference checking, annotation processing,
/// label-visibility analysis, and type inference.
pub mod passes;

/// Lowers the analyzed AST into a stack-based instruction stream.
pub mod bytecode;

/// Textual rendering of a compiled grammar (`source`/`types` outputs).
pub mod emit;

/// The in-memory parser surface (`parser` output): a compiled grammar
/// linked against host action code, runnable directly.
pub mod runtime;

pub use ast::{Expr, Grammar, NodeId};
pub use diagnostics::{CompileError, Diagnostic, DiagnosticCode, Severity};
pub use options::{CompileOptions, Format, Output};
pub use runtime::{
    ActionContext, ActionFn, ActionResult, ActionTable, LoadedParser, ParseOptions,
    PegSyntaxError, RollbackFn, Value,
};

/// One of the three shapes [`compile`] can produce, selected by
/// [`options::CompileOptions::output`].
pub enum CompileArtifact {
    /// Full compiled-bytecode text, wrapped per [`options::Format`].
    Source(String),
    /// A type-declaration summary, one line per rule.
    Types(String),
    /// An in-memory parser, linked against the supplied [`ActionTable`]
    /// and ready to run without any further compilation step.
    Parser(LoadedParser),
}

/// The result of a successful [`compile`] call: the requested artifact,
/// plus any non-fatal diagnostics collected along the way.
pub struct CompiledGrammar {
    artifact: CompileArtifact,
    warnings: Vec<Diagnostic>,
}

impl CompiledGrammar {
    /// The artifact [`options::CompileOptions::output`] requested.
    #[must_use]
    pub fn artifact(&self) -> &CompileArtifact {
        &self.artifact
    }

    /// Consumes `self`, returning just the artifact.
    #[must_use]
    pub fn into_artifact(self) -> CompileArtifact {
        self.artifact
    }

    /// Non-fatal diagnostics (currently only `W-UNREACHABLE-RULE`)
    /// collected while compiling, in pass order.
    #[must_use]
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }
}

/// Compiles a grammar, expressed as the external AST-schema JSON contract
/// (§6), into the artifact `options` requests.
///
/// `actions` links host closures to the grammar's action/predicate/scope
/// code blocks by [`ast::CodeId`]; it is only consulted when `options`
/// requests [`Output::Parser`] and may be left empty (`ActionTable::new()`)
/// for `Source`/`Types` output, or for a grammar with no code blocks.
///
/// # Errors
///
/// Returns [`CompileError::MalformedAst`] if `grammar_json` does not match
/// the wire schema, [`CompileError::Diagnostics`] if any pass reports a
/// fatal diagnostic, or [`CompileError::UnsupportedOption`] if
/// `options.tokenizer()` is set — streaming-tokenizer codegen is out of
/// scope for this crate (see `DESIGN.md`).
#[tracing::instrument(level = "debug", skip_all)]
pub fn compile(
    grammar_json: &str,
    options: &CompileOptions,
    actions: ActionTable,
) -> Result<CompiledGrammar, CompileError> {
    if options.tokenizer() {
        return Err(CompileError::UnsupportedOption(
            "streaming tokenizer codegen is not implemented by this crate".to_string(),
        ));
    }

    let mut grammar = Grammar::from_json(grammar_json)?;
    let (metadata, diagnostics) = passes::run_analysis(&mut grammar, options)?;
    let warnings: Vec<Diagnostic> = diagnostics.into_iter().filter(|d| !d.is_fatal()).collect();

    let artifact = match options.output() {
        Output::Types => CompileArtifact::Types(emit::render_types(&grammar, &metadata)),
        Output::Parser => {
            let module = bytecode::generate(&grammar, &metadata);
            CompileArtifact::Parser(LoadedParser::new(module, actions))
        }
        Output::Source => {
            let module = bytecode::generate(&grammar, &metadata);
            CompileArtifact::Source(emit::render_source(&module, options.format()))
        }
    };

    Ok(CompiledGrammar { artifact, warnings })
}
