//! The compiler pass pipeline: reference checking, annotation processing,
//! label-visibility analysis, and type inference, run in that fixed order
//! (§4.1). Bytecode generation and emission are separate stages in
//! [`crate::bytecode`] and [`crate::emit`] — they consume this pipeline's
//! output rather than being passes over diagnostics themselves.

pub mod actions;
pub mod annotations;
pub mod reference_checker;
pub mod types;

use tracing::debug;

use crate::ast::Grammar;
use crate::diagnostics::{self, CompileError, Diagnostic};
use crate::metadata::MetadataTable;
use crate::options::{CompileOptions, Output};

/// One stage of the pipeline, for [`required_passes`] introspection and for
/// tagging `tracing` spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassId {
    /// [`reference_checker`].
    ReferenceCheck,
    /// [`annotations`].
    AnnotationProcessing,
    /// [`actions`].
    LabelVisibility,
    /// [`types`].
    TypeInference,
    /// [`crate::bytecode`].
    BytecodeGeneration,
    /// [`crate::emit`].
    Emission,
}

/// The minimal set of passes needed to produce `output`, in run order.
///
/// [`Output::Types`] stops after type inference — there is no need to
/// lower to bytecode just to report a type summary. [`Output::Parser`]
/// needs bytecode but never a textual emission step.
#[must_use]
pub fn required_passes(output: Output) -> &'static [PassId] {
    match output {
        Output::Types => &[
            PassId::ReferenceCheck,
            PassId::AnnotationProcessing,
            PassId::LabelVisibility,
            PassId::TypeInference,
        ],
        Output::Parser => &[
            PassId::ReferenceCheck,
            PassId::AnnotationProcessing,
            PassId::LabelVisibility,
            PassId::TypeInference,
            PassId::BytecodeGeneration,
        ],
        Output::Source => &[
            PassId::ReferenceCheck,
            PassId::AnnotationProcessing,
            PassId::LabelVisibility,
            PassId::TypeInference,
            PassId::BytecodeGeneration,
            PassId::Emission,
        ],
    }
}

/// Runs every analysis pass (everything up to, but not including,
/// bytecode generation and emission) over `grammar`, mutating it in place
/// and returning the metadata table those later stages need.
///
/// # Errors
///
/// Returns [`CompileError::Diagnostics`] if any pass reports a fatal
/// diagnostic. Diagnostics from every pass that ran before the failure are
/// included, not just the first one.
#[tracing::instrument(level = "debug", skip_all)]
pub fn run_analysis(
    grammar: &mut Grammar,
    options: &CompileOptions,
) -> Result<(MetadataTable, Vec<Diagnostic>), CompileError> {
    let mut all_diagnostics = Vec::new();
    let mut metadata = MetadataTable::new();

    let reference_diagnostics = reference_checker::run(grammar);
    let reference_fatal = reference_diagnostics.iter().any(Diagnostic::is_fatal);
    all_diagnostics.extend(reference_diagnostics);
    if reference_fatal {
        return Err(CompileError::Diagnostics(all_diagnostics));
    }

    let annotation_diagnostics = annotations::run(grammar, options, &mut metadata);
    let annotation_fatal = annotation_diagnostics.iter().any(Diagnostic::is_fatal);
    all_diagnostics.extend(annotation_diagnostics);
    if annotation_fatal {
        return Err(CompileError::Diagnostics(all_diagnostics));
    }

    all_diagnostics.extend(actions::run(grammar, &mut metadata));
    all_diagnostics.extend(types::run(grammar, &mut metadata));

    debug!(
        diagnostic_count = all_diagnostics.len(),
        "analysis pipeline complete"
    );

    diagnostics::finish(all_diagnostics.clone())?;
    Ok((metadata, all_diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_passes_scale_with_output() {
        assert_eq!(required_passes(Output::Types).len(), 4);
        assert_eq!(required_passes(Output::Parser).len(), 5);
        assert_eq!(required_passes(Output::Source).len(), 6);
        assert_eq!(
            *required_passes(Output::Source).last().unwrap(),
            PassId::Emission
        );
    }
}
