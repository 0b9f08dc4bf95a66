//! Compile-time configuration.
//!
//! Mirrors the knobs a grammar author would pass on a CLI or through a
//! build-tool plugin, minus the CLI itself (out of scope for this crate —
//! callers wire [`CompileOptions`] up to whatever front end they have).

use std::collections::BTreeSet;

/// What shape of output [`crate::compile`] should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    /// Emit generated parser source text.
    #[default]
    Source,
    /// Emit only a type signature summary (no executable code).
    Types,
    /// Skip emission; return an in-memory [`crate::runtime::LoadedParser`]
    /// ready to run against input text.
    Parser,
}

/// The module wrapper used when [`Output::Source`] is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// No module wrapper; a bare object/function declaration.
    Bare,
    /// `module.exports = ...` CommonJS wrapper.
    #[default]
    CommonJs,
    /// `export default ...` ES module wrapper.
    Esm,
}

/// Compile-time configuration, built with [`CompileOptions::new`] and the
/// `with_*` builder methods.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub(crate) output: Output,
    pub(crate) format: Format,
    /// Build parameters available to `@if` guards; a condition identifier
    /// is truthy iff it is present in this set.
    pub(crate) parameters: BTreeSet<String>,
    /// Downgrade every diagnostic at or below this code's default severity
    /// to a warning rather than a fatal error. `None` disables downgrading.
    pub(crate) allow_unreachable_rules: bool,
    pub(crate) trace: bool,
    /// If set, the emitted parser's `startRule` option may select this rule
    /// instead of the grammar's first rule.
    pub(crate) start_rule: Option<String>,
    /// If true, the emitter produces a streaming tokenizer instead of a
    /// one-shot parser. Out of scope for code generation in this crate
    /// (§ Non-goals); recorded here so callers can see the request was
    /// accepted and error out themselves rather than silently ignored.
    pub(crate) tokenizer: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            output: Output::default(),
            format: Format::default(),
            parameters: BTreeSet::new(),
            allow_unreachable_rules: true,
            trace: false,
            start_rule: None,
            tokenizer: false,
        }
    }
}

impl CompileOptions {
    /// Starts from the defaults: `output: Source`, `format: CommonJs`, no
    /// build parameters, unreachable-rule warnings allowed, tracing off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the requested output shape.
    #[must_use]
    pub fn with_output(mut self, output: Output) -> Self {
        self.output = output;
        self
    }

    /// Sets the module wrapper format for [`Output::Source`].
    #[must_use]
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Adds one build parameter, truthy for any `@if` condition of the same name.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>) -> Self {
        self.parameters.insert(name.into());
        self
    }

    /// Replaces the whole build parameter set.
    #[must_use]
    pub fn with_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = names.into_iter().map(Into::into).collect();
        self
    }

    /// When `false`, `W-UNREACHABLE-RULE` is escalated to a fatal error.
    #[must_use]
    pub fn with_allow_unreachable_rules(mut self, allow: bool) -> Self {
        self.allow_unreachable_rules = allow;
        self
    }

    /// Enables a `tracing` event per pass transition, at `debug` level.
    #[must_use]
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Publishes `name` as the rule the emitted parser's `startRule` option
    /// may select, in addition to the grammar's own first rule.
    #[must_use]
    pub fn with_start_rule(mut self, name: impl Into<String>) -> Self {
        self.start_rule = Some(name.into());
        self
    }

    /// Requests streaming-tokenizer emission instead of a one-shot parser.
    #[must_use]
    pub fn with_tokenizer(mut self, tokenizer: bool) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    /// The requested output shape.
    #[must_use]
    pub fn output(&self) -> Output {
        self.output
    }

    /// The requested module format.
    #[must_use]
    pub fn format(&self) -> Format {
        self.format
    }

    /// Whether `name` is present in the build parameter set.
    #[must_use]
    pub fn has_parameter(&self, name: &str) -> bool {
        self.parameters.contains(name)
    }

    /// The explicitly published start rule, if one was set.
    #[must_use]
    pub fn start_rule(&self) -> Option<&str> {
        self.start_rule.as_deref()
    }

    /// Whether streaming-tokenizer emission was requested.
    #[must_use]
    pub fn tokenizer(&self) -> bool {
        self.tokenizer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_compose() {
        let opts = CompileOptions::new()
            .with_output(Output::Parser)
            .with_format(Format::Esm)
            .with_parameter("release")
            .with_allow_unreachable_rules(false);

        assert_eq!(opts.output(), Output::Parser);
        assert_eq!(opts.format(), Format::Esm);
        assert!(opts.has_parameter("release"));
        assert!(!opts.has_parameter("debug"));
        assert!(!opts.allow_unreachable_rules);
    }

    #[test]
    fn defaults_match_documented_values() {
        let opts = CompileOptions::default();
        assert_eq!(opts.output(), Output::Source);
        assert_eq!(opts.format(), Format::CommonJs);
        assert!(opts.allow_unreachable_rules);
    }
}
