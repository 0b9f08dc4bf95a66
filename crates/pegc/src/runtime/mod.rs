//! The in-memory parser surface produced by [`crate::compile`] with
//! [`crate::options::Output::Parser`] — a compiled grammar plus an
//! [`ActionTable`], runnable directly against input text without
//! round-tripping through emitted source (§4.7).

mod error;
mod value;
mod vm;

pub use error::{Expectation, ExpectationKind, PegSyntaxError};
pub use value::{ActionContext, ActionFn, ActionResult, ActionTable, RollbackFn, Value};

use std::sync::Arc;

use crate::ast::{CodeId, RuleIndex};
use crate::bytecode::BytecodeModule;
use crate::location::Location;
use vm::{RunOutcome, Vm};

/// Which rule a [`LoadedParser::parse_with`] call should start from, in
/// place of the grammar's own start rule (§6's `startRule` option).
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    start_rule: Option<String>,
}

impl ParseOptions {
    /// No override: use the grammar's own start rule.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts parsing from `name` instead of the grammar's first rule.
    #[must_use]
    pub fn with_start_rule(mut self, name: impl Into<String>) -> Self {
        self.start_rule = Some(name.into());
        self
    }
}

/// A compiled grammar linked against an [`ActionTable`], ready to parse
/// input without any further compilation step.
pub struct LoadedParser {
    module: BytecodeModule,
    actions: ActionTable,
}

impl LoadedParser {
    pub(crate) fn new(module: BytecodeModule, mut actions: ActionTable) -> Self {
        actions.register(CodeId::SEPARATOR_FLATTEN, Arc::new(separator_flatten));
        Self { module, actions }
    }

    /// Parses `input` from the grammar's start rule.
    ///
    /// # Errors
    ///
    /// Returns [`PegSyntaxError`] if `input` is not admitted by the
    /// grammar, or is only a strict prefix of it — matching this
    /// lineage's `parse()` contract of consuming the whole input, not
    /// just a leading match.
    pub fn parse(&self, input: &str) -> Result<Value, PegSyntaxError> {
        self.parse_from(input, self.module.start_rule)
    }

    /// Parses `input`, honoring `options.start_rule` if set.
    ///
    /// # Errors
    ///
    /// Returns [`PegSyntaxError`] for an unadmitted input, or if
    /// `options` names a rule this grammar does not declare.
    pub fn parse_with(&self, input: &str, options: &ParseOptions) -> Result<Value, PegSyntaxError> {
        let rule_idx = match &options.start_rule {
            Some(name) => self.rule_index(name).ok_or_else(|| {
                PegSyntaxError::custom(
                    format!("no such start rule: {name}"),
                    Location::synthetic(),
                )
            })?,
            None => self.module.start_rule,
        };
        self.parse_from(input, rule_idx)
    }

    /// The rules this grammar publishes, in declaration order.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&str> {
        self.module.rules.iter().map(|r| r.name.as_str()).collect()
    }

    fn rule_index(&self, name: &str) -> Option<RuleIndex> {
        self.module.rules.iter().position(|r| r.name == name)
    }

    fn parse_from(&self, input: &str, rule_idx: RuleIndex) -> Result<Value, PegSyntaxError> {
        match Vm::new(&self.module, &self.actions, input).run(rule_idx) {
            RunOutcome::Matched { value, consumed } if consumed == input.len() => Ok(value),
            RunOutcome::Matched { consumed, .. } => Err(trailing_input_error(input, consumed)),
            RunOutcome::Failed(error) => Err(error),
        }
    }
}

/// The built-in closure behind [`CodeId::SEPARATOR_FLATTEN`]: collapses
/// the `@separator` rewrite's `[first, [[sep, item], ...]]` shape down to
/// `[first, item, ...]`, dropping the separator occurrences (§4.3, §8
/// scenario 6). Always registered by [`LoadedParser::new`], so it runs
/// regardless of what `ActionTable` the caller links in.
fn separator_flatten(ctx: &ActionContext<'_>) -> ActionResult {
    let first = ctx
        .arg(crate::passes::annotations::SEPARATOR_FIRST_LABEL)
        .cloned()
        .unwrap_or(Value::Undefined);
    let rest = ctx
        .arg(crate::passes::annotations::SEPARATOR_REST_LABEL)
        .cloned()
        .unwrap_or_else(|| Value::Array(Vec::new()));

    let mut result = vec![first];
    if let Value::Array(pairs) = rest {
        for pair in pairs {
            if let Value::Array(items) = pair {
                if let Some(last) = items.last() {
                    result.push(last.clone());
                }
            }
        }
    }
    Ok(Value::Array(result))
}

fn trailing_input_error(input: &str, offset: usize) -> PegSyntaxError {
    let found = input[offset..].chars().next();
    let found_desc = found.map_or_else(|| "end of input".to_string(), |c| format!("{c:?}"));
    PegSyntaxError {
        message: format!("Expected end of input but {found_desc} found"),
        location: error::point_location(input, offset),
        found,
        expected: vec![Expectation {
            kind: ExpectationKind::End,
            description: "end of input".to_string(),
        }],
    }
}
