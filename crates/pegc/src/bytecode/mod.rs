//! Lowers the analyzed AST into a stack-based instruction stream (§4.6).
//!
//! The instruction set is deliberately small: every PEG combinator lowers
//! to a handful of jumps around a handful of match primitives, the same
//! way a regex engine compiles to a small bytecode rather than walking an
//! AST at match time. [`crate::runtime`] is the interpreter for this
//! instruction set; [`crate::emit`] is the textual equivalent.
//!
//! A handful of primitives beyond the distilled opcode list are needed to
//! make this an actually runnable bytecode rather than a sketch of one:
//! `Collect` (a sequence's per-element results have to be folded into its
//! tuple result somehow, eliding predicate elements per §4.5's `undefined`
//! typing), `AcceptSpan` (`text(e)` needs to read back
//! the substring since a saved position, not just the most recent match),
//! `Repeat` (`zeroOrMore`/`oneOrMore` need a loop, and nesting the body as
//! a sub-program is simpler and exactly as expressive as a backward jump
//! over a flat stream), and `Bind`/`Unbind` (labels need *some* runtime
//! representation; a small side environment keyed by name is simpler to
//! get right than raw stack-offset arithmetic and the generator already
//! knows each label's lexical extent from `MetadataTable`). The runtime
//! clears a rule's whole label environment when its `Call` returns, which
//! is enough to satisfy the visibility rule `passes::actions` already
//! enforces at compile time, so the generator never actually needs to
//! emit `Unbind` — it stays part of the instruction set for a future,
//! finer-grained scoping pass. `MarkRollback`/`UnwindRollbacks` back
//! `scope(e, code)`'s rollback-hook contract (§9, §4.6): `code` runs before
//! `e` and may register a hook through `ActionContext::on_rollback`; these
//! two instructions bracket `e` so the hooks registered while matching it
//! fire, in reverse order, exactly when `e` fails. Recorded in `DESIGN.md`.

mod constants;
mod gen;

pub use constants::{Constant, ConstantsPool};
pub use gen::generate;

use crate::ast::{CodeId, RuleIndex};

/// A single VM instruction.
///
/// `then_len`/`else_len` on the conditional jumps count instructions, not
/// bytes, and index into the same flat stream the jump itself lives in:
/// the generator always emits both branches inline, immediately after the
/// jump, so no separate label-patching pass over byte offsets is needed.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Pushes the current input cursor onto the position stack.
    PushCurrPos,
    /// Pops the top of the position stack, discarding it without moving
    /// the cursor (a completed match no longer needs its start position).
    Pop,
    /// Pops the top of the position stack and resets the cursor to it
    /// (undoes the input consumed since the matching `PushCurrPos`).
    PopCurrPos,
    /// Pops `n` entries from the *value* stack, discarding them.
    PopN(u32),
    /// Removes the `n` value-stack entries just below the top one, leaving
    /// the top entry in place. Used to discard a partially-matched
    /// sequence's earlier element results while keeping the failure marker
    /// the last element just pushed — `PopN` alone would discard that
    /// marker instead, since it counts from the top.
    PopNKeepTop(u32),
    /// Pushes constant `k` onto the value stack verbatim (used for the
    /// `null`/`undefined` sentinels `optional`/lookahead nodes produce).
    Load(u32),
    /// Matches the literal string at constant `k`, case-sensitively,
    /// without consuming input. Pushes a throwaway condition marker (an
    /// error marker on mismatch) for the following `IfNotError` to test;
    /// the branch that runs discards it with `PopN(1)` before pushing its
    /// real result.
    MatchString(u32),
    /// Matches the literal string at constant `k`, ignoring case, without
    /// consuming input. Same condition-marker convention as `MatchString`.
    MatchStringIc(u32),
    /// Matches one code point against the character class at constant
    /// `k`, without consuming input. Same condition-marker convention.
    MatchClass(u32),
    /// Matches any one code point, without consuming input. Same
    /// condition-marker convention.
    MatchAny,
    /// Matches only at end-of-input; consumes nothing either way. Same
    /// condition-marker convention.
    MatchEnd,
    /// Consumes `n` code points, pushing the consumed substring as the result.
    AcceptN(u32),
    /// Consumes the literal string at constant `k`, pushing it as the
    /// result (preserves source casing for a case-insensitive match).
    AcceptString(u32),
    /// Pops a saved position and pushes the input substring from that
    /// position to the current cursor, without moving the cursor. Used by
    /// `text(e)` to read back what `e` consumed.
    AcceptSpan,
    /// Pushes a failure marker recording the expected-constant `k`, for
    /// farthest-failure error reporting.
    Fail(u32),
    /// If the top of the value stack is not a failure marker, runs the
    /// next `then_len` instructions; otherwise skips them and runs the
    /// following `else_len`.
    IfNotError {
        /// Instruction count to run when the condition holds.
        then_len: u32,
        /// Instruction count to run otherwise.
        else_len: u32,
    },
    /// Like [`Instruction::IfNotError`] but with the condition inverted.
    IfError {
        /// Instruction count to run when the condition holds.
        then_len: u32,
        /// Instruction count to run otherwise.
        else_len: u32,
    },
    /// Pops the top of the value stack and, using host-language truthiness
    /// (`§6`'s semantic predicates), runs the next `then_len` instructions
    /// if it is truthy or the following `else_len` if not. Unlike
    /// `IfNotError`/`IfError`, this always pops — a predicate's host value
    /// is never itself the surrounding node's result.
    IfTruthy {
        /// Instruction count to run when the condition holds.
        then_len: u32,
        /// Instruction count to run otherwise.
        else_len: u32,
    },
    /// Invokes rule `rule_idx`, binding `args` (by name) from the current
    /// label environment for the callee to see — used for declared grammar
    /// parameters threaded through a sub-parser invocation, not ordinary
    /// `ruleRef`s (which pass no arguments).
    Call {
        /// Index of the rule to invoke.
        rule_idx: RuleIndex,
        /// Label names bound for the callee, in manifest order.
        args: Vec<String>,
    },
    /// Runs user code `code`. `args` names the labels (in manifest order)
    /// whose current bindings the host closure receives.
    Execute {
        /// Identifier of the code block to run.
        code: CodeId,
        /// Label names whose bindings are passed to the code block.
        args: Vec<String>,
    },
    /// Pops `keep.len()` values (a sequence's per-element results, oldest
    /// first) and folds them into the sequence's own result: entries at a
    /// `false` position are dropped (a `simpleAnd`/`simpleNot`/
    /// `semanticAnd`/`semanticNot` element contributes nothing — its
    /// statically `undefined` type carries no information), and the result
    /// is the single kept value unwrapped if exactly one survives, or the
    /// array of survivors (possibly empty) otherwise.
    Collect {
        /// Per-element keep flags, oldest first.
        keep: Vec<bool>,
    },
    /// Runs `body` repeatedly, collecting its successful results into an
    /// array, until `body` fails. If fewer than `min` iterations succeeded,
    /// the overall result is the failure that ended the loop; otherwise the
    /// failure is discarded and the accumulated array is pushed.
    Repeat {
        /// Instructions to run each iteration.
        body: Vec<Instruction>,
        /// Minimum number of successful iterations required.
        min: u32,
    },
    /// Suppresses failure-set recording for the duration of a lookahead.
    SilentFailsOn,
    /// Re-enables failure-set recording.
    SilentFailsOff,
    /// Binds the current top of the value stack under `name` in the label
    /// environment, without altering the value stack itself.
    Bind(String),
    /// Pops the `n` most recently bound names off the label environment.
    Unbind(u32),
    /// Snapshots the current depth of the rollback-hook stack, so a
    /// matching `UnwindRollbacks` knows how many hooks a `scope`'s own
    /// `Execute` registered (§9, §4.6: host code decides how many hooks to
    /// register at runtime, so the generator cannot emit a fixed count).
    MarkRollback,
    /// Pops every rollback hook registered since the last `MarkRollback`,
    /// running each (most recently registered first) if `run` is true, or
    /// discarding them unrun otherwise.
    UnwindRollbacks {
        /// Whether the popped hooks should be run or discarded unrun.
        run: bool,
    },
}

/// The compiled form of one rule.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// The rule's name.
    pub name: String,
    /// The rule's compiled instructions.
    pub instructions: Vec<Instruction>,
}

/// A whole compiled grammar: every rule's instructions plus the shared
/// constants pool they index into.
#[derive(Debug, Clone)]
pub struct BytecodeModule {
    /// Every compiled rule, in declaration order.
    pub rules: Vec<CompiledRule>,
    /// Shared constants pool indexed by the rules' instructions.
    pub constants: ConstantsPool,
    /// Index of the rule where matching begins.
    pub start_rule: RuleIndex,
}
