//! Recursive lowering of [`Expr`] into [`Instruction`] streams.
//!
//! Every helper below returns a self-contained instruction sequence with
//! one invariant: running it leaves exactly one new value on the value
//! stack (a match result or a failure marker) and leaves the cursor either
//! advanced past what it matched (success) or exactly where it started
//! (failure) — callers never need to know which combinator produced the
//! sequence they are splicing in.

use crate::ast::{ClassPart, Expr, Grammar};
use crate::bytecode::{BytecodeModule, CompiledRule, Constant, ConstantsPool, Instruction};
use crate::metadata::MetadataTable;

struct GenCtx<'a> {
    pool: ConstantsPool,
    metadata: &'a MetadataTable,
}

/// Compiles every rule in `grammar` into a [`BytecodeModule`].
///
/// # Panics
///
/// Panics if a `ruleRef` was never resolved by
/// [`crate::passes::reference_checker`] — callers must run the analysis
/// pipeline to completion (with no fatal diagnostics) before calling this.
#[must_use]
pub fn generate(grammar: &Grammar, metadata: &MetadataTable) -> BytecodeModule {
    let mut ctx = GenCtx {
        pool: ConstantsPool::new(),
        metadata,
    };

    let rules = grammar
        .rules
        .iter()
        .map(|rule| CompiledRule {
            name: rule.name.clone(),
            instructions: compile_expr(&rule.expression, &mut ctx),
        })
        .collect();

    BytecodeModule {
        rules,
        constants: ctx.pool,
        start_rule: grammar.start_rule().unwrap_or(0),
    }
}

fn compile_expr(expr: &Expr, ctx: &mut GenCtx) -> Vec<Instruction> {
    match expr {
        Expr::Literal {
            value, ignore_case, ..
        } => literal(value, *ignore_case, ctx),
        Expr::Class {
            parts,
            inverted,
            ignore_case,
            ..
        } => class(parts, *inverted, *ignore_case, ctx),
        Expr::Any { .. } => any(ctx),
        Expr::End { .. } => end(ctx),
        Expr::RuleRef { resolved, .. } => {
            let rule_idx = resolved.expect(
                "bytecode generation requires every ruleRef to have been resolved by the reference checker",
            );
            vec![Instruction::Call {
                rule_idx,
                args: Vec::new(),
            }]
        }
        Expr::Sequence { elements, .. } => sequence(elements, ctx),
        Expr::Choice { alternatives, .. } => choice(alternatives, ctx),
        Expr::Optional { expression, .. } => optional(expression, ctx),
        Expr::ZeroOrMore { expression, .. } => repeat(expression, 0, ctx),
        Expr::OneOrMore { expression, .. } => repeat(expression, 1, ctx),
        Expr::Text { expression, .. } => text(expression, ctx),
        Expr::SimpleAnd { expression, .. } => simple_and(expression, ctx),
        Expr::SimpleNot { expression, .. } => simple_not(expression, ctx),
        Expr::SemanticAnd { id, code, .. } => semantic_predicate(*id, code.id, false, ctx),
        Expr::SemanticNot { id, code, .. } => semantic_predicate(*id, code.id, true, ctx),
        Expr::Labeled {
            label, expression, ..
        } => labeled(label, expression, ctx),
        Expr::Action {
            id,
            expression,
            code,
            ..
        } => action(*id, expression, code.id, ctx),
        Expr::Scope {
            id,
            expression,
            code,
            ..
        } => scope(*id, expression, code.id, ctx),
        Expr::Named {
            display_name,
            expression,
            ..
        } => named(display_name, expression, ctx),
        Expr::Annotated { expression, .. } => compile_expr(expression, ctx),
    }
}

fn expectation(ctx: &mut GenCtx, kind: &str, description: String) -> u32 {
    ctx.pool.intern(Constant::Expectation {
        kind: kind.to_string(),
        description,
    })
}

fn literal(value: &str, ignore_case: bool, ctx: &mut GenCtx) -> Vec<Instruction> {
    let k = ctx.pool.intern(Constant::Str(value.to_string()));
    let match_instr = if ignore_case {
        Instruction::MatchStringIc(k)
    } else {
        Instruction::MatchString(k)
    };
    let exp_k = expectation(ctx, "literal", format!("{value:?}"));
    // `Match*` leaves a throwaway condition marker on the value stack; both
    // branches discard it with `PopN(1)` before pushing their real result.
    let accept = vec![Instruction::PopN(1), Instruction::AcceptString(k)];
    let fail = vec![Instruction::PopN(1), Instruction::Fail(exp_k)];
    let mut out = vec![match_instr];
    out.push(Instruction::IfNotError {
        then_len: u32::try_from(accept.len()).unwrap(),
        else_len: u32::try_from(fail.len()).unwrap(),
    });
    out.extend(accept);
    out.extend(fail);
    out
}

fn describe_class(parts: &[ClassPart], inverted: bool) -> String {
    let mut desc = String::from("[");
    if inverted {
        desc.push('^');
    }
    for part in parts {
        match part {
            ClassPart::Single(c) => desc.push(*c),
            ClassPart::Range(begin, end) => {
                desc.push(*begin);
                desc.push('-');
                desc.push(*end);
            }
        }
    }
    desc.push(']');
    desc
}

fn class(parts: &[ClassPart], inverted: bool, ignore_case: bool, ctx: &mut GenCtx) -> Vec<Instruction> {
    let desc = describe_class(parts, inverted);
    let k = ctx.pool.intern(Constant::Class {
        parts: parts.to_vec(),
        inverted,
        ignore_case,
    });
    let exp_k = expectation(ctx, "class", desc);
    let accept = vec![Instruction::PopN(1), Instruction::AcceptN(1)];
    let fail = vec![Instruction::PopN(1), Instruction::Fail(exp_k)];
    let mut out = vec![Instruction::MatchClass(k)];
    out.push(Instruction::IfNotError {
        then_len: u32::try_from(accept.len()).unwrap(),
        else_len: u32::try_from(fail.len()).unwrap(),
    });
    out.extend(accept);
    out.extend(fail);
    out
}

fn any(ctx: &mut GenCtx) -> Vec<Instruction> {
    let exp_k = expectation(ctx, "any", "any character".to_string());
    vec![
        Instruction::MatchAny,
        Instruction::IfNotError {
            then_len: 2,
            else_len: 2,
        },
        Instruction::PopN(1),
        Instruction::AcceptN(1),
        Instruction::PopN(1),
        Instruction::Fail(exp_k),
    ]
}

fn end(ctx: &mut GenCtx) -> Vec<Instruction> {
    let undefined_k = ctx.pool.intern(Constant::Undefined);
    let exp_k = expectation(ctx, "end", "end of input".to_string());
    vec![
        Instruction::MatchEnd,
        Instruction::IfNotError {
            then_len: 2,
            else_len: 2,
        },
        Instruction::PopN(1),
        Instruction::Load(undefined_k),
        Instruction::PopN(1),
        Instruction::Fail(exp_k),
    ]
}

/// A sequence element whose own type is statically `undefined` (§4.5:
/// `simpleAnd`/`simpleNot`/`semanticAnd`/`semanticNot`) contributes nothing
/// to the sequence's result — these exist purely for their side effect on
/// control flow, never for their value. `named`/`annotated` are transparent
/// wrappers, so the check looks through them.
fn is_elided(expr: &Expr) -> bool {
    match expr {
        Expr::SimpleAnd { .. } | Expr::SimpleNot { .. } | Expr::SemanticAnd { .. } | Expr::SemanticNot { .. } => true,
        Expr::Named { expression, .. } | Expr::Annotated { expression, .. } => is_elided(expression),
        _ => false,
    }
}

fn sequence(elements: &[Expr], ctx: &mut GenCtx) -> Vec<Instruction> {
    if elements.is_empty() {
        return vec![Instruction::Collect { keep: Vec::new() }];
    }
    let mut out = vec![Instruction::PushCurrPos];
    out.extend(sequence_rest(elements, elements, 0, ctx));
    out
}

fn sequence_rest(remaining: &[Expr], all: &[Expr], done: u32, ctx: &mut GenCtx) -> Vec<Instruction> {
    let head = compile_expr(&remaining[0], ctx);
    let tail = if remaining.len() == 1 {
        let keep = all.iter().map(|e| !is_elided(e)).collect();
        vec![Instruction::Collect { keep }, Instruction::Pop]
    } else {
        sequence_rest(&remaining[1..], all, done + 1, ctx)
    };
    // The failed element just pushed a failure marker on top of `done`
    // earlier elements' results; keep that marker (it's the sequence's own
    // result) and discard only the results beneath it.
    let recover = vec![Instruction::PopNKeepTop(done), Instruction::PopCurrPos];

    let mut out = head;
    out.push(Instruction::IfNotError {
        then_len: u32::try_from(tail.len()).unwrap(),
        else_len: u32::try_from(recover.len()).unwrap(),
    });
    out.extend(tail);
    out.extend(recover);
    out
}

fn choice(alternatives: &[Expr], ctx: &mut GenCtx) -> Vec<Instruction> {
    assert!(!alternatives.is_empty(), "choice must have at least one alternative");
    choice_rest(alternatives, ctx)
}

fn choice_rest(alternatives: &[Expr], ctx: &mut GenCtx) -> Vec<Instruction> {
    let head = compile_expr(&alternatives[0], ctx);
    if alternatives.len() == 1 {
        return head;
    }
    let cleanup = vec![Instruction::PopN(1)];
    let tail = choice_rest(&alternatives[1..], ctx);

    let mut out = head;
    out.push(Instruction::IfError {
        then_len: u32::try_from(cleanup.len() + tail.len()).unwrap(),
        else_len: 0,
    });
    out.extend(cleanup);
    out.extend(tail);
    out
}

fn optional(expression: &Expr, ctx: &mut GenCtx) -> Vec<Instruction> {
    let null_k = ctx.pool.intern(Constant::Null);
    let body = compile_expr(expression, ctx);
    let recover = vec![Instruction::PopN(1), Instruction::Load(null_k)];
    let mut out = body;
    out.push(Instruction::IfError {
        then_len: u32::try_from(recover.len()).unwrap(),
        else_len: 0,
    });
    out.extend(recover);
    out
}

fn repeat(expression: &Expr, min: u32, ctx: &mut GenCtx) -> Vec<Instruction> {
    vec![Instruction::Repeat {
        body: compile_expr(expression, ctx),
        min,
    }]
}

fn text(expression: &Expr, ctx: &mut GenCtx) -> Vec<Instruction> {
    let body = compile_expr(expression, ctx);
    let success = vec![Instruction::PopN(1), Instruction::AcceptSpan];
    let failure = vec![Instruction::PopCurrPos];

    let mut out = vec![Instruction::PushCurrPos];
    out.extend(body);
    out.push(Instruction::IfNotError {
        then_len: u32::try_from(success.len()).unwrap(),
        else_len: u32::try_from(failure.len()).unwrap(),
    });
    out.extend(success);
    out.extend(failure);
    out
}

fn simple_and(expression: &Expr, ctx: &mut GenCtx) -> Vec<Instruction> {
    let undefined_k = ctx.pool.intern(Constant::Undefined);
    let body = compile_expr(expression, ctx);
    let success = vec![
        Instruction::PopN(1),
        Instruction::PopCurrPos,
        Instruction::Load(undefined_k),
    ];
    let failure = vec![Instruction::PopCurrPos];

    let mut out = vec![Instruction::PushCurrPos, Instruction::SilentFailsOn];
    out.extend(body);
    out.push(Instruction::SilentFailsOff);
    out.push(Instruction::IfNotError {
        then_len: u32::try_from(success.len()).unwrap(),
        else_len: u32::try_from(failure.len()).unwrap(),
    });
    out.extend(success);
    out.extend(failure);
    out
}

fn simple_not(expression: &Expr, ctx: &mut GenCtx) -> Vec<Instruction> {
    let undefined_k = ctx.pool.intern(Constant::Undefined);
    let exp_k = expectation(ctx, "not", "predicate failure".to_string());
    let body = compile_expr(expression, ctx);
    let matched = vec![
        Instruction::PopN(1),
        Instruction::PopCurrPos,
        Instruction::Fail(exp_k),
    ];
    let did_not_match = vec![
        Instruction::PopN(1),
        Instruction::PopCurrPos,
        Instruction::Load(undefined_k),
    ];

    let mut out = vec![Instruction::PushCurrPos, Instruction::SilentFailsOn];
    out.extend(body);
    out.push(Instruction::SilentFailsOff);
    out.push(Instruction::IfNotError {
        then_len: u32::try_from(matched.len()).unwrap(),
        else_len: u32::try_from(did_not_match.len()).unwrap(),
    });
    out.extend(matched);
    out.extend(did_not_match);
    out
}

fn semantic_predicate(
    id: crate::ast::NodeId,
    code: crate::ast::CodeId,
    negate: bool,
    ctx: &mut GenCtx,
) -> Vec<Instruction> {
    let undefined_k = ctx.pool.intern(Constant::Undefined);
    let exp_k = expectation(ctx, "predicate", "predicate failure".to_string());
    let args = label_names(id, ctx);

    let mut out = vec![Instruction::Execute { code, args }];
    // `IfTruthy` pops the host value itself (a predicate's return value is
    // never the surrounding node's result) and branches on it directly —
    // unlike a match primitive's condition marker, a predicate's truthiness
    // is data, not a pass/fail tag, so `IfNotError` cannot test it.
    let pass = vec![Instruction::Load(undefined_k)];
    let deny = vec![Instruction::Fail(exp_k)];
    let (then_len, else_len) = if negate {
        (u32::try_from(deny.len()).unwrap(), u32::try_from(pass.len()).unwrap())
    } else {
        (u32::try_from(pass.len()).unwrap(), u32::try_from(deny.len()).unwrap())
    };
    out.push(Instruction::IfTruthy { then_len, else_len });
    if negate {
        out.extend(deny);
        out.extend(pass);
    } else {
        out.extend(pass);
        out.extend(deny);
    }
    out
}

/// Rebrands any failure produced inside `expression` with `display_name`
/// (§3: `named(displayName, e)`). Wraps the child in `SilentFailsOn`/
/// `SilentFailsOff` so its own expectations never reach the farthest-failure
/// tracker, then reports a single `"other"`-kind expectation in their place
/// on failure; a success passes the child's value through untouched.
fn named(display_name: &str, expression: &Expr, ctx: &mut GenCtx) -> Vec<Instruction> {
    let exp_k = expectation(ctx, "other", display_name.to_string());
    let body = compile_expr(expression, ctx);
    let failure = vec![Instruction::PopN(1), Instruction::Fail(exp_k)];

    let mut out = vec![Instruction::SilentFailsOn];
    out.extend(body);
    out.push(Instruction::SilentFailsOff);
    out.push(Instruction::IfNotError {
        then_len: 0,
        else_len: u32::try_from(failure.len()).unwrap(),
    });
    out.extend(failure);
    out
}

fn labeled(label: &str, expression: &Expr, ctx: &mut GenCtx) -> Vec<Instruction> {
    let mut out = compile_expr(expression, ctx);
    // `Bind` is harmless to run on a failure marker too — nothing ever
    // looks a label up by name unless the compile-time visibility analysis
    // (`passes::actions`) already proved it in scope on the success path,
    // and the runtime clears a rule's whole label environment when its
    // `Call` returns, so a binding never outlives the rule invocation that
    // introduced it.
    out.push(Instruction::Bind(label.to_string()));
    out
}

fn action(
    id: crate::ast::NodeId,
    expression: &Expr,
    code: crate::ast::CodeId,
    ctx: &mut GenCtx,
) -> Vec<Instruction> {
    let args = label_names(id, ctx);
    let body = compile_expr(expression, ctx);
    // `PushCurrPos`/`Pop` bracket the body so `Execute` can read back the
    // span it matched (for action code that calls `text()`) by peeking the
    // position stack, the same trick `text(e)` itself uses. `Execute`
    // pushes its own return value without touching the body's own result
    // still sitting underneath it; `PopNKeepTop(1)` drops that leftover
    // and keeps `Execute`'s value as `action`'s one net contribution to
    // the value stack, the same discard-beneath-the-top trick `sequence`'s
    // own failure recovery uses.
    let run = vec![
        Instruction::Execute { code, args },
        Instruction::PopNKeepTop(1),
        Instruction::Pop,
    ];
    let recover = vec![Instruction::Pop];

    let mut out = vec![Instruction::PushCurrPos];
    out.extend(body);
    out.push(Instruction::IfNotError {
        then_len: u32::try_from(run.len()).unwrap(),
        else_len: u32::try_from(recover.len()).unwrap(),
    });
    out.extend(run);
    out.extend(recover);
    out
}

/// `scope(e, code)` runs `code` for its side effects (introducing bindings,
/// possibly calling [`crate::runtime::ActionContext::on_rollback`]) and
/// then matches `e`. `MarkRollback`/`UnwindRollbacks` bracket `e` so any
/// hooks `code` registered run, in reverse order, exactly when `e` fails —
/// and are simply discarded, unrun, when it matches (§9, §4.6).
fn scope(
    id: crate::ast::NodeId,
    expression: &Expr,
    code: crate::ast::CodeId,
    ctx: &mut GenCtx,
) -> Vec<Instruction> {
    let args = label_names(id, ctx);
    let body = compile_expr(expression, ctx);
    let success = vec![Instruction::UnwindRollbacks { run: false }];
    let failure = vec![Instruction::UnwindRollbacks { run: true }];

    let mut out = vec![
        Instruction::Execute { code, args },
        Instruction::PopN(1),
        Instruction::MarkRollback,
    ];
    out.extend(body);
    out.push(Instruction::IfNotError {
        then_len: u32::try_from(success.len()).unwrap(),
        else_len: u32::try_from(failure.len()).unwrap(),
    });
    out.extend(success);
    out.extend(failure);
    out
}

fn label_names(id: crate::ast::NodeId, ctx: &GenCtx) -> Vec<String> {
    ctx.metadata
        .label_manifest(id)
        .into_iter()
        .map(|(name, _, _)| name)
        .collect()
}
