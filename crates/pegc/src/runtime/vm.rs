//! The stack-based interpreter for [`crate::bytecode::Instruction`] streams.
//!
//! One [`Vm`] is created per `parse` call and discarded when it returns
//! (§5: no state is shared between invocations). Every instruction
//! sequence obeys one invariant throughout: running it pushes exactly one
//! new entry onto the value stack, either a real result or a
//! [`StackValue::Fail`] marker, and leaves the cursor exactly where a
//! failure started or advanced past what a success consumed.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::ast::{CodeId, RuleIndex};
use crate::bytecode::{BytecodeModule, Constant, Instruction};
use crate::location::Location;
use crate::runtime::error::{FailureTracker, PegSyntaxError};
use crate::runtime::value::{ActionContext, ActionTable, RollbackFn, Value};

/// A value-stack entry: either a real result or a failure marker carrying
/// the constant index of the expectation that produced it.
#[derive(Debug, Clone)]
enum StackValue {
    Value(Value),
    Fail(u32),
}

/// Sentinel constant index used by `Match*` instructions for their
/// throwaway success/failure condition marker — never looked up in the
/// constants pool, and never allowed to escape past the branch that
/// immediately discards it with `PopN(1)`.
const NO_EXPECTATION: u32 = u32::MAX;

/// Raised when action code calls `error(msg)`, aborting the parse outright
/// rather than reporting an ordinary PEG match failure.
struct HostAbort {
    message: String,
    location: Location,
}

type StepResult = Result<(), HostAbort>;

pub(crate) struct Vm<'a> {
    module: &'a BytecodeModule,
    actions: &'a ActionTable,
    input: &'a str,
    pos: usize,
    value_stack: Vec<StackValue>,
    pos_stack: Vec<usize>,
    label_env: Vec<(String, Value)>,
    failures: FailureTracker,
    /// Bounded per-parse stack of `scope` rollback hooks (§9, §4.6).
    /// Bounded because a hook only lives between its `scope`'s `Execute`
    /// and the matching `UnwindRollbacks` — nothing accumulates across a
    /// whole parse.
    rollbacks: RefCell<Vec<RollbackFn>>,
    /// Depths into `rollbacks` snapshotted by `MarkRollback`, one per
    /// in-flight `scope`.
    rollback_marks: Vec<usize>,
}

/// The outcome of running a compiled grammar's start rule over `input`.
pub(crate) enum RunOutcome {
    Matched { value: Value, consumed: usize },
    Failed(PegSyntaxError),
}

impl<'a> Vm<'a> {
    pub(crate) fn new(module: &'a BytecodeModule, actions: &'a ActionTable, input: &'a str) -> Self {
        Self {
            module,
            actions,
            input,
            pos: 0,
            value_stack: Vec::new(),
            pos_stack: Vec::new(),
            label_env: Vec::new(),
            failures: FailureTracker::default(),
            rollbacks: RefCell::new(Vec::new()),
            rollback_marks: Vec::new(),
        }
    }

    pub(crate) fn run(mut self, start_rule: RuleIndex) -> RunOutcome {
        match self.call_rule(start_rule) {
            Ok(StackValue::Value(value)) => RunOutcome::Matched {
                value,
                consumed: self.pos,
            },
            Ok(StackValue::Fail(_)) => RunOutcome::Failed(self.failures.into_error(self.input)),
            Err(abort) => RunOutcome::Failed(PegSyntaxError::custom(abort.message, abort.location)),
        }
    }

    fn call_rule(&mut self, rule_idx: RuleIndex) -> Result<StackValue, HostAbort> {
        let mark = self.label_env.len();
        let instructions = &self.module.rules[rule_idx].instructions;
        self.exec(instructions)?;
        self.label_env.truncate(mark);
        Ok(self
            .value_stack
            .pop()
            .expect("a rule's instructions always push exactly one result"))
    }

    fn exec(&mut self, instrs: &[Instruction]) -> StepResult {
        let mut i = 0;
        while i < instrs.len() {
            match &instrs[i] {
                Instruction::PushCurrPos => self.pos_stack.push(self.pos),
                Instruction::Pop => {
                    self.pos_stack.pop();
                }
                Instruction::PopCurrPos => {
                    self.pos = self
                        .pos_stack
                        .pop()
                        .expect("PopCurrPos without a matching PushCurrPos");
                }
                Instruction::PopN(n) => {
                    let new_len = self.value_stack.len().saturating_sub(*n as usize);
                    self.value_stack.truncate(new_len);
                }
                Instruction::PopNKeepTop(n) => {
                    let top = self
                        .value_stack
                        .pop()
                        .expect("PopNKeepTop on an empty value stack");
                    let new_len = self.value_stack.len().saturating_sub(*n as usize);
                    self.value_stack.truncate(new_len);
                    self.value_stack.push(top);
                }
                Instruction::Load(k) => {
                    self.value_stack
                        .push(StackValue::Value(self.constant_value(*k)));
                }
                Instruction::MatchString(k) => self.push_match_condition(self.match_string(*k, false)),
                Instruction::MatchStringIc(k) => {
                    self.push_match_condition(self.match_string(*k, true));
                }
                Instruction::MatchClass(k) => self.push_match_condition(self.match_class(*k)),
                Instruction::MatchAny => self.push_match_condition(self.char_at(self.pos).map(char::len_utf8)),
                Instruction::MatchEnd => {
                    self.push_match_condition((self.pos >= self.input.len()).then_some(0));
                }
                Instruction::AcceptN(n) => {
                    let text = self.take_chars(*n as usize);
                    self.pos += text.len();
                    self.value_stack.push(StackValue::Value(Value::Str(text)));
                }
                Instruction::AcceptString(k) => {
                    let Constant::Str(s) = self.module.constants.get(*k) else {
                        panic!("AcceptString constant is not a string")
                    };
                    let matched = self.take_chars(s.chars().count());
                    self.pos += matched.len();
                    self.value_stack.push(StackValue::Value(Value::Str(matched)));
                }
                Instruction::AcceptSpan => {
                    let start = self
                        .pos_stack
                        .pop()
                        .expect("AcceptSpan without a matching PushCurrPos");
                    let span = self.input[start..self.pos].to_string();
                    self.value_stack.push(StackValue::Value(Value::Str(span)));
                }
                Instruction::Fail(k) => {
                    self.failures.record(self.pos, self.module.constants.get(*k));
                    self.value_stack.push(StackValue::Fail(*k));
                }
                Instruction::IfNotError { then_len, else_len } => {
                    let is_error = self.peek_is_fail();
                    i = self.branch(instrs, i, !is_error, *then_len, *else_len)?;
                    continue;
                }
                Instruction::IfError { then_len, else_len } => {
                    let is_error = self.peek_is_fail();
                    i = self.branch(instrs, i, is_error, *then_len, *else_len)?;
                    continue;
                }
                Instruction::IfTruthy { then_len, else_len } => {
                    let truthy = match self.value_stack.pop() {
                        Some(StackValue::Value(v)) => v.is_truthy(),
                        Some(StackValue::Fail(_)) | None => false,
                    };
                    i = self.branch(instrs, i, truthy, *then_len, *else_len)?;
                    continue;
                }
                Instruction::Call { rule_idx, args } => {
                    self.bind_call_args(args);
                    let result = self.call_rule(*rule_idx)?;
                    self.value_stack.push(result);
                }
                Instruction::Execute { code, args } => {
                    let result = self.execute(*code, args)?;
                    self.value_stack.push(result);
                }
                Instruction::Collect { keep } => {
                    let start = self.value_stack.len() - keep.len();
                    let values: Vec<Value> = self
                        .value_stack
                        .split_off(start)
                        .into_iter()
                        .zip(keep.iter())
                        .filter_map(|(sv, keep)| keep.then_some(sv))
                        .map(|sv| match sv {
                            StackValue::Value(v) => v,
                            StackValue::Fail(_) => {
                                panic!("Collect over a failure marker — sequence logic should have aborted first")
                            }
                        })
                        .collect();
                    let result = if values.len() == 1 {
                        values.into_iter().next().expect("length checked above")
                    } else {
                        Value::Array(values)
                    };
                    self.value_stack.push(StackValue::Value(result));
                }
                Instruction::Repeat { body, min } => self.repeat(body, *min)?,
                Instruction::SilentFailsOn => self.failures.enter_silent(),
                Instruction::SilentFailsOff => self.failures.exit_silent(),
                Instruction::Bind(name) => {
                    let value = match self.value_stack.last() {
                        Some(StackValue::Value(v)) => v.clone(),
                        Some(StackValue::Fail(_)) | None => Value::Undefined,
                    };
                    self.label_env.push((name.clone(), value));
                }
                Instruction::Unbind(n) => {
                    let new_len = self.label_env.len().saturating_sub(*n as usize);
                    self.label_env.truncate(new_len);
                }
                Instruction::MarkRollback => {
                    self.rollback_marks.push(self.rollbacks.borrow().len());
                }
                Instruction::UnwindRollbacks { run } => {
                    let mark = self
                        .rollback_marks
                        .pop()
                        .expect("UnwindRollbacks without a matching MarkRollback");
                    let hooks: Vec<RollbackFn> = self.rollbacks.borrow_mut().split_off(mark);
                    if *run {
                        for hook in hooks.into_iter().rev() {
                            hook();
                        }
                    }
                }
            }
            i += 1;
        }
        Ok(())
    }

    fn branch(
        &mut self,
        instrs: &[Instruction],
        i: usize,
        take_then: bool,
        then_len: u32,
        else_len: u32,
    ) -> Result<usize, HostAbort> {
        let then_len = then_len as usize;
        let else_len = else_len as usize;
        let then_start = i + 1;
        let else_start = then_start + then_len;
        let after = else_start + else_len;
        if take_then {
            self.exec(&instrs[then_start..else_start])?;
        } else {
            self.exec(&instrs[else_start..after])?;
        }
        Ok(after)
    }

    fn repeat(&mut self, body: &[Instruction], min: u32) -> StepResult {
        let mut results = Vec::new();
        let mut last_fail = NO_EXPECTATION;
        loop {
            self.exec(body)?;
            match self
                .value_stack
                .pop()
                .expect("a repeat body always pushes exactly one result")
            {
                StackValue::Value(v) => results.push(v),
                StackValue::Fail(k) => {
                    last_fail = k;
                    break;
                }
            }
        }
        if results.len() as u32 >= min {
            self.value_stack.push(StackValue::Value(Value::Array(results)));
        } else {
            self.value_stack.push(StackValue::Fail(last_fail));
        }
        Ok(())
    }

    fn execute(&mut self, code: CodeId, arg_names: &[String]) -> Result<StackValue, HostAbort> {
        let args: HashMap<String, Value> = arg_names
            .iter()
            .map(|name| {
                let value = self
                    .label_env
                    .iter()
                    .rev()
                    .find(|(n, _)| n == name)
                    .map_or(Value::Undefined, |(_, v)| v.clone());
                (name.clone(), value)
            })
            .collect();
        let text_start = self.pos_stack.last().copied().unwrap_or(self.pos);
        let text = &self.input[text_start..self.pos];
        let location = self.point_location(text_start);
        let context = ActionContext {
            args: &args,
            text,
            location,
            rollbacks: &self.rollbacks,
        };
        let Some(action) = self.actions.get(code) else {
            // No closure bound for this code block: treat as a no-op that
            // produces `undefined`, so grammars exercised without a full
            // action table (e.g. a bare reference/type check) still run.
            return Ok(StackValue::Value(Value::Undefined));
        };
        match action(&context) {
            Ok(value) => Ok(StackValue::Value(value)),
            Err(message) => Err(HostAbort { message, location }),
        }
    }

    fn bind_call_args(&mut self, _args: &[String]) {
        // Declared grammar parameters (as opposed to label-bound call
        // arguments) are not threaded through `ruleRef` invocations in
        // this crate; every `Call` the generator emits passes an empty
        // argument list.
    }

    fn push_match_condition(&mut self, matched_len: Option<usize>) {
        match matched_len {
            Some(_) => self.value_stack.push(StackValue::Value(Value::Undefined)),
            None => self.value_stack.push(StackValue::Fail(NO_EXPECTATION)),
        }
    }

    fn peek_is_fail(&self) -> bool {
        matches!(self.value_stack.last(), Some(StackValue::Fail(_)))
    }

    fn constant_value(&self, k: u32) -> Value {
        match self.module.constants.get(k) {
            Constant::Null => Value::Null,
            Constant::Undefined => Value::Undefined,
            Constant::Str(s) => Value::Str(s.clone()),
            Constant::Class { .. } | Constant::Expectation { .. } => {
                panic!("Load used on a non-loadable constant")
            }
        }
    }

    fn match_string(&self, k: u32, ignore_case: bool) -> Option<usize> {
        let Constant::Str(s) = self.module.constants.get(k) else {
            panic!("MatchString constant is not a string")
        };
        let n = s.chars().count();
        let slice = self.peek_chars(n)?;
        let matches = if ignore_case {
            slice.to_lowercase() == s.to_lowercase()
        } else {
            slice == s.as_str()
        };
        matches.then_some(slice.len())
    }

    fn match_class(&self, k: u32) -> Option<usize> {
        let Constant::Class {
            parts,
            inverted,
            ignore_case,
        } = self.module.constants.get(k)
        else {
            panic!("MatchClass constant is not a class")
        };
        let ch = self.char_at(self.pos)?;
        let mut hit = parts.iter().any(|p| p.contains(ch));
        if !hit && *ignore_case {
            hit = ch
                .to_lowercase()
                .chain(ch.to_uppercase())
                .any(|c| parts.iter().any(|p| p.contains(c)));
        }
        (hit != *inverted).then(|| ch.len_utf8())
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.input[offset..].chars().next()
    }

    fn peek_chars(&self, n: usize) -> Option<&str> {
        let rest = &self.input[self.pos..];
        let end = rest.char_indices().nth(n).map_or(rest.len(), |(i, _)| i);
        if rest[..end].chars().count() < n {
            return None;
        }
        Some(&rest[..end])
    }

    fn take_chars(&self, n: usize) -> String {
        self.peek_chars(n).unwrap_or("").to_string()
    }

    fn point_location(&self, offset: usize) -> Location {
        crate::runtime::error::point_location(self.input, offset)
    }
}
