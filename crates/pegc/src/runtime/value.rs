//! Runtime values a compiled parser can produce or pass to host code.
//!
//! Host action code is opaque text this crate never parses (see
//! [`crate::ast::CodeBlock`]); the types a grammar's actions actually
//! build (numbers, strings, arrays, the odd boolean) are few enough to
//! model directly instead of shipping a generic "any JSON value" type.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::location::Location;

/// A value on the VM's value stack, or passed to/returned from host code.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JavaScript's `null`, produced by a failed `optional`.
    Null,
    /// JavaScript's `undefined`, produced by a passing lookahead or `end`.
    Undefined,
    /// A boolean value.
    Bool(bool),
    /// A numeric value.
    Number(f64),
    /// A string value.
    Str(String),
    /// A sequence result, or whatever an action explicitly returns as one.
    Array(Vec<Value>),
}

impl Value {
    /// Host-language truthiness, used by semantic predicates.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null | Value::Undefined => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_) => true,
        }
    }
}

/// A hook registered through [`ActionContext::on_rollback`], run if the
/// `scope` that registered it goes on to fail.
pub type RollbackFn = Box<dyn FnOnce() + Send>;

/// What a running action/predicate/scope closure is given to work with.
pub struct ActionContext<'a> {
    /// The labels visible at this code block, by name, in the order
    /// [`crate::metadata::MetadataTable::label_manifest`] recorded them.
    pub args: &'a HashMap<String, Value>,
    /// The substring this node matched, for code that calls `text()`.
    /// Meaningful for `action` bodies, which the generator brackets with
    /// their own position save; for code blocks it does not bracket this
    /// way (semantic predicates, `scope` bodies) it reflects whatever
    /// save is nearest on the stack, which callers should not rely on.
    pub text: &'a str,
    /// Where in the input this node's match began.
    pub location: Location,
    /// The parse's bounded rollback-hook stack (§9, §4.6). `scope(e, code)`
    /// runs `code` before attempting `e`; `code` registers a hook here if
    /// it needs to undo some side effect when `e` turns out not to match.
    /// `RefCell`-wrapped because `ActionFn` takes `&ActionContext`, not
    /// `&mut` — registration is the one piece of state a closure mutates.
    pub(crate) rollbacks: &'a RefCell<Vec<RollbackFn>>,
}

impl ActionContext<'_> {
    /// Looks up a visible label by name.
    #[must_use]
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name)
    }

    /// Registers `hook` to run if the enclosing `scope`'s expression fails.
    /// Hooks run in reverse registration order, before the cursor is
    /// restored. A no-op if `e` goes on to match.
    pub fn on_rollback(&self, hook: impl FnOnce() + Send + 'static) {
        self.rollbacks.borrow_mut().push(Box::new(hook));
    }
}

/// The result of running a host code block: either a value (for an action)
/// or a truthy/falsy verdict (for a predicate), or an explicit abort raised
/// by the action calling `error(...)`.
pub type ActionResult = Result<Value, String>;

/// A host closure bound to one [`crate::ast::CodeId`].
pub type ActionFn = Arc<dyn Fn(&ActionContext<'_>) -> ActionResult + Send + Sync>;

/// Maps every code block in a compiled grammar to the closure that
/// implements it, supplied by the caller at link time — this crate never
/// evaluates action-code text itself (§1 Non-goals).
#[derive(Clone, Default)]
pub struct ActionTable {
    entries: HashMap<crate::ast::CodeId, ActionFn>,
}

impl ActionTable {
    /// An action table with no entries bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `code` to `action`, overwriting any previous binding.
    pub fn register(&mut self, code: crate::ast::CodeId, action: ActionFn) -> &mut Self {
        self.entries.insert(code, action);
        self
    }

    /// The closure bound to `code`, if any.
    #[must_use]
    pub fn get(&self, code: crate::ast::CodeId) -> Option<&ActionFn> {
        self.entries.get(&code)
    }
}

impl std::fmt::Debug for ActionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionTable")
            .field("bound", &self.entries.len())
            .finish()
    }
}
