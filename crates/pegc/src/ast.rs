//! The typed grammar AST every pass operates on.
//!
//! [`Expr`] is the tagged sum type described by the specification: one
//! variant per PEG combinator, each carrying exactly the payload that
//! combinator needs. It is produced by [`lower`] from the wire-format tree
//! in [`crate::wire`] (the bootstrap parser's actual output shape) and is
//! never round-tripped back through JSON; passes mutate it in place.

use std::collections::BTreeSet;

use crate::location::Location;
use crate::wire;

/// Identifies an [`Expr`] node for the lifetime of a single compilation.
///
/// Dense and assigned in depth-first order during lowering, so it doubles
/// as a stable key into the side tables passes use to attach derived
/// metadata (see [`crate::metadata`]) without extending the AST itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Identifies an opaque host-code block (an action, predicate, scope body,
/// or the grammar initializer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodeId(pub u32);

impl CodeId {
    /// Identity reserved for the `@separator` rewrite's synthesized
    /// flattening action (`passes::annotations::apply_separator`). Never
    /// collides with a lowered grammar's own code blocks: [`lower`]'s
    /// counter starts at 0 and advances once per real code block found in
    /// the source, and no realistic grammar has anywhere near `u32::MAX`
    /// of them.
    pub const SEPARATOR_FLATTEN: CodeId = CodeId(u32::MAX);
}

/// The index of a [`Rule`] in [`Grammar::rules`].
///
/// Rules form a cyclic graph; storing them in a flat table and referring to
/// them by index (rather than by direct reference) sidesteps the cycle
/// entirely, both here and in the bytecode's `Call`/`Rule` instructions.
pub type RuleIndex = usize;

/// An opaque block of host-language source text.
///
/// The compiler never parses this text — only [`crate::passes::actions`]
/// inspects it, and only to conservatively scan for identifier references
/// that might be labels. The emitter places the text verbatim into a named
/// closure; the in-memory runtime looks it up by `id` in an
/// [`crate::runtime::ActionTable`] supplied at link time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Stable identity for this occurrence of host code.
    pub id: CodeId,
    /// The verbatim source text, exactly as written in the grammar.
    pub source: String,
}

/// One endpoint of a character class: a single code point or an inclusive
/// range of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassPart {
    /// Matches exactly this code point.
    Single(char),
    /// Matches any code point in `begin..=end`.
    Range(char, char),
}

impl ClassPart {
    /// Whether `ch` falls inside this part.
    #[must_use]
    pub fn contains(&self, ch: char) -> bool {
        match self {
            ClassPart::Single(c) => *c == ch,
            ClassPart::Range(begin, end) => (*begin..=*end).contains(&ch),
        }
    }

    /// A range is invalid (`E-INVALID-RANGE`) when its end precedes its
    /// start — there is no way to express an empty range in the class
    /// syntax, so this always indicates a mistake in the grammar source.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            ClassPart::Single(_) => true,
            ClassPart::Range(begin, end) => begin <= end,
        }
    }
}

/// A literal value appearing inside a generic annotation's parameter list.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    /// A quoted string, e.g. the `T` in `@type(type: "Foo")`.
    Str(String),
    /// A numeric literal.
    Number(f64),
    /// `true` / `false`.
    Bool(bool),
    /// A bare identifier reference, e.g. `expr` in `@separator(expr: comma)`.
    Ident(String),
    /// A bracketed list of literals.
    Array(Vec<AnnotationValue>),
}

/// An annotation attached to a [`Rule`] or to one alternative of a `choice`.
#[derive(Debug, Clone)]
pub enum Annotation {
    /// `@if(cond1, cond2, …)` — guards the annotated node on build parameters.
    If {
        /// Identifiers that must all be present (truthy) in the build
        /// parameter set for the guard to pass.
        conditions: BTreeSet<String>,
        /// Source span of the annotation itself.
        location: Location,
    },
    /// Any other `@name(key: value, …)` annotation (`token`, `separator`,
    /// `type`, or an annotation this crate does not recognize).
    Generic {
        /// The annotation's bare name, e.g. `"separator"`.
        name: String,
        /// Its `identifier: value` parameter list, in source order.
        parameters: Vec<(String, AnnotationValue)>,
        /// Source span of the annotation itself.
        location: Location,
    },
}

impl Annotation {
    /// Source span of this annotation.
    #[must_use]
    pub fn location(&self) -> Location {
        match self {
            Annotation::If { location, .. } | Annotation::Generic { location, .. } => *location,
        }
    }

    /// The single parameter value for `key`, if present.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&AnnotationValue> {
        match self {
            Annotation::If { .. } => None,
            Annotation::Generic { parameters, .. } => {
                parameters.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
        }
    }
}

/// A named production: an expression body plus the metadata attached to it
/// in the grammar source.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Unique within the grammar (enforced by the reference checker).
    pub name: String,
    /// Optional human-readable name used in error messages in place of
    /// `name`.
    pub display_name: Option<String>,
    /// Annotations attached directly to the rule (as opposed to one of its
    /// `choice` alternatives).
    pub annotations: Vec<Annotation>,
    /// The rule's body.
    pub expression: Expr,
    /// Source span covering the whole rule, including annotations.
    pub location: Location,
}

/// The root of a grammar: an ordered rule table plus grammar-wide
/// declarations.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    /// Host code executed once before any rule runs. Supplements top-level
    /// helper definitions referenced from action code.
    pub initializer: Option<CodeBlock>,
    /// Declared grammar parameters, threaded into the emitted module's
    /// function signature when a sub-parser format requires it. Distinct
    /// from the `parameters` compile option, which only feeds `@if`.
    pub parameters: Vec<String>,
    /// Every rule, in declaration order. The first rule is the start rule.
    pub rules: Vec<Rule>,
}

impl Grammar {
    /// Parses the external AST-schema JSON contract (§6) into a [`Grammar`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::diagnostics::CompileError::MalformedAst`] if `json`
    /// does not match the wire schema.
    pub fn from_json(json: &str) -> Result<Self, crate::diagnostics::CompileError> {
        let wire: wire::WireGrammar = facet_json::from_str(json)
            .map_err(|e| crate::diagnostics::CompileError::MalformedAst(e.to_string()))?;
        Ok(lower(wire))
    }

    /// Index of the start rule (the first rule), or `None` for an empty
    /// grammar.
    #[must_use]
    pub fn start_rule(&self) -> Option<RuleIndex> {
        if self.rules.is_empty() {
            None
        } else {
            Some(0)
        }
    }

    /// Looks up a rule by name.
    #[must_use]
    pub fn rule_index(&self, name: &str) -> Option<RuleIndex> {
        self.rules.iter().position(|r| r.name == name)
    }
}

/// The PEG expression sum type (§3).
///
/// Every variant carries its own [`NodeId`] and [`Location`]; use
/// [`Expr::id`] / [`Expr::location`] rather than matching on every variant
/// when only the common fields are needed.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Matches the fixed string `value`.
    Literal {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Literal string value.
        value: String,
        /// Whether matching ignores case.
        ignore_case: bool,
    },
    /// Matches one code point against `parts`.
    Class {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Character class members.
        parts: Vec<ClassPart>,
        /// Whether the class is negated.
        inverted: bool,
        /// Whether matching ignores case.
        ignore_case: bool,
    },
    /// Matches any one code point; fails at end-of-input.
    Any {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
    },
    /// Succeeds only at end-of-input; consumes nothing.
    End {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
    },
    /// Invokes another rule by name.
    RuleRef {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Referenced rule name.
        name: String,
        /// Filled in by the reference-checking pass once `name` is known to
        /// resolve. `None` before that pass runs or after it fails.
        resolved: Option<RuleIndex>,
    },
    /// Matches every element in order; result is the tuple of sub-results.
    Sequence {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Sequence elements, matched in order.
        elements: Vec<Expr>,
    },
    /// Tries each alternative in order, committing on the first success.
    Choice {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Choice alternatives, tried in order.
        alternatives: Vec<Expr>,
    },
    /// Zero-or-one repetition of `expression`.
    Optional {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Sub-expression this node wraps.
        expression: Box<Expr>,
    },
    /// Zero-or-more repetition of `expression`.
    ZeroOrMore {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Sub-expression this node wraps.
        expression: Box<Expr>,
    },
    /// One-or-more repetition of `expression`.
    OneOrMore {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Sub-expression this node wraps.
        expression: Box<Expr>,
    },
    /// Matches `expression`, but returns the matched substring.
    Text {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Sub-expression this node wraps.
        expression: Box<Expr>,
    },
    /// Positive lookahead: consumes nothing, succeeds iff `expression`
    /// would match.
    SimpleAnd {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Sub-expression this node wraps.
        expression: Box<Expr>,
    },
    /// Negative lookahead: consumes nothing, succeeds iff `expression`
    /// would not match.
    SimpleNot {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Sub-expression this node wraps.
        expression: Box<Expr>,
    },
    /// Positive semantic predicate: consumes nothing, succeeds iff `code`
    /// returns truthy.
    SemanticAnd {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Embedded code block.
        code: CodeBlock,
    },
    /// Negative semantic predicate.
    SemanticNot {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Embedded code block.
        code: CodeBlock,
    },
    /// Binds the result of `expression` under `label` for enclosing action
    /// code.
    Labeled {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Binding name for the matched result.
        label: String,
        /// Sub-expression this node wraps.
        expression: Box<Expr>,
    },
    /// Matches `expression`, then runs `code`; its return value replaces
    /// the match result.
    Action {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Sub-expression this node wraps.
        expression: Box<Expr>,
        /// Embedded code block.
        code: CodeBlock,
    },
    /// Runs `code` before attempting `expression`; `code` may introduce
    /// bindings visible inside `expression`.
    Scope {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Sub-expression this node wraps.
        expression: Box<Expr>,
        /// Embedded code block.
        code: CodeBlock,
    },
    /// Rebrands failures produced inside `expression` with `display_name`.
    Named {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Name used to rebrand failures.
        display_name: String,
        /// Sub-expression this node wraps.
        expression: Box<Expr>,
    },
    /// Carries its own annotation list, independent of the enclosing rule's.
    /// Used for `@if`/`@token`/`@separator`/`@type` attached to a single
    /// `choice` alternative rather than to the whole rule.
    Annotated {
        /// Stable node identity.
        id: NodeId,
        /// Source location of this node.
        location: Location,
        /// Annotations attached to this node.
        annotations: Vec<Annotation>,
        /// Sub-expression this node wraps.
        expression: Box<Expr>,
    },
}

impl Expr {
    /// The node's stable identity.
    #[must_use]
    pub fn id(&self) -> NodeId {
        match self {
            Expr::Literal { id, .. }
            | Expr::Class { id, .. }
            | Expr::Any { id, .. }
            | Expr::End { id, .. }
            | Expr::RuleRef { id, .. }
            | Expr::Sequence { id, .. }
            | Expr::Choice { id, .. }
            | Expr::Optional { id, .. }
            | Expr::ZeroOrMore { id, .. }
            | Expr::OneOrMore { id, .. }
            | Expr::Text { id, .. }
            | Expr::SimpleAnd { id, .. }
            | Expr::SimpleNot { id, .. }
            | Expr::SemanticAnd { id, .. }
            | Expr::SemanticNot { id, .. }
            | Expr::Labeled { id, .. }
            | Expr::Action { id, .. }
            | Expr::Scope { id, .. }
            | Expr::Named { id, .. }
            | Expr::Annotated { id, .. } => *id,
        }
    }

    /// The node's source span.
    #[must_use]
    pub fn location(&self) -> Location {
        match self {
            Expr::Literal { location, .. }
            | Expr::Class { location, .. }
            | Expr::Any { location, .. }
            | Expr::End { location, .. }
            | Expr::RuleRef { location, .. }
            | Expr::Sequence { location, .. }
            | Expr::Choice { location, .. }
            | Expr::Optional { location, .. }
            | Expr::ZeroOrMore { location, .. }
            | Expr::OneOrMore { location, .. }
            | Expr::Text { location, .. }
            | Expr::SimpleAnd { location, .. }
            | Expr::SimpleNot { location, .. }
            | Expr::SemanticAnd { location, .. }
            | Expr::SemanticNot { location, .. }
            | Expr::Labeled { location, .. }
            | Expr::Action { location, .. }
            | Expr::Scope { location, .. }
            | Expr::Named { location, .. }
            | Expr::Annotated { location, .. } => *location,
        }
    }

    /// Immediate children, in evaluation order.
    ///
    /// Leaf kinds (`Literal`, `Class`, `Any`, `End`, `RuleRef`,
    /// `SemanticAnd`, `SemanticNot`) return an empty vector.
    #[must_use]
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Literal { .. }
            | Expr::Class { .. }
            | Expr::Any { .. }
            | Expr::End { .. }
            | Expr::RuleRef { .. }
            | Expr::SemanticAnd { .. }
            | Expr::SemanticNot { .. } => Vec::new(),
            Expr::Sequence { elements, .. } => elements.iter().collect(),
            Expr::Choice { alternatives, .. } => alternatives.iter().collect(),
            Expr::Optional { expression, .. }
            | Expr::ZeroOrMore { expression, .. }
            | Expr::OneOrMore { expression, .. }
            | Expr::Text { expression, .. }
            | Expr::SimpleAnd { expression, .. }
            | Expr::SimpleNot { expression, .. }
            | Expr::Labeled { expression, .. }
            | Expr::Action { expression, .. }
            | Expr::Scope { expression, .. }
            | Expr::Named { expression, .. }
            | Expr::Annotated { expression, .. } => vec![expression.as_ref()],
        }
    }

    /// Mutable immediate children, in evaluation order.
    #[must_use]
    pub fn children_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Expr::Literal { .. }
            | Expr::Class { .. }
            | Expr::Any { .. }
            | Expr::End { .. }
            | Expr::RuleRef { .. }
            | Expr::SemanticAnd { .. }
            | Expr::SemanticNot { .. } => Vec::new(),
            Expr::Sequence { elements, .. } => elements.iter_mut().collect(),
            Expr::Choice { alternatives, .. } => alternatives.iter_mut().collect(),
            Expr::Optional { expression, .. }
            | Expr::ZeroOrMore { expression, .. }
            | Expr::OneOrMore { expression, .. }
            | Expr::Text { expression, .. }
            | Expr::SimpleAnd { expression, .. }
            | Expr::SimpleNot { expression, .. }
            | Expr::Labeled { expression, .. }
            | Expr::Action { expression, .. }
            | Expr::Scope { expression, .. }
            | Expr::Named { expression, .. }
            | Expr::Annotated { expression, .. } => vec![expression.as_mut()],
        }
    }

    /// The canonical name of this node's variant, used in diagnostics and
    /// trace logging.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Literal { .. } => "literal",
            Expr::Class { .. } => "class",
            Expr::Any { .. } => "any",
            Expr::End { .. } => "end",
            Expr::RuleRef { .. } => "ruleRef",
            Expr::Sequence { .. } => "sequence",
            Expr::Choice { .. } => "choice",
            Expr::Optional { .. } => "optional",
            Expr::ZeroOrMore { .. } => "zeroOrMore",
            Expr::OneOrMore { .. } => "oneOrMore",
            Expr::Text { .. } => "text",
            Expr::SimpleAnd { .. } => "simpleAnd",
            Expr::SimpleNot { .. } => "simpleNot",
            Expr::SemanticAnd { .. } => "semanticAnd",
            Expr::SemanticNot { .. } => "semanticNot",
            Expr::Labeled { .. } => "labeled",
            Expr::Action { .. } => "action",
            Expr::Scope { .. } => "scope",
            Expr::Named { .. } => "named",
            Expr::Annotated { .. } => "annotated",
        }
    }
}

/// Lowers a wire-format grammar into the typed [`Grammar`]/[`Expr`] tree,
/// assigning dense [`NodeId`]s and [`CodeId`]s in depth-first order.
#[must_use]
pub fn lower(wire: wire::WireGrammar) -> Grammar {
    let mut ctx = Lowerer::default();
    let rules = wire
        .rules
        .into_iter()
        .map(|r| ctx.lower_rule(r))
        .collect();
    Grammar {
        initializer: wire.initializer.map(|src| ctx.code_block(src)),
        parameters: wire.parameters,
        rules,
    }
}

#[derive(Default)]
struct Lowerer {
    next_node_id: u32,
    next_code_id: u32,
}

impl Lowerer {
    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    fn code_block(&mut self, source: String) -> CodeBlock {
        let id = CodeId(self.next_code_id);
        self.next_code_id += 1;
        CodeBlock { id, source }
    }

    fn lower_rule(&mut self, wire: wire::WireRule) -> Rule {
        Rule {
            name: wire.name,
            display_name: wire.display_name,
            annotations: wire
                .annotations
                .into_iter()
                .map(|a| self.lower_annotation(a))
                .collect(),
            expression: self.lower_expr(wire.expression),
            location: wire.location,
        }
    }

    fn lower_annotation(&mut self, wire: wire::WireAnnotation) -> Annotation {
        if wire.name == "if" {
            Annotation::If {
                conditions: wire.conditions.into_iter().collect(),
                location: wire.location,
            }
        } else {
            Annotation::Generic {
                name: wire.name,
                parameters: wire
                    .parameters
                    .into_iter()
                    .map(|p| (p.key, lower_literal(p.value)))
                    .collect(),
                location: wire.location,
            }
        }
    }

    fn lower_expr(&mut self, wire: wire::WireNode) -> Expr {
        let id = self.node_id();
        let location = wire.location;
        match wire.kind {
            wire::WireKind::Literal => Expr::Literal {
                id,
                location,
                value: wire.value.unwrap_or_default(),
                ignore_case: wire.ignore_case.unwrap_or(false),
            },
            wire::WireKind::Class => Expr::Class {
                id,
                location,
                parts: wire
                    .parts
                    .unwrap_or_default()
                    .into_iter()
                    .map(|p| match p.end {
                        Some(end) => ClassPart::Range(p.begin, end),
                        None => ClassPart::Single(p.begin),
                    })
                    .collect(),
                inverted: wire.inverted.unwrap_or(false),
                ignore_case: wire.ignore_case.unwrap_or(false),
            },
            wire::WireKind::Any => Expr::Any { id, location },
            wire::WireKind::End => Expr::End { id, location },
            wire::WireKind::RuleRef => Expr::RuleRef {
                id,
                location,
                name: wire.name.unwrap_or_default(),
                resolved: None,
            },
            wire::WireKind::Sequence => Expr::Sequence {
                id,
                location,
                elements: wire
                    .elements
                    .unwrap_or_default()
                    .into_iter()
                    .map(|e| self.lower_expr(e))
                    .collect(),
            },
            wire::WireKind::Choice => Expr::Choice {
                id,
                location,
                alternatives: wire
                    .alternatives
                    .unwrap_or_default()
                    .into_iter()
                    .map(|e| self.lower_expr(e))
                    .collect(),
            },
            wire::WireKind::Optional => Expr::Optional {
                id,
                location,
                expression: self.lower_child(wire.expression),
            },
            wire::WireKind::ZeroOrMore => Expr::ZeroOrMore {
                id,
                location,
                expression: self.lower_child(wire.expression),
            },
            wire::WireKind::OneOrMore => Expr::OneOrMore {
                id,
                location,
                expression: self.lower_child(wire.expression),
            },
            wire::WireKind::Text => Expr::Text {
                id,
                location,
                expression: self.lower_child(wire.expression),
            },
            wire::WireKind::SimpleAnd => Expr::SimpleAnd {
                id,
                location,
                expression: self.lower_child(wire.expression),
            },
            wire::WireKind::SimpleNot => Expr::SimpleNot {
                id,
                location,
                expression: self.lower_child(wire.expression),
            },
            wire::WireKind::SemanticAnd => Expr::SemanticAnd {
                id,
                location,
                code: self.code_block(wire.code.unwrap_or_default()),
            },
            wire::WireKind::SemanticNot => Expr::SemanticNot {
                id,
                location,
                code: self.code_block(wire.code.unwrap_or_default()),
            },
            wire::WireKind::Labeled => Expr::Labeled {
                id,
                location,
                label: wire.name.unwrap_or_default(),
                expression: self.lower_child(wire.expression),
            },
            wire::WireKind::Action => Expr::Action {
                id,
                location,
                expression: self.lower_child(wire.expression),
                code: self.code_block(wire.code.unwrap_or_default()),
            },
            wire::WireKind::Scope => Expr::Scope {
                id,
                location,
                expression: self.lower_child(wire.expression),
                code: self.code_block(wire.code.unwrap_or_default()),
            },
            wire::WireKind::Named => Expr::Named {
                id,
                location,
                display_name: wire.display_name.unwrap_or_default(),
                expression: self.lower_child(wire.expression),
            },
            wire::WireKind::Annotated => Expr::Annotated {
                id,
                location,
                annotations: wire
                    .annotations
                    .unwrap_or_default()
                    .into_iter()
                    .map(|a| self.lower_annotation(a))
                    .collect(),
                expression: self.lower_child(wire.expression),
            },
        }
    }

    fn lower_child(&mut self, expression: Option<Box<wire::WireNode>>) -> Box<Expr> {
        let wire = expression.expect("unary wire node missing its child expression");
        Box::new(self.lower_expr(*wire))
    }
}

fn lower_literal(wire: wire::WireLiteral) -> AnnotationValue {
    match wire {
        wire::WireLiteral::Str(s) => AnnotationValue::Str(s),
        wire::WireLiteral::Number(n) => AnnotationValue::Number(n),
        wire::WireLiteral::Bool(b) => AnnotationValue::Bool(b),
        wire::WireLiteral::Ident(i) => AnnotationValue::Ident(i),
        wire::WireLiteral::Array(items) => {
            AnnotationValue::Array(items.into_iter().map(lower_literal).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit(value: &str) -> wire::WireNode {
        wire::WireNode {
            kind: wire::WireKind::Literal,
            /// Source location of this node.
            location: Location::synthetic(),
            /// Literal string value.
            value: Some(value.to_string()),
            /// Whether matching ignores case.
            ignore_case: Some(false),
            /// Character class members.
            parts: None,
            /// Whether the class is negated.
            inverted: None,
            /// Referenced rule name.
            name: None,
            /// Name used to rebrand failures.
            display_name: None,
            /// Sequence elements, matched in order.
            elements: None,
            /// Choice alternatives, tried in order.
            alternatives: None,
            /// Sub-expression this node wraps.
            expression: None,
            /// Embedded code block.
            code: None,
            /// Annotations attached to this node.
            annotations: None,
        }
    }

    #[test]
    fn lowers_a_flat_sequence() {
        let wire = wire::WireGrammar {
            initializer: None,
            parameters: Vec::new(),
            rules: vec![wire::WireRule {
                /// Referenced rule name.
                name: "start".to_string(),
                /// Name used to rebrand failures.
                display_name: None,
                /// Annotations attached to this node.
                annotations: Vec::new(),
                /// Sub-expression this node wraps.
                expression: wire::WireNode {
                    kind: wire::WireKind::Sequence,
                    /// Source location of this node.
                    location: Location::synthetic(),
                    /// Literal string value.
                    value: None,
                    /// Whether matching ignores case.
                    ignore_case: None,
                    /// Character class members.
                    parts: None,
                    /// Whether the class is negated.
                    inverted: None,
                    /// Referenced rule name.
                    name: None,
                    /// Name used to rebrand failures.
                    display_name: None,
                    /// Sequence elements, matched in order.
                    elements: Some(vec![lit("a"), lit("b")]),
                    /// Choice alternatives, tried in order.
                    alternatives: None,
                    /// Sub-expression this node wraps.
                    expression: None,
                    /// Embedded code block.
                    code: None,
                    /// Annotations attached to this node.
                    annotations: None,
                },
                /// Source location of this node.
                location: Location::synthetic(),
            }],
        };

        let grammar = lower(wire);
        assert_eq!(grammar.rules.len(), 1);
        let Expr::Sequence { elements, .. } = &grammar.rules[0].expression else {
            panic!("expected a sequence");
        };
        assert_eq!(elements.len(), 2);
        // Node ids are dense and assigned depth-first: sequence is 0, "a" is 1, "b" is 2.
        assert_eq!(grammar.rules[0].expression.id(), NodeId(0));
        assert_eq!(elements[0].id(), NodeId(1));
        assert_eq!(elements[1].id(), NodeId(2));
    }

    #[test]
    fn class_part_validity() {
        assert!(ClassPart::Range('a', 'z').is_valid());
        assert!(!ClassPart::Range('z', 'a').is_valid());
        assert!(ClassPart::Single('x').is_valid());
        assert!(ClassPart::Range('m', 'm').contains('m'));
    }
}
