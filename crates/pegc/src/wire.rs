//! The JSON-shaped AST contract produced by the bootstrap parser.
//!
//! This module mirrors the external schema byte-for-byte: one flat node
//! struct carrying every field any variant might need, tagged by a `type`
//! discriminator, exactly the shape a hand-written recursive-descent
//! bootstrap parser emits. [`crate::ast`] lowers this wire shape into the
//! strongly typed [`crate::ast::Expr`] sum type that every pass operates on;
//! nothing outside [`crate::ast::lower`] should need to look at a
//! [`WireNode`] directly.

use facet::Facet;

use crate::location::Location;

/// The `type` discriminator on a wire-format grammar node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Facet)]
#[repr(u8)]
pub enum WireKind {
    /// `literal(value, ignoreCase)`.
    #[facet(rename = "literal")]
    Literal,
    /// `class(parts, inverted, ignoreCase)`.
    #[facet(rename = "class")]
    Class,
    /// `any`.
    #[facet(rename = "any")]
    Any,
    /// `end`.
    #[facet(rename = "end")]
    End,
    /// `ruleRef(name)`.
    #[facet(rename = "rule_ref")]
    RuleRef,
    /// `sequence(elements[])`.
    #[facet(rename = "sequence")]
    Sequence,
    /// `choice(alternatives[])`.
    #[facet(rename = "choice")]
    Choice,
    /// `optional(e)`.
    #[facet(rename = "optional")]
    Optional,
    /// `zeroOrMore(e)`.
    #[facet(rename = "zero_or_more")]
    ZeroOrMore,
    /// `oneOrMore(e)`.
    #[facet(rename = "one_or_more")]
    OneOrMore,
    /// `text(e)`.
    #[facet(rename = "text")]
    Text,
    /// `simpleAnd(e)`.
    #[facet(rename = "simple_and")]
    SimpleAnd,
    /// `simpleNot(e)`.
    #[facet(rename = "simple_not")]
    SimpleNot,
    /// `semanticAnd(code)`.
    #[facet(rename = "semantic_and")]
    SemanticAnd,
    /// `semanticNot(code)`.
    #[facet(rename = "semantic_not")]
    SemanticNot,
    /// `labeled(label, e)`.
    #[facet(rename = "labeled")]
    Labeled,
    /// `action(e, code)`.
    #[facet(rename = "action")]
    Action,
    /// `scope(e, code)`.
    #[facet(rename = "scope")]
    Scope,
    /// `named(displayName, e)`.
    #[facet(rename = "named")]
    Named,
    /// `annotated(annotations[], e)` — an expression carrying its own
    /// annotations, distinct from the annotations on the enclosing rule.
    /// This is how `@if`/`@token`/`@separator`/`@type` attach to one
    /// alternative of a `choice` rather than to the whole rule.
    #[facet(rename = "annotated")]
    Annotated,
}

/// A single endpoint of a character class range: either one code point or
/// the two endpoints of an inclusive range.
#[derive(Debug, Clone, Facet)]
pub struct WireClassPart {
    /// Start of the range (or the sole code point for a singleton).
    pub begin: char,
    /// End of the range, inclusive. Equal to `begin` for a singleton.
    #[facet(default)]
    pub end: Option<char>,
}

/// One flat node in the wire-format AST, tagged by [`WireKind`].
///
/// Every field below is populated only for the node kinds that use it; the
/// rest are left at their default. This mirrors the on-the-wire JSON, which
/// genuinely is a flat object with optional properties rather than a tagged
/// union with distinct per-variant shapes.
#[derive(Debug, Clone, Facet)]
pub struct WireNode {
    /// Discriminator for this node.
    #[facet(rename = "type")]
    pub kind: WireKind,
    /// Source span.
    pub location: Location,
    /// `literal.value`.
    #[facet(default)]
    pub value: Option<String>,
    /// `literal.ignoreCase` / `class.ignoreCase`.
    #[facet(default)]
    pub ignore_case: Option<bool>,
    /// `class.parts`.
    #[facet(default)]
    pub parts: Option<Vec<WireClassPart>>,
    /// `class.inverted`.
    #[facet(default)]
    pub inverted: Option<bool>,
    /// `ruleRef.name` / `labeled.label` / `named.name`.
    #[facet(default)]
    pub name: Option<String>,
    /// `named.displayName`.
    #[facet(default)]
    pub display_name: Option<String>,
    /// `sequence.elements`.
    #[facet(default)]
    pub elements: Option<Vec<WireNode>>,
    /// `choice.alternatives`.
    #[facet(default)]
    pub alternatives: Option<Vec<WireNode>>,
    /// The single child expression for unary wrapper kinds.
    #[facet(default)]
    pub expression: Option<Box<WireNode>>,
    /// Opaque host-language code, for `semanticAnd`/`semanticNot`/`action`/`scope`.
    #[facet(default)]
    pub code: Option<String>,
    /// `annotated.annotations`.
    #[facet(default)]
    pub annotations: Option<Vec<WireAnnotation>>,
}

/// A wire-format annotation attached to a rule or a choice alternative.
#[derive(Debug, Clone, Facet)]
pub struct WireAnnotation {
    /// `"if"` or the generic annotation name (`"token"`, `"separator"`, `"type"`, …).
    pub name: String,
    /// For `@if`: the guarded condition identifiers. Empty for generic annotations.
    #[facet(default)]
    pub conditions: Vec<String>,
    /// For generic annotations: identifier → literal-value parameters.
    #[facet(default)]
    pub parameters: Vec<WireAnnotationParam>,
    /// Source location of this annotation.
    pub location: Location,
}

/// One `identifier: value` entry inside a generic annotation's parameter list.
#[derive(Debug, Clone, Facet)]
pub struct WireAnnotationParam {
    /// The parameter's identifier.
    pub key: String,
    /// The parameter's literal value.
    pub value: WireLiteral,
}

/// A literal value appearing inside an annotation parameter list.
#[derive(Debug, Clone, Facet)]
#[repr(u8)]
pub enum WireLiteral {
    /// A quoted string.
    Str(String),
    /// A numeric literal.
    Number(f64),
    /// `true` / `false`.
    Bool(bool),
    /// A bare identifier reference (e.g. `expr` in `@separator(expr: comma)`).
    Ident(String),
    /// A bracketed list of literals.
    Array(Vec<WireLiteral>),
}

/// A wire-format rule: name, optional display name, annotations, and body.
#[derive(Debug, Clone, Facet)]
pub struct WireRule {
    /// The rule's name.
    pub name: String,
    #[facet(default)]
    /// Optional human-readable name used to rebrand failures.
    pub display_name: Option<String>,
    #[facet(default)]
    /// Annotations attached to this rule.
    pub annotations: Vec<WireAnnotation>,
    /// The rule's body expression.
    pub expression: WireNode,
    /// Source location of this rule.
    pub location: Location,
}

/// The wire-format grammar: the root of the AST schema contract.
#[derive(Debug, Clone, Facet)]
pub struct WireGrammar {
    #[facet(default)]
    /// Optional top-level initializer code.
    pub initializer: Option<String>,
    #[facet(default)]
    /// Declared grammar parameter names.
    pub parameters: Vec<String>,
    /// The grammar's rules, in declaration order.
    pub rules: Vec<WireRule>,
}
