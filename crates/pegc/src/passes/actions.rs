//! Third pass: computes, for every node carrying host-language code, the
//! set of labels visible to that code.
//!
//! Action and predicate code is opaque text this crate never parses (§1);
//! the compiler cannot know which identifiers the host language will
//! actually read. What it *can* know, from the AST alone, is which labels
//! are in lexical scope at that point — bound by an enclosing `labeled`
//! within the same `sequence`, still live because nothing has closed the
//! sequence yet. That visibility set is what the bytecode generator and
//! the in-memory runtime use to build each code block's binding
//! environment.
//!
//! `action` code additionally sees labels bound directly within the
//! expression it wraps (`n:([0-9]+) { ... }` sees `n`), since its code
//! only runs once that expression has fully matched. `scope`/predicate
//! code runs *before* anything nested could bind, so it only ever sees
//! labels from an enclosing scope — never its own.

use tracing::trace;

use crate::ast::{Expr, Grammar};
use crate::diagnostics::Diagnostic;
use crate::metadata::MetadataTable;

/// Runs the label-visibility pass. Never produces diagnostics itself —
/// there is nothing a grammar author can get wrong here — but returns a
/// `Vec<Diagnostic>` for symmetry with the other passes in the pipeline.
#[tracing::instrument(level = "debug", skip_all)]
pub fn run(grammar: &Grammar, metadata: &mut MetadataTable) -> Vec<Diagnostic> {
    for rule in &grammar.rules {
        visit(&rule.expression, &mut Vec::new(), metadata);
    }
    Vec::new()
}

type Scope = Vec<(String, crate::ast::NodeId)>;

/// `scope` in scope: labels bound so far in the enclosing sequence chain,
/// paired with the node each label is bound to. A label re-bound deeper in
/// the chain shadows the outer one because lookups in [`record`] search
/// `rposition`-style from the end, but since binding order already tracks
/// the most recent shadow last, a plain positional match suffices.
fn visit(expr: &Expr, scope: &mut Scope, metadata: &mut MetadataTable) {
    match expr {
        Expr::SemanticAnd { id, .. } | Expr::SemanticNot { id, .. } => {
            record(*id, scope, metadata);
        }
        Expr::Action { id, expression, .. } => {
            // Action code runs only after `expression` has fully matched
            // (§4.6's `action()` lowering brackets the body, then
            // `Execute`s), so labels it binds directly — not just labels
            // already open from an enclosing sequence — are visible too.
            let mut own_scope = scope.clone();
            collect_direct_labels(expression, &mut own_scope);
            metadata.entry(*id).visible_labels = own_scope;
            visit(expression, scope, metadata);
        }
        Expr::Scope { id, expression, .. } => {
            record(*id, scope, metadata);
            // The scope's own code may introduce bindings of its own, but
            // their names are opaque; nothing more precise is knowable
            // than "at least the outer scope's labels are visible".
            visit(expression, scope, metadata);
        }
        Expr::Labeled {
            label,
            expression,
            id,
            ..
        } => {
            visit(expression, scope, metadata);
            scope.push((label.clone(), *id));
        }
        Expr::Sequence { elements, .. } => {
            let depth = scope.len();
            for element in elements {
                visit(element, scope, metadata);
            }
            scope.truncate(depth);
        }
        _ => {
            for child in expr.children() {
                visit(child, scope, metadata);
            }
        }
    }
}

fn record(id: crate::ast::NodeId, scope: &Scope, metadata: &mut MetadataTable) {
    trace!(node = ?id, labels = ?scope, "recorded visible labels");
    metadata.entry(id).visible_labels = scope.clone();
}

/// Collects labels bound directly within `expr` at the same nesting level —
/// `expr` itself if it is `labeled`, or every element of `expr` if it is a
/// `sequence` — without descending into a nested `labeled`'s own
/// expression (a deeper nesting level) or into a nested `action`/`scope`
/// (which computes its own visibility independently).
fn collect_direct_labels(expr: &Expr, scope: &mut Scope) {
    match expr {
        Expr::Labeled { label, id, .. } => scope.push((label.clone(), *id)),
        Expr::Sequence { elements, .. } => {
            for element in elements {
                collect_direct_labels(element, scope);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CodeBlock, CodeId, NodeId, Rule};
    use crate::location::Location;

    fn code(id: u32) -> CodeBlock {
        CodeBlock {
            id: CodeId(id),
            source: String::new(),
        }
    }

    #[test]
    fn action_sees_earlier_labels_in_same_sequence() {
        let grammar = Grammar {
            initializer: None,
            parameters: Vec::new(),
            rules: vec![Rule {
                name: "start".to_string(),
                display_name: None,
                annotations: Vec::new(),
                expression: Expr::Action {
                    id: NodeId(10),
                    location: Location::synthetic(),
                    code: code(0),
                    expression: Box::new(Expr::Sequence {
                        id: NodeId(1),
                        location: Location::synthetic(),
                        elements: vec![
                            Expr::Labeled {
                                id: NodeId(2),
                                location: Location::synthetic(),
                                label: "head".to_string(),
                                expression: Box::new(Expr::Any {
                                    id: NodeId(3),
                                    location: Location::synthetic(),
                                }),
                            },
                            Expr::Action {
                                id: NodeId(4),
                                location: Location::synthetic(),
                                code: code(1),
                                expression: Box::new(Expr::Any {
                                    id: NodeId(5),
                                    location: Location::synthetic(),
                                }),
                            },
                        ],
                    }),
                },
                location: Location::synthetic(),
            }],
        };

        let mut metadata = MetadataTable::new();
        let diagnostics = run(&grammar, &mut metadata);
        assert!(diagnostics.is_empty());

        assert_eq!(
            metadata.get(NodeId(4)).unwrap().visible_labels,
            vec![("head".to_string(), NodeId(2))]
        );
        // The outer action wraps the whole sequence directly, so it sees
        // the label bound inside its own expression too.
        assert_eq!(
            metadata.get(NodeId(10)).unwrap().visible_labels,
            vec![("head".to_string(), NodeId(2))]
        );
    }

    #[test]
    fn action_sees_label_bound_by_its_own_direct_child() {
        // `start = n:([0-9]+) { ... }`: the action wraps the labeled node
        // directly, with no intervening sequence.
        let grammar = Grammar {
            initializer: None,
            parameters: Vec::new(),
            rules: vec![Rule {
                name: "start".to_string(),
                display_name: None,
                annotations: Vec::new(),
                expression: Expr::Action {
                    id: NodeId(2),
                    location: Location::synthetic(),
                    code: code(0),
                    expression: Box::new(Expr::Labeled {
                        id: NodeId(1),
                        location: Location::synthetic(),
                        label: "n".to_string(),
                        expression: Box::new(Expr::OneOrMore {
                            id: NodeId(0),
                            location: Location::synthetic(),
                            expression: Box::new(Expr::Any {
                                id: NodeId(3),
                                location: Location::synthetic(),
                            }),
                        }),
                    }),
                },
                location: Location::synthetic(),
            }],
        };

        let mut metadata = MetadataTable::new();
        run(&grammar, &mut metadata);
        assert_eq!(
            metadata.get(NodeId(2)).unwrap().visible_labels,
            vec![("n".to_string(), NodeId(1))]
        );
    }

    #[test]
    fn labels_do_not_leak_across_sibling_sequences() {
        let grammar = Grammar {
            initializer: None,
            parameters: Vec::new(),
            rules: vec![Rule {
                name: "start".to_string(),
                display_name: None,
                annotations: Vec::new(),
                expression: Expr::Sequence {
                    id: NodeId(0),
                    location: Location::synthetic(),
                    elements: vec![
                        Expr::Sequence {
                            id: NodeId(1),
                            location: Location::synthetic(),
                            elements: vec![Expr::Labeled {
                                id: NodeId(2),
                                location: Location::synthetic(),
                                label: "a".to_string(),
                                expression: Box::new(Expr::Any {
                                    id: NodeId(3),
                                    location: Location::synthetic(),
                                }),
                            }],
                        },
                        Expr::SemanticAnd {
                            id: NodeId(4),
                            location: Location::synthetic(),
                            code: code(0),
                        },
                    ],
                },
                location: Location::synthetic(),
            }],
        };

        let mut metadata = MetadataTable::new();
        run(&grammar, &mut metadata);
        assert!(metadata.get(NodeId(4)).unwrap().visible_labels.is_empty());
    }
}
