//! Second pass: evaluates `@if` and rewrites the generic annotations
//! (`@token`, `@separator`, `@type`) into their target subtrees.
//!
//! Evaluation is single-pass and top-down: once a subtree is rewritten it
//! is not rescanned, and `@if` is always evaluated before the other
//! annotations at the same site (§9 design note) since it decides whether
//! the site survives to be rewritten at all.

use tracing::{debug, trace};

use crate::ast::{Annotation, AnnotationValue, ClassPart, CodeBlock, CodeId, Expr, Grammar};
use crate::diagnostics::{Diagnostic, DiagnosticCode};
use crate::metadata::{MetadataTable, TypeInfo};
use crate::options::CompileOptions;

/// Runs the annotation-processing pass, mutating `grammar` in place and
/// recording `@type` overrides into `metadata`.
#[tracing::instrument(level = "debug", skip_all)]
pub fn run(
    grammar: &mut Grammar,
    options: &CompileOptions,
    metadata: &mut MetadataTable,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let mut index = 0;
    while index < grammar.rules.len() {
        let satisfied = grammar.rules[index]
            .annotations
            .iter()
            .all(|a| if_satisfied(a, options));

        if !satisfied {
            let removed = grammar.rules.remove(index);
            trace!(rule = %removed.name, "removed by @if");
            continue;
        }

        // Generic rule-level annotations never rewrite the whole rule body
        // today (only `@if` acts at rule granularity); still validate names
        // so an unrecognized rule-level annotation is reported.
        for annotation in &grammar.rules[index].annotations {
            check_known(annotation, &mut diagnostics);
        }

        rewrite_expr(
            &mut grammar.rules[index].expression,
            options,
            metadata,
            &mut diagnostics,
        );
        index += 1;
    }

    if grammar.start_rule().is_none() {
        diagnostics.push(Diagnostic::without_location(
            DiagnosticCode::EmptyGrammar,
            "every rule was removed by @if evaluation",
        ));
    }

    debug!(diagnostic_count = diagnostics.len(), "annotation processing complete");
    diagnostics
}

fn if_satisfied(annotation: &Annotation, options: &CompileOptions) -> bool {
    match annotation {
        Annotation::If { conditions, .. } => {
            conditions.iter().all(|c| options.has_parameter(c))
        }
        Annotation::Generic { .. } => true,
    }
}

fn check_known(annotation: &Annotation, diagnostics: &mut Vec<Diagnostic>) {
    if let Annotation::Generic { name, location, .. } = annotation {
        if !matches!(name.as_str(), "token" | "separator" | "type") {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::UnknownAnnotation,
                format!("unknown annotation `@{name}`"),
                *location,
            ));
        }
    }
}

/// Walks `expr`, pruning `@if`-guarded `choice` alternatives and applying
/// generic annotation rewrites found on [`Expr::Annotated`] wrappers.
fn rewrite_expr(
    expr: &mut Expr,
    options: &CompileOptions,
    metadata: &mut MetadataTable,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Expr::Choice { alternatives, .. } = expr {
        alternatives.retain(|alt| match alt {
            Expr::Annotated { annotations, .. } => {
                annotations.iter().all(|a| if_satisfied(a, options))
            }
            _ => true,
        });
    }

    if let Expr::Class { parts, location, .. } = expr {
        if !validate_class_parts(parts) {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::InvalidRange,
                "character class range end precedes its start",
                *location,
            ));
        }
    }

    unwrap_and_apply(expr, metadata, diagnostics);

    for child in expr.children_mut() {
        rewrite_expr(child, options, metadata, diagnostics);
    }
}

/// Applies the generic annotations on an [`Expr::Annotated`] node to its
/// wrapped expression, replacing `expr` with the (possibly rewritten)
/// inner expression so later passes never see the wrapper again.
fn unwrap_and_apply(
    expr: &mut Expr,
    metadata: &mut MetadataTable,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Expr::Annotated {
        annotations,
        expression,
        ..
    } = expr
    else {
        return;
    };

    for annotation in annotations.iter() {
        check_known(annotation, diagnostics);
    }

    let mut inner = std::mem::replace(expression.as_mut(), Expr::End {
        id: crate::ast::NodeId(0),
        location: crate::location::Location::synthetic(),
    });

    for annotation in annotations.iter() {
        let Annotation::Generic {
            name,
            parameters,
            location,
        } = annotation
        else {
            continue;
        };
        match name.as_str() {
            "separator" => {
                inner = apply_separator(inner, parameters, *location, diagnostics);
            }
            "type" => {
                if let Some(AnnotationValue::Str(type_name)) = param(parameters, "type") {
                    metadata.set_type(inner.id(), TypeInfo::Fixed(type_name.clone()));
                }
            }
            "token" => {
                // Marks the subtree atomic for the emitter's whitespace-skip
                // logic; recorded as metadata rather than a tree rewrite.
                metadata.entry(inner.id());
            }
            _ => {}
        }
    }

    *expr = inner;
}

fn param<'a>(parameters: &'a [(String, AnnotationValue)], key: &str) -> Option<&'a AnnotationValue> {
    parameters.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

/// Labels the `@separator` rewrite's two top-level pieces carry, so the
/// synthesized flattening action below can find them as direct labels of
/// its own wrapped [`Expr::Sequence`] (§4.4's label-visibility rule).
pub(crate) const SEPARATOR_FIRST_LABEL: &str = "__pegc_separator_first";
pub(crate) const SEPARATOR_REST_LABEL: &str = "__pegc_separator_rest";

/// `@separator(expr: <E>)` wraps `X+`/`X*` into
/// `action(sequence(X#first, zeroOrMore(sequence(E, X))#rest), <flatten>)`,
/// where `<flatten>` returns `[first, ...rest.map(pair => pair.last)]` so
/// the separator occurrences never show up in the parsed result (§4.3,
/// §8 scenario 6).
fn apply_separator(
    inner: Expr,
    parameters: &[(String, AnnotationValue)],
    location: crate::location::Location,
    diagnostics: &mut Vec<Diagnostic>,
) -> Expr {
    let Some(separator_expr) = param(parameters, "expr") else {
        diagnostics.push(Diagnostic::new(
            DiagnosticCode::UnknownAnnotation,
            "@separator requires an `expr` parameter",
            location,
        ));
        return inner;
    };

    let (first, rest_id, rest_location) = match inner {
        Expr::OneOrMore {
            expression,
            id,
            location,
        }
        | Expr::ZeroOrMore {
            expression,
            id,
            location,
        } => (*expression, id, location),
        other => {
            diagnostics.push(Diagnostic::new(
                DiagnosticCode::UnknownAnnotation,
                "@separator only applies to `X+` or `X*`",
                location,
            ));
            return other;
        }
    };

    let separator_node = separator_placeholder(separator_expr, rest_location);

    let tail = Expr::Sequence {
        id: rest_id,
        location: rest_location,
        elements: vec![separator_node, first.clone()],
    };
    let repeated_tail = Expr::ZeroOrMore {
        id: rest_id,
        location: rest_location,
        expression: Box::new(tail),
    };
    let sequence = Expr::Sequence {
        id: rest_id,
        location: rest_location,
        elements: vec![
            Expr::Labeled {
                id: rest_id,
                location: rest_location,
                label: SEPARATOR_FIRST_LABEL.to_string(),
                expression: Box::new(first),
            },
            Expr::Labeled {
                id: rest_id,
                location: rest_location,
                label: SEPARATOR_REST_LABEL.to_string(),
                expression: Box::new(repeated_tail),
            },
        ],
    };
    Expr::Action {
        id: rest_id,
        location: rest_location,
        expression: Box::new(sequence),
        code: CodeBlock {
            id: CodeId::SEPARATOR_FLATTEN,
            source: "<built-in: flatten @separator pairs>".to_string(),
        },
    }
}

/// `@separator`'s `expr` parameter names another rule; represented as a
/// `ruleRef` since that is the only reference-shaped annotation value.
fn separator_placeholder(value: &AnnotationValue, location: crate::location::Location) -> Expr {
    match value {
        AnnotationValue::Ident(name) => Expr::RuleRef {
            id: crate::ast::NodeId(0),
            location,
            name: name.clone(),
            resolved: None,
        },
        AnnotationValue::Str(s) => Expr::Literal {
            id: crate::ast::NodeId(0),
            location,
            value: s.clone(),
            ignore_case: false,
        },
        _ => Expr::End {
            id: crate::ast::NodeId(0),
            location,
        },
    }
}

/// Validates that `parts` forms a valid character class.
fn validate_class_parts(parts: &[ClassPart]) -> bool {
    parts.iter().all(ClassPart::is_valid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeId, Rule};
    use crate::location::Location;

    fn grammar_with(expression: Expr, annotations: Vec<Annotation>) -> Grammar {
        Grammar {
            initializer: None,
            parameters: Vec::new(),
            rules: vec![Rule {
                name: "start".to_string(),
                display_name: None,
                annotations,
                expression,
                location: Location::synthetic(),
            }],
        }
    }

    #[test]
    fn rule_level_if_removes_unsatisfied_rule() {
        let mut grammar = grammar_with(
            Expr::End {
                id: NodeId(0),
                location: Location::synthetic(),
            },
            vec![Annotation::If {
                conditions: ["debug".to_string()].into_iter().collect(),
                location: Location::synthetic(),
            }],
        );
        let mut metadata = MetadataTable::new();
        let diagnostics = run(&mut grammar, &CompileOptions::new(), &mut metadata);
        assert!(grammar.rules.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::EmptyGrammar);
    }

    #[test]
    fn rule_level_if_keeps_satisfied_rule() {
        let mut grammar = grammar_with(
            Expr::End {
                id: NodeId(0),
                location: Location::synthetic(),
            },
            vec![Annotation::If {
                conditions: ["debug".to_string()].into_iter().collect(),
                location: Location::synthetic(),
            }],
        );
        let mut metadata = MetadataTable::new();
        let options = CompileOptions::new().with_parameter("debug");
        let diagnostics = run(&mut grammar, &options, &mut metadata);
        assert_eq!(grammar.rules.len(), 1);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn unknown_generic_annotation_is_flagged_non_fatal() {
        let mut grammar = grammar_with(
            Expr::Annotated {
                id: NodeId(1),
                location: Location::synthetic(),
                annotations: vec![Annotation::Generic {
                    name: "bogus".to_string(),
                    parameters: Vec::new(),
                    location: Location::synthetic(),
                }],
                expression: Box::new(Expr::End {
                    id: NodeId(0),
                    location: Location::synthetic(),
                }),
            },
            Vec::new(),
        );
        let mut metadata = MetadataTable::new();
        let diagnostics = run(&mut grammar, &CompileOptions::new(), &mut metadata);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::UnknownAnnotation);
        assert_eq!(diagnostics[0].severity, crate::diagnostics::Severity::Error);
    }

    #[test]
    fn separator_rewrites_one_or_more() {
        let mut grammar = grammar_with(
            Expr::Annotated {
                id: NodeId(2),
                location: Location::synthetic(),
                annotations: vec![Annotation::Generic {
                    name: "separator".to_string(),
                    parameters: vec![("expr".to_string(), AnnotationValue::Ident("comma".to_string()))],
                    location: Location::synthetic(),
                }],
                expression: Box::new(Expr::OneOrMore {
                    id: NodeId(1),
                    location: Location::synthetic(),
                    expression: Box::new(Expr::RuleRef {
                        id: NodeId(0),
                        location: Location::synthetic(),
                        name: "id".to_string(),
                        resolved: None,
                    }),
                }),
            },
            Vec::new(),
        );
        let mut metadata = MetadataTable::new();
        let diagnostics = run(&mut grammar, &CompileOptions::new(), &mut metadata);
        assert!(diagnostics.is_empty());
        match &grammar.rules[0].expression {
            Expr::Action {
                expression, code, ..
            } => {
                assert_eq!(code.id, CodeId::SEPARATOR_FLATTEN);
                match expression.as_ref() {
                    Expr::Sequence { elements, .. } => {
                        assert_eq!(elements.len(), 2);
                        assert!(matches!(elements[0], Expr::Labeled { ref label, .. } if label == SEPARATOR_FIRST_LABEL));
                        match &elements[1] {
                            Expr::Labeled { label, expression, .. } => {
                                assert_eq!(label, SEPARATOR_REST_LABEL);
                                assert!(matches!(expression.as_ref(), Expr::ZeroOrMore { .. }));
                            }
                            other => panic!("expected the rest to be labeled, got {other:?}"),
                        }
                    }
                    other => panic!("expected a sequence rewrite, got {other:?}"),
                }
            }
            other => panic!("expected an action-wrapped rewrite, got {other:?}"),
        }
    }

    #[test]
    fn separator_flattens_to_a_plain_array_at_parse_time() {
        // `@separator(expr: ",") id+` parsing `"a,bc,d"` must produce
        // `["a", "bc", "d"]`, not the nested `[first, [[sep, item], ...]]`
        // shape the unflattened rewrite would leave behind — the exact
        // regression the tree-shape-only test above cannot catch.
        let id_rule = Rule {
            name: "id".to_string(),
            display_name: None,
            annotations: Vec::new(),
            expression: Expr::Text {
                id: NodeId(100),
                location: Location::synthetic(),
                expression: Box::new(Expr::OneOrMore {
                    id: NodeId(101),
                    location: Location::synthetic(),
                    expression: Box::new(Expr::Class {
                        id: NodeId(102),
                        location: Location::synthetic(),
                        parts: vec![
                            ClassPart::Range('a', 'z'),
                            ClassPart::Range('A', 'Z'),
                        ],
                        inverted: false,
                        ignore_case: false,
                    }),
                }),
            },
            location: Location::synthetic(),
        };
        let start_rule = Rule {
            name: "start".to_string(),
            display_name: None,
            annotations: Vec::new(),
            expression: Expr::Annotated {
                id: NodeId(1),
                location: Location::synthetic(),
                annotations: vec![Annotation::Generic {
                    name: "separator".to_string(),
                    parameters: vec![(
                        "expr".to_string(),
                        AnnotationValue::Str(",".to_string()),
                    )],
                    location: Location::synthetic(),
                }],
                expression: Box::new(Expr::OneOrMore {
                    id: NodeId(0),
                    location: Location::synthetic(),
                    expression: Box::new(Expr::RuleRef {
                        id: NodeId(2),
                        location: Location::synthetic(),
                        name: "id".to_string(),
                        resolved: None,
                    }),
                }),
            },
            location: Location::synthetic(),
        };
        let mut grammar = Grammar {
            initializer: None,
            parameters: Vec::new(),
            rules: vec![start_rule, id_rule],
        };

        let options = crate::options::CompileOptions::new();
        let (metadata, diagnostics) = crate::passes::run_analysis(&mut grammar, &options)
            .expect("analysis pipeline succeeds");
        assert!(diagnostics.is_empty());

        let module = crate::bytecode::generate(&grammar, &metadata);
        let parser = crate::runtime::LoadedParser::new(module, crate::runtime::ActionTable::new());

        let value = parser.parse("a,bc,d").expect("grammar admits the input");
        assert_eq!(
            value,
            crate::runtime::Value::Array(vec![
                crate::runtime::Value::Str("a".to_string()),
                crate::runtime::Value::Str("bc".to_string()),
                crate::runtime::Value::Str("d".to_string()),
            ])
        );
    }

    #[test]
    fn type_annotation_records_fixed_metadata() {
        let mut grammar = grammar_with(
            Expr::Annotated {
                id: NodeId(1),
                location: Location::synthetic(),
                annotations: vec![Annotation::Generic {
                    name: "type".to_string(),
                    parameters: vec![("type".to_string(), AnnotationValue::Str("any".to_string()))],
                    location: Location::synthetic(),
                }],
                expression: Box::new(Expr::Any {
                    id: NodeId(0),
                    location: Location::synthetic(),
                }),
            },
            Vec::new(),
        );
        let mut metadata = MetadataTable::new();
        let diagnostics = run(&mut grammar, &CompileOptions::new(), &mut metadata);
        assert!(diagnostics.is_empty());
        let inner_id = grammar.rules[0].expression.id();
        assert_eq!(
            metadata.type_of(inner_id).unwrap().type_name(),
            "any"
        );
    }
}
