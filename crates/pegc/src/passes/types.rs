//! Fourth pass: fixed-point type inference (§4.5).
//!
//! Types are plain strings, not a structural type system — `"string"`,
//! `"Array<string>"`, `"[string, string]"`, `"string | undefined"` and so
//! on are themselves the type representation, built up compositionally the
//! same way the emitted parser's generated type declarations will read.
//! `ruleRef` is the only construct that can introduce a cycle, so the pass
//! iterates rule types to a fixed point rather than computing them in one
//! top-down sweep.

use tracing::{debug, trace};

use crate::ast::{Expr, Grammar};
use crate::diagnostics::Diagnostic;
use crate::metadata::{MetadataTable, TypeInfo};

const UNKNOWN: &str = "unknown";

/// Runs inference to a fixed point, writing every node's resolved type
/// into `metadata`. Produces no diagnostics: an unresolved `ruleRef` would
/// already have been reported by [`crate::passes::reference_checker`], and
/// every other construct always has a derivable type.
#[tracing::instrument(level = "debug", skip_all, fields(rule_count = grammar.rules.len()))]
pub fn run(grammar: &Grammar, metadata: &mut MetadataTable) -> Vec<Diagnostic> {
    let mut rule_types: Vec<String> = vec![UNKNOWN.to_string(); grammar.rules.len()];

    loop {
        let mut changed = false;
        for (index, rule) in grammar.rules.iter().enumerate() {
            let ty = infer(&rule.expression, &rule_types, metadata);
            if ty != rule_types[index] {
                rule_types[index] = ty;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for rule in &grammar.rules {
        infer(&rule.expression, &rule_types, metadata);
    }

    debug!(?rule_types, "type inference converged");
    Vec::new()
}

/// Infers `expr`'s type given the current (possibly not yet converged)
/// `rule_types` table, and records it into `metadata` unless a `Fixed`
/// override is already on record for that node.
fn infer(expr: &Expr, rule_types: &[String], metadata: &mut MetadataTable) -> String {
    if let Some(TypeInfo::Fixed(fixed)) = metadata.type_of(expr.id()) {
        return fixed.clone();
    }

    let ty = match expr {
        Expr::Literal { .. } | Expr::Class { .. } | Expr::Any { .. } | Expr::Text { .. } => {
            "string".to_string()
        }
        Expr::End { .. }
        | Expr::SimpleAnd { .. }
        | Expr::SimpleNot { .. }
        | Expr::SemanticAnd { .. }
        | Expr::SemanticNot { .. } => "undefined".to_string(),
        Expr::Optional { expression, .. } => {
            format!("{} | null", infer(expression, rule_types, metadata))
        }
        Expr::ZeroOrMore { expression, .. } | Expr::OneOrMore { expression, .. } => {
            format!("Array<{}>", infer(expression, rule_types, metadata))
        }
        Expr::Sequence { elements, .. } => {
            let parts: Vec<String> = elements
                .iter()
                .map(|e| infer(e, rule_types, metadata))
                .collect();
            format!("[{}]", parts.join(", "))
        }
        Expr::Choice { alternatives, .. } => {
            let mut parts: Vec<String> = alternatives
                .iter()
                .map(|e| infer(e, rule_types, metadata))
                .collect();
            parts.dedup();
            parts.join(" | ")
        }
        Expr::Action { code, .. } => declared_return_type(&code.source),
        Expr::Scope { expression, .. } | Expr::Labeled { expression, .. } => {
            infer(expression, rule_types, metadata)
        }
        Expr::Named { expression, .. } | Expr::Annotated { expression, .. } => {
            infer(expression, rule_types, metadata)
        }
        Expr::RuleRef { resolved, .. } => resolved
            .and_then(|index| rule_types.get(index))
            .cloned()
            .unwrap_or_else(|| UNKNOWN.to_string()),
    };

    let changed = metadata.set_type(expr.id(), TypeInfo::Inferred(ty.clone()));
    if changed {
        trace!(node = ?expr.id(), kind = expr.kind_name(), ty = %ty, "type assigned");
    }
    ty
}

/// Looks for a `// @returns T` marker as a conservative stand-in for a
/// declared return type annotation in action code; falls back to `"any"`.
/// The compiler never parses action code as a language, so this is a
/// best-effort textual scan, not a type checker.
fn declared_return_type(source: &str) -> String {
    for line in source.lines() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("// @returns ") {
            let declared = rest.trim();
            if !declared.is_empty() {
                return declared.to_string();
            }
        }
    }
    "any".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CodeBlock, CodeId, NodeId, Rule};
    use crate::location::Location;

    fn rule(name: &str, expression: Expr) -> Rule {
        Rule {
            name: name.to_string(),
            display_name: None,
            annotations: Vec::new(),
            expression,
            location: Location::synthetic(),
        }
    }

    #[test]
    fn literal_infers_string() {
        let grammar = Grammar {
            initializer: None,
            parameters: Vec::new(),
            rules: vec![rule(
                "start",
                Expr::Literal {
                    id: NodeId(0),
                    location: Location::synthetic(),
                    value: "x".to_string(),
                    ignore_case: false,
                },
            )],
        };
        let mut metadata = MetadataTable::new();
        run(&grammar, &mut metadata);
        assert_eq!(metadata.type_of(NodeId(0)).unwrap().type_name(), "string");
    }

    #[test]
    fn recursive_rule_converges() {
        // start = "a" / (start "a")
        let grammar = Grammar {
            initializer: None,
            parameters: Vec::new(),
            rules: vec![rule(
                "start",
                Expr::Choice {
                    id: NodeId(0),
                    location: Location::synthetic(),
                    alternatives: vec![
                        Expr::Literal {
                            id: NodeId(1),
                            location: Location::synthetic(),
                            value: "a".to_string(),
                            ignore_case: false,
                        },
                        Expr::Sequence {
                            id: NodeId(2),
                            location: Location::synthetic(),
                            elements: vec![
                                Expr::RuleRef {
                                    id: NodeId(3),
                                    location: Location::synthetic(),
                                    name: "start".to_string(),
                                    resolved: Some(0),
                                },
                                Expr::Literal {
                                    id: NodeId(4),
                                    location: Location::synthetic(),
                                    value: "a".to_string(),
                                    ignore_case: false,
                                },
                            ],
                        },
                    ],
                },
            )],
        };
        let mut metadata = MetadataTable::new();
        run(&grammar, &mut metadata);
        assert_eq!(
            metadata.type_of(NodeId(0)).unwrap().type_name(),
            "string | [string, string]"
        );
    }

    #[test]
    fn fixed_type_blocks_propagation() {
        let mut metadata = MetadataTable::new();
        metadata.set_type(NodeId(0), TypeInfo::Fixed("any".to_string()));
        let grammar = Grammar {
            initializer: None,
            parameters: Vec::new(),
            rules: vec![rule(
                "start",
                Expr::ZeroOrMore {
                    id: NodeId(1),
                    location: Location::synthetic(),
                    expression: Box::new(Expr::Any {
                        id: NodeId(0),
                        location: Location::synthetic(),
                    }),
                },
            )],
        };
        run(&grammar, &mut metadata);
        assert_eq!(metadata.type_of(NodeId(0)).unwrap().type_name(), "any");
        assert_eq!(
            metadata.type_of(NodeId(1)).unwrap().type_name(),
            "Array<any>"
        );
    }

    #[test]
    fn action_honors_declared_return_marker() {
        let grammar = Grammar {
            initializer: None,
            parameters: Vec::new(),
            rules: vec![rule(
                "start",
                Expr::Action {
                    id: NodeId(1),
                    location: Location::synthetic(),
                    expression: Box::new(Expr::Any {
                        id: NodeId(0),
                        location: Location::synthetic(),
                    }),
                    code: CodeBlock {
                        id: CodeId(0),
                        source: "// @returns number\nreturn 1;".to_string(),
                    },
                },
            )],
        };
        let mut metadata = MetadataTable::new();
        run(&grammar, &mut metadata);
        assert_eq!(metadata.type_of(NodeId(1)).unwrap().type_name(), "number");
    }
}
