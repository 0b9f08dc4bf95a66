//! First pass: resolves every `ruleRef` to a [`crate::ast::RuleIndex`] and
//! reports structural problems that make the rest of the pipeline
//! meaningless to run (duplicate names, dangling references, an empty
//! grammar, unreachable rules).

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::ast::{Expr, Grammar, RuleIndex};
use crate::diagnostics::{Diagnostic, DiagnosticCode};

/// Runs the reference-checking pass over `grammar`, mutating every
/// [`Expr::RuleRef::resolved`] field in place.
///
/// Returns every diagnostic found; callers decide whether any are fatal.
#[tracing::instrument(level = "debug", skip_all, fields(rule_count = grammar.rules.len()))]
pub fn run(grammar: &mut Grammar) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if grammar.rules.is_empty() {
        diagnostics.push(Diagnostic::without_location(
            DiagnosticCode::EmptyGrammar,
            "grammar declares no rules",
        ));
        return diagnostics;
    }

    let mut by_name: HashMap<String, Vec<RuleIndex>> = HashMap::new();
    for (index, rule) in grammar.rules.iter().enumerate() {
        by_name.entry(rule.name.clone()).or_default().push(index);
    }
    for (name, indices) in &by_name {
        if indices.len() > 1 {
            for &index in &indices[1..] {
                diagnostics.push(Diagnostic::new(
                    DiagnosticCode::DuplicateRule,
                    format!("rule `{name}` is declared more than once"),
                    grammar.rules[index].location,
                ));
            }
        }
    }

    let resolve: HashMap<String, RuleIndex> = by_name
        .iter()
        .filter(|(_, indices)| indices.len() == 1)
        .map(|(name, indices)| (name.clone(), indices[0]))
        .collect();

    for rule in &mut grammar.rules {
        resolve_refs(&mut rule.expression, &resolve, &mut diagnostics);
    }

    diagnostics.extend(unreachable_rules(grammar));

    debug!(diagnostic_count = diagnostics.len(), "reference check complete");
    diagnostics
}

fn resolve_refs(
    expr: &mut Expr,
    resolve: &HashMap<String, RuleIndex>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Expr::RuleRef {
        name,
        resolved,
        location,
        ..
    } = expr
    {
        match resolve.get(name) {
            Some(&index) => *resolved = Some(index),
            None => diagnostics.push(Diagnostic::new(
                DiagnosticCode::UndefinedRule,
                format!("reference to undefined rule `{name}`"),
                *location,
            )),
        }
    }
    for child in expr.children_mut() {
        resolve_refs(child, resolve, diagnostics);
    }
}

fn unreachable_rules(grammar: &Grammar) -> Vec<Diagnostic> {
    let Some(start) = grammar.start_rule() else {
        return Vec::new();
    };

    let mut reachable = HashSet::new();
    let mut stack = vec![start];
    while let Some(index) = stack.pop() {
        if !reachable.insert(index) {
            continue;
        }
        collect_rule_refs(&grammar.rules[index].expression, &mut stack);
    }

    grammar
        .rules
        .iter()
        .enumerate()
        .filter(|(index, _)| !reachable.contains(index))
        .map(|(_, rule)| {
            Diagnostic::new(
                DiagnosticCode::UnreachableRule,
                format!("rule `{}` is not reachable from the start rule", rule.name),
                rule.location,
            )
        })
        .collect()
}

fn collect_rule_refs(expr: &Expr, out: &mut Vec<RuleIndex>) {
    if let Expr::RuleRef {
        resolved: Some(index),
        ..
    } = expr
    {
        out.push(*index);
    }
    for child in expr.children() {
        collect_rule_refs(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{CodeId, NodeId};
    use crate::location::Location;

    fn rule_ref(id: u32, name: &str) -> Expr {
        Expr::RuleRef {
            id: NodeId(id),
            location: Location::synthetic(),
            name: name.to_string(),
            resolved: None,
        }
    }

    fn simple_grammar(rules: Vec<(&str, Expr)>) -> Grammar {
        Grammar {
            initializer: None,
            parameters: Vec::new(),
            rules: rules
                .into_iter()
                .map(|(name, expression)| crate::ast::Rule {
                    name: name.to_string(),
                    display_name: None,
                    annotations: Vec::new(),
                    expression,
                    location: Location::synthetic(),
                })
                .collect(),
        }
    }

    #[test]
    fn resolves_a_valid_reference() {
        let mut grammar = simple_grammar(vec![
            ("start", rule_ref(0, "tail")),
            (
                "tail",
                Expr::End {
                    id: NodeId(1),
                    location: Location::synthetic(),
                },
            ),
        ]);
        let diagnostics = run(&mut grammar);
        assert!(diagnostics.is_empty());
        let Expr::RuleRef { resolved, .. } = &grammar.rules[0].expression else {
            panic!();
        };
        assert_eq!(*resolved, Some(1));
    }

    #[test]
    fn flags_undefined_reference() {
        let mut grammar = simple_grammar(vec![("start", rule_ref(0, "missing"))]);
        let diagnostics = run(&mut grammar);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::UndefinedRule);
    }

    #[test]
    fn flags_unreachable_rule_as_warning() {
        let mut grammar = simple_grammar(vec![
            (
                "start",
                Expr::End {
                    id: NodeId(0),
                    location: Location::synthetic(),
                },
            ),
            (
                "orphan",
                Expr::End {
                    id: NodeId(1),
                    location: Location::synthetic(),
                },
            ),
        ]);
        let diagnostics = run(&mut grammar);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::UnreachableRule);
        assert_eq!(
            diagnostics[0].severity,
            crate::diagnostics::Severity::Warning
        );
    }

    #[test]
    fn empty_grammar_is_fatal_and_skips_other_checks() {
        let mut grammar = simple_grammar(vec![]);
        let diagnostics = run(&mut grammar);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::EmptyGrammar);
    }

    #[test]
    fn duplicate_rule_names_do_not_also_report_undefined() {
        let mut grammar = simple_grammar(vec![
            (
                "start",
                Expr::Sequence {
                    id: NodeId(0),
                    location: Location::synthetic(),
                    elements: vec![rule_ref(1, "dup")],
                },
            ),
            (
                "dup",
                Expr::End {
                    id: NodeId(2),
                    location: Location::synthetic(),
                },
            ),
            (
                "dup",
                Expr::SemanticAnd {
                    id: NodeId(3),
                    location: Location::synthetic(),
                    code: crate::ast::CodeBlock {
                        id: CodeId(0),
                        source: String::new(),
                    },
                },
            ),
        ]);
        let diagnostics = run(&mut grammar);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::DuplicateRule);
    }
}
