//! Renders [`crate::options::Output::Types`]: one declaration per rule,
//! from the type strings [`crate::passes::types`] recorded.

use crate::ast::Grammar;
use crate::metadata::MetadataTable;

/// Renders a `rule_name: inferred_type;` line per rule, in declaration order.
#[must_use]
pub fn render(grammar: &Grammar, metadata: &MetadataTable) -> String {
    let mut out = String::new();
    for rule in &grammar.rules {
        let ty = metadata
            .type_of(rule.expression.id())
            .map_or("unknown", |t| t.type_name());
        out.push_str(&format!("type {} = {ty};\n", rule.name));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, NodeId, Rule};
    use crate::location::Location;
    use crate::metadata::TypeInfo;

    #[test]
    fn renders_one_line_per_rule() {
        let grammar = Grammar {
            initializer: None,
            parameters: Vec::new(),
            rules: vec![Rule {
                name: "start".to_string(),
                display_name: None,
                annotations: Vec::new(),
                expression: Expr::Any {
                    id: NodeId(0),
                    location: Location::synthetic(),
                },
                location: Location::synthetic(),
            }],
        };
        let mut metadata = MetadataTable::new();
        metadata.set_type(NodeId(0), TypeInfo::Inferred("string".to_string()));

        assert_eq!(render(&grammar, &metadata), "type start = string;\n");
    }
}
