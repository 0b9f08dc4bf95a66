//! Black-box tests against the public [`pegc::compile`] entry point: the
//! six literal end-to-end scenarios plus the choice/lookahead laws, all
//! restated verbatim from the grammar's testable properties.
//!
//! Grammars are hand-authored JSON in the wire-format AST schema, the way
//! an external bootstrap parser's output would actually look; scenario 6
//! (the `@separator` rewrite) gets its VM-level proof alongside
//! `passes::annotations` instead, built from a hand-constructed `Grammar`
//! rather than wire-format JSON, since that keeps it next to the rewrite
//! and the reserved label constants it asserts against.

use std::sync::Arc;

use pegc::ast::CodeId;
use pegc::{ActionContext, ActionTable, CompileArtifact, CompileOptions, Output, Value};

const LOC: &str = r#"{"start":{"offset":0,"line":1,"column":1},"end":{"offset":0,"line":1,"column":1}}"#;

fn grammar(expression: &str) -> String {
    format!(
        r#"{{"parameters":[],"rules":[{{"name":"start","annotations":[],"expression":{expression},"location":{LOC}}}]}}"#
    )
}

fn parser(expression: &str) -> pegc::LoadedParser {
    compile_with(expression, ActionTable::new())
}

fn compile_with(expression: &str, actions: ActionTable) -> pegc::LoadedParser {
    let json = grammar(expression);
    let options = CompileOptions::new().with_output(Output::Parser);
    let compiled = pegc::compile(&json, &options, actions).expect("grammar compiles");
    match compiled.into_artifact() {
        CompileArtifact::Parser(p) => p,
        _ => panic!("expected a Parser artifact"),
    }
}

fn literal(value: &str) -> String {
    format!(r#"{{"type":"literal","location":{LOC},"value":"{value}","ignore_case":false}}"#)
}

#[test]
fn scenario_1_literal_match() {
    let parser = parser(&literal("a"));
    assert_eq!(parser.parse("a").unwrap(), Value::Str("a".to_string()));
    assert!(parser.parse("b").is_err());
}

#[test]
fn scenario_2_sequence_success_and_farthest_failure() {
    let expr = format!(
        r#"{{"type":"sequence","location":{LOC},"elements":[{},{}]}}"#,
        literal("a"),
        literal("b")
    );
    let parser = parser(&expr);

    assert_eq!(
        parser.parse("ab").unwrap(),
        Value::Array(vec![Value::Str("a".to_string()), Value::Str("b".to_string())])
    );

    let err = parser.parse("a").unwrap_err();
    assert_eq!(err.location.start.offset, 1);
    assert!(err.found.is_none());
    assert_eq!(err.expected.len(), 1);
    assert_eq!(err.expected[0].description, "\"b\"");
    assert_eq!(err.message, "Expected \"b\" but end of input found");
}

#[test]
fn scenario_3_action_with_label_and_class() {
    let expr = format!(
        concat!(
            r#"{{"type":"action","location":{loc},"#,
            r#""code":"return parseInt(n.join(''), 10);","#,
            r#""expression":{{"type":"labeled","location":{loc},"name":"n","#,
            r#""expression":{{"type":"one_or_more","location":{loc},"#,
            r#""expression":{{"type":"class","location":{loc},"#,
            r#""parts":[{{"begin":"0","end":"9"}}],"inverted":false,"ignore_case":false}}}}}}}}}}"#,
        ),
        loc = LOC
    );

    let mut actions = ActionTable::new();
    actions.register(
        CodeId(0),
        Arc::new(|ctx: &ActionContext<'_>| {
            let Some(Value::Array(digits)) = ctx.arg("n") else {
                return Err("expected `n` to be bound to an array of digit strings".to_string());
            };
            let joined: String = digits
                .iter()
                .map(|v| match v {
                    Value::Str(s) => s.as_str(),
                    _ => "",
                })
                .collect();
            joined
                .parse::<f64>()
                .map(Value::Number)
                .map_err(|_| format!("not a number: {joined:?}"))
        }),
    );

    let parser = compile_with(&expr, actions);
    assert_eq!(parser.parse("042").unwrap(), Value::Number(42.0));
}

#[test]
fn scenario_4_repetition_success_and_merged_failure() {
    let expr = format!(
        r#"{{"type":"sequence","location":{LOC},"elements":[{{"type":"zero_or_more","location":{LOC},"expression":{}}},{}]}}"#,
        literal("a"),
        literal("b")
    );
    let parser = parser(&expr);

    assert_eq!(
        parser.parse("aaab").unwrap(),
        Value::Array(vec![
            Value::Array(vec![
                Value::Str("a".to_string()),
                Value::Str("a".to_string()),
                Value::Str("a".to_string())
            ]),
            Value::Str("b".to_string()),
        ])
    );

    let err = parser.parse("aaac").unwrap_err();
    assert_eq!(err.location.start.offset, 3);
    assert_eq!(err.found, Some('c'));
    let descriptions: Vec<&str> = err.expected.iter().map(|e| e.description.as_str()).collect();
    assert_eq!(descriptions, vec!["\"a\"", "\"b\""]);
    assert_eq!(err.message, "Expected \"a\" or \"b\" but 'c' found");
}

#[test]
fn scenario_5_negative_lookahead_elides_from_the_result() {
    let expr = format!(
        r#"{{"type":"sequence","location":{LOC},"elements":[{{"type":"simple_not","location":{LOC},"expression":{}}},{{"type":"any","location":{LOC}}}]}}"#,
        literal("x")
    );
    let parser = parser(&expr);

    // The predicate's `undefined` result is dropped, not tupled in — a
    // two-element sequence collapsing to its one meaningful survivor.
    assert_eq!(parser.parse("y").unwrap(), Value::Str("y".to_string()));

    let err = parser.parse("x").unwrap_err();
    assert_eq!(err.location.start.offset, 0);
}

#[test]
fn choice_result_equals_parsing_the_winning_alternative_alone() {
    let expr = format!(
        r#"{{"type":"choice","location":{LOC},"alternatives":[{},{}]}}"#,
        literal("cat"),
        literal("dog")
    );
    let parser = parser(&expr);

    assert_eq!(parser.parse("cat").unwrap(), Value::Str("cat".to_string()));
    assert_eq!(parser.parse("dog").unwrap(), Value::Str("dog".to_string()));
    assert!(parser.parse("cow").is_err());
}

#[test]
fn simple_and_does_not_consume_input() {
    // If the lookahead advanced the cursor, the literal right after it
    // would have nothing left to match and the whole sequence would fail.
    let expr = format!(
        r#"{{"type":"sequence","location":{LOC},"elements":[{{"type":"simple_and","location":{LOC},"expression":{}}},{}]}}"#,
        literal("ab"),
        literal("ab")
    );
    let parser = parser(&expr);
    assert_eq!(parser.parse("ab").unwrap(), Value::Str("ab".to_string()));
}
