//! Integration tests for the expression engine, registry and autosuggest.

use formwork_expression::{
    EvaluationContext, ExpressionEngine, ExpressionError, FailureMode, FunctionEntry, Registry,
    SuggestionKind, suggest,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::{Value, json};
use std::sync::Arc;
use std::thread;

fn context(data: Value) -> EvaluationContext {
    EvaluationContext::builder(Arc::new(Registry::with_builtins()))
        .data(data)
        .build()
}

#[test]
fn single_fragment_yields_native_integer() {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({"user": {"age": 30}}));
    let value = engine.evaluate("${user.age}", &ctx).unwrap();
    assert_eq!(value, json!(30));
    assert!(value.is_i64());
}

#[test]
fn mixed_text_yields_substituted_string() {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({"user": {"name": "Ann"}}));
    assert_eq!(
        engine.evaluate("Hello ${user.name}!", &ctx).unwrap(),
        json!("Hello Ann!")
    );
}

#[rstest]
#[case("plain")]
#[case("")]
#[case("braces { } and $ alone")]
#[case("price: $5")]
fn marker_free_strings_round_trip(#[case] text: &str) {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({}));
    assert_eq!(engine.evaluate(text, &ctx).unwrap(), json!(text));
}

#[test]
fn re_resolving_resolved_value_is_idempotent() {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({"user": {"name": "Ann"}}));
    let once = engine.evaluate("Hi ${user.name}", &ctx).unwrap();
    let twice = engine.evaluate(once.as_str().unwrap(), &ctx).unwrap();
    assert_eq!(once, twice);
}

#[rstest]
#[case("${concat(user.first, ' ', user.last)}", json!("Ann Lee"))]
#[case("${upper(substring(user.first, 0, 1))}.", json!("A."))]
#[case("${length(user.roles)}", json!(2))]
#[case("${includes(user.roles, 'admin')}", json!(true))]
#[case("${default(user.nickname, user.first)}", json!("Ann"))]
#[case("${coalesce(user.middle, 'n/a')}", json!("n/a"))]
#[case("${if(user.active, 'on', 'off')}", json!("on"))]
#[case("${sum(order.lines)}", json!(60))]
#[case("${round(order.tax, 1)}", json!(4.6))]
#[case("${first(user.roles)}-${last(user.roles)}", json!("admin-editor"))]
#[case("${join(user.roles, '|')}", json!("admin|editor"))]
#[case("${to_number('12')}", json!(12))]
#[case("${[1, user.first]}", json!([1, "Ann"]))]
#[case("${user.roles[-1]}", json!("editor"))]
fn builtins_compose(#[case] text: &str, #[case] expected: Value) {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({
        "user": {"first": "Ann", "last": "Lee", "roles": ["admin", "editor"], "active": true, "middle": null},
        "order": {"lines": [10, 20, 30], "tax": 4.56}
    }));
    assert_eq!(engine.evaluate(text, &ctx).unwrap(), expected);
}

#[test]
fn errors_are_classified() {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({}));

    let err = engine.evaluate("${missing}", &ctx).unwrap_err();
    assert_eq!(err, ExpressionError::unresolved("missing"));

    let err = engine.evaluate("${nope(1)}", &ctx).unwrap_err();
    assert_eq!(err, ExpressionError::unknown_function("nope"));

    let err = engine.evaluate("${1 2}", &ctx).unwrap_err();
    assert!(matches!(err, ExpressionError::Syntax { .. }));

    let err = engine.evaluate("Hi ${name", &ctx).unwrap_err();
    assert!(matches!(err, ExpressionError::Syntax { offset: 3, .. }));

    let err = engine.evaluate("${upper(1)}", &ctx).unwrap_err();
    assert!(matches!(err, ExpressionError::InvalidArgument { .. }));
}

#[test]
fn failure_mode_is_per_call() {
    let engine = ExpressionEngine::new();
    let ctx = context(json!({}));
    let fallback = FailureMode::Fallback(json!(0));
    assert_eq!(engine.evaluate_with("${x}", &ctx, &fallback).unwrap(), json!(0));
    assert_eq!(
        engine
            .evaluate_with("${x}", &ctx, &FailureMode::KeepOriginal)
            .unwrap(),
        json!("${x}")
    );
    assert!(engine.evaluate_with("${x}", &ctx, &FailureMode::Strict).is_err());
}

#[test]
fn local_overrides_beat_registry_and_data() {
    let engine = ExpressionEngine::new();
    let registry = Arc::new(Registry::with_builtins());
    registry.set_variable("currency", json!("EUR"));

    let ctx = EvaluationContext::builder(Arc::clone(&registry))
        .data(json!({"currency": "USD"}))
        .build();
    assert_eq!(engine.evaluate("${currency}", &ctx).unwrap(), json!("EUR"));

    let ctx = EvaluationContext::builder(registry)
        .data(json!({"currency": "USD"}))
        .local("currency", json!("GBP"))
        .build();
    assert_eq!(engine.evaluate("${currency}", &ctx).unwrap(), json!("GBP"));
}

#[test]
fn custom_function_failure_is_function_error() {
    let engine = ExpressionEngine::new();
    let registry = Registry::with_builtins();
    registry.register(
        FunctionEntry::new("lookup_city", |args: &[Value]| match args.first() {
            Some(Value::String(zip)) if zip == "0150" => Ok(json!("Oslo")),
            _ => Err(ExpressionError::function("lookup_city", "unknown postal code")),
        })
        .with_description("Resolve a postal code")
        .with_params(["zip"]),
    );
    let ctx = EvaluationContext::builder(Arc::new(registry))
        .data(json!({"zip": "0150", "bad_zip": "9999"}))
        .build();

    assert_eq!(engine.evaluate("${lookup_city(zip)}", &ctx).unwrap(), json!("Oslo"));
    let err = engine.evaluate("${lookup_city(bad_zip)}", &ctx).unwrap_err();
    assert_eq!(err.code(), "EXPR:FUNCTION");
}

#[test]
fn registry_supports_concurrent_readers() {
    let engine = Arc::new(ExpressionEngine::new());
    let registry = Arc::new(Registry::with_builtins());
    registry.set_variable("greeting", json!("hi"));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let ctx = EvaluationContext::builder(registry)
                    .data_value("n", json!(i))
                    .build();
                engine.evaluate("${greeting} ${n}", &ctx).unwrap()
            })
        })
        .collect();

    let mut results: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.sort_by_key(ToString::to_string);
    assert_eq!(
        results,
        vec![json!("hi 0"), json!("hi 1"), json!("hi 2"), json!("hi 3")]
    );
}

#[test]
fn suggestions_cover_form_values_and_functions() {
    let ctx = context(json!({"email": "", "employer": {"name": "Acme", "size": 10}}));

    let suggestions = suggest("Contact: ${em", &ctx, 5);
    assert_eq!(suggestions[0].label, "email");
    assert_eq!(suggestions[1].label, "employer");
    assert_eq!(suggestions[0].kind, SuggestionKind::Variable);
    assert!(suggestions.iter().any(|s| s.label == "is_empty"));

    let suggestions = suggest("${employer.", &ctx, 5);
    let labels: Vec<&str> = suggestions.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(labels, vec!["employer.name", "employer.size"]);
}

#[test]
fn references_feed_dependency_analysis() {
    let engine = ExpressionEngine::new();
    assert_eq!(
        engine
            .references("${if(country, upper(address.city), items[0].name)}")
            .unwrap(),
        vec!["country", "address.city", "items[0].name"]
    );
    assert!(engine.references("static").unwrap().is_empty());
}
