//! Tests for chain accounting, negation, bypass, and sentence rendering.

use affirm::Registry;
use serde_json::{json, Value};

fn is_number(v: &Value) -> bool {
    v.is_number()
}

#[test]
fn test_passing_tests_are_counted() {
    let is = Registry::new();
    let chain = is.new_chain(json!(20), Some("Age"));

    chain
        .validate(is_number)
        .validate(|v| v.as_i64().is_some_and(|n| n > 10))
        .validate(|v| v.as_i64().is_some_and(|n| n < 30));

    assert!(chain.valid());
    assert_eq!(chain.test_count(), 3);
    assert_eq!(chain.error_count(), 0);
}

#[test]
fn test_later_tests_still_run_after_failure() {
    let is = Registry::with_builtins();
    let chain = is.new_chain(json!("bad"), Some("Age"));

    chain.run("number", &[]).run("greater_than", &[json!(10)]);

    assert_eq!(chain.test_count(), 2);
    assert_eq!(chain.error_count(), 2);
    assert_eq!(
        chain.error_message().unwrap(),
        "Age must be numeric and be greater than 10"
    );
}

#[test]
fn test_n_failures_count_n() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(true), "flag");

    chain
        .run("string", &[])
        .run("array", &[])
        .run("object", &[])
        .run("null", &[]);

    assert_eq!(chain.error_count(), 4);
    assert_eq!(chain.test_count(), 4);
}

#[test]
fn test_not_turns_failure_into_success() {
    let is = Registry::new();
    let chain = is.that(json!("abc"), "v");

    chain.not().validate(is_number);

    assert_eq!(chain.error_count(), 0);
    assert_eq!(chain.test_count(), 1);
}

#[test]
fn test_negation_is_mutually_exclusive() {
    let is = Registry::with_builtins();
    let cases = [
        ("number", json!("12"), vec![]),
        ("number", json!("x"), vec![]),
        ("less_than", json!(3), vec![json!(5)]),
        ("less_than", json!(9), vec![json!(5)]),
        ("inside", json!(1), vec![json!([1, 2])]),
        ("empty", json!([]), vec![]),
        ("string", json!(null), vec![]),
    ];

    for (name, value, args) in cases {
        let plain = is.that(value.clone(), "v");
        plain.run(name, &args);
        let negated = is.that(value, "v");
        negated.not().run(name, &args);

        assert_ne!(plain.valid(), negated.valid(), "{name}");
    }
}

#[test]
fn test_negated_failure_message() {
    let is = Registry::with_builtins();
    let chain = is.that(json!("abc"), "code");

    chain.not().run("string", &[]).run("string", &[]);

    assert_eq!(chain.test_count(), 2);
    assert_eq!(chain.error_message().unwrap(), "code must not be a string");
}

#[test]
fn test_not_does_not_touch_manipulators() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(" 5 "), "n");

    chain.not().run("trim", &[]).run("number", &[]);

    assert_eq!(chain.value(), json!("5"));
    assert_eq!(chain.error_message().unwrap(), "n must not be numeric");
}

#[test]
fn test_override_message_from_extra_argument() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(7), "score");

    chain
        .run("between", &[json!(10), json!(20), json!("sit in [{1}, {2}] not at {0}")])
        .run("string", &[json!("be text")]);

    assert_eq!(
        chain.error_message().unwrap(),
        "score must sit in [10, 20] not at 7 and be text"
    );
}

#[test]
fn test_stop_freezes_counts_and_resume_restores() {
    let is = Registry::with_builtins();
    let chain = is.that(json!("x"), "v");

    chain.run("string", &[]).stop();
    chain
        .run("number", &[])
        .run("to_integer", &[])
        .validate(|_| false);

    assert_eq!(chain.test_count(), 1);
    assert_eq!(chain.error_count(), 0);
    assert_eq!(chain.value(), json!("x"));

    chain.resume().run("number", &[]);
    assert_eq!(chain.test_count(), 2);
    assert_eq!(chain.error_count(), 1);
}

#[test]
fn test_stop_if_invalid_only_stops_invalid_chains() {
    let is = Registry::with_builtins();

    let good = is.that(json!(123), "good");
    good.run("number", &[])
        .stop_if_invalid()
        .run("greater_than", &[json!(100)]);
    assert_eq!(good.error_count(), 0);
    assert_eq!(good.test_count(), 2);

    let bad = is.that(json!(123), "bad");
    bad.run("string", &[])
        .stop_if_invalid()
        .run("greater_than", &[json!(100)]);
    assert_eq!(bad.error_count(), 1);
    assert_eq!(bad.test_count(), 1);
}

#[test]
fn test_stop_if_invalid_sees_descendants() {
    let is = Registry::with_builtins();
    let chain = is.that(json!({"a": "x"}), "obj");

    chain.property("a").run("number", &[]);
    chain.stop_if_invalid().run("object", &[]);

    assert!(chain.is_bypassed());
    assert_eq!(chain.test_count(), 1);
}

#[test]
fn test_unknown_operation_is_recorded() {
    let is = Registry::new();
    let chain = is.that(json!(1), "n");

    chain.run("no_such_check", &[]);

    assert_eq!(chain.test_count(), 1);
    assert_eq!(
        chain.error_message().unwrap(),
        "n must be checked by a registered `no_such_check` operation"
    );
}

#[test]
fn test_default_name_is_value_text() {
    let is = Registry::with_builtins();

    let chain = is.new_chain(json!(42), None);
    chain.run("string", &[]);

    assert_eq!(chain.name(), "42");
    assert_eq!(chain.error_message().unwrap(), "42 must be a string");
}

#[test]
fn test_expressive_noops() {
    let is = Registry::with_builtins();
    let chain = is.that(json!([]), "list");

    chain.an().run("array", &[]).and().a().run("string", &[]);

    assert_eq!(chain.test_count(), 2);
    assert_eq!(chain.error_message().unwrap(), "list must be a string");
}

#[test]
fn test_throw_if_invalid() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(123), "n");

    assert!(chain.run("number", &[]).throw_if_invalid().is_ok());

    chain.run("string", &[]);
    let error = chain.throw_if_invalid().unwrap_err();
    assert_eq!(error.to_string(), "n must be a string");

    assert!(chain.valid());
    assert!(chain.throw_if_invalid().is_ok());
}

#[test]
fn test_clear_allows_reuse() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(123), "n");

    chain.run("string", &[]).stop();
    chain.clear();
    chain.not().run("string", &[]);

    assert!(chain.valid());
    assert_eq!(chain.test_count(), 1);
}
