//! Tests for `or` grouping of alternative tests.

use affirm::Registry;
use serde_json::json;

#[test]
fn test_second_alternative_passes() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(123), "value");

    chain.run("string", &[]).or().run("number", &[]);

    assert!(chain.valid());
    assert_eq!(chain.test_count(), 2);
}

#[test]
fn test_first_alternative_passes_skips_the_rest() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(123), "value");

    chain
        .run("number", &[])
        .or()
        .run("string", &[])
        .or()
        .run("array", &[])
        .or()
        .run("object", &[]);

    assert!(chain.valid());
    assert_eq!(chain.test_count(), 1);
}

#[test]
fn test_all_alternatives_fail() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(123), "value");

    chain
        .run("string", &[])
        .or()
        .run("array", &[])
        .or()
        .run("object", &[]);

    assert!(!chain.valid());
    assert_eq!(chain.test_count(), 3);
    assert_eq!(chain.error_count(), 1);
    assert_eq!(
        chain.error_message().unwrap(),
        "value must be a string, be an array, or be an object"
    );
}

#[test]
fn test_n_failures_in_one_group_count_once() {
    let is = Registry::with_builtins();

    for n in 2..6 {
        let chain = is.that(json!(true), "flag");
        chain.run("string", &[]);
        for _ in 1..n {
            chain.or().run("string", &[]);
        }
        assert_eq!(chain.error_count(), 1, "group of {n}");
        assert_eq!(chain.test_count(), n, "group of {n}");
    }
}

#[test]
fn test_middle_alternative_passes() {
    let is = Registry::with_builtins();
    let chain = is.that(json!([]), "value");

    chain
        .run("string", &[])
        .or()
        .run("array", &[])
        .or()
        .run("object", &[]);

    assert!(chain.valid());
    assert_eq!(chain.test_count(), 2);
}

#[test]
fn test_group_then_plain_test() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(5), "n");

    chain
        .run("string", &[])
        .or()
        .run("null", &[])
        .run("greater_than", &[json!(10)]);

    assert_eq!(chain.error_count(), 2);
    assert_eq!(
        chain.error_message().unwrap(),
        "n must be a string or be null and be greater than 10"
    );
}

#[test]
fn test_two_groups_are_separate() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(5), "n");

    chain
        .run("string", &[])
        .or()
        .run("null", &[])
        .and()
        .run("array", &[])
        .or()
        .run("object", &[]);

    assert_eq!(chain.error_count(), 2);
    assert_eq!(
        chain.error_message().unwrap(),
        "n must be a string or be null and be an array or be an object"
    );
}

#[test]
fn test_group_after_passing_plain_test() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(5), "n");

    // The passing `number` satisfies the group; `string` never runs.
    chain
        .run("string", &[])
        .run("number", &[])
        .or()
        .run("string", &[]);

    assert_eq!(chain.test_count(), 2);
    assert_eq!(chain.error_message().unwrap(), "n must be a string");
}

#[test]
fn test_negation_inside_group() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(5), "n");

    chain.run("string", &[]).or().not().run("number", &[]);

    assert_eq!(chain.error_count(), 1);
    assert_eq!(
        chain.error_message().unwrap(),
        "n must be a string or not be numeric"
    );
}

#[test]
fn test_or_while_stopped_is_ignored() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(5), "n");

    chain.run("string", &[]).stop_if_invalid().or().run("number", &[]);

    assert_eq!(chain.error_count(), 1);
    assert_eq!(chain.test_count(), 1);
}

#[test]
fn test_unknown_operation_after_passing_alternative_is_skipped() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(5), "n");

    chain
        .run("number", &[])
        .or()
        .run("numbr", &[])
        .run("string", &[]);

    assert_eq!(chain.test_count(), 2);
    assert_eq!(chain.error_count(), 1);
    assert_eq!(chain.error_message().unwrap(), "n must be a string");
}

#[test]
fn test_unknown_operation_joins_group_and_closes_it() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(5), "n");

    chain
        .run("string", &[])
        .or()
        .run("numbr", &[])
        .run("null", &[]);

    assert_eq!(chain.test_count(), 3);
    assert_eq!(chain.error_count(), 2);
    assert_eq!(
        chain.error_message().unwrap(),
        "n must be a string or be checked by a registered `numbr` operation and be null"
    );
}

#[test]
fn test_negated_unknown_operation_still_fails() {
    let is = Registry::with_builtins();
    let chain = is.that(json!(5), "n");

    chain.not().run("numbr", &[]).run("number", &[]);

    assert_eq!(chain.test_count(), 2);
    assert_eq!(
        chain.error_message().unwrap(),
        "n must be checked by a registered `numbr` operation"
    );
}
