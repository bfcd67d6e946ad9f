//! Sentence building helpers.
//!
//! This module provides [`format_template`] for positional placeholder
//! substitution and [`join_list`] for natural-language lists such as
//! `"a, b, and c"`. Both are pure functions.

use serde_json::Value;

/// Renders a value the way it should appear inside an error sentence.
///
/// Strings render without quotes; every other value renders as its JSON text.
///
/// # Example
///
/// ```rust
/// use affirm::format::display_value;
/// use serde_json::json;
///
/// assert_eq!(display_value(&json!("abc")), "abc");
/// assert_eq!(display_value(&json!(12)), "12");
/// assert_eq!(display_value(&json!([1, 2])), "[1,2]");
/// ```
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replaces `{N}` placeholders in `template` with `args[N]`.
///
/// An empty placeholder `{}` takes the argument matching its position among
/// all placeholders, numbered or not, so `"{1} {}"` renders `args[1]` then
/// `args[1]`. Indices with no matching argument render as the empty string. Braces
/// that do not form a placeholder are copied through unchanged.
///
/// # Example
///
/// ```rust
/// use affirm::format::format_template;
///
/// let args = ["Age".to_string(), "be numeric".to_string()];
/// assert_eq!(format_template("{0} must {1}", &args), "Age must be numeric");
/// assert_eq!(format_template("{} must {}", &args), "Age must be numeric");
/// assert_eq!(format_template("be less than {5}", &args), "be less than ");
/// ```
pub fn format_template<S: AsRef<str>>(template: &str, args: &[S]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut sequential = 0usize;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        if after.as_bytes().get(digits) != Some(&b'}') {
            out.push('{');
            rest = after;
            continue;
        }

        let index = if digits == 0 {
            Some(sequential)
        } else {
            after[..digits].parse::<usize>().ok()
        };
        sequential += 1;

        if let Some(arg) = index.and_then(|i| args.get(i)) {
            out.push_str(arg.as_ref());
        }
        rest = &after[digits + 1..];
    }

    out.push_str(rest);
    out
}

/// Joins items into a natural-language list using `conjunction`.
///
/// Zero items yield an empty string, one item is returned as is, two items
/// become `"a {conjunction} b"` and three or more become
/// `"a, b, {conjunction} c"`.
///
/// # Example
///
/// ```rust
/// use affirm::format::join_list;
///
/// assert_eq!(join_list(&["be a string"], "and"), "be a string");
/// assert_eq!(join_list(&["x", "y"], "or"), "x or y");
/// assert_eq!(join_list(&["x", "y", "z"], "and"), "x, y, and z");
/// ```
pub fn join_list<S: AsRef<str>>(items: &[S], conjunction: &str) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [first, second] => format!("{} {} {}", first.as_ref(), conjunction, second.as_ref()),
        [head @ .., last] => {
            let head: Vec<&str> = head.iter().map(|item| item.as_ref()).collect();
            format!("{}, {} {}", head.join(", "), conjunction, last.as_ref())
        }
    }
}
