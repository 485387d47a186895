//! Glob-style pattern matching with `*`/`?` and a trailing-space wildcard.
//!
//! A pattern ending in `" *"` (a literal space before the star) matches
//! both the bare prefix and the prefix followed by a space and anything
//! else — `"cmd *"` matches `"cmd"` and `"cmd -la"`. Every other pattern
//! compiles to an anchored regex the ordinary way: `*` becomes `.*`, `?`
//! becomes `.`, everything else is escaped literally.

use regex::Regex;

pub fn matches(pattern: &str, input: &str) -> bool {
    if let Some(base) = pattern.strip_suffix(" *") {
        return input == base || input.strip_prefix(base).is_some_and(|rest| rest.starts_with(' '));
    }
    to_regex(pattern).is_match(input)
}

fn to_regex(pattern: &str) -> Regex {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).expect("glob-derived regex is always valid")
}
