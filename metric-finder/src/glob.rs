//! Shell-style matching of a single path segment.
//!
//! Supports `*`, `?`, `[...]` (with `!`/`^` negation) and `{a,b}` alternation.
//! Matching is anchored and case-sensitive. Unbalanced `[` or `{` are taken
//! literally.

use regex::Regex;
use std::collections::HashSet;
use tracing::{trace, warn};

/// Characters that make a segment a glob rather than a literal name.
pub const GLOB_CHARS: [char; 6] = ['*', '?', '[', ']', '{', '}'];

/// Whether `segment` contains any glob metacharacter.
pub fn is_glob(segment: &str) -> bool {
    segment.contains(GLOB_CHARS)
}

/// Returns the candidates whose whole name matches `pattern`, sorted.
pub fn match_entries<'a, I>(candidates: I, pattern: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut matched: Vec<String> = if !is_glob(pattern) {
        candidates
            .into_iter()
            .filter(|c| *c == pattern)
            .map(str::to_string)
            .collect()
    } else {
        match Regex::new(&glob_to_regex(pattern)) {
            Ok(re) => candidates
                .into_iter()
                .filter(|c| re.is_match(c))
                .map(str::to_string)
                .collect(),
            Err(e) => {
                warn!(pattern, "Glob did not compile ({}); matching literally", e);
                candidates
                    .into_iter()
                    .filter(|c| *c == pattern)
                    .map(str::to_string)
                    .collect()
            }
        }
    };
    matched.sort();
    matched.dedup();
    trace!(pattern, matched = matched.len(), "Matched entries");
    matched
}

/// Translates a glob segment into an anchored regular expression.
pub fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let braces = matched_braces(&chars);
    let mut out = String::from("^(?s:");
    let mut depth = 0usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i + 1..end]));
                    i = end;
                }
                None => out.push_str(r"\["),
            },
            '{' if braces.contains(&i) => {
                depth += 1;
                out.push_str("(?:");
            }
            '}' if braces.contains(&i) => {
                depth = depth.saturating_sub(1);
                out.push(')');
            }
            ',' if depth > 0 => out.push('|'),
            _ => out.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
        i += 1;
    }
    out.push_str(")$");
    out
}

/// Positions of `{` and `}` that pair up.
fn matched_braces(chars: &[char]) -> HashSet<usize> {
    let mut open = Vec::new();
    let mut pairs = HashSet::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '[' => {
                if let Some(end) = class_end(chars, i) {
                    i = end;
                }
            }
            '{' => open.push(i),
            '}' => {
                if let Some(start) = open.pop() {
                    pairs.insert(start);
                    pairs.insert(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    pairs
}

/// Index of the `]` closing the class opened at `start`, if any. A `]`
/// directly after the opening (or after the negation mark) is a member.
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if matches!(chars.get(j), Some('!') | Some('^')) {
        j += 1;
    }
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    (j..chars.len()).find(|&k| chars[k] == ']')
}

fn translate_class(body: &[char]) -> String {
    let mut out = String::from("[");
    let mut rest = body;
    if let Some((&first, tail)) = rest.split_first() {
        if first == '!' || first == '^' {
            out.push('^');
            rest = tail;
        }
    }
    for (k, c) in rest.iter().enumerate() {
        match c {
            '\\' | '[' | ']' | '&' | '~' => {
                out.push('\\');
                out.push(*c);
            }
            '^' if k == 0 => out.push_str(r"\^"),
            _ => out.push(*c),
        }
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn m(candidates: &[&str], pattern: &str) -> Vec<String> {
        match_entries(candidates.iter().copied(), pattern)
    }

    #[test]
    fn star_is_anchored() {
        assert_eq!(m(&["a", "ab", "b"], "a*"), vec!["a", "ab"]);
        assert_eq!(m(&["a", "ab"], "a"), vec!["a"]);
        assert_eq!(m(&["xqpsx", "qps", "qp"], "*qps*"), vec!["qps", "xqpsx"]);
    }

    #[test]
    fn question_mark_and_classes() {
        assert_eq!(m(&["load1", "load15", "load5"], "load?"), vec!["load1", "load5"]);
        assert_eq!(m(&["01", "05", "11", "15", "21"], "[01][15]"), vec!["01", "05", "11", "15"]);
        assert_eq!(m(&["a", "b", "c"], "[!a]"), vec!["b", "c"]);
        assert_eq!(m(&["a", "b", "c", "d"], "[b-c]"), vec!["b", "c"]);
        assert_eq!(m(&["]", "a"], "[]]"), vec!["]"]);
    }

    #[test]
    fn brace_alternation() {
        assert_eq!(
            m(&["cpu", "mem", "disk", "cpus"], "{cpu,mem}"),
            vec!["cpu", "mem"]
        );
        assert_eq!(
            m(&["web01", "web02", "db01"], "{web,db}0{1}"),
            vec!["db01", "web01"]
        );
    }

    #[test]
    fn case_sensitive_and_literal_metacharacters() {
        assert_eq!(m(&["MySQL", "mysql"], "My*"), vec!["MySQL"]);
        assert_eq!(m(&["a.b", "axb"], "a.?"), vec!["a.b"]);
        assert_eq!(m(&["a+b", "aab"], "a+*"), vec!["a+b"]);
        assert_eq!(m(&["[x", "x"], "[x"), vec!["[x"]);
        assert_eq!(m(&["{a", "a"], "{a*"), vec!["{a"]);
    }

    #[test]
    fn results_are_deterministic() {
        let candidates = ["zeta", "alpha", "beta"];
        assert_eq!(m(&candidates, "*"), m(&candidates, "*"));
        assert_eq!(m(&candidates, "*"), vec!["alpha", "beta", "zeta"]);
    }
}
