//! Collapsing of a pattern's literal prefix into one lookup key.
//!
//! `["Platform", "MySQL", "*", "*", "*qps*"]` becomes
//! `["Platform.MySQL", "*", "*", "*qps*"]`, so the resolver can fetch the
//! `Platform.MySQL` row directly instead of walking to it one level at a time.

use crate::glob::is_glob;

/// Joins a leading run of two or more literal segments into one segment.
pub fn compress_pattern<S: AsRef<str>>(segments: &[S]) -> Vec<String> {
    let literal_run = segments
        .iter()
        .take_while(|s| !is_glob((*s).as_ref()))
        .count();

    if segments.len() < 2 || literal_run < 2 {
        return segments.iter().map(|s| s.as_ref().to_string()).collect();
    }

    let prefix = segments[..literal_run]
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<&str>>()
        .join(".");

    std::iter::once(prefix)
        .chain(segments[literal_run..].iter().map(|s| s.as_ref().to_string()))
        .collect()
}

/// Splits a dotted pattern and compresses it.
pub fn split_pattern(pattern: &str) -> Vec<String> {
    let segments: Vec<&str> = pattern.split('.').collect();
    compress_pattern(&segments)
}
