//! Lexical synonym expansion for the sparse index (part of C6/C8).
//!
//! A small, high-signal set of domain-term expansions so a query for
//! "ICFR" also matches chunks spelling out "internal control over
//! financial reporting", and so on for the handful of acronyms common
//! in audit and regulatory text. Kept deliberately tight to avoid
//! dragging in spurious matches.

use regex::Regex;
use std::sync::OnceLock;

/// Maximum length of an expanded query, guarding against pathological
/// expansion of pathological input.
const MAX_EXPANDED_LEN: usize = 512;

struct Pattern {
    regex: Regex,
    expand: fn(&regex::Captures<'_>) -> String,
}

fn patterns() -> &'static [Pattern] {
    static PATTERNS: OnceLock<Vec<Pattern>> = OnceLock::new();
    #[allow(clippy::expect_used)]
    PATTERNS.get_or_init(|| {
        vec![
            Pattern {
                regex: Regex::new(r"(?i)\bICFR\b").expect("static pattern is valid"),
                expand: |_| {
                    "(\"internal control over financial reporting\" OR ICFR)".to_string()
                },
            },
            Pattern {
                regex: Regex::new(r"(?i)\bESEF\b").expect("static pattern is valid"),
                expand: |_| "(\"European Single Electronic Format\" OR ESEF)".to_string(),
            },
            Pattern {
                regex: Regex::new(r"(?i)\biXBRL\b").expect("static pattern is valid"),
                expand: |_| "(\"inline XBRL\" OR iXBRL)".to_string(),
            },
            Pattern {
                regex: Regex::new(r"(?i)\bXBRL\b").expect("static pattern is valid"),
                expand: |_| {
                    "(\"eXtensible Business Reporting Language\" OR XBRL)".to_string()
                },
            },
            Pattern {
                regex: Regex::new(r"(?i)\bAS\s?(\d{3,4})\b").expect("static pattern is valid"),
                expand: |caps| {
                    let number = &caps[1];
                    format!("(\"Auditing Standard {number}\" OR \"AS {number}\")")
                },
            },
        ]
    })
}

/// Expands known domain acronyms in `query` into an OR-clause of their
/// full-form and acronym spellings, bounding the result to
/// [`MAX_EXPANDED_LEN`] bytes.
#[must_use]
pub fn expand_for_sparse(query: &str) -> String {
    let mut expanded = query.to_string();
    for pattern in patterns() {
        expanded = pattern
            .regex
            .replace_all(&expanded, |caps: &regex::Captures<'_>| (pattern.expand)(caps))
            .into_owned();
    }

    if expanded.len() > MAX_EXPANDED_LEN {
        let mut boundary = MAX_EXPANDED_LEN;
        while !expanded.is_char_boundary(boundary) && boundary > 0 {
            boundary -= 1;
        }
        expanded.truncate(boundary);
    }

    expanded
}
