//! Identifier generation shared by the code-emitting formatters
//!
//! Pointer segments become language identifiers: camelCase for Swift,
//! PascalCase for Kotlin, snake_case for XML resource names. Collisions are
//! resolved by numeric suffix in first-come order, and reserved keywords get
//! a stable prefix.

use std::collections::HashSet;

/// Split pointer segments into lowercase words on non-alphanumeric
/// boundaries and case changes.
fn words(segments: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for segment in segments {
        let mut current = String::new();
        let mut prev_lower = false;
        for c in segment.chars() {
            if c.is_alphanumeric() {
                if c.is_uppercase() && prev_lower && !current.is_empty() {
                    out.push(current.clone());
                    current.clear();
                }
                prev_lower = c.is_lowercase() || c.is_numeric();
                current.extend(c.to_lowercase());
            } else {
                if !current.is_empty() {
                    out.push(current.clone());
                    current.clear();
                }
                prev_lower = false;
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
    }
    out
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// `["color", "primaryDark"]` → `colorPrimaryDark`.
pub fn camel_case(segments: &[String]) -> String {
    let words = words(segments);
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(word);
        } else {
            out.push_str(&capitalize(word));
        }
    }
    sanitize_leading(out)
}

/// `["color", "primary"]` → `ColorPrimary`.
pub fn pascal_case(segments: &[String]) -> String {
    let words = words(segments);
    let out: String = words.iter().map(|w| capitalize(w)).collect();
    sanitize_leading(out)
}

/// `["color", "primary"]` → `color_primary`.
pub fn snake_case(segments: &[String]) -> String {
    let out = words(segments).join("_");
    sanitize_leading(out)
}

/// Identifiers must not start with a digit.
fn sanitize_leading(ident: String) -> String {
    if ident.chars().next().map(|c| c.is_numeric()).unwrap_or(true) {
        format!("t{ident}")
    } else {
        ident
    }
}

/// Allocates unique identifiers, appending a numeric suffix on collision and
/// prefixing reserved keywords.
pub struct IdentAllocator {
    taken: HashSet<String>,
    keywords: &'static [&'static str],
    keyword_prefix: &'static str,
}

impl IdentAllocator {
    pub fn new(keywords: &'static [&'static str], keyword_prefix: &'static str) -> Self {
        Self {
            taken: HashSet::new(),
            keywords,
            keyword_prefix,
        }
    }

    /// Reserve and return a unique spelling of `candidate`.
    pub fn allocate(&mut self, candidate: String) -> String {
        let base = if self.keywords.contains(&candidate.as_str()) {
            format!("{}{}", self.keyword_prefix, capitalize(&candidate))
        } else {
            candidate
        };

        if self.taken.insert(base.clone()) {
            return base;
        }
        let mut suffix = 2;
        loop {
            let attempt = format!("{base}{suffix}");
            if self.taken.insert(attempt.clone()) {
                return attempt;
            }
            suffix += 1;
        }
    }
}

/// Swift keywords that collide with common token names.
pub const SWIFT_KEYWORDS: &[&str] = &[
    "default", "case", "class", "enum", "extension", "func", "import", "init", "internal",
    "let", "operator", "private", "protocol", "public", "static", "struct", "subscript",
    "typealias", "var", "break", "continue", "do", "else", "for", "if", "in", "repeat",
    "return", "switch", "where", "while", "as", "is", "nil", "self", "super", "true", "false",
];

/// Kotlin hard keywords.
pub const KOTLIN_KEYWORDS: &[&str] = &[
    "as", "break", "class", "continue", "do", "else", "false", "for", "fun", "if", "in",
    "interface", "is", "null", "object", "package", "return", "super", "this", "throw",
    "true", "try", "typealias", "val", "var", "when", "while",
];

/// JavaScript reserved words that matter for bare object keys and exports.
pub const JS_KEYWORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete",
    "do", "else", "export", "extends", "finally", "for", "function", "if", "import", "in",
    "instanceof", "new", "return", "super", "switch", "this", "throw", "try", "typeof",
    "var", "void", "while", "with", "yield",
];
