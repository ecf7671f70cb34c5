use std::sync::OnceLock;

use regex::Regex;

/// Tag type given to keys without a `prefix:` namespace.
pub const DEFAULT_TAG_TYPE: &str = "regular";

const PROBLEM_CHARS_PATTERN: &str = r#"[=\+/&<>;'"\?%#$@,\. \t\r\n]"#;

fn problem_chars() -> &'static Regex {
    static PROBLEM_CHARS: OnceLock<Regex> = OnceLock::new();
    PROBLEM_CHARS.get_or_init(|| {
        Regex::new(PROBLEM_CHARS_PATTERN).expect("problem character pattern is valid")
    })
}

/// Returns true when `key` contains a character that cannot appear in an
/// output column value.
pub fn is_problem_key(key: &str) -> bool {
    problem_chars().is_match(key)
}

/// A tag key split into its namespace (tag type) and field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedKey<'a> {
    pub tag_type: &'a str,
    pub field: &'a str,
}

impl<'a> ClassifiedKey<'a> {
    pub fn is_namespaced(&self) -> bool {
        self.tag_type != DEFAULT_TAG_TYPE
    }
}

/// Splits `key` on its first colon. Keys without a colon get the
/// [`DEFAULT_TAG_TYPE`] and keep the whole key as the field.
pub fn split_key(key: &str) -> ClassifiedKey<'_> {
    match key.split_once(':') {
        Some((tag_type, field)) => ClassifiedKey { tag_type, field },
        None => ClassifiedKey {
            tag_type: DEFAULT_TAG_TYPE,
            field: key,
        },
    }
}

/// Classifies a key, returning `None` for keys that must be dropped.
pub fn classify_key(key: &str) -> Option<ClassifiedKey<'_>> {
    if is_problem_key(key) {
        None
    } else {
        Some(split_key(key))
    }
}
