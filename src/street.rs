use std::{borrow::Cow, sync::OnceLock};

use regex::Regex;

use crate::rules::NormalizationRules;

fn street_type_re() -> &'static Regex {
    static STREET_TYPE: OnceLock<Regex> = OnceLock::new();
    STREET_TYPE
        .get_or_init(|| Regex::new(r"(?i)\b(\S+\.?)\n?$").expect("street type pattern is valid"))
}

/// Byte span of the trailing suffix token of `street`, if any. A single
/// trailing newline is not part of the token.
fn suffix_span(street: &str) -> Option<(usize, usize)> {
    street_type_re()
        .captures(street)
        .and_then(|caps| caps.get(1))
        .map(|m| (m.start(), m.end()))
}

/// Returns the trailing suffix token of a street name (`"Main St."` → `"St."`).
pub fn trailing_suffix(street: &str) -> Option<&str> {
    suffix_span(street).map(|(start, end)| &street[start..end])
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuffixOutcome<'a> {
    /// No trailing token could be extracted (empty or whitespace-only value).
    NoSuffix,
    /// The suffix is already in its canonical form.
    Expected,
    /// The trailing token was replaced by its canonical form.
    Rewritten(String),
    /// The suffix is neither canonical nor mapped; the rule table needs a new
    /// entry.
    Unrecognized(&'a str),
}

pub struct StreetSuffixCanonicalizer<'r> {
    rules: &'r NormalizationRules,
}

impl<'r> StreetSuffixCanonicalizer<'r> {
    pub fn new(rules: &'r NormalizationRules) -> Self {
        Self { rules }
    }

    pub fn classify<'a>(&self, street: &'a str) -> SuffixOutcome<'a> {
        let Some((start, end)) = suffix_span(street) else {
            return SuffixOutcome::NoSuffix;
        };
        let token = &street[start..end];
        if self.rules.is_expected_suffix(token) {
            return SuffixOutcome::Expected;
        }
        match self.rules.canonical_suffix(token) {
            Some(full) => {
                let mut rewritten = String::with_capacity(street.len() + full.len());
                rewritten.push_str(&street[..start]);
                rewritten.push_str(full);
                rewritten.push_str(&street[end..]);
                SuffixOutcome::Rewritten(rewritten)
            }
            None => SuffixOutcome::Unrecognized(token),
        }
    }

    /// Canonicalizes the trailing suffix, borrowing the input when no rule
    /// applies.
    pub fn canonicalize<'a>(&self, street: &'a str) -> Cow<'a, str> {
        match self.classify(street) {
            SuffixOutcome::Rewritten(rewritten) => Cow::Owned(rewritten),
            SuffixOutcome::Unrecognized(token) => {
                log::trace!("Unrecognized street suffix '{token}' in '{street}'");
                Cow::Borrowed(street)
            }
            SuffixOutcome::NoSuffix | SuffixOutcome::Expected => Cow::Borrowed(street),
        }
    }
}
