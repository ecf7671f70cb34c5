//! Address value cleanup.
//!
//! Every `addr:*` tag value runs through [`AddressNormalizer::normalize`]. The
//! field name after the `addr:` prefix picks one [`AddressField`] rule; fields
//! without a rule pass through untouched. No rule fails: a value that cannot be
//! repaired is returned as-is so a later audit run can surface it.

use std::borrow::Cow;

use anyhow::Result;
use regex::Regex;

use crate::{
    rules::{NormalizationRules, PostcodeRules},
    street::StreetSuffixCanonicalizer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressField {
    Postcode,
    State,
    Street,
    Other,
}

impl AddressField {
    pub fn from_field_name(field: &str) -> Self {
        match field {
            "postcode" => AddressField::Postcode,
            "state" => AddressField::State,
            "street" => AddressField::Street,
            _ => AddressField::Other,
        }
    }
}

/// Returns true when `value` is a well-formed postcode under `rules`.
pub fn is_valid_postcode(value: &str, rules: &PostcodeRules) -> bool {
    value.chars().count() == rules.length
        && rules
            .prefixes
            .iter()
            .any(|prefix| value.starts_with(prefix.as_str()))
}

fn last_chars(value: &str, count: usize) -> &str {
    match value.char_indices().rev().nth(count.saturating_sub(1)) {
        Some((idx, _)) if count > 0 => &value[idx..],
        _ if count == 0 => "",
        _ => value,
    }
}

pub struct AddressNormalizer<'r> {
    rules: &'r NormalizationRules,
    streets: StreetSuffixCanonicalizer<'r>,
    embedded: Regex,
}

impl<'r> AddressNormalizer<'r> {
    pub fn new(rules: &'r NormalizationRules) -> Result<Self> {
        Ok(Self {
            rules,
            streets: StreetSuffixCanonicalizer::new(rules),
            embedded: rules.postcode.embedded_pattern()?,
        })
    }

    pub fn rules(&self) -> &'r NormalizationRules {
        self.rules
    }

    /// Normalizes `value` for the `addr:` sub-field `field`.
    pub fn normalize<'a>(&self, field: &str, value: &'a str) -> Cow<'a, str> {
        self.apply(AddressField::from_field_name(field), value)
    }

    pub fn apply<'a>(&self, field: AddressField, value: &'a str) -> Cow<'a, str> {
        match field {
            AddressField::Postcode => self.postcode(value),
            AddressField::State => self.state(value),
            AddressField::Street => self.streets.canonicalize(value),
            AddressField::Other => Cow::Borrowed(value),
        }
    }

    fn postcode<'a>(&self, value: &'a str) -> Cow<'a, str> {
        let rules = &self.rules.postcode;
        if is_valid_postcode(value, rules) {
            return Cow::Borrowed(value);
        }
        if value.starts_with(rules.region_prefix.as_str()) && !rules.region_prefix.is_empty() {
            return Cow::Borrowed(last_chars(value, rules.length));
        }
        if value.chars().count() > rules.embedded_min_length {
            if let Some(code) = self.embedded.find(value) {
                return Cow::Borrowed(code.as_str());
            }
        }
        log::trace!("Postcode '{value}' left unchanged");
        Cow::Borrowed(value)
    }

    fn state<'a>(&self, value: &'a str) -> Cow<'a, str> {
        let rules = &self.rules.state;
        if value == rules.canonical {
            return Cow::Borrowed(value);
        }
        if value.eq_ignore_ascii_case(&rules.canonical)
            || rules.aliases.iter().any(|alias| alias == value)
        {
            return Cow::Owned(rules.canonical.clone());
        }
        log::trace!("State '{value}' left unchanged");
        Cow::Borrowed(value)
    }
}
