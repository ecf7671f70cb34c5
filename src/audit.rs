//! Read-only audit of `addr:*` tag values.
//!
//! The audit never rewrites anything; it lists postcodes that fail the
//! validity check, or counts values (street suffixes for `street`) so the rule
//! tables can be extended before a shaping run.

use std::{collections::HashMap, io::BufRead, str::FromStr};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;
use serde::Serialize;

use crate::{
    cli::{AuditArgs, AuditFormat},
    normalize::is_valid_postcode,
    osm::{Element, ElementKind, ElementStream},
    rules::NormalizationRules,
    street::trailing_suffix,
    table,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditField {
    Postcode,
    Street,
    /// Any other address field, counted by raw value.
    Value(String),
}

impl AuditField {
    pub fn name(&self) -> &str {
        match self {
            AuditField::Postcode => "postcode",
            AuditField::Street => "street",
            AuditField::Value(name) => name,
        }
    }

    pub fn tag_key(&self) -> String {
        format!("addr:{}", self.name())
    }
}

impl FromStr for AuditField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let field = value.trim();
        let field = field.strip_prefix("addr:").unwrap_or(field);
        match field {
            "" => Err("Audit field cannot be empty".to_string()),
            "postcode" => Ok(AuditField::Postcode),
            "street" => Ok(AuditField::Street),
            other => Ok(AuditField::Value(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidValue {
    /// 1-based ordinal of the owning node or way among all top-level
    /// elements; child and raw XML start tags are not counted.
    pub sequence: usize,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

impl ValueCount {
    pub fn new(value: impl Into<String>, count: usize) -> Self {
        Self {
            value: value.into(),
            count,
        }
    }
}

/// Counts are ordered by count (descending) then value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuditReport {
    InvalidPostcodes { values: Vec<InvalidValue> },
    SuffixCounts { counts: Vec<ValueCount> },
    ValueCounts { counts: Vec<ValueCount> },
}

impl AuditReport {
    /// Keeps the first `top` findings; `top == 0` keeps all.
    pub fn top(mut self, top: usize) -> Self {
        if top > 0 {
            match &mut self {
                AuditReport::InvalidPostcodes { values } => values.truncate(top),
                AuditReport::SuffixCounts { counts } | AuditReport::ValueCounts { counts } => {
                    counts.truncate(top)
                }
            }
        }
        self
    }

    /// Display rows in report order; `top == 0` keeps all.
    pub fn rows(&self, top: usize) -> Vec<Vec<String>> {
        let rows: Vec<Vec<String>> = match self {
            AuditReport::InvalidPostcodes { values } => values
                .iter()
                .map(|invalid| vec![invalid.sequence.to_string(), invalid.value.clone()])
                .collect(),
            AuditReport::SuffixCounts { counts } | AuditReport::ValueCounts { counts } => counts
                .iter()
                .map(|entry| vec![entry.value.clone(), entry.count.to_string()])
                .collect(),
        };
        if top > 0 {
            rows.into_iter().take(top).collect()
        } else {
            rows
        }
    }

    pub fn headers(&self) -> Vec<String> {
        let headers: [&str; 2] = match self {
            AuditReport::InvalidPostcodes { .. } => ["element", "postcode"],
            AuditReport::SuffixCounts { .. } => ["suffix", "count"],
            AuditReport::ValueCounts { .. } => ["value", "count"],
        };
        headers.iter().map(|h| h.to_string()).collect()
    }

    pub fn len(&self) -> usize {
        match self {
            AuditReport::InvalidPostcodes { values } => values.len(),
            AuditReport::SuffixCounts { counts } | AuditReport::ValueCounts { counts } => {
                counts.len()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct AuditAccumulator<'r> {
    field: AuditField,
    key: String,
    rules: &'r NormalizationRules,
    invalid: Vec<InvalidValue>,
    counts: HashMap<String, usize>,
}

impl<'r> AuditAccumulator<'r> {
    fn new(field: AuditField, rules: &'r NormalizationRules) -> Self {
        Self {
            key: field.tag_key(),
            field,
            rules,
            invalid: Vec::new(),
            counts: HashMap::new(),
        }
    }

    fn ingest(&mut self, sequence: usize, element: &Element) {
        for (key, value) in element.tags() {
            if key != self.key {
                continue;
            }
            match &self.field {
                AuditField::Postcode => {
                    if !is_valid_postcode(value, &self.rules.postcode) {
                        self.invalid.push(InvalidValue {
                            sequence,
                            value: value.to_string(),
                        });
                    }
                }
                AuditField::Street => {
                    if let Some(token) = trailing_suffix(value)
                        && !self.rules.is_expected_suffix(token)
                    {
                        *self.counts.entry(token.to_string()).or_insert(0) += 1;
                    }
                }
                AuditField::Value(_) => {
                    *self.counts.entry(value.to_string()).or_insert(0) += 1;
                }
            }
        }
    }

    fn sorted_counts(counts: HashMap<String, usize>) -> Vec<ValueCount> {
        counts
            .into_iter()
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
            .map(|(value, count)| ValueCount { value, count })
            .collect()
    }

    fn finish(self) -> AuditReport {
        match self.field {
            AuditField::Postcode => AuditReport::InvalidPostcodes {
                values: self.invalid,
            },
            AuditField::Street => AuditReport::SuffixCounts {
                counts: Self::sorted_counts(self.counts),
            },
            AuditField::Value(_) => AuditReport::ValueCounts {
                counts: Self::sorted_counts(self.counts),
            },
        }
    }
}

/// Audits `field` across the node and way elements of `elements`.
pub fn audit_stream<R: BufRead>(
    elements: ElementStream<R>,
    field: AuditField,
    rules: &NormalizationRules,
) -> Result<AuditReport> {
    let mut accumulator = AuditAccumulator::new(field, rules);
    for (idx, element) in elements.enumerate() {
        let element = element.with_context(|| format!("Reading element {}", idx + 1))?;
        if matches!(element.kind, ElementKind::Node | ElementKind::Way) {
            accumulator.ingest(idx + 1, &element);
        }
    }
    Ok(accumulator.finish())
}

pub fn execute(args: &AuditArgs) -> Result<()> {
    let rules = NormalizationRules::resolve(args.rules.as_deref())?;
    let field = args.field.clone();
    info!(
        "Auditing '{}' in '{}'",
        field.tag_key(),
        args.input.display()
    );
    let elements = ElementStream::open(&args.input)?;
    let report = audit_stream(elements, field.clone(), &rules)
        .with_context(|| format!("Auditing {:?}", args.input))?;
    let findings = report.len();
    let report = report.top(args.top);
    match args.format {
        AuditFormat::Table => {
            if report.is_empty() {
                println!("No findings for '{}'.", field.tag_key());
            } else {
                table::print_table(&report.headers(), &report.rows(0));
            }
        }
        AuditFormat::Json => {
            let rendered =
                serde_json::to_string_pretty(&report).context("Serializing audit report")?;
            println!("{rendered}");
        }
    }
    info!(
        "Audit of '{}' produced {} finding(s)",
        field.tag_key(),
        findings
    );
    Ok(())
}
