//! Normalization rule tables.
//!
//! [`NormalizationRules`] bundles every lookup table the address cleanup
//! consults: the street-suffix abbreviation mapping, the set of suffixes that
//! are already canonical, the accepted postcode prefixes and the canonical
//! state form. A rules value is built once per run (from the built-in defaults
//! or a YAML file) and handed by reference to the normalizer, the suffix
//! canonicalizer and the audit.
//!
//! A YAML rules file only needs the keys it wants to change:
//!
//! ```yaml
//! suffix_mapping:
//!   Hwy: Highway
//! expected_suffixes: [Street, Avenue, Highway]
//! ```

use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::Read,
    path::Path,
};

use anyhow::{Context, Result, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};

const DEFAULT_EXPECTED_SUFFIXES: &[&str] = &[
    "Street", "Avenue", "Boulevard", "Drive", "Court", "Place", "Square", "Lane", "Road", "Trail",
    "Parkway", "Commons", "Way", "Circle", "Key", "Terrace", "Garden",
];

const DEFAULT_SUFFIX_MAPPING: &[(&str, &str)] = &[
    ("St", "Street"),
    ("St.", "Street"),
    ("Ave", "Avenue"),
    ("Ave.", "Avenue"),
    ("Rd.", "Road"),
    ("BLVD", "Boulevard"),
    ("Dr.", "Drive"),
    ("PL", "Place"),
    ("Pl", "Place"),
    ("Ln", "Lane"),
    ("Ct", "Court"),
    ("Blvd", "Boulevard"),
    ("Cir", "Circle"),
    ("Dr", "Drive"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationRules {
    /// Street suffixes considered canonical; never rewritten.
    pub expected_suffixes: BTreeSet<String>,
    /// Abbreviated suffix token to its full form. Lookup is exact.
    pub suffix_mapping: BTreeMap<String, String>,
    pub postcode: PostcodeRules,
    pub state: StateRules,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostcodeRules {
    /// A valid postcode starts with one of these.
    pub prefixes: Vec<String>,
    /// Exact length (in characters) of a valid postcode.
    pub length: usize,
    /// Values starting with this literal are recovered by keeping their
    /// trailing `length` characters, e.g. `CA94123`.
    pub region_prefix: String,
    /// Values longer than this are searched for an embedded code.
    pub embedded_min_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateRules {
    /// Canonical form; any case variant of it is rewritten to this.
    pub canonical: String,
    /// Spellings (matched exactly) that also mean the canonical state.
    pub aliases: Vec<String>,
}

impl Default for NormalizationRules {
    fn default() -> Self {
        Self {
            expected_suffixes: DEFAULT_EXPECTED_SUFFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            suffix_mapping: DEFAULT_SUFFIX_MAPPING
                .iter()
                .map(|(abbr, full)| (abbr.to_string(), full.to_string()))
                .collect(),
            postcode: PostcodeRules::default(),
            state: StateRules::default(),
        }
    }
}

impl Default for PostcodeRules {
    fn default() -> Self {
        Self {
            prefixes: vec!["94".to_string(), "95".to_string()],
            length: 5,
            region_prefix: "CA".to_string(),
            embedded_min_length: 10,
        }
    }
}

impl Default for StateRules {
    fn default() -> Self {
        Self {
            canonical: "CA".to_string(),
            aliases: vec!["California".to_string()],
        }
    }
}

impl PostcodeRules {
    /// Pattern finding the first run of `length` digits inside a longer value.
    pub fn embedded_pattern(&self) -> Result<Regex> {
        Regex::new(&format!("[0-9]{{{}}}", self.length))
            .with_context(|| format!("Building pattern for {}-digit postcodes", self.length))
    }
}

impl NormalizationRules {
    pub fn is_expected_suffix(&self, token: &str) -> bool {
        self.expected_suffixes.contains(token)
    }

    pub fn canonical_suffix(&self, token: &str) -> Option<&str> {
        self.suffix_mapping.get(token).map(String::as_str)
    }

    /// Loads rules from `path`, or returns the built-in defaults when no path
    /// is given.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).with_context(|| format!("Opening rules file {path:?}"))?;
        let mut raw = String::new();
        file.read_to_string(&mut raw)
            .with_context(|| format!("Reading rules file {path:?}"))?;
        let rules = Self::from_yaml_str(&raw)
            .with_context(|| format!("Parsing rules file {path:?}"))?;
        log::debug!(
            "Loaded {} suffix mapping(s) and {} expected suffix(es) from {:?}",
            rules.suffix_mapping.len(),
            rules.expected_suffixes.len(),
            path
        );
        Ok(rules)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let rules: Self = serde_yaml::from_str(raw)?;
        rules.validate()?;
        Ok(rules)
    }

    fn validate(&self) -> Result<()> {
        if self.postcode.length == 0 {
            bail!("postcode.length must be greater than zero");
        }
        self.postcode.embedded_pattern()?;
        if self.state.canonical.trim().is_empty() {
            bail!("state.canonical cannot be empty");
        }
        if let Some((abbr, _)) = self
            .suffix_mapping
            .iter()
            .find(|(abbr, _)| abbr.chars().any(char::is_whitespace))
        {
            bail!("Suffix mapping key '{abbr}' must be a single token");
        }
        Ok(())
    }
}
