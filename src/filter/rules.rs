//! Rule-set documents.
//!
//! A rule-set is either a mapping with a `rules` sequence or a bare sequence of rule
//! entries:
//!
//! ```yaml
//! rules:
//!   - label: AI
//!     any: [deep learning, gan]
//!   - label: Planning
//!     match: all
//!     terms: [rule, planning]
//!     columns: [title]
//! ```
//!
//! Parsing is lenient: entries that are not mappings, have no label, or have no
//! terms are skipped and reported in [`ParsedRules::skipped`].

use serde::Serialize;
use serde_yaml::Value as Yaml;

use super::MatchMode;
use crate::{BibError, Result};

/// Keys whose terms are concatenated, in this order.
const TERM_KEYS: [&str; 3] = ["terms", "any", "all"];

/// One labelling rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub label: String,
    pub terms: Vec<String>,
    pub mode: MatchMode,
    pub columns: Option<Vec<String>>,
    pub min_match: Option<usize>,
}

/// Why an entry was left out of a rule-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotAMapping,
    MissingLabel,
    NoTerms,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotAMapping => "entry is not a mapping",
            SkipReason::MissingLabel => "entry has no label",
            SkipReason::NoTerms => "entry has no terms",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRule {
    /// Position of the entry in the rule sequence.
    pub index: usize,
    pub reason: SkipReason,
}

/// Rules that parsed, and the entries that did not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedRules {
    pub rules: Vec<Rule>,
    pub skipped: Vec<SkippedRule>,
}

/// Where a rule-set comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleSource {
    /// YAML (or JSON) text.
    Yaml(String),
    /// An already parsed document.
    Document(Yaml),
}

impl RuleSource {
    pub fn parse(self) -> Result<ParsedRules> {
        match self {
            RuleSource::Yaml(text) => parse_rules_yaml(&text),
            RuleSource::Document(document) => parse_rules(&document),
        }
    }
}

impl From<&str> for RuleSource {
    fn from(text: &str) -> Self {
        RuleSource::Yaml(text.to_string())
    }
}

impl From<String> for RuleSource {
    fn from(text: String) -> Self {
        RuleSource::Yaml(text)
    }
}

impl From<&String> for RuleSource {
    fn from(text: &String) -> Self {
        RuleSource::Yaml(text.clone())
    }
}

impl From<Yaml> for RuleSource {
    fn from(document: Yaml) -> Self {
        RuleSource::Document(document)
    }
}

impl From<serde_json::Value> for RuleSource {
    fn from(document: serde_json::Value) -> Self {
        RuleSource::Document(json_to_yaml(document))
    }
}

fn json_to_yaml(value: serde_json::Value) -> Yaml {
    use serde_json::Value as Json;
    match value {
        Json::Null => Yaml::Null,
        Json::Bool(b) => Yaml::Bool(b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Yaml::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Yaml::Number(u.into())
            } else {
                Yaml::Number(n.as_f64().unwrap_or(f64::NAN).into())
            }
        }
        Json::String(s) => Yaml::String(s),
        Json::Array(items) => Yaml::Sequence(items.into_iter().map(json_to_yaml).collect()),
        Json::Object(map) => Yaml::Mapping(
            map.into_iter()
                .map(|(k, v)| (Yaml::String(k), json_to_yaml(v)))
                .collect(),
        ),
    }
}

/// Parses rule-set text. Empty text yields no rules.
pub fn parse_rules_yaml(text: &str) -> Result<ParsedRules> {
    if text.trim().is_empty() {
        return Ok(ParsedRules::default());
    }
    let document: Yaml = serde_yaml::from_str(text)?;
    parse_rules(&document)
}

/// Parses a rule-set document.
///
/// # Errors
///
/// - [`BibError::InvalidFormat`] if the document is neither a mapping nor a sequence,
///   or its `rules` value is not a sequence
/// - [`BibError::InvalidArgument`] if an entry names an unsupported `mode`
pub fn parse_rules(document: &Yaml) -> Result<ParsedRules> {
    let entries: &[Yaml] = match document {
        Yaml::Null => &[],
        Yaml::Sequence(entries) => entries,
        Yaml::Mapping(_) => match document.get("rules") {
            None | Some(Yaml::Null) => &[],
            Some(Yaml::Sequence(entries)) => entries,
            Some(_) => {
                return Err(BibError::InvalidFormat(
                    "`rules` must be a sequence of rule entries".to_string(),
                ));
            }
        },
        _ => {
            return Err(BibError::InvalidFormat(
                "rule-set must be a mapping or a sequence".to_string(),
            ));
        }
    };

    let mut parsed = ParsedRules::default();
    for (index, entry) in entries.iter().enumerate() {
        match parse_entry(entry)? {
            Ok(rule) => parsed.rules.push(rule),
            Err(reason) => parsed.skipped.push(SkippedRule { index, reason }),
        }
    }
    Ok(parsed)
}

fn parse_entry(entry: &Yaml) -> Result<std::result::Result<Rule, SkipReason>> {
    if !entry.is_mapping() {
        return Ok(Err(SkipReason::NotAMapping));
    }

    let label = entry
        .get("label")
        .and_then(scalar_text)
        .map(|label| label.trim().to_string())
        .unwrap_or_default();
    if label.is_empty() {
        return Ok(Err(SkipReason::MissingLabel));
    }

    let mut terms = Vec::new();
    for key in TERM_KEYS {
        match entry.get(key) {
            Some(Yaml::Sequence(items)) => terms.extend(items.iter().filter_map(scalar_text)),
            Some(value) => terms.extend(scalar_text(value)),
            None => {}
        }
    }
    terms.retain(|term: &String| !term.trim().is_empty());
    if terms.is_empty() {
        return Ok(Err(SkipReason::NoTerms));
    }

    let mut mode = match entry.get("mode").and_then(scalar_text) {
        Some(mode) => mode.parse::<MatchMode>()?,
        None => MatchMode::Lemma,
    };

    let columns = match entry.get("columns") {
        Some(Yaml::Sequence(items)) => Some(items.iter().filter_map(scalar_text).collect()),
        _ => None,
    };

    // a negative minimum still counts as explicit and asks for at least one term
    let explicit_min = entry
        .get("min_match")
        .and_then(Yaml::as_i64)
        .map(|n| usize::try_from(n).unwrap_or(1));
    let min_match = match explicit_min {
        Some(n) => Some(n),
        None => {
            let match_all = entry
                .get("match")
                .and_then(scalar_text)
                .is_some_and(|m| m.trim().eq_ignore_ascii_case("all"));
            if match_all {
                if mode == MatchMode::Lemma {
                    mode = MatchMode::MinMatch;
                }
                Some(terms.len())
            } else {
                None
            }
        }
    };

    Ok(Ok(Rule {
        label,
        terms,
        mode,
        columns,
        min_match,
    }))
}

fn scalar_text(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        Yaml::Tagged(tagged) => scalar_text(&tagged.value),
        _ => None,
    }
}
