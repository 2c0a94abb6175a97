//! Keyword filtering and rule-based labelling of paper tables.
//!
//! Three matching modes are available (see [`MatchMode`]):
//!
//! - `lemma`: a term matches when its crudely lemmatised tokens appear in the text's
//!   lemmatised tokens, so "networks" finds "network" but "plan" does not find
//!   "planning". Multi-word terms must appear contiguously.
//! - `substring`: a term matches anywhere in the normalised text.
//! - `minmatch`: at least `min_match` distinct terms occur as substrings.
//!
//! Text is taken from the requested columns, or from `title`, `abstract`, `keywords`
//! and `summary` when none of those exist.
//!
//! # Example
//!
//! ```
//! use bibmetrics::{KeywordFilter, MatchMode, Table};
//!
//! let papers = Table::from_rows(
//!     ["paper_id", "title"],
//!     vec![
//!         vec!["P1".into(), "Rule-based Planning Systems".into()],
//!         vec!["P2".into(), "Planning with rules of thumb".into()],
//!         vec!["P3".into(), "GAN-assisted Urban Design".into()],
//!     ],
//! ).unwrap();
//!
//! let both = KeywordFilter::new(["rule", "planning"])
//!     .mode(MatchMode::MinMatch)
//!     .min_match(2)
//!     .apply(&papers)
//!     .unwrap();
//! assert_eq!(both.len(), 2);
//! ```

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::{Result, Table, Value};

mod matcher;
mod rules;

pub use matcher::{DEFAULT_SEARCH_COLUMNS, MatchMode, Matcher, SearchText, resolve_columns};
pub use rules::{ParsedRules, Rule, RuleSource, SkipReason, SkippedRule, parse_rules, parse_rules_yaml};

/// Builder for a keyword filter over a paper table.
#[derive(Debug, Clone, Default)]
pub struct KeywordFilter {
    terms: Vec<String>,
    mode: MatchMode,
    columns: Option<Vec<String>>,
    min_match: Option<usize>,
}

impl KeywordFilter {
    /// Creates a filter for `terms` in [`MatchMode::Lemma`] over the default columns.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn mode(mut self, mode: MatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Columns to search. Names not present in the table are ignored.
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Minimum number of distinct terms for [`MatchMode::MinMatch`]. `0` means all.
    #[must_use]
    pub fn min_match(mut self, min_match: usize) -> Self {
        self.min_match = Some(min_match);
        self
    }

    /// Returns the rows of `papers` that match, in their original order.
    ///
    /// # Errors
    ///
    /// [`crate::BibError::NoSearchableColumns`] if no column can be searched.
    pub fn apply(&self, papers: &Table) -> Result<Table> {
        Ok(papers.select_rows(&self.matching_rows(papers)?))
    }

    /// Indices of the matching rows.
    pub fn matching_rows(&self, papers: &Table) -> Result<Vec<usize>> {
        if self.terms.is_empty() {
            return Ok(Vec::new());
        }
        let columns = resolve_columns(papers, self.columns.as_deref())?;
        let Some(matcher) = Matcher::new(self.terms.as_slice(), self.mode, self.min_match) else {
            return Ok(Vec::new());
        };
        Ok(papers
            .rows()
            .enumerate()
            .filter(|(_, row)| matcher.matches(row, columns.as_slice()))
            .map(|(i, _)| i)
            .collect())
    }
}

/// Returns the papers matching `terms`.
///
/// Empty or all-blank `terms` give an empty table with the same columns.
///
/// # Examples
///
/// ```
/// use bibmetrics::{MatchMode, Table, by_keywords};
///
/// let papers = Table::from_rows(
///     ["paper_id", "title", "abstract"],
///     vec![
///         vec!["P1".into(), "Urban form".into(), "Deep learning techniques for streets".into()],
///         vec!["P2".into(), "Timber joints".into(), "".into()],
///     ],
/// ).unwrap();
///
/// let hits = by_keywords(&papers, &["deep learning"], MatchMode::Lemma, None, None).unwrap();
/// assert_eq!(hits.len(), 1);
///
/// let none = by_keywords(&papers, &["deep learning"], MatchMode::Lemma, Some(&["title"][..]), None).unwrap();
/// assert!(none.is_empty());
/// ```
pub fn by_keywords<S: AsRef<str>>(
    papers: &Table,
    terms: &[S],
    mode: MatchMode,
    columns: Option<&[&str]>,
    min_match: Option<usize>,
) -> Result<Table> {
    let mut filter = KeywordFilter::new(terms.iter().map(|t| t.as_ref()));
    filter.mode = mode;
    filter.columns = columns.map(|cols| cols.iter().map(|c| c.to_string()).collect());
    filter.min_match = min_match;
    filter.apply(papers)
}

/// Labels papers with every rule they satisfy.
///
/// The result is a copy of `papers` with `label_column` (replaced if it exists) holding
/// a sorted, duplicate-free list of labels per row; unmatched rows get an empty list.
/// Rules are applied with [`by_keywords`] semantics. Entries that cannot form a rule
/// are skipped with a warning.
///
/// # Errors
///
/// - [`crate::BibError::InvalidFormat`] for unparseable rule-set text
/// - [`crate::BibError::InvalidArgument`] for an unsupported rule `mode`
/// - [`crate::BibError::NoSearchableColumns`] if a rule has no column to search
pub fn label_by_rules(
    papers: &Table,
    rules: impl Into<RuleSource>,
    label_column: &str,
) -> Result<Table> {
    let parsed = rules.into().parse()?;
    for skipped in &parsed.skipped {
        warn!(index = skipped.index, reason = skipped.reason.as_str(), "skipping rule entry");
    }

    let mut labels: Vec<BTreeSet<String>> = vec![BTreeSet::new(); papers.len()];
    let mut search_cache: HashMap<Vec<String>, Vec<SearchText>> = HashMap::new();

    for rule in &parsed.rules {
        let Some(matcher) = Matcher::new(rule.terms.as_slice(), rule.mode, rule.min_match) else {
            continue;
        };
        let columns = resolve_columns(papers, rule.columns.as_deref())?;
        let texts = search_cache
            .entry(columns)
            .or_insert_with_key(|columns| SearchText::for_table(papers, columns.as_slice()));

        let mut matched = 0usize;
        for (row_labels, text) in labels.iter_mut().zip(texts.iter()) {
            if matcher.matches_text(text) {
                row_labels.insert(rule.label.clone());
                matched += 1;
            }
        }
        debug!(label = %rule.label, mode = %rule.mode, matched, "applied rule");
    }

    let mut frame = papers.clone();
    frame.set_column(
        label_column,
        labels
            .into_iter()
            .map(|set| Value::List(set.into_iter().collect()))
            .collect(),
    )?;
    Ok(frame)
}
