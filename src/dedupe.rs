//! Paper deduplicator implementation.
//!
//! Exports from several databases often list the same work more than once with small
//! differences in spelling or punctuation. This module groups such near-duplicate
//! paper records and keeps one canonical record per group.
//!
//! ## Algorithm
//!
//! 1. Every title is reduced to a comparison key (casefolded, punctuation stripped,
//!    whitespace collapsed).
//! 2. Papers are partitioned by exact `year`. Papers without a year are only compared
//!    with each other, never with dated papers.
//! 3. Within a partition every pair of keys is scored; a pair scoring at or above the
//!    similarity threshold is linked.
//! 4. Linked papers are closed transitively (union-find) into duplicate groups.
//! 5. Each group keeps the paper with the lexicographically smallest `paper_id`. No
//!    field-level merging takes place.
//!
//! The outcome only depends on the set of rows, not on their order or on how partitions
//! are scheduled when running in parallel.
//!
//! Absorbed papers' authorships are left alone; [`remap_authorships`] can move them
//! onto the surviving papers when a caller wants that.
//!
//! ## Usage
//!
//! ```rust
//! use bibmetrics::{Table, Value};
//! use bibmetrics::dedupe::{Deduplicator, DeduplicatorConfig, TitleSimilarity};
//!
//! let papers = Table::from_rows(
//!     ["paper_id", "title", "year"],
//!     vec![
//!         vec!["P4".into(), "Deep Learning for Building Information Modeling".into(), 2021.into()],
//!         vec!["P1".into(), "Deep Learning for Building Information Modelling".into(), 2021.into()],
//!     ],
//! ).unwrap();
//!
//! let config = DeduplicatorConfig {
//!     similarity: 0.9,
//!     metric: TitleSimilarity::Levenshtein,
//!     run_in_parallel: false,
//! };
//! let deduplicator = Deduplicator::new().with_config(config);
//!
//! let groups = deduplicator.find_duplicates(&papers).unwrap();
//! assert_eq!(groups[0].unique, "P1");
//! assert_eq!(groups[0].duplicates, vec!["P4".to_string()]);
//!
//! let deduped = deduplicator.dedupe(&papers).unwrap();
//! assert_eq!(deduped.len(), 1);
//! assert_eq!(deduped.get(0, "paper_id"), Some(&Value::from("P1")));
//! ```

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use strsim::{jaro_winkler, normalized_levenshtein};
use tracing::{debug, info};

use crate::text::title_key;
use crate::{BibError, Result, Table, Value};

/// Default title similarity threshold.
pub const DEFAULT_SIMILARITY: f64 = 0.9;

/// How two title keys are scored.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TitleSimilarity {
    /// `1 - edit distance / longer length`, over characters. Tolerates one-letter
    /// spelling variants ("modelling" / "modeling").
    #[default]
    Levenshtein,
    /// Shared tokens over all distinct tokens.
    Jaccard,
    /// Jaro-Winkler, favouring common prefixes.
    JaroWinkler,
}

impl TitleSimilarity {
    fn score(&self, a: &TitleKey, b: &TitleKey) -> f64 {
        match self {
            TitleSimilarity::Levenshtein => normalized_levenshtein(&a.key, &b.key),
            TitleSimilarity::Jaccard => {
                let shared = a.tokens.intersection(&b.tokens).count();
                let total = a.tokens.union(&b.tokens).count();
                if total == 0 {
                    0.0
                } else {
                    shared as f64 / total as f64
                }
            }
            TitleSimilarity::JaroWinkler => jaro_winkler(&a.key, &b.key),
        }
    }

    /// Upper bound of [`Self::score`] given only the key lengths, used to skip pairs
    /// that cannot reach the threshold.
    fn length_bound(&self, a: &TitleKey, b: &TitleKey) -> f64 {
        match self {
            TitleSimilarity::Levenshtein => {
                let longest = a.chars.max(b.chars);
                if longest == 0 {
                    return 1.0;
                }
                1.0 - a.chars.abs_diff(b.chars) as f64 / longest as f64
            }
            _ => 1.0,
        }
    }
}

/// Configuration options for the deduplication process.
///
/// # Examples
///
/// ```
/// use bibmetrics::dedupe::{DeduplicatorConfig, TitleSimilarity};
///
/// let config = DeduplicatorConfig {
///     similarity: 0.95,
///     metric: TitleSimilarity::JaroWinkler,
///     run_in_parallel: true,
/// };
/// ```
///
/// # Notes
///
/// - `similarity` must lie in `(0, 1]`; lower values merge more aggressively.
/// - `run_in_parallel` needs the `parallel` feature and is ignored without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeduplicatorConfig {
    /// Minimum title similarity for two papers of the same year to be linked.
    pub similarity: f64,
    /// Title similarity measure.
    pub metric: TitleSimilarity,
    /// Score year partitions in parallel.
    pub run_in_parallel: bool,
}

impl Default for DeduplicatorConfig {
    fn default() -> Self {
        Self {
            similarity: DEFAULT_SIMILARITY,
            metric: TitleSimilarity::default(),
            run_in_parallel: false,
        }
    }
}

/// A set of papers judged to be the same work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// `paper_id` of the record that is kept
    pub unique: String,
    /// `paper_id`s of the absorbed records, sorted
    pub duplicates: Vec<String>,
}

/// Deduplication engine for paper tables.
///
/// # Performance
///
/// - Time complexity: O(Σ n_y²) where n_y is the number of papers in year y
/// - Partitions can be scored in parallel
#[derive(Debug, Default, Clone)]
pub struct Deduplicator {
    config: DeduplicatorConfig,
}

#[derive(Debug)]
struct TitleKey {
    key: String,
    chars: usize,
    tokens: HashSet<String>,
}

impl TitleKey {
    fn new(title: &str) -> Self {
        let key = title_key(title);
        Self {
            chars: key.chars().count(),
            tokens: key.split(' ').filter(|s| !s.is_empty()).map(String::from).collect(),
            key,
        }
    }
}

#[derive(Debug)]
struct Candidate {
    row: usize,
    paper_id: String,
    title: TitleKey,
}

/// Disjoint-set forest over partition-local indices.
struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = i;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            // attach the larger root under the smaller so roots are stable
            let (low, high) = if a < b { (a, b) } else { (b, a) };
            self.parent[high] = low;
        }
    }
}

/// A resolved group: the kept row and the rows absorbed into it.
#[derive(Debug)]
struct RowGroup {
    unique: usize,
    duplicates: Vec<usize>,
}

impl Deduplicator {
    /// Creates a Deduplicator with the default threshold of 0.9 and Levenshtein scoring.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a Deduplicator with custom configuration.
    #[must_use]
    pub fn with_config(mut self, config: DeduplicatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DeduplicatorConfig {
        &self.config
    }

    /// Finds every group of two or more duplicate papers, sorted by the kept `paper_id`.
    ///
    /// # Errors
    ///
    /// - [`BibError::InvalidArgument`] if the threshold lies outside `(0, 1]`
    /// - [`BibError::MissingColumn`] if `paper_id` or `title` is absent
    pub fn find_duplicates(&self, papers: &Table) -> Result<Vec<DuplicateGroup>> {
        let groups = self.row_groups(papers)?;
        let id = |row: usize| papers.get(row, "paper_id").map_or_else(String::new, |v| v.to_text().into_owned());
        Ok(groups
            .into_iter()
            .map(|group| DuplicateGroup {
                unique: id(group.unique),
                duplicates: group.duplicates.into_iter().map(id).sorted().collect(),
            })
            .sorted_by(|a, b| a.unique.cmp(&b.unique))
            .collect())
    }

    /// Returns a copy of `papers` without the absorbed duplicates. Surviving rows keep
    /// their original order and all of their columns.
    pub fn dedupe(&self, papers: &Table) -> Result<Table> {
        let groups = self.row_groups(papers)?;
        let dropped: HashSet<usize> = groups.iter().flat_map(|g| g.duplicates.iter().copied()).collect();
        let kept: Vec<usize> = (0..papers.len()).filter(|row| !dropped.contains(row)).collect();
        info!(
            rows = papers.len(),
            groups = groups.len(),
            dropped = dropped.len(),
            "deduplicated papers"
        );
        Ok(papers.select_rows(&kept))
    }

    fn validate(&self, papers: &Table) -> Result<()> {
        let similarity = self.config.similarity;
        if !(similarity > 0.0 && similarity <= 1.0) {
            return Err(BibError::invalid_argument(
                "similarity",
                format!("similarity must be in (0, 1], got {similarity}"),
            ));
        }
        papers.require_columns("papers", &["paper_id", "title"])
    }

    fn row_groups(&self, papers: &Table) -> Result<Vec<RowGroup>> {
        self.validate(papers)?;
        if papers.len() < 2 {
            return Ok(Vec::new());
        }

        let partitions: Vec<Vec<Candidate>> = Self::group_by_year(papers).into_values().collect();

        #[cfg(feature = "parallel")]
        let groups: Vec<RowGroup> = if self.config.run_in_parallel {
            use rayon::prelude::*;

            partitions
                .par_iter()
                .map(|candidates| self.process_partition(candidates))
                .collect::<Vec<_>>()
                .into_iter()
                .flatten()
                .collect()
        } else {
            partitions
                .iter()
                .flat_map(|candidates| self.process_partition(candidates))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let groups: Vec<RowGroup> = partitions
            .iter()
            .flat_map(|candidates| self.process_partition(candidates))
            .collect();

        Ok(groups)
    }

    /// Buckets rows by year; `None` holds the rows without a usable year.
    fn group_by_year(papers: &Table) -> BTreeMap<Option<i64>, Vec<Candidate>> {
        let mut year_map: BTreeMap<Option<i64>, Vec<Candidate>> = BTreeMap::new();
        for (row, record) in papers.rows().enumerate() {
            let year = record.get("year").and_then(Value::as_int);
            year_map.entry(year).or_default().push(Candidate {
                row,
                paper_id: record.text("paper_id").into_owned(),
                title: TitleKey::new(&record.text("title")),
            });
        }
        debug!(partitions = year_map.len(), "grouped papers by year");
        year_map
    }

    fn process_partition(&self, candidates: &[Candidate]) -> Vec<RowGroup> {
        let threshold = self.config.similarity;
        let metric = self.config.metric;
        let mut forest = UnionFind::new(candidates.len());

        for (i, current) in candidates.iter().enumerate() {
            if current.title.key.is_empty() {
                continue;
            }
            for (j, other) in candidates.iter().enumerate().skip(i + 1) {
                if other.title.key.is_empty() {
                    continue;
                }
                if metric.length_bound(&current.title, &other.title) < threshold {
                    continue;
                }
                if metric.score(&current.title, &other.title) >= threshold {
                    forest.union(i, j);
                }
            }
        }

        let mut members: HashMap<usize, Vec<usize>> = HashMap::new();
        for i in 0..candidates.len() {
            members.entry(forest.find(i)).or_default().push(i);
        }

        members
            .into_values()
            .filter(|group| group.len() > 1)
            .map(|group| Self::select_unique(candidates, group))
            .collect()
    }

    /// Keeps the smallest `paper_id`; equal ids fall back to the earlier row.
    fn select_unique(candidates: &[Candidate], group: Vec<usize>) -> RowGroup {
        let keep = group
            .iter()
            .copied()
            .min_by(|&a, &b| {
                candidates[a]
                    .paper_id
                    .cmp(&candidates[b].paper_id)
                    .then(candidates[a].row.cmp(&candidates[b].row))
            })
            .unwrap_or(group[0]);
        RowGroup {
            unique: candidates[keep].row,
            duplicates: group
                .into_iter()
                .filter(|&i| i != keep)
                .map(|i| candidates[i].row)
                .collect(),
        }
    }
}

/// Removes near-duplicate papers, keeping the smallest `paper_id` of every group.
///
/// # Errors
///
/// Returns [`BibError::InvalidArgument`] for a threshold outside `(0, 1]` and
/// [`BibError::MissingColumn`] when `paper_id` or `title` is missing.
pub fn dedupe_papers(papers: &Table, similarity: f64) -> Result<Table> {
    let config = DeduplicatorConfig {
        similarity,
        ..Default::default()
    };
    Deduplicator::new().with_config(config).dedupe(papers)
}

/// Rewrites authorships of absorbed papers onto their group's kept paper and drops the
/// pairs this makes redundant. Row order is otherwise preserved.
pub fn remap_authorships(authorships: &Table, groups: &[DuplicateGroup]) -> Result<Table> {
    authorships.require_columns("authorships", &["paper_id", "author_id"])?;

    let target: HashMap<&str, &str> = groups
        .iter()
        .flat_map(|g| g.duplicates.iter().map(move |d| (d.as_str(), g.unique.as_str())))
        .collect();

    let mut frame = authorships.clone();
    frame.update_column("paper_id", |value| {
        match target.get(value.to_text().as_ref()) {
            Some(unique) => Value::from(*unique),
            None => value.clone(),
        }
    });

    let mut seen = HashSet::new();
    let kept: Vec<usize> = frame
        .rows()
        .enumerate()
        .filter(|(_, row)| seen.insert((row.text("paper_id").into_owned(), row.text("author_id").into_owned())))
        .map(|(i, _)| i)
        .collect();
    Ok(frame.select_rows(&kept))
}
