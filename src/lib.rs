//! Cleaning, deduplication and rule-based labelling for bibliometric corpora.
//!
//! `bibmetrics` works on exported paper, author and authorship tables. It reconciles
//! inconsistent export schemas, collapses near-duplicate papers, and filters or labels
//! papers with a small declarative keyword-rule language.
//!
//! # Key Features
//!
//! - **Table loading**: find `papers`, `authors` and `authorships` exports (CSV, JSON,
//!   optionally Parquet) in a directory and normalise their columns
//! - **Schema validation**: report every missing column or duplicate identifier at once
//! - **Author names**: canonical `"Surname, I."` display names and grouping keys
//! - **Deduplication**:
//!   - Fuzzy title similarity within a publication year
//!   - Transitive duplicate groups, lowest `paper_id` wins
//!   - Deterministic, optionally parallel
//! - **Keyword filtering and labelling**:
//!   - Substring, lemma and minimum-match modes
//!   - YAML/JSON rule-sets with lenient parsing
//! - **Aggregates**: trend counts, top-k values and RAKE keyword phrases
//!
//! # Basic Usage
//!
//! ```rust
//! use bibmetrics::{Table, Value, dedupe_papers, by_keywords, MatchMode};
//!
//! let papers = Table::from_rows(
//!     ["paper_id", "title", "year"],
//!     vec![
//!         vec!["P1".into(), "Deep Learning for Building Information Modelling".into(), 2021.into()],
//!         vec!["P4".into(), "Deep Learning for Building Information Modeling".into(), 2021.into()],
//!         vec!["P3".into(), "Rule-based Planning Systems".into(), 2019.into()],
//!     ],
//! ).unwrap();
//!
//! let deduped = dedupe_papers(&papers, 0.9).unwrap();
//! assert_eq!(deduped.len(), 2);
//!
//! let planning = by_keywords(&deduped, &["planning"], MatchMode::Substring, None, None).unwrap();
//! assert_eq!(planning.get(0, "paper_id"), Some(&Value::from("P3")));
//! ```
//!
//! # Rule-based Labelling
//!
//! ```rust
//! # use bibmetrics::{Table, Value};
//! use bibmetrics::label_by_rules;
//!
//! # let papers = Table::from_rows(
//! #     ["paper_id", "title"],
//! #     vec![vec!["P3".into(), "Rule-based Planning Systems".into()]],
//! # ).unwrap();
//! let rules = r#"
//! rules:
//!   - label: Planning
//!     match: all
//!     terms: [rule, planning]
//! "#;
//!
//! let labelled = label_by_rules(&papers, rules, "labels").unwrap();
//! assert_eq!(labelled.get(0, "labels"), Some(&Value::from(vec!["Planning"])));
//! ```
//!
//! # Error Handling
//!
//! Fallible operations return the crate's [`Result`], wrapping [`BibError`]:
//!
//! ```rust
//! use bibmetrics::{BibError, Table, dedupe_papers};
//!
//! let papers = Table::new(["paper_id", "title"]);
//! match dedupe_papers(&papers, 1.5) {
//!     Err(BibError::InvalidArgument { argument, .. }) => assert_eq!(argument, "similarity"),
//!     other => panic!("unexpected: {other:?}"),
//! }
//! ```
//!
//! # Logging
//!
//! The crate emits [`tracing`] events (skipped rules, duplicate summaries, loaded
//! files). Install any subscriber to see them.

use std::path::PathBuf;
use thiserror::Error;

pub mod authors;
pub mod dedupe;
pub mod filter;
pub mod keywords;
pub mod loader;
pub mod metrics;
mod regex;
pub mod schema;
pub mod table;
pub mod text;

// Reexports
pub use authors::{canonical_name, normalize_authors};
pub use dedupe::{Deduplicator, DeduplicatorConfig, DuplicateGroup, dedupe_papers};
pub use filter::{KeywordFilter, MatchMode, Rule, by_keywords, label_by_rules};
pub use loader::{Records, TableLoader, load_records};
pub use schema::{SchemaReport, validate_schema};
pub use table::{Row, Table, Value};

/// A specialized Result type for bibliometric operations.
pub type Result<T> = std::result::Result<T, BibError>;

/// Errors raised by table operations.
#[derive(Error, Debug)]
pub enum BibError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    InvalidFormat(String),

    #[error("Missing required column `{column}` in `{table}` table")]
    MissingColumn { table: String, column: String },

    #[error("Invalid argument `{argument}`: {message}")]
    InvalidArgument { argument: String, message: String },

    #[error("No textual columns available for keyword filtering")]
    NoSearchableColumns,

    #[error("No table found for `{table}` in {}", .directory.display())]
    TableNotFound { table: String, directory: PathBuf },
}

impl BibError {
    pub(crate) fn missing_column(table: &str, column: &str) -> Self {
        BibError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    pub(crate) fn invalid_argument(argument: &str, message: impl Into<String>) -> Self {
        BibError::InvalidArgument {
            argument: argument.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(feature = "csv")]
impl From<csv::Error> for BibError {
    fn from(err: csv::Error) -> Self {
        BibError::InvalidFormat(err.to_string())
    }
}

impl From<serde_json::Error> for BibError {
    fn from(err: serde_json::Error) -> Self {
        BibError::InvalidFormat(err.to_string())
    }
}

impl From<serde_yaml::Error> for BibError {
    fn from(err: serde_yaml::Error) -> Self {
        BibError::InvalidFormat(err.to_string())
    }
}

#[cfg(feature = "parquet")]
impl From<parquet::errors::ParquetError> for BibError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        BibError::InvalidFormat(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = BibError::InvalidFormat("bad line".to_string());
        assert_eq!(error.to_string(), "Parse error: bad line");

        let error = BibError::TableNotFound {
            table: "papers".to_string(),
            directory: PathBuf::from("/data/export"),
        };
        assert_eq!(error.to_string(), "No table found for `papers` in /data/export");
    }

    #[test]
    fn test_invalid_argument_names_argument() {
        let error = BibError::invalid_argument("k", "k must be positive");
        assert_eq!(error.to_string(), "Invalid argument `k`: k must be positive");
    }
}
