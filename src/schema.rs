//! Schema validation for paper, author and authorship tables.
//!
//! Unlike the rest of the crate, validation never fails fast: every problem found is
//! collected into a [`SchemaReport`] so callers can inspect them all before deciding
//! whether to proceed.
//!
//! ```
//! use bibmetrics::{Table, validate_schema};
//!
//! let papers = Table::new(["paper_id"]);
//! let report = validate_schema([("papers", &papers)]);
//!
//! assert!(!report.ok());
//! assert_eq!(report.issues()[0].column, "title");
//! ```

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::{Table, Value};

/// Required columns per known table kind, in reporting order.
const CONTRACTS: &[(&str, &[&str])] = &[
    ("papers", &["paper_id", "title"]),
    ("authors", &["author_id", "name"]),
    ("authorships", &["paper_id", "author_id"]),
];

/// Primary identifier column per table kind. Authorships have none.
const PRIMARY_KEYS: &[(&str, &str)] = &[("papers", "paper_id"), ("authors", "author_id")];

/// Kind of schema check that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaCheck {
    RequiredColumn,
    UniqueId,
    MissingId,
}

impl SchemaCheck {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaCheck::RequiredColumn => "required_column",
            SchemaCheck::UniqueId => "unique_id",
            SchemaCheck::MissingId => "missing_id",
        }
    }
}

/// One problem found in one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaIssue {
    pub table: String,
    pub column: String,
    pub check: SchemaCheck,
    pub message: String,
}

/// Outcome of [`validate_schema`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    issues: Vec<SchemaIssue>,
}

impl SchemaReport {
    /// `true` when no issue was found.
    pub fn ok(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn issues(&self) -> &[SchemaIssue] {
        &self.issues
    }

    /// Flat rendering with columns `table`, `check`, `message`.
    pub fn to_table(&self) -> Table {
        let rows = self
            .issues
            .iter()
            .map(|issue| {
                vec![
                    Value::from(issue.table.as_str()),
                    Value::from(issue.check.as_str()),
                    Value::from(issue.message.as_str()),
                ]
            })
            .collect();
        Table::from_parts(vec!["table".into(), "check".into(), "message".into()], rows)
    }
}

/// Validates the known tables among `tables` against their column contracts.
///
/// Tables are looked up by name (`papers`, `authors`, `authorships`); other names are
/// ignored and absent tables are not reported.
pub fn validate_schema<'a, K, I>(tables: I) -> SchemaReport
where
    K: AsRef<str>,
    I: IntoIterator<Item = (K, &'a Table)>,
{
    let supplied: BTreeMap<String, &Table> = tables
        .into_iter()
        .map(|(name, table)| (name.as_ref().to_string(), table))
        .collect();

    let mut issues = Vec::new();
    for (name, required) in CONTRACTS {
        let Some(table) = supplied.get(*name) else {
            continue;
        };
        for column in required.iter().filter(|c| !table.has_column(c)) {
            issues.push(SchemaIssue {
                table: name.to_string(),
                column: column.to_string(),
                check: SchemaCheck::RequiredColumn,
                message: format!("missing required column `{column}`"),
            });
        }
        if let Some((_, key)) = PRIMARY_KEYS.iter().find(|(kind, _)| kind == name) {
            check_identifiers(name, key, table, &mut issues);
        }
    }
    SchemaReport { issues }
}

fn check_identifiers(name: &str, key: &str, table: &Table, issues: &mut Vec<SchemaIssue>) {
    let Some(values) = table.column(key) else {
        return;
    };

    let mut missing = 0usize;
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for value in values {
        if value.is_missing() {
            missing += 1;
            continue;
        }
        let id = value.to_text().into_owned();
        let count = counts.entry(id.clone()).or_insert(0);
        if *count == 1 {
            order.push(id);
        }
        *count += 1;
    }

    if missing > 0 {
        issues.push(SchemaIssue {
            table: name.to_string(),
            column: key.to_string(),
            check: SchemaCheck::MissingId,
            message: format!("{missing} row(s) have no `{key}`"),
        });
    }
    if !order.is_empty() {
        let shown: Vec<String> = order.iter().take(5).cloned().collect();
        let suffix = if order.len() > shown.len() { ", ..." } else { "" };
        issues.push(SchemaIssue {
            table: name.to_string(),
            column: key.to_string(),
            check: SchemaCheck::UniqueId,
            message: format!(
                "{} duplicated `{key}` value(s): {}{suffix}",
                order.len(),
                shown.join(", ")
            ),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn papers() -> Table {
        Table::from_rows(
            ["paper_id", "title", "year"],
            vec![
                vec!["P1".into(), "A".into(), 2021.into()],
                vec!["P2".into(), "B".into(), 2022.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_valid_tables() {
        let papers = papers();
        let authors = Table::from_rows(
            ["author_id", "name"],
            vec![vec!["A1".into(), "alice tan".into()]],
        )
        .unwrap();
        let authorships = Table::from_rows(
            ["paper_id", "author_id"],
            vec![vec!["P1".into(), "A1".into()], vec!["P1".into(), "A1".into()]],
        )
        .unwrap();

        let report = validate_schema([
            ("papers", &papers),
            ("authors", &authors),
            ("authorships", &authorships),
        ]);
        assert!(report.ok(), "{:?}", report.issues());
        assert!(report.to_table().is_empty());
    }

    #[test]
    fn test_missing_tables_are_not_flagged() {
        let report = validate_schema([("papers", &papers())]);
        assert!(report.ok());

        let report = validate_schema(Vec::<(&str, &Table)>::new());
        assert!(report.ok());
    }

    #[test]
    fn test_unknown_tables_are_ignored() {
        let references = Table::new(["citing_paper_id", "cited_text"]);
        let report = validate_schema([("references", &references)]);
        assert!(report.ok());
    }

    #[test]
    fn test_reports_every_problem() {
        let papers = Table::from_rows(
            ["paper_id", "year"],
            vec![
                vec!["P1".into(), 2021.into()],
                vec!["P1".into(), 2021.into()],
                vec![Value::Null, 2020.into()],
            ],
        )
        .unwrap();
        let authorships = Table::new(["paper_id"]);

        let mut tables = HashMap::new();
        tables.insert("papers".to_string(), papers);
        tables.insert("authorships".to_string(), authorships);

        let report = validate_schema(&tables);
        assert!(!report.ok());

        let checks: Vec<(&str, &str, SchemaCheck)> = report
            .issues()
            .iter()
            .map(|i| (i.table.as_str(), i.column.as_str(), i.check))
            .collect();
        assert_eq!(
            checks,
            vec![
                ("papers", "title", SchemaCheck::RequiredColumn),
                ("papers", "paper_id", SchemaCheck::MissingId),
                ("papers", "paper_id", SchemaCheck::UniqueId),
                ("authorships", "author_id", SchemaCheck::RequiredColumn),
            ]
        );
    }

    #[test]
    fn test_to_table_rendering() {
        let authors = Table::from_rows(["author_id"], vec![vec!["A1".into()]]).unwrap();
        let report = validate_schema([("authors", &authors)]);
        let table = report.to_table();

        assert_eq!(table.columns(), &["table", "check", "message"]);
        assert_eq!(table.get(0, "table"), Some(&Value::from("authors")));
        assert_eq!(table.get(0, "check"), Some(&Value::from("required_column")));
        assert_eq!(
            table.get(0, "message"),
            Some(&Value::from("missing required column `name`"))
        );
    }
}
