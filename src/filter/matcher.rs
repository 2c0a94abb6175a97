//! Keyword matchers and the searchable text they run against.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::text::{lemmatise, normalise_text, normalise_value};
use crate::{BibError, Result, Row, Table};

/// Columns searched when none of the requested columns exist, in order.
pub const DEFAULT_SEARCH_COLUMNS: [&str; 4] = ["title", "abstract", "keywords", "summary"];

/// How keyword terms are compared with a paper's text.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Any term's lemmatised tokens appear (contiguously) among the text's lemmatised tokens.
    #[default]
    Lemma,
    /// At least `min_match` distinct terms appear as substrings.
    MinMatch,
    /// Any term appears as a substring.
    Substring,
}

impl MatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Lemma => "lemma",
            MatchMode::MinMatch => "minmatch",
            MatchMode::Substring => "substring",
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchMode {
    type Err = BibError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lemma" => Ok(MatchMode::Lemma),
            "minmatch" => Ok(MatchMode::MinMatch),
            "substring" => Ok(MatchMode::Substring),
            other => Err(BibError::invalid_argument(
                "mode",
                format!("unsupported mode `{other}`, choose from 'lemma', 'minmatch', 'substring'"),
            )),
        }
    }
}

/// Normalised text of one row over a set of columns.
#[derive(Debug, Clone, Default)]
pub struct SearchText {
    joined: String,
    lemmas: Vec<String>,
    lemma_set: HashSet<String>,
}

impl SearchText {
    pub fn from_row<S: AsRef<str>>(row: &Row<'_>, columns: &[S]) -> Self {
        let joined = columns
            .iter()
            .filter_map(|column| row.get(column.as_ref()))
            .map(normalise_value)
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        let lemmas: Vec<String> = joined.split_whitespace().map(lemmatise).collect();
        Self {
            lemma_set: lemmas.iter().cloned().collect(),
            lemmas,
            joined,
        }
    }

    /// Search text of every row of `table`, in row order.
    pub fn for_table<S: AsRef<str>>(table: &Table, columns: &[S]) -> Vec<Self> {
        table.rows().map(|row| Self::from_row(&row, columns)).collect()
    }

    fn contains_phrase(&self, phrase: &[String]) -> bool {
        match phrase {
            [] => false,
            [token] => self.lemma_set.contains(token),
            _ => self.lemmas.windows(phrase.len()).any(|window| window == phrase),
        }
    }
}

/// A compiled matcher, built once per filter or rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    Substring { terms: Vec<String> },
    Lemma { phrases: Vec<Vec<String>> },
    MinMatch { terms: Vec<String>, min: usize },
}

impl Matcher {
    /// Compiles `terms` for `mode`. Terms are normalised and blank ones dropped;
    /// returns `None` when nothing is left to match.
    ///
    /// For [`MatchMode::MinMatch`], `min_match` of `None` or `0` requires every term,
    /// and larger values are capped at the number of distinct terms.
    pub fn new<S: AsRef<str>>(terms: &[S], mode: MatchMode, min_match: Option<usize>) -> Option<Self> {
        let mut normalised: Vec<String> = Vec::with_capacity(terms.len());
        for term in terms.iter().map(|t| normalise_text(t.as_ref())) {
            if !term.is_empty() && !normalised.contains(&term) {
                normalised.push(term);
            }
        }
        if normalised.is_empty() {
            return None;
        }

        let matcher = match mode {
            MatchMode::Substring => Matcher::Substring { terms: normalised },
            MatchMode::Lemma => Matcher::Lemma {
                phrases: normalised
                    .iter()
                    .map(|term| term.split_whitespace().map(lemmatise).collect())
                    .collect(),
            },
            MatchMode::MinMatch => {
                let min = match min_match {
                    None | Some(0) => normalised.len(),
                    Some(n) => n.min(normalised.len()),
                };
                Matcher::MinMatch {
                    terms: normalised,
                    min,
                }
            }
        };
        Some(matcher)
    }

    /// Tests one row over `columns`.
    pub fn matches<S: AsRef<str>>(&self, row: &Row<'_>, columns: &[S]) -> bool {
        self.matches_text(&SearchText::from_row(row, columns))
    }

    /// Tests precomputed search text.
    pub fn matches_text(&self, text: &SearchText) -> bool {
        match self {
            Matcher::Substring { terms } => terms.iter().any(|term| text.joined.contains(term.as_str())),
            Matcher::Lemma { phrases } => phrases.iter().any(|phrase| text.contains_phrase(phrase)),
            Matcher::MinMatch { terms, min } => {
                terms
                    .iter()
                    .filter(|term| text.joined.contains(term.as_str()))
                    .count()
                    >= *min
            }
        }
    }
}

/// Picks the columns to search: the requested ones that exist, else every default
/// column that exists.
///
/// # Errors
///
/// [`BibError::NoSearchableColumns`] when neither yields a column.
pub fn resolve_columns<S: AsRef<str>>(table: &Table, columns: Option<&[S]>) -> Result<Vec<String>> {
    if let Some(requested) = columns {
        let resolved: Vec<String> = requested
            .iter()
            .map(AsRef::as_ref)
            .filter(|c| table.has_column(c))
            .map(String::from)
            .collect();
        if !resolved.is_empty() {
            return Ok(resolved);
        }
    }
    let resolved: Vec<String> = DEFAULT_SEARCH_COLUMNS
        .iter()
        .filter(|c| table.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if resolved.is_empty() {
        return Err(BibError::NoSearchableColumns);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn paper(title: &str, abstract_: &str) -> Table {
        Table::from_rows(
            ["paper_id", "title", "abstract"],
            vec![vec!["P1".into(), title.into(), abstract_.into()]],
        )
        .unwrap()
    }

    fn hit(matcher: &Matcher, table: &Table) -> bool {
        let row = table.row(0).unwrap();
        matcher.matches(&row, &["title", "abstract"])
    }

    #[rstest]
    #[case("lemma", MatchMode::Lemma)]
    #[case("MinMatch", MatchMode::MinMatch)]
    #[case(" substring ", MatchMode::Substring)]
    fn test_parse_mode(#[case] input: &str, #[case] expected: MatchMode) {
        assert_eq!(input.parse::<MatchMode>().unwrap(), expected);
        assert_eq!(expected.to_string().parse::<MatchMode>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_mode() {
        let err = "fuzzy".parse::<MatchMode>().unwrap_err();
        assert!(matches!(err, BibError::InvalidArgument { ref argument, .. } if argument == "mode"));
    }

    #[test]
    fn test_blank_terms_compile_to_nothing() {
        assert_eq!(Matcher::new(&["", "  ", "!!"], MatchMode::Lemma, None), None);
        assert_eq!(Matcher::new::<&str>(&[], MatchMode::Substring, None), None);
    }

    #[test]
    fn test_lemma_matches_inflections() {
        let table = paper("Urban Models", "We review deep learning techniques.");
        let matcher = Matcher::new(&["model"], MatchMode::Lemma, None).unwrap();
        assert!(hit(&matcher, &table));

        let matcher = Matcher::new(&["Techniques"], MatchMode::Lemma, None).unwrap();
        assert!(hit(&matcher, &table));

        let matcher = Matcher::new(&["deep learning"], MatchMode::Lemma, None).unwrap();
        assert!(hit(&matcher, &table));

        let matcher = Matcher::new(&["learning deep"], MatchMode::Lemma, None).unwrap();
        assert!(!hit(&matcher, &table));
    }

    #[test]
    fn test_lemma_does_not_match_inside_words() {
        let table = paper("Rule-based Planning Systems", "");
        let matcher = Matcher::new(&["rule", "plan"], MatchMode::Lemma, None).unwrap();
        assert!(!hit(&matcher, &table));

        let matcher = Matcher::new(&["rule"], MatchMode::Substring, None).unwrap();
        assert!(hit(&matcher, &table));
    }

    #[rstest]
    #[case(None, false)]
    #[case(Some(0), false)]
    #[case(Some(1), true)]
    #[case(Some(2), true)]
    #[case(Some(3), false)]
    fn test_min_match(#[case] min_match: Option<usize>, #[case] expected: bool) {
        let table = paper("Rule-based Planning Systems", "");
        let matcher = Matcher::new(&["rule", "planning", "gan"], MatchMode::MinMatch, min_match).unwrap();
        assert_eq!(hit(&matcher, &table), expected);
    }

    #[test]
    fn test_duplicate_terms_count_once() {
        let matcher = Matcher::new(&["rule", "Rule ", "planning"], MatchMode::MinMatch, None).unwrap();
        assert_eq!(
            matcher,
            Matcher::MinMatch {
                terms: vec!["rule".to_string(), "planning".to_string()],
                min: 2,
            }
        );
    }

    #[test]
    fn test_min_match_capped_at_distinct_terms() {
        let table = paper("BIM coordination", "");
        let matcher = Matcher::new(&["BIM", "bim"], MatchMode::MinMatch, Some(2)).unwrap();
        assert_eq!(
            matcher,
            Matcher::MinMatch {
                terms: vec!["bim".to_string()],
                min: 1,
            }
        );
        assert!(hit(&matcher, &table));
    }

    #[test]
    fn test_missing_cells_are_empty_text() {
        let table = Table::from_rows(
            ["title", "abstract"],
            vec![vec![Value::Null, Value::Float(f64::NAN)]],
        )
        .unwrap();
        let matcher = Matcher::new(&["nan"], MatchMode::Substring, None).unwrap();
        assert!(!hit(&matcher, &table));
    }

    #[test]
    fn test_resolve_columns() {
        let table = Table::new(["paper_id", "summary", "keywords", "title"]);
        assert_eq!(
            resolve_columns(&table, Some(&["keywords", "nope"][..])).unwrap(),
            vec!["keywords"]
        );
        assert_eq!(
            resolve_columns(&table, Some(&["nope"][..])).unwrap(),
            vec!["title", "keywords", "summary"]
        );
        assert_eq!(
            resolve_columns::<&str>(&table, None).unwrap(),
            vec!["title", "keywords", "summary"]
        );

        let table = Table::new(["paper_id", "year"]);
        assert!(matches!(
            resolve_columns::<&str>(&table, None),
            Err(BibError::NoSearchableColumns)
        ));
    }
}
