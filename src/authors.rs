//! Author name canonicalisation.
//!
//! Free-form names such as `"alice tan"` or `" Carla  Gomez "` are rendered in the
//! citation form `"Tan, A."`. This is a display transform only: `author_id` stays the
//! join key and authors whose names collapse to the same display string are not merged.

use crate::{Result, Table, Value};

/// Options for [`normalize_authors_with`].
#[derive(Debug, Clone)]
pub struct NormalizeAuthorsConfig {
    /// Column holding the raw name, rewritten in place with the canonical form.
    pub name_column: String,
    /// If set, the untouched raw name is copied into this column.
    pub raw_column: Option<String>,
    /// If set, [`author_key`] of each name is written into this column.
    pub key_column: Option<String>,
}

impl Default for NormalizeAuthorsConfig {
    fn default() -> Self {
        Self {
            name_column: "name".to_string(),
            raw_column: None,
            key_column: None,
        }
    }
}

/// Splits a raw name into `(surname, given names)`.
///
/// A comma means the name is already `"Surname, Given"`; otherwise the last
/// whitespace-separated token is the surname.
fn split_name(name: &str) -> (String, Vec<String>) {
    if let Some((family, given)) = name.split_once(',') {
        let family = family.split_whitespace().collect::<Vec<_>>().join(" ");
        let given = given
            .split(|c: char| c.is_whitespace() || c == '.')
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        return (family, given);
    }

    let mut tokens: Vec<String> = name.split_whitespace().map(String::from).collect();
    match tokens.pop() {
        Some(surname) => (surname, tokens),
        None => (String::new(), Vec::new()),
    }
}

/// Uppercases the first letter of every alphabetic run, lowercases the rest
/// (`"o'brien-SMITH"` becomes `"O'Brien-Smith"`).
fn title_case(word: &str) -> String {
    let mut result = String::with_capacity(word.len());
    let mut previous_is_letter = false;
    for c in word.chars() {
        if previous_is_letter {
            result.extend(c.to_lowercase());
        } else {
            result.extend(c.to_uppercase());
        }
        previous_is_letter = c.is_alphabetic();
    }
    result
}

fn initials(given: &[String]) -> Vec<String> {
    given
        .iter()
        .filter_map(|token| token.chars().next())
        .map(|c| c.to_uppercase().collect())
        .collect()
}

/// Renders a raw author name as `"Surname, I. I."`.
///
/// Single-token names become the title-cased token alone.
///
/// # Examples
///
/// ```
/// use bibmetrics::canonical_name;
///
/// assert_eq!(canonical_name("alice tan"), "Tan, A.");
/// assert_eq!(canonical_name(" Carla  Gomez "), "Gomez, C.");
/// assert_eq!(canonical_name("john paul jones"), "Jones, J. P.");
/// assert_eq!(canonical_name("PLATO"), "Plato");
/// ```
pub fn canonical_name(name: &str) -> String {
    let (surname, given) = split_name(name);
    let surname = title_case(&surname);
    if given.is_empty() {
        return surname;
    }
    let initials = initials(&given)
        .into_iter()
        .map(|i| format!("{i}."))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{surname}, {initials}")
}

/// A lowercase `surname_initials` key for grouping authors across spellings.
///
/// ```
/// use bibmetrics::authors::author_key;
///
/// assert_eq!(author_key("Alice Tan"), "tan_a");
/// assert_eq!(author_key("Tan, A."), "tan_a");
/// ```
pub fn author_key(name: &str) -> String {
    let (surname, given) = split_name(name);
    let surname = surname.to_lowercase();
    let initials = initials(&given).concat().to_lowercase();
    if initials.is_empty() {
        surname
    } else {
        format!("{surname}_{initials}")
    }
}

/// Canonicalises the `name` column of an authors table.
///
/// # Errors
///
/// Returns [`crate::BibError::MissingColumn`] when `author_id` or `name` is absent.
pub fn normalize_authors(authors: &Table) -> Result<Table> {
    normalize_authors_with(authors, &NormalizeAuthorsConfig::default())
}

/// [`normalize_authors`] with a custom name column and optional raw/key columns.
pub fn normalize_authors_with(authors: &Table, config: &NormalizeAuthorsConfig) -> Result<Table> {
    authors.require_columns("authors", &["author_id", config.name_column.as_str()])?;

    let mut frame = authors.clone();
    let raw: Vec<Value> = authors
        .column(&config.name_column)
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    if let Some(column) = &config.raw_column {
        frame.set_column(column, raw.clone())?;
    }
    if let Some(column) = &config.key_column {
        let keys = raw
            .iter()
            .map(|v| {
                if v.is_missing() {
                    Value::Null
                } else {
                    Value::Text(author_key(&v.to_text()))
                }
            })
            .collect();
        frame.set_column(column, keys)?;
    }
    frame.update_column(&config.name_column, |value| {
        if value.is_missing() {
            Value::Text(String::new())
        } else {
            Value::Text(canonical_name(&value.to_text()))
        }
    });
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BibError;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("alice tan", "Tan, A.")]
    #[case("BOB LEE", "Lee, B.")]
    #[case(" Carla  Gomez ", "Gomez, C.")]
    #[case("Daniel Ito", "Ito, D.")]
    #[case("mary ann o'brien", "O'Brien, M. A.")]
    #[case("jean-luc smith-jones", "Smith-Jones, J.")]
    #[case("madonna", "Madonna")]
    #[case("", "")]
    #[case("Tan, Alice", "Tan, A.")]
    #[case("Smith, J.J.", "Smith, J. J.")]
    fn test_canonical_name(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(canonical_name(raw), expected);
    }

    #[rstest]
    #[case("alice tan")]
    #[case("mary ann o'brien")]
    #[case("madonna")]
    fn test_canonical_name_is_a_fixed_point(#[case] raw: &str) {
        let once = canonical_name(raw);
        assert_eq!(canonical_name(&once), once);
    }

    #[test]
    fn test_normalize_authors() {
        let authors = Table::from_rows(
            ["author_id", "name"],
            vec![
                vec!["A1".into(), "alice tan".into()],
                vec!["A2".into(), "BOB LEE".into()],
                vec!["A3".into(), " Carla  Gomez ".into()],
                vec!["A4".into(), Value::Null],
            ],
        )
        .unwrap();

        let normalised = normalize_authors(&authors).unwrap();
        assert_eq!(normalised.get(0, "name"), Some(&Value::from("Tan, A.")));
        assert_eq!(normalised.get(2, "name"), Some(&Value::from("Gomez, C.")));
        assert_eq!(normalised.get(3, "name"), Some(&Value::from("")));
        assert_eq!(normalised.get(1, "author_id"), Some(&Value::from("A2")));
        // input untouched
        assert_eq!(authors.get(0, "name"), Some(&Value::from("alice tan")));
    }

    #[test]
    fn test_same_display_name_is_not_merged() {
        let authors = Table::from_rows(
            ["author_id", "name"],
            vec![
                vec!["A1".into(), "alice tan".into()],
                vec!["A9".into(), "Alan Tan".into()],
            ],
        )
        .unwrap();
        let normalised = normalize_authors(&authors).unwrap();
        assert_eq!(normalised.len(), 2);
        assert_eq!(normalised.get(0, "name"), normalised.get(1, "name"));
    }

    #[test]
    fn test_raw_and_key_columns() {
        let authors = Table::from_rows(
            ["author_id", "name"],
            vec![vec!["A1".into(), "alice tan".into()]],
        )
        .unwrap();
        let config = NormalizeAuthorsConfig {
            raw_column: Some("raw_name".to_string()),
            key_column: Some("author_key".to_string()),
            ..Default::default()
        };

        let normalised = normalize_authors_with(&authors, &config).unwrap();
        assert_eq!(
            normalised.columns(),
            &["author_id", "name", "raw_name", "author_key"]
        );
        assert_eq!(normalised.get(0, "raw_name"), Some(&Value::from("alice tan")));
        assert_eq!(normalised.get(0, "author_key"), Some(&Value::from("tan_a")));
    }

    #[test]
    fn test_missing_name_column() {
        let authors = Table::new(["author_id", "author"]);
        let err = normalize_authors(&authors).unwrap_err();
        assert!(matches!(
            err,
            BibError::MissingColumn { ref table, ref column } if table == "authors" && column == "name"
        ));
    }
}
