//! Loading paper, author and authorship tables from an export directory.
//!
//! Each table is looked up under a few conventional file stems, trying every supported
//! suffix per stem; the first file that exists wins:
//!
//! | table         | stems                                   |
//! |---------------|-----------------------------------------|
//! | `papers`      | `papers`, `papers_metadata`, `metadata` |
//! | `authors`     | `authors`, `researchers`                |
//! | `authorships` | `authorships`, `paper_authors`, `links` |
//!
//! Suffixes are tried in the order `.csv`, `.json`, `.parquet`. Parquet files are only
//! readable with the `parquet` feature.
//!
//! After reading, column names are reconciled so that every table carries the
//! identifiers the rest of the crate joins on (`paper_id`, `author_id`).
//!
//! # Example
//!
//! ```no_run
//! use bibmetrics::loader::{LoaderConfig, TableLoader};
//!
//! let mut config = LoaderConfig::new();
//! config.set_delimiter(b';');
//!
//! let records = TableLoader::new().with_config(config).load("exports/2024").unwrap();
//! println!("{} papers", records.papers.len());
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{BibError, Result, Table, Value};

/// Candidate file stems per table, in lookup order.
const KNOWN_STEMS: &[(&str, &[&str])] = &[
    ("papers", &["papers", "papers_metadata", "metadata"]),
    ("authors", &["authors", "researchers"]),
    ("authorships", &["authorships", "paper_authors", "links"]),
];

const SUPPORTED_SUFFIXES: [&str; 3] = ["csv", "json", "parquet"];

const PAPER_ID_ALIASES: [&str; 3] = ["id", "paperID", "paper"];

/// Venue given to papers whose export has none.
pub const UNKNOWN_VENUE: &str = "Unknown";

/// The three normalised tables of an export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Records {
    pub papers: Table,
    pub authors: Table,
    pub authorships: Table,
}

/// Options for reading delimited files.
///
/// # Examples
///
/// ```
/// use bibmetrics::loader::LoaderConfig;
///
/// let mut config = LoaderConfig::new();
/// config.set_delimiter(b'\t').set_trim(false);
/// ```
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Field delimiter for CSV files
    delimiter: u8,
    /// Whether surrounding whitespace is stripped from CSV cells
    trim: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderConfig {
    /// Comma-delimited, trimmed cells.
    #[must_use]
    pub fn new() -> Self {
        Self {
            delimiter: b',',
            trim: true,
        }
    }

    pub fn set_delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    pub fn set_trim(&mut self, trim: bool) -> &mut Self {
        self.trim = trim;
        self
    }
}

/// Finds, reads and normalises the tables of an export directory.
#[derive(Debug, Clone, Default)]
pub struct TableLoader {
    config: LoaderConfig,
}

impl TableLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Loads and normalises `papers`, `authors` and `authorships` from `directory`.
    ///
    /// # Errors
    ///
    /// - [`BibError::TableNotFound`] when a table has no file (including when the
    ///   directory itself does not exist)
    /// - [`BibError::InvalidFormat`] for unreadable file contents
    /// - [`BibError::MissingColumn`] when a required column cannot be reconciled
    pub fn load<P: AsRef<Path>>(&self, directory: P) -> Result<Records> {
        let directory = directory.as_ref();
        let papers = self.read_table(&find_table(directory, "papers")?)?;
        let authors = self.read_table(&find_table(directory, "authors")?)?;
        let authorships = self.read_table(&find_table(directory, "authorships")?)?;

        Ok(Records {
            papers: normalise_papers(&papers)?,
            authors: normalise_authors(&authors)?,
            authorships: normalise_authorships(&authorships)?,
        })
    }

    /// Reads one file into a table according to its suffix, without normalising it.
    pub fn read_table(&self, path: &Path) -> Result<Table> {
        let suffix = path.extension().and_then(|s| s.to_str()).unwrap_or_default();
        let table = match suffix {
            "csv" => self.read_csv(path)?,
            "json" => read_json(path)?,
            "parquet" => read_parquet(path)?,
            other => {
                return Err(BibError::InvalidFormat(format!(
                    "unsupported table format `{other}` for {}",
                    path.display()
                )));
            }
        };
        debug!(path = %path.display(), rows = table.len(), columns = table.columns().len(), "loaded table");
        Ok(table)
    }

    #[cfg(feature = "csv")]
    fn read_csv(&self, path: &Path) -> Result<Table> {
        use csv::{ReaderBuilder, Trim};

        let mut reader = ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(if self.config.trim { Trim::All } else { Trim::None })
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let width = headers.len();
        let mut table = Table::new(headers);
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() > width {
                return Err(BibError::InvalidFormat(format!(
                    "{}: record {} has {} fields but the header has {width}",
                    path.display(),
                    line + 1,
                    record.len()
                )));
            }
            let mut row: Vec<Value> = record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Value::Null
                    } else {
                        Value::Text(cell.to_string())
                    }
                })
                .collect();
            // short rows are padded with nulls
            row.resize(width, Value::Null);
            table.push_row(row)?;
        }
        Ok(table)
    }

    #[cfg(not(feature = "csv"))]
    fn read_csv(&self, path: &Path) -> Result<Table> {
        Err(BibError::InvalidFormat(format!(
            "reading {} requires the `csv` feature",
            path.display()
        )))
    }
}

/// Loads an export directory with the default [`LoaderConfig`].
pub fn load_records<P: AsRef<Path>>(directory: P) -> Result<Records> {
    TableLoader::new().load(directory)
}

/// Locates the file for `table` in `directory`.
pub fn find_table(directory: &Path, table: &str) -> Result<PathBuf> {
    let stems = KNOWN_STEMS
        .iter()
        .find(|(kind, _)| *kind == table)
        .map(|(_, stems)| *stems)
        .unwrap_or_default();

    stems
        .iter()
        .flat_map(|stem| {
            SUPPORTED_SUFFIXES
                .iter()
                .map(move |suffix| directory.join(format!("{stem}.{suffix}")))
        })
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| BibError::TableNotFound {
            table: table.to_string(),
            directory: directory.to_path_buf(),
        })
}

fn read_json(path: &Path) -> Result<Table> {
    let content = fs::read_to_string(path)?;
    Table::from_json(serde_json::from_str(&content)?)
}

#[cfg(feature = "parquet")]
fn read_parquet(path: &Path) -> Result<Table> {
    use parquet::file::reader::{FileReader, SerializedFileReader};

    let reader = SerializedFileReader::new(fs::File::open(path)?)?;
    let columns: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema()
        .get_fields()
        .iter()
        .map(|field| field.name().to_string())
        .collect();

    let mut table = Table::new(columns);
    for row in reader.get_row_iter(None)? {
        let row = row?;
        let mut cells = vec![Value::Null; table.columns().len()];
        for (name, field) in row.get_column_iter() {
            if let Some(index) = table.column_index(name) {
                cells[index] = parquet_value(field);
            }
        }
        table.push_row(cells)?;
    }
    Ok(table)
}

#[cfg(feature = "parquet")]
fn parquet_value(field: &parquet::record::Field) -> Value {
    use parquet::record::Field;

    match field {
        Field::Null => Value::Null,
        Field::Bool(b) => Value::Bool(*b),
        Field::Byte(v) => Value::Int(i64::from(*v)),
        Field::Short(v) => Value::Int(i64::from(*v)),
        Field::Int(v) => Value::Int(i64::from(*v)),
        Field::Long(v) => Value::Int(*v),
        Field::UByte(v) => Value::Int(i64::from(*v)),
        Field::UShort(v) => Value::Int(i64::from(*v)),
        Field::UInt(v) => Value::Int(i64::from(*v)),
        Field::ULong(v) => i64::try_from(*v).map_or(Value::Float(*v as f64), Value::Int),
        Field::Float(v) => Value::Float(f64::from(*v)),
        Field::Double(v) => Value::Float(*v),
        Field::Str(s) => Value::Text(s.clone()),
        Field::ListInternal(list) => Value::List(
            list.elements()
                .iter()
                .filter(|item| !matches!(item, Field::Null))
                .map(|item| match item {
                    Field::Str(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        ),
        other => Value::Text(other.to_string()),
    }
}

#[cfg(not(feature = "parquet"))]
fn read_parquet(path: &Path) -> Result<Table> {
    Err(BibError::InvalidFormat(format!(
        "reading {} requires the `parquet` feature",
        path.display()
    )))
}

/// Renames the first alias present to `canonical`, unless `canonical` already exists.
fn rename_first(frame: &mut Table, aliases: &[&str], canonical: &str) {
    if frame.has_column(canonical) {
        return;
    }
    if let Some(alias) = aliases.iter().find(|alias| frame.has_column(alias)) {
        frame.rename_column(alias, canonical);
    }
}

/// Adds `column` at the front holding each row's position, if it is absent.
fn synthesise_id(frame: &mut Table, column: &str) -> Result<()> {
    if frame.has_column(column) {
        return Ok(());
    }
    let ids = (0..frame.len()).map(|i| Value::Text(i.to_string())).collect();
    frame.insert_column(0, column, ids)
}

/// Reconciles a raw papers table.
///
/// `id`, `paperID` or `paper` become `paper_id` (synthesised from the row position when
/// none exists), `year` is coerced to an integer or null, and `venue` is added or
/// filled with `"Unknown"`.
///
/// # Errors
///
/// [`BibError::MissingColumn`] when there is no `title`.
pub fn normalise_papers(papers: &Table) -> Result<Table> {
    let mut frame = papers.clone();
    rename_first(&mut frame, &PAPER_ID_ALIASES, "paper_id");
    synthesise_id(&mut frame, "paper_id")?;
    frame.require_columns("papers", &["paper_id", "title"])?;

    frame.update_column("year", |year| year.as_int().map_or(Value::Null, Value::Int));

    if frame.has_column("venue") {
        frame.update_column("venue", |venue| {
            if venue.is_missing() {
                Value::from(UNKNOWN_VENUE)
            } else {
                venue.clone()
            }
        });
    } else {
        let venues = vec![Value::from(UNKNOWN_VENUE); frame.len()];
        frame.set_column("venue", venues)?;
    }
    Ok(frame)
}

/// Reconciles a raw authors table: `id` becomes `author_id` (synthesised when absent)
/// and `author` becomes `name`.
pub fn normalise_authors(authors: &Table) -> Result<Table> {
    let mut frame = authors.clone();
    rename_first(&mut frame, &["id"], "author_id");
    rename_first(&mut frame, &["author"], "name");
    synthesise_id(&mut frame, "author_id")?;
    frame.require_columns("authors", &["name"])?;
    Ok(frame)
}

/// Reconciles a raw authorships table: `paper` becomes `paper_id`, `author` or
/// `person_id` become `author_id`.
pub fn normalise_authorships(authorships: &Table) -> Result<Table> {
    let mut frame = authorships.clone();
    rename_first(&mut frame, &["paper"], "paper_id");
    rename_first(&mut frame, &["author", "person_id"], "author_id");
    frame.require_columns("authorships", &["paper_id", "author_id"])?;
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[cfg(feature = "csv")]
    fn export() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "papers.csv",
            "id,title,year\nP1,Deep Learning for BIM,2021\nP2,GAN-assisted Urban Design,n/a\n",
        );
        write(
            &dir,
            "researchers.json",
            r#"[{"id": "A1", "author": "alice tan"}, {"id": "A2", "author": "BOB LEE"}]"#,
        );
        write(
            &dir,
            "links.csv",
            "paper,person_id\nP1,A1\nP2,A2\n",
        );
        dir
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_load_records() {
        let dir = export();
        let records = load_records(dir.path()).unwrap();

        assert_eq!(records.papers.columns(), &["paper_id", "title", "year", "venue"]);
        assert_eq!(records.papers.get(0, "year"), Some(&Value::Int(2021)));
        assert_eq!(records.papers.get(1, "year"), Some(&Value::Null));
        assert_eq!(records.papers.get(1, "venue"), Some(&Value::from(UNKNOWN_VENUE)));

        assert_eq!(records.authors.columns(), &["author_id", "name"]);
        assert_eq!(records.authors.get(1, "name"), Some(&Value::from("BOB LEE")));

        assert_eq!(records.authorships.columns(), &["paper_id", "author_id"]);
        assert_eq!(records.authorships.get(1, "author_id"), Some(&Value::from("A2")));
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_first_stem_and_suffix_win() {
        let dir = export();
        write(&dir, "papers.json", r#"[{"paper_id": "J1", "title": "From JSON"}]"#);
        write(&dir, "metadata.csv", "paper_id,title\nM1,From metadata\n");

        let path = find_table(dir.path(), "papers").unwrap();
        assert_eq!(path.file_name().unwrap(), "papers.csv");

        fs::remove_file(dir.path().join("papers.csv")).unwrap();
        let records = load_records(dir.path()).unwrap();
        assert_eq!(records.papers.get(0, "paper_id"), Some(&Value::from("J1")));
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_missing_table() {
        let dir = export();
        fs::remove_file(dir.path().join("links.csv")).unwrap();

        let err = load_records(dir.path()).unwrap_err();
        assert!(matches!(err, BibError::TableNotFound { ref table, .. } if table == "authorships"));
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = load_records(&missing).unwrap_err();
        match err {
            BibError::TableNotFound { table, directory } => {
                assert_eq!(table, "papers");
                assert_eq!(directory, missing);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_semicolon_delimiter() {
        let dir = export();
        write(&dir, "papers.csv", "paper_id;title;venue\nP1; Shape grammars ;\n");
        write(&dir, "links.csv", "paper;person_id\nP1;A1\n");
        let mut config = LoaderConfig::new();
        config.set_delimiter(b';');

        let records = TableLoader::new().with_config(config).load(dir.path()).unwrap();
        assert_eq!(records.papers.get(0, "title"), Some(&Value::from("Shape grammars")));
        assert_eq!(records.papers.get(0, "venue"), Some(&Value::from(UNKNOWN_VENUE)));
        assert_eq!(records.authorships.get(0, "author_id"), Some(&Value::from("A1")));
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_short_rows_are_padded() {
        let dir = TempDir::new().unwrap();
        write(&dir, "papers.csv", "paper_id,title,year\nP1,Shape grammars\n");
        let table = TableLoader::new()
            .read_table(&dir.path().join("papers.csv"))
            .unwrap();
        assert_eq!(table.get(0, "title"), Some(&Value::from("Shape grammars")));
        assert_eq!(table.get(0, "year"), Some(&Value::Null));
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_wide_rows_are_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir, "papers.csv", "paper_id,title\nP1,Shape grammars,2021\n");
        let err = TableLoader::new()
            .read_table(&dir.path().join("papers.csv"))
            .unwrap_err();
        assert!(matches!(err, BibError::InvalidFormat(ref message) if message.contains("3 fields")));
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_malformed_json() {
        let dir = export();
        write(&dir, "researchers.json", "[{\"id\": ");
        let err = load_records(dir.path()).unwrap_err();
        assert!(matches!(err, BibError::InvalidFormat(_)));
    }

    #[cfg(not(feature = "parquet"))]
    #[test]
    fn test_parquet_requires_feature() {
        let dir = TempDir::new().unwrap();
        write(&dir, "papers.parquet", "");
        let err = TableLoader::new()
            .read_table(&dir.path().join("papers.parquet"))
            .unwrap_err();
        assert!(matches!(err, BibError::InvalidFormat(_)));
    }

    #[test]
    fn test_normalise_papers_synthesises_ids() {
        let papers = Table::from_rows(
            ["title", "year"],
            vec![
                vec!["A".into(), Value::Float(2020.0)],
                vec!["B".into(), "2019".into()],
            ],
        )
        .unwrap();
        let normalised = normalise_papers(&papers).unwrap();
        assert_eq!(normalised.columns(), &["paper_id", "title", "year", "venue"]);
        assert_eq!(normalised.get(1, "paper_id"), Some(&Value::from("1")));
        assert_eq!(normalised.get(0, "year"), Some(&Value::Int(2020)));
        assert_eq!(normalised.get(1, "year"), Some(&Value::Int(2019)));
    }

    #[rstest]
    #[case("id")]
    #[case("paperID")]
    #[case("paper")]
    fn test_paper_id_aliases(#[case] alias: &str) {
        let papers = Table::from_rows([alias, "title"], vec![vec!["P1".into(), "T".into()]]).unwrap();
        let normalised = normalise_papers(&papers).unwrap();
        assert_eq!(normalised.get(0, "paper_id"), Some(&Value::from("P1")));
    }

    #[test]
    fn test_normalise_papers_requires_title() {
        let papers = Table::new(["paper_id", "name"]);
        let err = normalise_papers(&papers).unwrap_err();
        assert!(matches!(err, BibError::MissingColumn { ref column, .. } if column == "title"));
    }

    #[test]
    fn test_normalise_authorships_requires_both_ids() {
        let links = Table::new(["paper", "role"]);
        let err = normalise_authorships(&links).unwrap_err();
        assert!(matches!(
            err,
            BibError::MissingColumn { ref table, ref column } if table == "authorships" && column == "author_id"
        ));
    }
}
