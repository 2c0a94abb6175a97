//! In-memory tabular data.
//!
//! A [`Table`] is an ordered list of column names plus rows of [`Value`] cells. It is
//! the shape every analytical function in this crate consumes and produces. Transforms
//! borrow their input and return a fresh table, so a caller's table is never modified
//! behind its back.
//!
//! # Example
//!
//! ```
//! use bibmetrics::{Table, Value};
//!
//! let mut papers = Table::new(["paper_id", "title", "year"]);
//! papers
//!     .push_row(vec!["P1".into(), "Rule-based Planning".into(), 2019.into()])
//!     .unwrap();
//!
//! assert_eq!(papers.len(), 1);
//! assert_eq!(papers.get(0, "year"), Some(&Value::Int(2019)));
//! ```

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use std::borrow::Cow;
use std::cmp::Ordering;

use crate::{BibError, Result};

/// A single cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing value
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// List of strings, e.g. a keyword list or the label set written by rule labelling
    List(Vec<String>),
}

impl Value {
    /// Returns `true` for nulls, NaN floats and blank text.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Renders the cell as text. Missing values render as an empty string and lists
    /// are joined with a single space.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Bool(b) => Cow::Owned(b.to_string()),
            Value::Int(i) => Cow::Owned(i.to_string()),
            Value::Float(f) if f.is_nan() => Cow::Borrowed(""),
            Value::Float(f) => Cow::Owned(f.to_string()),
            Value::Text(s) => Cow::Borrowed(s),
            Value::List(items) => Cow::Owned(items.join(" ")),
        }
    }

    /// Borrows the text of a `Text` cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Coerces the cell into an integer: ints, integral floats and numeric text.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite() && f.fract() == 0.0)
                        .map(|f| f as i64)
                })
            }
            _ => None,
        }
    }

    /// Coerces the cell into a float: ints, floats and numeric text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|f| !f.is_nan()),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            _ if self.is_null_like() => 4,
            Value::Bool(_) => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Text(_) => 2,
            _ => 3,
        }
    }

    fn is_null_like(&self) -> bool {
        matches!(self, Value::Null) || matches!(self, Value::Float(f) if f.is_nan())
    }

    /// Total ordering used when sorting grouped output: booleans, then numbers, then
    /// text, then lists, with missing values last.
    pub(crate) fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => a.cmp(b),
            (a, b) if a.rank() == 1 && b.rank() == 1 => {
                let (a, b) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                a.total_cmp(&b)
            }
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<&str>> for Value {
    fn from(value: Vec<&str>) -> Self {
        Value::List(value.into_iter().map(String::from).collect())
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Value::List(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match value {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or(Value::Null),
            Json::String(s) => Value::Text(s),
            Json::Array(items) => Value::List(
                items
                    .into_iter()
                    .filter(|item| !item.is_null())
                    .map(|item| match item {
                        Json::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            object @ Json::Object(_) => Value::Text(object.to_string()),
        }
    }
}

/// A borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    /// Looks up a cell by column name.
    pub fn get(&self, column: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// The cell text for `column`, empty when the column is absent or the cell missing.
    pub fn text(&self, column: &str) -> Cow<'a, str> {
        self.get(column).map_or(Cow::Borrowed(""), Value::to_text)
    }

    pub fn values(&self) -> &'a [Value] {
        self.values
    }
}

/// Ordered columns and rows of cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Creates an empty table with the given columns.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Creates a table from columns and rows.
    ///
    /// # Errors
    ///
    /// Returns [`BibError::InvalidArgument`] if a row's width differs from the column count.
    pub fn from_rows<I, S, R>(columns: I, rows: R) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        R: IntoIterator<Item = Vec<Value>>,
    {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Assembles a table whose rows are already known to match the column count.
    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == columns.len()));
        Self { columns, rows }
    }

    /// Appends a row.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(BibError::invalid_argument(
                "row",
                format!(
                    "row has {} values but the table has {} columns",
                    row.len(),
                    self.columns.len()
                ),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// Returns the cell at `row` in `column`.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|values| &values[index])
    }

    /// Iterates the cells of one column.
    pub fn column<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Value> + use<'a>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |values| &values[index]))
    }

    /// Renames `from` to `to`. Nothing happens if `from` is absent or `to` already
    /// exists; returns whether the rename took place.
    pub fn rename_column(&mut self, from: &str, to: &str) -> bool {
        if self.has_column(to) {
            return false;
        }
        match self.column_index(from) {
            Some(index) => {
                self.columns[index] = to.to_string();
                true
            }
            None => false,
        }
    }

    /// Inserts a new column at `index` (clamped to the column count).
    pub fn insert_column(&mut self, index: usize, name: &str, values: Vec<Value>) -> Result<()> {
        if self.has_column(name) {
            return Err(BibError::invalid_argument(
                "column",
                format!("column `{name}` already exists"),
            ));
        }
        self.check_column_length(name, &values)?;
        let index = index.min(self.columns.len());
        self.columns.insert(index, name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(index, value);
        }
        Ok(())
    }

    /// Replaces the cells of `name`, appending the column if it does not exist yet.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        self.check_column_length(name, &values)?;
        match self.column_index(name) {
            Some(index) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[index] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Rewrites every cell of `name` in place; returns `false` if the column is absent.
    pub fn update_column<F>(&mut self, name: &str, mut f: F) -> bool
    where
        F: FnMut(&Value) -> Value,
    {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        for row in &mut self.rows {
            row[index] = f(&row[index]);
        }
        true
    }

    /// Copies the rows at `indices` (in that order) into a new table with the same
    /// columns. Out-of-range indices are ignored.
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// A table with the same columns and no rows.
    pub fn empty_like(&self) -> Table {
        Table::new(self.columns.iter().cloned())
    }

    /// Fails with [`BibError::MissingColumn`] on the first of `columns` not present.
    pub fn require_columns(&self, table: &str, columns: &[&str]) -> Result<()> {
        match columns.iter().find(|c| !self.has_column(c)) {
            Some(column) => Err(BibError::missing_column(table, column)),
            None => Ok(()),
        }
    }

    /// Builds a table from JSON: either an array of records or a column-oriented
    /// object whose values are arrays or index-keyed objects.
    ///
    /// Columns keep the order in which keys first appear.
    pub fn from_json(value: serde_json::Value) -> Result<Table> {
        use serde_json::Value as Json;
        match value {
            Json::Array(records) => {
                let mut columns: Vec<String> = Vec::new();
                for record in &records {
                    let Json::Object(map) = record else {
                        return Err(BibError::InvalidFormat(
                            "expected an array of JSON objects".to_string(),
                        ));
                    };
                    for key in map.keys() {
                        if !columns.contains(key) {
                            columns.push(key.clone());
                        }
                    }
                }
                let mut table = Table::new(columns.clone());
                for record in records {
                    if let Json::Object(mut map) = record {
                        let row = columns
                            .iter()
                            .map(|c| map.remove(c).map_or(Value::Null, Value::from))
                            .collect();
                        table.push_row(row)?;
                    }
                }
                Ok(table)
            }
            Json::Object(columns) => {
                let mut names = Vec::with_capacity(columns.len());
                let mut cells: Vec<Vec<Value>> = Vec::with_capacity(columns.len());
                for (name, column) in columns {
                    let values: Vec<Value> = match column {
                        Json::Array(items) => items.into_iter().map(Value::from).collect(),
                        Json::Object(by_index) => {
                            let mut entries: Vec<(String, Json)> = by_index.into_iter().collect();
                            entries.sort_by_key(|(index, _)| index.parse::<usize>().unwrap_or(usize::MAX));
                            entries.into_iter().map(|(_, v)| v.into()).collect()
                        }
                        _ => {
                            return Err(BibError::InvalidFormat(format!(
                                "column `{name}` is neither an array nor an object"
                            )));
                        }
                    };
                    names.push(name);
                    cells.push(values);
                }
                let height = cells.iter().map(Vec::len).max().unwrap_or(0);
                let mut table = Table::new(names);
                for i in 0..height {
                    let row = cells
                        .iter()
                        .map(|column| column.get(i).cloned().unwrap_or_default())
                        .collect();
                    table.push_row(row)?;
                }
                Ok(table)
            }
            _ => Err(BibError::InvalidFormat(
                "expected a JSON array or object".to_string(),
            )),
        }
    }

    fn check_column_length(&self, name: &str, values: &[Value]) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(BibError::invalid_argument(
                "column",
                format!(
                    "column `{name}` has {} values but the table has {} rows",
                    values.len(),
                    self.rows.len()
                ),
            ));
        }
        Ok(())
    }
}

struct Record<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl Serialize for Record<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (column, value) in self.columns.iter().zip(self.values) {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// Serialises as an array of records.
impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for values in &self.rows {
            seq.serialize_element(&Record {
                columns: &self.columns,
                values,
            })?;
        }
        seq.end()
    }
}
