//! Aggregate views over paper tables: grouped trends and most frequent values.

use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::{BibError, Result, Table, Value};

const FRAME: &str = "frame";

/// Counts rows (or sums `weight`) per distinct combination of `by` and `groupby`.
///
/// The result has the grouping columns followed by `count`, or by `value` when a
/// weight column is given. Rows are sorted by the grouping columns; missing values form
/// their own group and sort last. Non-numeric weights contribute nothing.
///
/// # Examples
///
/// ```
/// use bibmetrics::{Table, Value};
/// use bibmetrics::metrics::trend;
///
/// let papers = Table::from_rows(
///     ["paper_id", "year"],
///     vec![
///         vec!["P1".into(), 2021.into()],
///         vec!["P2".into(), 2019.into()],
///         vec!["P3".into(), 2021.into()],
///     ],
/// ).unwrap();
///
/// let counts = trend(&papers, "year", &[], None).unwrap();
/// assert_eq!(counts.columns(), &["year", "count"]);
/// assert_eq!(counts.get(1, "count"), Some(&Value::Int(2)));
/// ```
///
/// # Errors
///
/// [`BibError::MissingColumn`] when a grouping or weight column is absent.
pub fn trend(frame: &Table, by: &str, groupby: &[&str], weight: Option<&str>) -> Result<Table> {
    let grouping: Vec<&str> = std::iter::once(by).chain(groupby.iter().copied()).collect();
    frame.require_columns(FRAME, &grouping)?;
    if let Some(weight) = weight {
        frame.require_columns(FRAME, &[weight])?;
    }

    let keyed: Vec<(Vec<Value>, Option<f64>)> = frame
        .rows()
        .map(|row| {
            let key: Vec<Value> = grouping
                .iter()
                .map(|column| row.get(column).cloned().unwrap_or_default())
                .collect();
            let amount = weight.and_then(|w| row.get(w)).and_then(Value::as_f64);
            (key, amount)
        })
        .sorted_by(|(a, _), (b, _)| compare_keys(a, b))
        .collect();

    let mut columns: Vec<String> = grouping.iter().map(|c| c.to_string()).collect();
    columns.push(if weight.is_some() { "value" } else { "count" }.to_string());

    let rows = keyed
        .chunk_by(|(a, _), (b, _)| compare_keys(a, b).is_eq())
        .map(|group| {
            let mut row = group[0].0.clone();
            row.push(match weight {
                Some(_) => Value::Float(group.iter().filter_map(|(_, amount)| *amount).sum()),
                None => Value::Int(group.len() as i64),
            });
            row
        })
        .collect();
    Ok(Table::from_parts(columns, rows))
}

/// The `k` most frequent values of `field` with their counts, as columns `field` and
/// `count`.
///
/// List cells contribute each item; text cells are split on `separator` when one is
/// given. Items are trimmed and blanks ignored. Equal counts keep first-seen order.
///
/// ```
/// use bibmetrics::{Table, Value};
/// use bibmetrics::metrics::topk;
///
/// let papers = Table::from_rows(
///     ["keywords"],
///     vec![vec!["BIM; GAN".into()], vec!["GAN".into()], vec![Value::Null]],
/// ).unwrap();
///
/// let top = topk(&papers, "keywords", 1, Some(";")).unwrap();
/// assert_eq!(top.get(0, "keywords"), Some(&Value::from("GAN")));
/// assert_eq!(top.get(0, "count"), Some(&Value::Int(2)));
/// ```
///
/// # Errors
///
/// - [`BibError::InvalidArgument`] when `k` is zero
/// - [`BibError::MissingColumn`] when `field` is absent
pub fn topk(frame: &Table, field: &str, k: usize, separator: Option<&str>) -> Result<Table> {
    frame.require_columns(FRAME, &[field])?;
    if k == 0 {
        return Err(BibError::invalid_argument("k", "k must be positive"));
    }

    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for value in frame.column(field).into_iter().flatten() {
        for item in items(value, separator) {
            let count = counts.entry(item.clone()).or_insert(0);
            if *count == 0 {
                order.push(item);
            }
            *count += 1;
        }
    }

    let rows = order
        .into_iter()
        .map(|item| {
            let count = counts.get(&item).copied().unwrap_or_default();
            (item, count)
        })
        .sorted_by(|(_, a), (_, b)| b.cmp(a))
        .take(k)
        .map(|(item, count)| vec![Value::Text(item), Value::Int(count as i64)])
        .collect();
    Ok(Table::from_parts(vec![field.to_string(), "count".to_string()], rows))
}

fn items(value: &Value, separator: Option<&str>) -> Vec<String> {
    let trimmed = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
    match (value, separator) {
        (Value::List(list), _) => list.iter().filter_map(|s| trimmed(s)).collect(),
        (Value::Text(text), Some(separator)) => text.split(separator).filter_map(trimmed).collect(),
        (value, _) if value.is_missing() => Vec::new(),
        (value, _) => trimmed(&value.to_text()).into_iter().collect(),
    }
}

fn compare_keys(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.sort_cmp(y))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}
