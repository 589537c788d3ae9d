use anyhow::{Result, anyhow};
use polars::prelude::*;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

/// Column type inferred from the non-null values seen for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Text,
    Integer,
    Float,
    Boolean,
    TextList,
}

impl ColumnKind {
    fn infer(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self::Integer),
            Value::Number(_) => Some(Self::Float),
            Value::Array(_) => Some(Self::TextList),
            Value::String(_) | Value::Object(_) => Some(Self::Text),
        }
    }

    /// Smallest kind that holds values of both kinds without losing any.
    fn widen(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Integer, Self::Float) | (Self::Float, Self::Integer) => Self::Float,
            (Self::TextList, _) | (_, Self::TextList) => Self::TextList,
            _ => Self::Text,
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

#[derive(Debug, Default)]
struct FieldStats {
    first: Option<ColumnKind>,
    kind: Option<ColumnKind>,
    mismatched: usize,
}

/// Turns loosely typed JSON records (one object per movie or review) into a `DataFrame`.
///
/// Columns are the union of keys across all records, in first-seen order. A key absent
/// from a record becomes null in that row.
pub struct RecordFlattener;

impl RecordFlattener {
    pub fn new() -> Self {
        RecordFlattener
    }

    pub fn flatten_to_dataframe(&self, json_data: &[Value]) -> Result<DataFrame> {
        let mut records = Vec::with_capacity(json_data.len());
        let mut failed_count = 0;

        for (index, item) in json_data.iter().enumerate() {
            match item.as_object() {
                Some(object) => records.push(object),
                None => {
                    failed_count += 1;
                    warn!("Skipping record at index {}: expected a JSON object", index);
                }
            }
        }

        info!(
            "Record flattening summary: {} objects, {} skipped out of {} total",
            records.len(),
            failed_count,
            json_data.len()
        );

        if records.is_empty() {
            return Ok(DataFrame::empty());
        }

        let mut field_order: Vec<&str> = Vec::new();
        let mut stats: HashMap<&str, FieldStats> = HashMap::new();
        for record in &records {
            for (key, value) in record.iter() {
                let field = stats.entry(key.as_str()).or_insert_with(|| {
                    field_order.push(key.as_str());
                    FieldStats::default()
                });
                let Some(kind) = ColumnKind::infer(value) else {
                    continue;
                };

                match field.first {
                    None => field.first = Some(kind),
                    Some(first) if first != kind && !(first.is_numeric() && kind.is_numeric()) => {
                        field.mismatched += 1;
                    }
                    Some(_) => {}
                }
                field.kind = Some(field.kind.map_or(kind, |seen| seen.widen(kind)));
            }
        }

        let mut columns = Vec::with_capacity(field_order.len());
        for field in field_order {
            let values = records.iter().map(|record| record.get(field).unwrap_or(&Value::Null));
            let (kind, mismatched) = stats
                .get(field)
                .map(|s| (s.kind, s.mismatched))
                .unwrap_or_default();
            if mismatched > 0 {
                warn!(
                    "Column '{}' mixes value types: {} values differ from the first, stored as {:?}",
                    field, mismatched, kind
                );
            }
            columns.push(Self::build_series(field, kind, values)?.into());
        }

        DataFrame::new(columns).map_err(|e| anyhow!("Failed to create DataFrame: {}", e))
    }

    fn build_series<'a>(
        field: &str,
        kind: Option<ColumnKind>,
        values: impl Iterator<Item = &'a Value>,
    ) -> Result<Series> {
        let name: PlSmallStr = field.into();

        let series = match kind {
            // every value null, keep a typed column so later casts work
            None | Some(ColumnKind::Text) => {
                let texts: Vec<Option<String>> = values.map(Self::as_text).collect();
                Series::new(name, texts)
            }
            Some(ColumnKind::Integer) => {
                let ints: Vec<Option<i64>> = values
                    .map(|v| match v {
                        Value::Number(n) => n.as_i64(),
                        Value::String(s) => s.trim().parse().ok(),
                        _ => None,
                    })
                    .collect();
                Series::new(name, ints)
            }
            Some(ColumnKind::Float) => {
                let floats: Vec<Option<f64>> = values
                    .map(|v| match v {
                        Value::Number(n) => n.as_f64(),
                        Value::String(s) => s.trim().parse().ok(),
                        _ => None,
                    })
                    .collect();
                Series::new(name, floats)
            }
            Some(ColumnKind::Boolean) => {
                let bools: Vec<Option<bool>> = values
                    .map(|v| match v {
                        Value::Bool(b) => Some(*b),
                        Value::String(s) => s.trim().parse().ok(),
                        _ => None,
                    })
                    .collect();
                Series::new(name, bools)
            }
            Some(ColumnKind::TextList) => {
                let lists: Vec<Option<Series>> = values
                    .map(|v| match v {
                        Value::Array(items) => {
                            let texts: Vec<String> = items.iter().filter_map(Self::as_text).collect();
                            Some(Series::new(PlSmallStr::EMPTY, texts))
                        }
                        Value::Null => None,
                        // a lone scalar where a list was expected
                        other => Self::as_text(other).map(|s| Series::new(PlSmallStr::EMPTY, [s])),
                    })
                    .collect();
                Series::new(name, lists)
            }
        };

        Ok(series)
    }

    fn as_text(value: &Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

impl Default for RecordFlattener {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_imdb_movie_details_record() {
        let flattener = RecordFlattener::new();

        let movies = vec![
            json!({
                "movie_id": "tt0105112",
                "plot_summary": "Former CIA analyst, Jack Ryan is in England with his family on vacation.",
                "duration": "1h 57min",
                "genre": ["Action", "Thriller"],
                "rating": 6.9,
                "release_date": "1992-06-05",
                "plot_synopsis": "Jack Ryan (Ford) is on a working vacation in London."
            }),
            json!({
                "movie_id": "tt1204975",
                "plot_summary": "Billy, Sam, Paddy and Archie are four friends.",
                "duration": "1h 45min",
                "genre": ["Comedy"],
                "rating": 6.6,
                "release_date": "2013-11-01",
                "plot_synopsis": ""
            }),
        ];

        let df = flattener.flatten_to_dataframe(&movies).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 7);

        assert!(matches!(df.column("genre").unwrap().dtype(), DataType::List(_)));
        assert_eq!(df.column("rating").unwrap().dtype(), &DataType::Float64);
        assert_eq!(
            df.column("duration").unwrap().str().unwrap().get(1),
            Some("1h 45min")
        );
    }

    #[test]
    fn test_missing_keys_become_nulls() {
        let flattener = RecordFlattener::new();

        let reviews = vec![
            json!({"movie_id": "tt1", "review_text": "Great", "is_spoiler": true}),
            json!({"movie_id": "tt2", "review_summary": "Meh", "user_id": 42}),
        ];

        let df = flattener.flatten_to_dataframe(&reviews).unwrap();
        assert_eq!(df.height(), 2);

        let summaries = df.column("review_summary").unwrap().str().unwrap();
        assert_eq!(summaries.get(0), None);
        assert_eq!(summaries.get(1), Some("Meh"));

        assert_eq!(df.column("is_spoiler").unwrap().bool().unwrap().get(1), None);
        assert_eq!(df.column("user_id").unwrap().i64().unwrap().get(1), Some(42));
    }

    #[test]
    fn test_all_null_column_is_text() {
        let flattener = RecordFlattener::new();

        let df = flattener
            .flatten_to_dataframe(&[json!({"plot_synopsis": null}), json!({"plot_synopsis": null})])
            .unwrap();
        assert_eq!(df.column("plot_synopsis").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_non_objects_are_skipped() {
        let flattener = RecordFlattener::new();

        let df = flattener
            .flatten_to_dataframe(&[json!("stray"), json!({"movie_id": "tt9"}), json!(3)])
            .unwrap();
        assert_eq!(df.height(), 1);

        let empty = flattener.flatten_to_dataframe(&[]).unwrap();
        assert_eq!(empty.height(), 0);
    }

    #[test]
    fn test_mixed_integer_and_text_widens_to_text() {
        let flattener = RecordFlattener::new();

        let df = flattener
            .flatten_to_dataframe(&[json!({"movie_id": 1}), json!({"movie_id": "tt2"}), json!({"movie_id": null})])
            .unwrap();

        let ids = df.column("movie_id").unwrap();
        assert_eq!(ids.dtype(), &DataType::String);
        let ids = ids.str().unwrap();
        assert_eq!(ids.get(0), Some("1"));
        assert_eq!(ids.get(1), Some("tt2"));
        assert_eq!(ids.get(2), None);
    }

    #[test]
    fn test_mixed_integer_and_float_widens_to_float() {
        let flattener = RecordFlattener::new();

        let df = flattener
            .flatten_to_dataframe(&[json!({"rating": 7}), json!({"rating": 6.5})])
            .unwrap();

        let ratings = df.column("rating").unwrap().f64().unwrap();
        assert_eq!(ratings.get(0), Some(7.0));
        assert_eq!(ratings.get(1), Some(6.5));
    }

    #[test]
    fn test_scalar_in_list_column_is_kept() {
        let flattener = RecordFlattener::new();

        let df = flattener
            .flatten_to_dataframe(&[json!({"genre": "Drama, Comedy"}), json!({"genre": ["Action"]})])
            .unwrap();

        let genre = df.column("genre").unwrap();
        assert!(matches!(genre.dtype(), DataType::List(_)));

        let first = genre.as_materialized_series().list().unwrap().get_as_series(0).unwrap();
        assert_eq!(first.str().unwrap().get(0), Some("Drama, Comedy"));
    }
}
