use anyhow::Result;
use ndarray::Array2;
use polars::prelude::*;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{info, warn};

use crate::error::PipelineError;

/// Multi-hot genre indicators: one row per movie, one column per label in `classes`.
#[derive(Debug, Clone, PartialEq)]
pub struct GenreMatrix {
    pub classes: Vec<String>,
    pub matrix: Array2<i32>,
}

impl GenreMatrix {
    /// Indicator columns keyed by label. The key set depends on the input data.
    pub fn into_columns(self) -> HashMap<String, Vec<i32>> {
        self.classes
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.clone(), self.matrix.column(idx).to_vec()))
            .collect()
    }
}

pub struct GenreEncoder;

impl GenreEncoder {
    /// Read every movie's label set from a List(String) or comma separated String column.
    pub fn read_label_sets(&self, df: &DataFrame, col_name: &str) -> Result<Vec<Vec<String>>> {
        let column = df.column(col_name)?;

        match column.dtype() {
            DataType::List(_) => {
                let lists = column.as_materialized_series().list()?;
                let mut label_sets = Vec::with_capacity(lists.len());

                for entry in lists.into_iter() {
                    let labels = match entry {
                        Some(inner) => {
                            let inner = inner.cast(&DataType::String)?;
                            inner
                                .str()?
                                .into_iter()
                                .flatten()
                                .flat_map(|s| s.split(','))
                                .filter_map(Self::normalize_label)
                                .collect()
                        }
                        None => Vec::new(),
                    };
                    label_sets.push(labels);
                }

                Ok(label_sets)
            }
            DataType::String | DataType::Null => {
                let as_text = column.cast(&DataType::String)?;
                Ok(as_text
                    .str()?
                    .into_iter()
                    .map(|value| {
                        value
                            .map(|s| s.split(',').filter_map(Self::normalize_label).collect())
                            .unwrap_or_default()
                    })
                    .collect())
            }
            other => Err(PipelineError::UnsupportedColumnType {
                column: col_name.to_string(),
                dtype: other.to_string(),
            }
            .into()),
        }
    }

    /// Sorted distinct labels across all movies.
    pub fn fit(&self, label_sets: &[Vec<String>]) -> Vec<String> {
        let vocabulary: BTreeSet<&str> = label_sets
            .iter()
            .flat_map(|labels| labels.iter().map(String::as_str))
            .collect();

        vocabulary.into_iter().map(str::to_string).collect()
    }

    pub fn transform(&self, classes: &[String], label_sets: &[Vec<String>]) -> GenreMatrix {
        let index: HashMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.as_str(), idx))
            .collect();

        let mut matrix = Array2::<i32>::zeros((label_sets.len(), classes.len()));
        for (row, labels) in label_sets.iter().enumerate() {
            for label in labels {
                if let Some(&col) = index.get(label.as_str()) {
                    matrix[[row, col]] = 1;
                }
            }
        }

        GenreMatrix {
            classes: classes.to_vec(),
            matrix,
        }
    }

    pub fn fit_transform(&self, label_sets: &[Vec<String>]) -> GenreMatrix {
        let classes = self.fit(label_sets);
        self.transform(&classes, label_sets)
    }

    /// Append one indicator column per genre to `df`. Returns the column names added.
    ///
    /// `reserved` holds names the caller will add to the frame later. A label that
    /// matches an existing or reserved name is written as `genre_<label>`, with a
    /// numeric suffix if that is taken as well.
    pub fn encode_column(
        &self,
        df: &mut DataFrame,
        col_name: &str,
        reserved: &[&str],
    ) -> Result<Vec<String>> {
        let label_sets = self.read_label_sets(df, col_name)?;
        let encoded = self.fit_transform(&label_sets);
        let classes = encoded.classes.clone();
        let mut columns = encoded.into_columns();

        let mut taken: HashSet<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .chain(reserved.iter().map(|s| s.to_string()))
            .collect();

        let mut added = Vec::with_capacity(classes.len());
        for label in &classes {
            let name = Self::indicator_name(label, &taken);
            if &name != label {
                warn!("Genre '{}' clashes with an existing column, using '{}'", label, name);
            }

            let values = columns.remove(label).unwrap_or_default();
            df.with_column(Series::new(name.as_str().into(), values))?;
            taken.insert(name.clone());
            added.push(name);
        }

        info!(
            "Encoded {} distinct genres across {} movies",
            classes.len(),
            label_sets.len()
        );

        Ok(added)
    }

    fn indicator_name(label: &str, taken: &HashSet<String>) -> String {
        if !taken.contains(label) {
            return label.to_string();
        }

        let base = format!("genre_{label}");
        let mut name = base.clone();
        let mut n = 2;
        while taken.contains(&name) {
            name = format!("{base}_{n}");
            n += 1;
        }
        name
    }

    fn normalize_label(raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
