use std::fmt;

/// Which input table a schema problem was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Movies,
    Reviews,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movies => write!(f, "movies"),
            Self::Reviews => write!(f, "reviews"),
        }
    }
}

/// Fatal pipeline errors. Malformed values never end up here, they degrade to null/0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A required column is absent from an input table
    MissingColumn { table: TableKind, column: String },

    /// A column exists but holds a type the pipeline can't read
    UnsupportedColumnType {
        column: String,
        dtype: String,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumn { table, column } => {
                write!(f, "required column '{column}' is missing from the {table} table")
            }
            Self::UnsupportedColumnType { column, dtype } => {
                write!(f, "column '{column}' has unsupported type {dtype}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message_names_column() {
        let err = PipelineError::MissingColumn {
            table: TableKind::Reviews,
            column: "review_date".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "required column 'review_date' is missing from the reviews table"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = PipelineError::MissingColumn {
            table: TableKind::Movies,
            column: "genre".to_string(),
        }
        .into();

        let typed = err.downcast_ref::<PipelineError>().unwrap();
        assert!(matches!(
            typed,
            PipelineError::MissingColumn { table: TableKind::Movies, .. }
        ));
    }
}
