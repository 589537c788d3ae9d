use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use polars::prelude::*;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::{PipelineError, TableKind};
use crate::processor::{DateNormalizer, DurationParser, GenreEncoder, TextCleaner};

pub const JOIN_KEY: &str = "movie_id";

pub const MOVIE_TEXT_COLUMNS: [&str; 2] = ["plot_summary", "plot_synopsis"];
pub const REVIEW_TEXT_COLUMNS: [&str; 2] = ["review_text", "review_summary"];

pub const REQUIRED_MOVIE_COLUMNS: [&str; 6] = [
    JOIN_KEY,
    "plot_summary",
    "plot_synopsis",
    "release_date",
    "genre",
    "duration",
];
pub const REQUIRED_REVIEW_COLUMNS: [&str; 4] = [JOIN_KEY, "review_text", "review_summary", "review_date"];

/// Columns added to the movies or the merged table after genres are encoded.
const DERIVED_COLUMNS: [&str; 3] = ["duration_min", "has_summary", "has_synopsis"];

const REVIEW_SUFFIX: &str = "_review";
const MOVIE_SUFFIX: &str = "_movie";
const ROW_ORDER: &str = "__review_row";

/// Cleans, encodes and left-joins the movie and review tables.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    cleaner: TextCleaner,
}

impl Preprocessor {
    pub fn new(cleaner: TextCleaner) -> Self {
        Preprocessor { cleaner }
    }

    /// Run the pipeline with `today` as the processing date for both days-since columns.
    pub fn run(&self, mut movies: DataFrame, mut reviews: DataFrame, today: NaiveDate) -> Result<DataFrame> {
        require_columns(&movies, TableKind::Movies, &REQUIRED_MOVIE_COLUMNS)?;
        require_columns(&reviews, TableKind::Reviews, &REQUIRED_REVIEW_COLUMNS)?;

        info!(
            "Preprocessing {} movies and {} reviews (processing date {})",
            movies.height(),
            reviews.height(),
            today
        );

        // Text cleaning
        self.cleaner.clean_columns(&mut movies, &MOVIE_TEXT_COLUMNS)?;
        self.cleaner.clean_columns(&mut reviews, &REVIEW_TEXT_COLUMNS)?;

        // Date normalization
        let dates = DateNormalizer;
        let release_report = dates.normalize_release_dates(&mut movies, "release_date")?;
        let review_report = dates.normalize_review_dates(&mut reviews, "review_date")?;
        info!(
            "release_date: {}/{} parsed, {} unknown, {} missing",
            release_report.parsed,
            release_report.total(),
            release_report.unknown,
            release_report.missing
        );
        info!(
            "review_date: {}/{} parsed, {} unknown, {} missing",
            review_report.parsed,
            review_report.total(),
            review_report.unknown,
            review_report.missing
        );
        if release_report.unknown + review_report.unknown > 0 {
            warn!(
                "{} dates could not be parsed and were set to null",
                release_report.unknown + review_report.unknown
            );
        }

        // Days since events
        dates.add_days_since(&mut movies, "release_date", "days_since_release", today)?;
        dates.add_days_since(&mut reviews, "review_date", "days_since_review", today)?;

        // Genre indicators
        let mut reserved = DERIVED_COLUMNS.to_vec();
        reserved.push(ROW_ORDER);
        let genre_columns = GenreEncoder.encode_column(&mut movies, "genre", &reserved)?;

        // Duration minutes
        let duration_report = DurationParser.parse_column(&mut movies, "duration", "duration_min")?;
        if duration_report.unmatched > 0 {
            warn!(
                "{} durations matched no hour/minute pattern and were set to 0 minutes",
                duration_report.unmatched
            );
        }
        if duration_report.overflowed > 0 {
            warn!(
                "{} durations were too large to convert and were set to null",
                duration_report.overflowed
            );
        }

        // Merge
        let mut merged = left_join_reviews(reviews, movies)?;

        // Presence flags
        let summary_col = resolve_merged_name(&merged, "review_summary", REVIEW_SUFFIX);
        let synopsis_col = resolve_merged_name(&merged, "plot_synopsis", MOVIE_SUFFIX);
        add_presence_flag(&mut merged, &summary_col, "has_summary")?;
        add_presence_flag(&mut merged, &synopsis_col, "has_synopsis")?;

        info!(
            "Merged table: {} rows, {} columns ({} genre indicators)",
            merged.height(),
            merged.width(),
            genre_columns.len()
        );

        Ok(merged)
    }
}

/// Preprocess with today's local date and the default English stopwords.
pub fn preprocess(movies: DataFrame, reviews: DataFrame) -> Result<DataFrame> {
    let today = Local::now().date_naive();
    Preprocessor::default().run(movies, reviews, today)
}

pub fn require_columns(df: &DataFrame, table: TableKind, columns: &[&str]) -> Result<()> {
    for column in columns {
        if df.column(column).is_err() {
            return Err(PipelineError::MissingColumn {
                table,
                column: (*column).to_string(),
            }
            .into());
        }
    }
    Ok(())
}

/// Left join keeping every review row in its original order.
///
/// Non-key columns present in both tables get `_review` / `_movie` suffixes.
fn left_join_reviews(mut reviews: DataFrame, mut movies: DataFrame) -> Result<DataFrame> {
    let movie_count = movies.height();
    let duplicates = count_duplicate_keys(&movies)?;
    if duplicates > 0 {
        warn!(
            "{} duplicate movie_id values in movies; matching reviews will be repeated",
            duplicates
        );
    }

    // Both sides must share a key dtype; the flattener may infer ints for one table.
    key_to_string(&mut reviews)?;
    key_to_string(&mut movies)?;

    let review_columns: HashSet<String> = column_names(&reviews).into_iter().collect();
    let overlapping: Vec<String> = column_names(&movies)
        .into_iter()
        .filter(|name| name != JOIN_KEY && review_columns.contains(name))
        .collect();

    for name in &overlapping {
        reviews.rename(name, format!("{name}{REVIEW_SUFFIX}").into())?;
        movies.rename(name, format!("{name}{MOVIE_SUFFIX}").into())?;
    }
    if !overlapping.is_empty() {
        info!("Suffixed overlapping columns: {:?}", overlapping);
    }

    let review_count = reviews.height();
    let unmatched = count_unmatched_keys(&reviews, &movies)?;
    let merged = reviews
        .lazy()
        .with_row_index(ROW_ORDER, None)
        .join(
            movies.lazy(),
            [col(JOIN_KEY)],
            [col(JOIN_KEY)],
            JoinArgs::new(JoinType::Left),
        )
        .sort([ROW_ORDER], SortMultipleOptions::default())
        .collect()
        .context("Failed to join reviews with movies")?;

    let merged = merged.drop(ROW_ORDER)?;

    info!(
        "Joined {} reviews to {} movies ({} reviews without movie details)",
        review_count, movie_count, unmatched
    );

    Ok(merged)
}

fn key_to_string(df: &mut DataFrame) -> Result<()> {
    let key = df.column(JOIN_KEY)?;
    if key.dtype() != &DataType::String {
        let as_text = key.cast(&DataType::String)?;
        df.with_column(as_text)?;
    }
    Ok(())
}

fn count_duplicate_keys(movies: &DataFrame) -> Result<usize> {
    let distinct_keys = movies.column(JOIN_KEY)?.as_materialized_series().n_unique()?;
    Ok(movies.height().saturating_sub(distinct_keys))
}

fn count_unmatched_keys(reviews: &DataFrame, movies: &DataFrame) -> Result<usize> {
    let movie_keys = movies.column(JOIN_KEY)?.cast(&DataType::String)?;
    let known: HashSet<&str> = movie_keys.str()?.into_iter().flatten().collect();

    let review_keys = reviews.column(JOIN_KEY)?.cast(&DataType::String)?;
    let unmatched = review_keys
        .str()?
        .into_iter()
        .filter(|key| key.is_none_or(|k| !known.contains(k)))
        .count();

    Ok(unmatched)
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names().iter().map(|s| s.to_string()).collect()
}

fn resolve_merged_name(df: &DataFrame, base: &str, suffix: &str) -> String {
    if df.column(base).is_ok() {
        base.to_string()
    } else {
        format!("{base}{suffix}")
    }
}

/// 1 when the cleaned text is non-empty after trimming, else 0. Nulls count as empty.
fn add_presence_flag(df: &mut DataFrame, source_col: &str, flag_col: &str) -> Result<()> {
    let texts = df.column(source_col)?.cast(&DataType::String)?;
    let flags: Vec<i32> = texts
        .str()?
        .into_iter()
        .map(|value| match value {
            Some(s) if !s.trim().is_empty() => 1,
            _ => 0,
        })
        .collect();

    df.with_column(Series::new(flag_col.into(), flags))?;
    Ok(())
}
