use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use tracing::debug;

pub const RELEASE_DATE_FORMAT: &str = "%Y-%m-%d";
pub const REVIEW_DATE_FORMAT: &str = "%d %B %Y";

// Days from 0001-01-01 to 1970-01-01, the epoch polars stores `Date` against.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

static YEAR_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").unwrap());
static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}$").unwrap());

/// Counts from normalizing one date column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateColumnReport {
    pub parsed: usize,
    pub unknown: usize,
    pub missing: usize,
}

impl DateColumnReport {
    pub fn total(&self) -> usize {
        self.parsed + self.unknown + self.missing
    }
}

pub struct DateNormalizer;

impl DateNormalizer {
    /// Pad `YYYY` and `YYYY-MM` out to a full `YYYY-MM-DD`. Anything else is returned trimmed.
    pub fn fill_partial_date(&self, raw: Option<&str>) -> Option<String> {
        let trimmed = raw?.trim();

        if YEAR_ONLY.is_match(trimmed) {
            return Some(format!("{trimmed}-01-01"));
        }

        if YEAR_MONTH.is_match(trimmed) {
            return Some(format!("{trimmed}-01"));
        }

        Some(trimmed.to_string())
    }

    pub fn parse_release_date(&self, raw: Option<&str>) -> Option<NaiveDate> {
        let filled = self.fill_partial_date(raw)?;
        NaiveDate::parse_from_str(&filled, RELEASE_DATE_FORMAT).ok()
    }

    /// Review dates look like "04 January 2020" and are never partial.
    pub fn parse_review_date(&self, raw: Option<&str>) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(raw?.trim(), REVIEW_DATE_FORMAT).ok()
    }

    /// Whole days from `date` to `today`; `None` when the date is unknown.
    pub fn days_since(today: NaiveDate, date: Option<NaiveDate>) -> Option<i64> {
        date.map(|d| today.signed_duration_since(d).num_days())
    }

    pub fn normalize_release_dates(&self, df: &mut DataFrame, col_name: &str) -> Result<DateColumnReport> {
        self.normalize_column(df, col_name, |raw| self.parse_release_date(raw))
    }

    pub fn normalize_review_dates(&self, df: &mut DataFrame, col_name: &str) -> Result<DateColumnReport> {
        self.normalize_column(df, col_name, |raw| self.parse_review_date(raw))
    }

    /// Add `days_col` computed from an already normalized `Date` column.
    pub fn add_days_since(
        &self,
        df: &mut DataFrame,
        date_col: &str,
        days_col: &str,
        today: NaiveDate,
    ) -> Result<()> {
        let physical = df.column(date_col)?.cast(&DataType::Int32)?;
        let days: Vec<Option<i64>> = physical
            .i32()?
            .into_iter()
            .map(|epoch_days| {
                let date = epoch_days
                    .and_then(|d| d.checked_add(UNIX_EPOCH_DAYS_FROM_CE))
                    .and_then(NaiveDate::from_num_days_from_ce_opt);
                Self::days_since(today, date)
            })
            .collect();

        df.with_column(Series::new(days_col.into(), days))?;
        Ok(())
    }

    fn normalize_column<F>(&self, df: &mut DataFrame, col_name: &str, parse: F) -> Result<DateColumnReport>
    where
        F: Fn(Option<&str>) -> Option<NaiveDate>,
    {
        let source = df.column(col_name)?.cast(&DataType::String)?;
        let values = source.str()?;

        let mut report = DateColumnReport::default();
        let epoch_days: Vec<Option<i32>> = values
            .into_iter()
            .map(|value| {
                let parsed = parse(value);
                match (value, parsed) {
                    (None, _) => report.missing += 1,
                    (Some(_), Some(_)) => report.parsed += 1,
                    (Some(raw), None) => {
                        debug!("Unparseable date in '{}': {:?}", col_name, raw);
                        report.unknown += 1;
                    }
                }
                parsed.map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
            })
            .collect();

        let dates = Series::new(col_name.into(), epoch_days).cast(&DataType::Date)?;
        df.with_column(dates)?;

        Ok(report)
    }
}
