use anyhow::Result;
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use tracing::{debug, warn};

static HOURS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*h").unwrap());
static MINUTES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)\s*min").unwrap());

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DurationReport {
    pub parsed: usize,
    /// Present but matched neither pattern; these come out as 0 minutes
    pub unmatched: usize,
    pub missing: usize,
    /// Components too large to total in an `i64`; these come out as null
    pub overflowed: usize,
}

pub struct DurationParser;

impl DurationParser {
    /// Parse strings like "2 h 30 min" into total minutes.
    ///
    /// A string with no hour or minute component parses to 0, not `None`. A total that
    /// does not fit in an `i64` is unknown.
    pub fn to_minutes(&self, raw: Option<&str>) -> Option<i64> {
        let s = raw?.trim().to_lowercase();

        let hours = Self::first_number(&HOURS, &s)?;
        let minutes = Self::first_number(&MINUTES, &s)?;

        hours.checked_mul(60)?.checked_add(minutes)
    }

    /// True when the string carries at least one of the two components.
    pub fn has_component(&self, raw: &str) -> bool {
        let s = raw.trim().to_lowercase();
        HOURS.is_match(&s) || MINUTES.is_match(&s)
    }

    pub fn parse_column(&self, df: &mut DataFrame, source_col: &str, target_col: &str) -> Result<DurationReport> {
        let source = df.column(source_col)?.cast(&DataType::String)?;
        let values = source.str()?;

        let mut report = DurationReport::default();
        let minutes: Vec<Option<i64>> = values
            .into_iter()
            .map(|value| {
                let total = self.to_minutes(value);
                match value {
                    None => report.missing += 1,
                    Some(raw) if total.is_none() => {
                        warn!("Duration {:?} is too large, setting it to null", raw);
                        report.overflowed += 1;
                    }
                    Some(raw) if self.has_component(raw) => report.parsed += 1,
                    Some(raw) => {
                        debug!("Duration {:?} matched no hour/minute pattern", raw);
                        report.unmatched += 1;
                    }
                }
                total
            })
            .collect();

        df.with_column(Series::new(target_col.into(), minutes))?;
        Ok(report)
    }

    /// 0 when the pattern does not match, `None` when the digits overflow an `i64`.
    fn first_number(pattern: &Regex, s: &str) -> Option<i64> {
        match pattern.captures(s).and_then(|caps| caps.get(1)) {
            Some(m) => m.as_str().parse::<i64>().ok(),
            None => Some(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_formats() {
        let parser = DurationParser;

        assert_eq!(parser.to_minutes(Some("2 h 30 min")), Some(150));
        assert_eq!(parser.to_minutes(Some("45 min")), Some(45));
        assert_eq!(parser.to_minutes(Some("3 h")), Some(180));
        assert_eq!(parser.to_minutes(Some("1h 55min")), Some(115));
        assert_eq!(parser.to_minutes(Some("  2H 5MIN ")), Some(125));
        assert_eq!(parser.to_minutes(None), None);
    }

    #[test]
    fn test_unmatched_duration_is_zero() {
        let parser = DurationParser;

        assert_eq!(parser.to_minutes(Some("")), Some(0));
        assert_eq!(parser.to_minutes(Some("unknown")), Some(0));
        assert_eq!(parser.to_minutes(Some("90")), Some(0));
        assert!(!parser.has_component("90"));
        assert!(parser.has_component("90 min"));
    }

    #[test]
    fn test_parse_column_report() {
        let parser = DurationParser;
        let mut df = DataFrame::new(vec![
            Series::new("duration".into(), [Some("2 h 15 min"), Some("n/a"), None]).into(),
        ])
        .unwrap();

        let report = parser.parse_column(&mut df, "duration", "duration_min").unwrap();
        assert_eq!(
            report,
            DurationReport {
                parsed: 1,
                unmatched: 1,
                missing: 1,
                overflowed: 0
            }
        );

        let minutes = df.column("duration_min").unwrap().i64().unwrap();
        assert_eq!(minutes.get(0), Some(135));
        assert_eq!(minutes.get(1), Some(0));
        assert_eq!(minutes.get(2), None);

        // source column is left alone
        assert_eq!(df.column("duration").unwrap().str().unwrap().get(0), Some("2 h 15 min"));
    }

    #[test]
    fn test_oversized_duration_is_unknown() {
        let parser = DurationParser;

        assert_eq!(parser.to_minutes(Some("999999999999999999 h")), None);
        assert_eq!(parser.to_minutes(Some("99999999999999999999 min")), None);
        assert_eq!(parser.to_minutes(Some("153722867280912930 h 7 min")), Some(i64::MAX));
        assert_eq!(parser.to_minutes(Some("153722867280912930 h 8 min")), None);

        let mut df = DataFrame::new(vec![
            Series::new("duration".into(), ["999999999999999999 h", "1 h 30 min"]).into(),
        ])
        .unwrap();

        let report = parser.parse_column(&mut df, "duration", "duration_min").unwrap();
        assert_eq!(report.overflowed, 1);
        assert_eq!(report.parsed, 1);

        let minutes = df.column("duration_min").unwrap().i64().unwrap();
        assert_eq!(minutes.get(0), None);
        assert_eq!(minutes.get(1), Some(90));
    }
}
