use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// NLTK's English stopword list.
const ENGLISH_STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his",
    "himself", "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself",
    "they", "them", "their", "theirs", "themselves", "what", "which", "who", "whom", "this",
    "that", "that'll", "these", "those", "am", "is", "are", "was", "were", "be", "been",
    "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an", "the",
    "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how",
    "all", "any", "both", "each", "few", "more", "most", "other", "some", "such", "no",
    "nor", "not", "only", "own", "same", "so", "than", "too", "very", "s", "t", "can",
    "will", "just", "don", "don't", "should", "should've", "now", "d", "ll", "m", "o", "re",
    "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn", "didn't", "doesn",
    "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn", "isn't", "ma",
    "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't",
    "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn",
    "wouldn't",
];

static DEFAULT_STOPWORDS: Lazy<Arc<HashSet<String>>> = Lazy::new(|| {
    Arc::new(ENGLISH_STOPWORDS.iter().map(|w| (*w).to_string()).collect())
});

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Lowercases free text, strips punctuation and drops stopwords.
///
/// The stopword set is shared and read-only; cloning a cleaner is cheap.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    stopwords: Arc<HashSet<String>>,
}

impl TextCleaner {
    pub fn new() -> Self {
        TextCleaner {
            stopwords: Arc::clone(&DEFAULT_STOPWORDS),
        }
    }

    pub fn with_stopwords<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stopwords = words
            .into_iter()
            .map(|w| w.into().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        TextCleaner {
            stopwords: Arc::new(stopwords),
        }
    }

    /// Load stopwords from a file with one word per line. Blank lines and `#` comments are skipped.
    pub fn from_stopword_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read stopword file: {}", path.display()))?;

        let words: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .collect();

        info!("Loaded {} stopwords from {}", words.len(), path.display());
        Ok(Self::with_stopwords(words))
    }

    pub fn stopword_count(&self) -> usize {
        self.stopwords.len()
    }

    /// `None` is treated as missing and yields an empty string.
    pub fn clean(&self, text: Option<&str>) -> String {
        let Some(text) = text else {
            return String::new();
        };

        let lowered = text.to_lowercase();
        let stripped = NON_WORD.replace_all(&lowered, "");
        let collapsed = WHITESPACE_RUN.replace_all(&stripped, " ");

        collapsed
            .trim()
            .split_whitespace()
            .filter(|word| !self.stopwords.contains(*word))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Clean each named column in place. Non-string columns are cast to string first.
    pub fn clean_columns(&self, df: &mut DataFrame, columns: &[&str]) -> Result<()> {
        for col_name in columns {
            let source = df.column(col_name)?.cast(&DataType::String)?;
            let texts = source.str()?;

            let mut emptied = 0usize;
            let cleaned: Vec<String> = texts
                .into_iter()
                .map(|value| {
                    let out = self.clean(value);
                    if out.is_empty() {
                        emptied += 1;
                    }
                    out
                })
                .collect();

            debug!(
                "Cleaned column '{}': {} rows, {} empty after cleaning",
                col_name,
                cleaned.len(),
                emptied
            );

            df.with_column(Series::new((*col_name).into(), cleaned))?;
        }

        Ok(())
    }
}

impl Default for TextCleaner {
    fn default() -> Self {
        Self::new()
    }
}
