//! Operator ratings and the statistics derived from them.
//!
//! The evaluation log is the only thing persisted. Statistics, word patterns
//! and the summary report are recomputed from it on demand.

mod storage;
mod report;

pub use storage::{EvaluationLog, FileEvaluationLog, MemoryEvaluationLog};
pub use report::render_summary;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::utils::{char_len, truncate_chars};

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Ratings at or above this count as high-rated.
pub const HIGH_RATING: u8 = 4;
/// Ratings at or below this count as low-rated.
pub const LOW_RATING: u8 = 2;

/// Stored thread content is cut to this many characters.
const STORED_CONTENT_CHARS: usize = 500;

const PREFERRED_WORDS_LIMIT: usize = 20;
const AVOID_WORDS_LIMIT: usize = 10;
const SAMPLE_COMMENTS_LIMIT: usize = 5;
const GUIDED_PREFERRED_WORDS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Training data at {} is corrupt: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },
    #[error("JSON error: {0}")]
    Json(String),
    #[error("Invalid rating {0}: must be between 1 and 5")]
    InvalidRating(u8),
}

/// One operator rating of a generated comment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Written with an offset; logs without one are read as local time.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Local>,
    pub title: String,
    pub content: String,
    pub comment: String,
    pub rating: u8,
    #[serde(default)]
    pub feedback: String,
    pub comment_length: usize,
}

impl Evaluation {
    pub fn new(title: &str, content: &str, comment: &str, rating: u8, feedback: &str) -> Self {
        Self {
            timestamp: Local::now(),
            title: title.to_string(),
            content: truncate_chars(content, STORED_CONTENT_CHARS).to_string(),
            comment: comment.to_string(),
            rating,
            feedback: feedback.to_string(),
            comment_length: char_len(comment),
        }
    }
}

mod timestamp {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
    use serde::{de, Deserialize, Deserializer};

    const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Local>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(parsed.with_timezone(&Local));
        }
        let naive = NaiveDateTime::parse_from_str(&raw, NAIVE_FORMAT).map_err(de::Error::custom)?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| de::Error::custom(format!("{} does not exist in local time", raw)))
    }
}

/// A high-rated comment kept as an example.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatedSample {
    pub comment: String,
    pub rating: u8,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingStatistics {
    pub total_evaluations: usize,
    pub average_rating: f64,
    /// Count of ratings 1 through 5, by index `rating - 1`.
    pub rating_distribution: [usize; 5],
    pub average_length: f64,
    pub high_rated_comments: Vec<RatedSample>,
}

impl TrainingStatistics {
    fn empty() -> Self {
        Self {
            total_evaluations: 0,
            average_rating: 0.0,
            rating_distribution: [0; 5],
            average_length: 0.0,
            high_rated_comments: Vec::new(),
        }
    }

    /// Number of evaluations with the given rating.
    pub fn count_for(&self, rating: u8) -> usize {
        match rating {
            MIN_RATING..=MAX_RATING => self.rating_distribution[(rating - 1) as usize],
            _ => 0,
        }
    }
}

/// Word and length patterns of well and badly rated comments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternAnalysis {
    pub preferred_words: Vec<String>,
    pub avoid_words: Vec<String>,
    pub optimal_length: f64,
    pub sample_comments: Vec<String>,
}

/// Rating log plus the analysis built on top of it.
///
/// Writes take `&mut self`, so a store shared across threads has to sit
/// behind a lock.
pub struct TrainingStore<L: EvaluationLog> {
    log: L,
}

impl TrainingStore<FileEvaluationLog> {
    /// Open the file-backed store, starting empty if the file is unreadable.
    pub fn open_file(path: impl Into<PathBuf>) -> Self {
        Self::new(FileEvaluationLog::open_or_empty(path))
    }
}

impl<L: EvaluationLog> TrainingStore<L> {
    pub fn new(log: L) -> Self {
        Self { log }
    }

    pub fn evaluations(&self) -> &[Evaluation] {
        self.log.all()
    }

    /// Validate and append a rating.
    pub fn record(
        &mut self,
        title: &str,
        content: &str,
        comment: &str,
        rating: u8,
        feedback: &str,
    ) -> Result<(), TrainingError> {
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(TrainingError::InvalidRating(rating));
        }
        self.log
            .append(Evaluation::new(title, content, comment, rating, feedback))
    }

    /// Drop every evaluation.
    pub fn clear(&mut self) -> Result<(), TrainingError> {
        self.log.clear()
    }

    pub fn statistics(&self) -> TrainingStatistics {
        let records = self.log.all();
        if records.is_empty() {
            return TrainingStatistics::empty();
        }

        let total = records.len();
        let mut distribution = [0usize; 5];
        for record in records {
            if let MIN_RATING..=MAX_RATING = record.rating {
                distribution[(record.rating - 1) as usize] += 1;
            }
        }

        let rating_sum: u64 = records.iter().map(|r| r.rating as u64).sum();
        let length_sum: usize = records.iter().map(|r| r.comment_length).sum();

        TrainingStatistics {
            total_evaluations: total,
            average_rating: rating_sum as f64 / total as f64,
            rating_distribution: distribution,
            average_length: length_sum as f64 / total as f64,
            high_rated_comments: records
                .iter()
                .filter(|r| r.rating >= HIGH_RATING)
                .map(|r| RatedSample {
                    comment: r.comment.clone(),
                    rating: r.rating,
                    length: r.comment_length,
                })
                .collect(),
        }
    }

    /// Word and length patterns, or `None` until something is rated highly.
    pub fn analyze_patterns(&self) -> Option<PatternAnalysis> {
        let records = self.log.all();
        let high: Vec<&Evaluation> = records.iter().filter(|r| r.rating >= HIGH_RATING).collect();
        if high.is_empty() {
            return None;
        }
        let low: Vec<&Evaluation> = records.iter().filter(|r| r.rating <= LOW_RATING).collect();

        let mut preferred_words = rank_words(&high);
        preferred_words.truncate(PREFERRED_WORDS_LIMIT);
        let mut avoid_words = rank_words(&low);
        avoid_words.truncate(AVOID_WORDS_LIMIT);

        let length_sum: usize = high.iter().map(|r| r.comment_length).sum();

        Some(PatternAnalysis {
            preferred_words,
            avoid_words,
            optimal_length: length_sum as f64 / high.len() as f64,
            sample_comments: high
                .iter()
                .take(SAMPLE_COMMENTS_LIMIT)
                .map(|r| r.comment.clone())
                .collect(),
        })
    }

    /// Append learned patterns to a base prompt. Unchanged without data.
    pub fn build_guided_prompt(&self, base_prompt: &str) -> String {
        let Some(patterns) = self.analyze_patterns() else {
            return base_prompt.to_string();
        };

        let mut prompt = String::from(base_prompt);
        prompt.push_str("\n\nLEARNED PATTERNS FROM TRAINING:\n");

        if !patterns.preferred_words.is_empty() {
            let words: Vec<&str> = patterns
                .preferred_words
                .iter()
                .take(GUIDED_PREFERRED_WORDS)
                .map(String::as_str)
                .collect();
            prompt.push_str(&format!("- Preferred words: {}\n", words.join(", ")));
        }
        if !patterns.avoid_words.is_empty() {
            prompt.push_str(&format!(
                "- Avoid words: {}\n",
                patterns.avoid_words.join(", ")
            ));
        }
        prompt.push_str(&format!(
            "- Optimal length: ~{} characters\n",
            patterns.optimal_length as usize
        ));

        if !patterns.sample_comments.is_empty() {
            prompt.push_str("\nHigh-rated examples:\n");
            for comment in &patterns.sample_comments {
                prompt.push_str(&format!("\"{}\"\n", comment));
            }
        }

        prompt
    }

    /// Render the summary report, write it to `path` and return it.
    pub fn export_summary(&self, path: &Path) -> Result<String, TrainingError> {
        let summary = render_summary(
            &self.statistics(),
            self.analyze_patterns().as_ref(),
            Local::now(),
        );
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, &summary)?;
        Ok(summary)
    }
}

/// Words by descending frequency; ties keep first-seen order.
fn rank_words(records: &[&Evaluation]) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut next_index = 0;
    for record in records {
        for word in record.comment.to_lowercase().split_whitespace() {
            let entry = counts.entry(word.to_string()).or_insert_with(|| {
                next_index += 1;
                (0, next_index)
            });
            entry.0 += 1;
        }
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
        count_b.cmp(count_a).then(first_a.cmp(first_b))
    });
    ranked.into_iter().map(|(word, _)| word).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TrainingStore<MemoryEvaluationLog> {
        TrainingStore::new(MemoryEvaluationLog::new())
    }

    #[test]
    fn test_empty_statistics() {
        let stats = store().statistics();
        assert_eq!(stats.total_evaluations, 0);
        assert_eq!(stats.average_rating, 0.0);
        assert_eq!(stats.rating_distribution, [0; 5]);
        assert!(stats.high_rated_comments.is_empty());
    }

    #[test]
    fn test_timestamp_with_and_without_offset() {
        use chrono::{Datelike, Timelike};

        let naive = r#"{"timestamp": "2024-03-01T12:30:00.123456", "title": "t",
            "content": "c", "comment": "ну да логично звучит", "rating": 4,
            "feedback": "", "comment_length": 20}"#;
        let evaluation: Evaluation = serde_json::from_str(naive).unwrap();
        assert_eq!(evaluation.timestamp.year(), 2024);
        assert_eq!(evaluation.timestamp.hour(), 12);
        assert_eq!(evaluation.timestamp.minute(), 30);

        let whole_seconds = naive.replace(".123456", "");
        assert!(serde_json::from_str::<Evaluation>(&whole_seconds).is_ok());

        let written = serde_json::to_string(&evaluation).unwrap();
        let reread: Evaluation = serde_json::from_str(&written).unwrap();
        assert_eq!(reread, evaluation);

        let garbage = naive.replace("2024-03-01T12:30:00.123456", "yesterday");
        assert!(serde_json::from_str::<Evaluation>(&garbage).is_err());
    }

    #[test]
    fn test_invalid_ratings_rejected() {
        let mut store = store();
        assert!(matches!(
            store.record("t", "c", "comment", 0, ""),
            Err(TrainingError::InvalidRating(0))
        ));
        assert!(matches!(
            store.record("t", "c", "comment", 6, ""),
            Err(TrainingError::InvalidRating(6))
        ));
        assert_eq!(store.statistics().total_evaluations, 0);
    }

    #[test]
    fn test_statistics_after_records() {
        let mut store = store();
        store.record("t", "c", "да у меня так же было", 5, "").unwrap();
        store.record("t", "c", "ну такое себе", 2, "meh").unwrap();
        store.record("t", "c", "согласен полностью", 4, "").unwrap();

        let stats = store.statistics();
        assert_eq!(stats.total_evaluations, 3);
        assert!((stats.average_rating - 11.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.count_for(5), 1);
        assert_eq!(stats.count_for(4), 1);
        assert_eq!(stats.count_for(2), 1);
        assert_eq!(stats.count_for(3), 0);
        assert_eq!(stats.high_rated_comments.len(), 2);
        let expected_len = (21 + 13 + 18) as f64 / 3.0;
        assert!((stats.average_length - expected_len).abs() < 1e-9);
    }

    #[test]
    fn test_content_is_truncated_for_storage() {
        let mut store = store();
        let content = "ж".repeat(800);
        store.record("t", &content, "коммент", 3, "").unwrap();
        assert_eq!(store.evaluations()[0].content.chars().count(), 500);
        assert_eq!(store.evaluations()[0].comment_length, 7);
    }

    #[test]
    fn test_patterns_need_high_ratings() {
        let mut store = store();
        store.record("t", "c", "плохой коммент", 1, "").unwrap();
        assert_eq!(store.analyze_patterns(), None);
    }

    #[test]
    fn test_pattern_word_ranking() {
        let mut store = store();
        store.record("t", "c", "да тоже было кстати", 5, "").unwrap();
        store.record("t", "c", "Да кстати интересно", 4, "").unwrap();
        store.record("t", "c", "нет ну нет", 1, "").unwrap();
        store.record("t", "c", "средне", 3, "").unwrap();

        let patterns = store.analyze_patterns().unwrap();
        assert_eq!(
            patterns.preferred_words,
            vec!["да", "кстати", "тоже", "было", "интересно"]
        );
        assert_eq!(patterns.avoid_words, vec!["нет", "ну"]);
        assert_eq!(patterns.optimal_length, (19.0 + 19.0) / 2.0);
        assert_eq!(patterns.sample_comments.len(), 2);
    }

    #[test]
    fn test_guided_prompt_unchanged_without_data() {
        assert_eq!(store().build_guided_prompt("base"), "base");
    }

    #[test]
    fn test_guided_prompt_appends_patterns() {
        let mut store = store();
        store.record("t", "c", "да тоже было кстати", 5, "").unwrap();
        store.record("t", "c", "нет ну нет", 1, "").unwrap();

        let prompt = store.build_guided_prompt("base");
        assert!(prompt.starts_with("base\n\nLEARNED PATTERNS FROM TRAINING:\n"));
        assert!(prompt.contains("- Preferred words: да, тоже, было, кстати\n"));
        assert!(prompt.contains("- Avoid words: нет, ну\n"));
        assert!(prompt.contains("- Optimal length: ~19 characters\n"));
        assert!(prompt.contains("\"да тоже было кстати\"\n"));
    }

    #[test]
    fn test_clear_resets_statistics() {
        let mut store = store();
        store.record("t", "c", "да тоже было", 5, "").unwrap();
        store.clear().unwrap();
        assert_eq!(store.statistics().total_evaluations, 0);
    }
}
