//! Human-readable training summary.

use chrono::{DateTime, Local};

use super::{PatternAnalysis, TrainingStatistics, MAX_RATING, MIN_RATING};

const SUMMARY_PREFERRED_WORDS: usize = 15;

/// Render statistics and patterns as a plain-text report.
pub fn render_summary(
    stats: &TrainingStatistics,
    patterns: Option<&PatternAnalysis>,
    generated_at: DateTime<Local>,
) -> String {
    let mut output = String::new();

    output.push_str("GhostCommenter Training Summary\n");
    output.push_str(&format!(
        "Generated: {}\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));

    output.push_str("STATISTICS:\n");
    output.push_str(&format!(
        "- Total Evaluations: {}\n",
        stats.total_evaluations
    ));
    output.push_str(&format!(
        "- Average Rating: {:.2}/5\n",
        stats.average_rating
    ));
    output.push_str(&format!(
        "- Average Length: {:.1} characters\n\n",
        stats.average_length
    ));

    output.push_str("RATING DISTRIBUTION:\n");
    for rating in (MIN_RATING..=MAX_RATING).rev() {
        let count = stats.count_for(rating);
        output.push_str(&format!(
            "{} stars: {:3} {}\n",
            rating,
            count,
            "█".repeat(count)
        ));
    }

    if let Some(patterns) = patterns {
        output.push_str("\nPATTERNS:\n");
        output.push_str(&format!(
            "Optimal Length: {:.0} characters\n",
            patterns.optimal_length
        ));
        let words: Vec<&str> = patterns
            .preferred_words
            .iter()
            .take(SUMMARY_PREFERRED_WORDS)
            .map(String::as_str)
            .collect();
        output.push_str(&format!("\nPreferred Words: {}\n", words.join(", ")));
        if !patterns.avoid_words.is_empty() {
            output.push_str(&format!(
                "Avoid Words: {}\n",
                patterns.avoid_words.join(", ")
            ));
        }

        if !patterns.sample_comments.is_empty() {
            output.push_str("\nTop Rated Comments:\n");
            for (i, comment) in patterns.sample_comments.iter().enumerate() {
                output.push_str(&format!("{}. {}\n", i + 1, comment));
            }
        }
    }

    output
}
