//! Shared fixtures for unit tests.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::training::Evaluation;

/// An evaluation with placeholder thread text.
pub fn make_evaluation(comment: &str, rating: u8) -> Evaluation {
    Evaluation::new("Тема", "Текст темы", comment, rating, "")
}

/// Deterministic RNG for tests that do not care about the seed.
pub fn seeded_rng() -> StdRng {
    StdRng::seed_from_u64(42)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_evaluation() {
        let evaluation = make_evaluation("ну да логично звучит", 4);
        assert_eq!(evaluation.rating, 4);
        assert_eq!(evaluation.comment_length, 20);
        assert_eq!(evaluation.feedback, "");
    }
}
