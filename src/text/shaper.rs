//! Forces arbitrary text into a comment that fits a character window and
//! still ends on a finished thought.
//!
//! Completeness outranks the upper bound: the shaper will run a few
//! characters past `max_len` rather than emit a fragment, but it never stops
//! short of `min_len` while extension phrases remain.

use log::debug;
use rand::Rng;

use crate::text::completeness::{complete, is_complete};
use crate::utils::{char_len, preview, truncate_chars};

pub const DEFAULT_MIN_LEN: usize = 20;
pub const DEFAULT_MAX_LEN: usize = 60;

/// How far past `max_len` re-appending the cut token may go.
const REAPPEND_SLACK: usize = 5;

/// Overshoot tolerated before trailing tokens are popped.
const CLAMP_SLACK: usize = 10;

/// Popping never goes below this many tokens.
const CLAMP_MIN_TOKENS: usize = 3;

/// Phrases appended to comments that are too short. Each ends complete.
const EXTENSIONS: &[&str] = &[
    "интересно",
    "кстати",
    "щас попробую",
    "годно",
    "вобще интересно",
    "надо глянуть",
    "прикольно",
];

/// Character window a shaped comment must fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeLimits {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for ShapeLimits {
    fn default() -> Self {
        Self {
            min_len: DEFAULT_MIN_LEN,
            max_len: DEFAULT_MAX_LEN,
        }
    }
}

impl ShapeLimits {
    pub fn new(min_len: usize, max_len: usize) -> Result<Self, String> {
        if min_len > max_len {
            return Err(format!(
                "minimum length {} exceeds maximum length {}",
                min_len, max_len
            ));
        }
        Ok(Self { min_len, max_len })
    }
}

/// Shape `text` into a comment within `limits`.
///
/// Never fails. Output is at least `min_len` characters and complete; it
/// exceeds `max_len` only when cutting would leave a fragment.
pub fn shape<R: Rng + ?Sized>(text: &str, limits: ShapeLimits, rng: &mut R) -> String {
    let mut text = text.trim().to_string();

    if !is_complete(&text) {
        text = complete(&text, rng);
        debug!("Completed fragment: {}", preview(&text, 80));
    }

    if char_len(&text) < limits.min_len {
        text = pad_to_min(&text, limits.min_len, rng);
    }

    if char_len(&text) > limits.max_len {
        text = fit_to_max(&text, limits.max_len, rng);
        text = pad_if_short(text, limits.min_len, rng);
    }

    if !is_complete(&text) {
        text = complete(&text, rng);
        text = pad_if_short(text, limits.min_len, rng);
    }

    if char_len(&text) > limits.max_len + CLAMP_SLACK {
        debug!(
            "Comment still {} chars after cut, popping trailing words",
            char_len(&text)
        );
        text = pop_to_max(&text, limits.max_len, rng);
        text = pad_if_short(text, limits.min_len, rng);
    }

    text.trim().to_string()
}

/// A cut can drop everything but a short head when the next token is huge.
fn pad_if_short<R: Rng + ?Sized>(text: String, min_len: usize, rng: &mut R) -> String {
    if char_len(&text) < min_len {
        pad_to_min(&text, min_len, rng)
    } else {
        text
    }
}

/// Append extension phrases not already present until `min_len` is reached
/// or the pool runs out.
pub fn pad_to_min<R: Rng + ?Sized>(text: &str, min_len: usize, rng: &mut R) -> String {
    let mut text = text.trim().to_string();
    let mut pool: Vec<&str> = EXTENSIONS
        .iter()
        .copied()
        .filter(|phrase| !text.contains(phrase))
        .collect();

    while char_len(&text) < min_len && !pool.is_empty() {
        let phrase = pool.swap_remove(rng.gen_range(0..pool.len()));
        if text.contains(phrase) {
            continue;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(phrase);
    }

    text
}

/// Cut to `max_len` characters and drop the last, possibly partial, token.
pub fn cut_to_word_boundary(text: &str, max_len: usize) -> String {
    let cut = truncate_chars(text, max_len);
    let head = match cut.rsplit_once(' ') {
        Some((head, _)) => head,
        None => cut,
    };
    head.trim_end().to_string()
}

fn fit_to_max<R: Rng + ?Sized>(text: &str, max_len: usize, rng: &mut R) -> String {
    let head = cut_to_word_boundary(text, max_len);
    if is_complete(&head) {
        return head;
    }

    // Try restoring the token the cut removed; a few extra characters beat a
    // fragment.
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let whole = head
        .split_whitespace()
        .zip(tokens.iter())
        .take_while(|(kept, original)| kept == *original)
        .count();
    if whole < tokens.len() {
        let candidate = tokens[..=whole].join(" ");
        if char_len(&candidate) <= max_len + REAPPEND_SLACK && is_complete(&candidate) {
            return candidate;
        }
    }

    complete(&head, rng)
}

fn pop_to_max<R: Rng + ?Sized>(text: &str, max_len: usize, rng: &mut R) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    while tokens.len() > CLAMP_MIN_TOKENS && char_len(&tokens.join(" ")) > max_len {
        tokens.pop();
    }

    let popped = tokens.join(" ");
    if is_complete(&popped) {
        popped
    } else {
        complete(&popped, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_valid_comment_is_unchanged() {
        let mut rng = StdRng::seed_from_u64(1);
        let input = "согласен с этим полностью блин";
        assert_eq!(shape(input, ShapeLimits::default(), &mut rng), input);
    }

    #[test]
    fn test_short_comment_is_padded() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = shape("да согласен", ShapeLimits::default(), &mut rng);
            assert!(char_len(&out) >= DEFAULT_MIN_LEN, "too short: {:?}", out);
            assert!(char_len(&out) <= DEFAULT_MAX_LEN, "too long: {:?}", out);
            assert!(is_complete(&out), "incomplete: {:?}", out);
            assert!(out.starts_with("да согласен"));
        }
    }

    #[test]
    fn test_pad_skips_phrases_already_present() {
        let mut rng = StdRng::seed_from_u64(3);
        let out = pad_to_min("годно годно", 200, &mut rng);
        assert_eq!(out.matches("годно").count(), 2);
        for phrase in EXTENSIONS.iter().filter(|p| **p != "годно") {
            assert!(out.contains(phrase), "{:?} missing from {:?}", phrase, out);
        }
    }

    #[test]
    fn test_pad_stops_when_pool_exhausted() {
        let mut rng = StdRng::seed_from_u64(3);
        let out = pad_to_min("да", 10_000, &mut rng);
        assert!(char_len(&out) < 10_000);
    }

    #[test]
    fn test_cut_to_word_boundary() {
        assert_eq!(cut_to_word_boundary("один два три", 9), "один два");
        assert_eq!(cut_to_word_boundary("один два три", 8), "один");
        assert_eq!(cut_to_word_boundary("одиндватри", 4), "один");
    }

    #[test]
    fn test_cut_that_stays_complete_fits_window() {
        let mut rng = StdRng::seed_from_u64(11);
        // 90 chars, cut off mid-word.
        let input = "ну я вот тоже недавно с этим столкнулся и долго не мог понять в чем там было дело вот попр";
        let out = shape(input, ShapeLimits::default(), &mut rng);
        assert_eq!(out, "ну я вот тоже недавно с этим столкнулся и долго не мог");
    }

    #[test]
    fn test_oversized_token_after_short_head_is_padded() {
        // A URL flattened by normalization: too long to re-append.
        let input =
            "ну да httpsexamplecomforumthreadsmotorsverylongpath1234567890abcdefghijklmnop";
        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = shape(input, ShapeLimits::default(), &mut rng);
            assert!(char_len(&out) >= DEFAULT_MIN_LEN, "too short: {:?}", out);
            assert!(char_len(&out) <= DEFAULT_MAX_LEN + CLAMP_SLACK, "too long: {:?}", out);
            assert!(is_complete(&out), "incomplete: {:?}", out);
            assert!(!out.contains("https"));
        }
    }

    #[test]
    fn test_reappends_cut_word_within_slack() {
        let mut rng = StdRng::seed_from_u64(0);
        // The cut leaves a dangling "и"; restoring "дальше" lands at 20 chars.
        let limits = ShapeLimits::new(10, 18).unwrap();
        let out = shape("вот так вот и дальше будет всегда", limits, &mut rng);
        assert_eq!(out, "вот так вот и дальше");
    }

    #[test]
    fn test_new_limits_rejects_inverted_window() {
        assert!(ShapeLimits::new(30, 20).is_err());
        assert!(ShapeLimits::new(20, 20).is_ok());
    }

    #[test]
    fn test_reshaping_is_noop() {
        let inputs = [
            "ну тогда я думаю что",
            "да согласен",
            "короче я вообще не понял зачем так делать но ладно в целом тема интересная и полезная для",
        ];
        for seed in 0..20 {
            for input in inputs {
                let mut rng = StdRng::seed_from_u64(seed);
                let once = shape(input, ShapeLimits::default(), &mut rng);
                let len = char_len(&once);
                if len >= DEFAULT_MIN_LEN && len <= DEFAULT_MAX_LEN && is_complete(&once) {
                    let twice = shape(&once, ShapeLimits::default(), &mut rng);
                    assert_eq!(once, twice);
                }
            }
        }
    }
}
