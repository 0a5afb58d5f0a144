//! Heuristic check for whether a comment ends on a finished thought.
//!
//! This is not a grammar parser. It looks only at length, token count and the
//! final token, which is enough to catch output that was cut off mid-clause
//! or mid-word by a generator.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::utils::char_len;

const MIN_COMPLETE_CHARS: usize = 10;
const MIN_COMPLETE_TOKENS: usize = 3;

/// Words that cannot end a clause: conjunctions, prepositions, possessives
/// and degree or demonstrative modifiers.
const DANGLING_WORDS: &[&str] = &[
    // conjunctions and particles
    "и", "а", "но", "что", "чтобы", "или", "либо", "если", "когда", "потому", "хотя", "как",
    "где", "ведь", "то", "зато", "не", "ни", "бы",
    // prepositions
    "в", "во", "на", "с", "со", "к", "ко", "по", "о", "об", "от", "до", "из", "за", "для", "без",
    "под", "над", "про", "при", "у", "через", "перед", "после",
    // possessives
    "мой", "моя", "мое", "мои", "твой", "твоя", "твои", "наш", "наша", "ваш", "ваша", "свой",
    "своя", "свои",
    // degree and demonstratives
    "очень", "самый", "самая", "такой", "такая", "такое", "этот", "эта", "тот", "та", "более",
    "менее", "слишком", "довольно", "весьма",
];

/// Verb stems that show up when a generator stops mid-word.
const TRUNCATED_STEMS: &[&str] = &[
    "попроб", "посмот", "сдел", "подум", "получа", "объясн", "разбир", "попыта",
];

/// Natural continuations for specific dangling words.
const COMPLETION_RULES: &[(&str, &[&str])] = &[
    ("что", &["интересно", "думаешь", "скажешь"]),
    ("и", &["все", "так далее", "норм"]),
    ("а", &["ты сам пробовал", "у тебя так же"]),
    ("но", &["в целом норм", "все равно интересно"]),
    ("в", &["целом норм", "принципе понятно"]),
    ("на", &["самом деле интересно", "практике проверю"]),
    ("с", &["этим согласен", "ним согласен"]),
    ("для", &["начала норм", "себя отметил"]),
    ("потому", &["что удобно", "что так проще"]),
    ("если", &["честно интересно", "так то норм"]),
    ("очень", &["интересно", "круто", "полезно"]),
    ("когда", &["время будет", "как повезет"]),
    ("как", &["всегда", "обычно"]),
    ("мой", &["опыт такой же", "вариант тоже"]),
    ("моя", &["история похожая", "ситуация такая же"]),
    ("такой", &["же опыт был", "вариант тоже норм"]),
    ("про", &["это не знал", "такое слышал"]),
    ("по", &["факту так и есть", "опыту так"]),
    ("к", &["слову интересно", "сожалению так"]),
    ("о", &["таком не слышал", "подобном думал"]),
    ("у", &["меня так же", "меня похоже"]),
];

/// Generic closings used when the last token has no dedicated rule.
const FALLBACK_CLOSINGS: &[&str] = &[
    "вот так",
    "как то так",
    "в общем интересно",
    "короче норм",
    "надо попробовать",
];

/// Decide whether `text` reads as a finished thought. Deterministic.
pub fn is_complete(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || char_len(text) < MIN_COMPLETE_CHARS {
        return false;
    }

    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < MIN_COMPLETE_TOKENS {
        return false;
    }

    let Some(last) = tokens.last() else {
        return false;
    };
    let last = last.to_lowercase();

    if DANGLING_WORDS.contains(&last.as_str()) {
        return false;
    }

    let last_len = char_len(&last);
    let truncated = TRUNCATED_STEMS
        .iter()
        .any(|stem| last.starts_with(stem) && last_len <= char_len(stem) + 1);

    !truncated
}

/// Append a continuation to text that does not read as finished.
///
/// Complete text is returned unchanged. The result should still be re-checked
/// by the caller: one pass fixes the ending, not the length or token count.
pub fn complete<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    if is_complete(text) {
        return text.to_string();
    }

    let text = text.trim();
    let rule = text
        .split_whitespace()
        .last()
        .map(str::to_lowercase)
        .and_then(|last| continuations_for(&last));
    let continuation = match rule {
        Some(options) => options.choose(rng),
        None => FALLBACK_CLOSINGS.choose(rng),
    }
    .copied()
    .unwrap_or(FALLBACK_CLOSINGS[0]);

    if text.is_empty() {
        continuation.to_string()
    } else {
        format!("{} {}", text, continuation)
    }
}

fn continuations_for(word: &str) -> Option<&'static [&'static str]> {
    COMPLETION_RULES
        .iter()
        .find(|(dangling, _)| *dangling == word)
        .map(|(_, options)| *options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_short_or_empty_is_incomplete() {
        assert!(!is_complete(""));
        assert!(!is_complete("   "));
        assert!(!is_complete("да ок же"));
    }

    #[test]
    fn test_too_few_tokens_is_incomplete() {
        assert!(!is_complete("интересненько получилось"));
    }

    #[test]
    fn test_dangling_last_word_is_incomplete() {
        assert!(!is_complete("ну тогда я думаю что"));
        assert!(!is_complete("я вот пошел туда на"));
        assert!(!is_complete("это было очень"));
        assert!(!is_complete("ну тогда я думаю ЧТО"));
    }

    #[test]
    fn test_truncated_stem_is_incomplete() {
        assert!(!is_complete("надо будет попробу"));
        assert!(!is_complete("надо будет попроб"));
        assert!(is_complete("надо будет попробовать"));
    }

    #[test]
    fn test_plain_sentences_are_complete() {
        assert!(is_complete("согласен с этим полностью блин"));
        assert!(is_complete("да у меня так же было"));
        assert!(is_complete("ну да логично звучит"));
    }

    #[test]
    fn test_is_complete_is_pure() {
        let text = "ну вот у меня было так же только дольше";
        let first = is_complete(text);
        for _ in 0..10 {
            assert_eq!(is_complete(text), first);
        }
    }

    #[test]
    fn test_complete_leaves_complete_text_alone() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            complete("ну да логично звучит", &mut rng),
            "ну да логично звучит"
        );
    }

    #[test]
    fn test_complete_uses_registered_continuation() {
        for seed in 0..30 {
            let mut rng = StdRng::seed_from_u64(seed);
            let out = complete("ну тогда я думаю что", &mut rng);
            let tail = out.strip_prefix("ну тогда я думаю что ").unwrap();
            assert!(
                ["интересно", "думаешь", "скажешь"].contains(&tail),
                "unexpected continuation {:?}",
                tail
            );
            assert!(is_complete(&out));
        }
    }

    #[test]
    fn test_complete_falls_back_to_generic_closing() {
        let mut rng = StdRng::seed_from_u64(5);
        let out = complete("надо будет попробу", &mut rng);
        let tail = out.strip_prefix("надо будет попробу ").unwrap();
        assert!(FALLBACK_CLOSINGS.contains(&tail));
        assert!(is_complete(&out));
    }

    #[test]
    fn test_complete_always_grows_incomplete_text() {
        let mut rng = StdRng::seed_from_u64(9);
        for input in ["", "да", "а если", "и потом на"] {
            let out = complete(input, &mut rng);
            assert!(char_len(&out) > char_len(input), "{:?} -> {:?}", input, out);
        }
    }

    #[test]
    fn test_continuations_never_end_dangling() {
        let endings = COMPLETION_RULES
            .iter()
            .flat_map(|(_, options)| options.iter())
            .chain(FALLBACK_CLOSINGS.iter());
        for phrase in endings {
            let sentence = format!("ну вот короче {}", phrase);
            assert!(is_complete(&sentence), "{:?} ends dangling", phrase);
        }
    }
}
