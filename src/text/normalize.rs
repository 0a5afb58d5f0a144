//! Formatting removal and typo injection.

use rand::seq::SliceRandom;
use rand::Rng;

/// List markers stripped wherever they appear.
const LIST_MARKERS: &[&str] = &["1) ", "2) ", "3) ", "• "];

/// Dash bullets are only stripped for the first few occurrences.
const DASH_MARKER: &str = "- ";
const DASH_MARKER_LIMIT: usize = 2;

const EMPHASIS_MARKERS: &[&str] = &["**", "*"];

const ELLIPSES: &[&str] = &["...", "..", "…"];

const PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', ';', ':', '—', '–', '-', '«', '»', '"', '“', '”', '„',
];

const LOWERCASE_FIRST_PROBABILITY: f64 = 0.3;

/// Per-word probability that a matching typo is applied.
const TYPO_PROBABILITY: f64 = 0.1;

/// Informal spellings. An empty replacement drops the word entirely.
const TYPO_CATALOG: &[(&str, &str)] = &[
    ("что", "че"),
    ("сейчас", "щас"),
    ("ничего", "ниче"),
    ("чтото", "чето"),
    ("вроде", "вродь"),
    ("конечно", "канешно"),
    ("наверное", "наверно"),
    ("его", "ево"),
    ("вообще", "вобще"),
    ("короче", "кароч"),
    ("спасибо", "спс"),
    ("блин", ""),
    ("жесть", ""),
];

/// Strip markup and punctuation, tidy whitespace and add casual noise.
pub fn normalize<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let mut text = text.to_string();

    for marker in LIST_MARKERS {
        text = text.replace(marker, "");
    }
    text = text.replacen(DASH_MARKER, "", DASH_MARKER_LIMIT);
    for marker in EMPHASIS_MARKERS {
        text = text.replace(marker, "");
    }
    for ellipsis in ELLIPSES {
        text = text.replace(ellipsis, " ");
    }
    text.retain(|c| !PUNCTUATION.contains(&c));

    let mut text = collapse_whitespace(&text);

    if !text.is_empty() && rng.gen_bool(LOWERCASE_FIRST_PROBABILITY) {
        text = lowercase_first(&text);
    }

    inject_typos(&text, rng)
}

/// Replace one or two catalog words with their informal spelling.
///
/// Each catalog entry touches at most one word, and each matching word only
/// gets the typo with a small probability, so most calls change little or
/// nothing.
pub fn inject_typos<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let target = rng.gen_range(1..=2);
    let mut catalog: Vec<(&str, &str)> = TYPO_CATALOG.to_vec();
    catalog.shuffle(rng);

    let mut words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
    let mut applied = 0;

    for (canonical, replacement) in catalog {
        if applied >= target {
            break;
        }
        if !text.to_lowercase().contains(canonical) {
            continue;
        }
        for word in words.iter_mut() {
            let lowered = word.to_lowercase();
            if lowered.contains(canonical) && rng.gen_bool(TYPO_PROBABILITY) {
                *word = lowered.replace(canonical, replacement);
                applied += 1;
                break;
            }
        }
    }

    if applied == 0 {
        return text.to_string();
    }

    words.retain(|w| !w.is_empty());
    words.join(" ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
