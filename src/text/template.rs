//! Canned comments used when no generator output is available.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::text::normalize::inject_typos;
use crate::text::shaper::{cut_to_word_boundary, pad_to_min, ShapeLimits};
use crate::utils::char_len;

/// Generic agreement and interest phrases. Every entry ends complete.
const TEMPLATES: &[&str] = &[
    "да у меня так же было",
    "не знал об этом честно",
    "да тоже заметил это недавно",
    "согласен с этим полностью",
    "ну да логично звучит",
    "интересная тема кстати",
    "полезно знать спасибо",
];

/// Options for template comments.
#[derive(Debug, Clone, Copy)]
pub struct TemplateOptions {
    pub limits: ShapeLimits,
    /// Apply typo injection to the chosen phrase.
    pub typos: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            limits: ShapeLimits::default(),
            typos: true,
        }
    }
}

/// Pick a canned comment and fit it to the length window.
///
/// The thread is not inspected; the arguments keep the signature aligned
/// with generated comments.
pub fn template_comment<R: Rng + ?Sized>(
    _title: &str,
    _content: &str,
    options: TemplateOptions,
    rng: &mut R,
) -> String {
    let phrase = TEMPLATES.choose(rng).copied().unwrap_or(TEMPLATES[0]);
    let mut comment = if options.typos {
        inject_typos(phrase, rng)
    } else {
        phrase.to_string()
    };

    if char_len(&comment) < options.limits.min_len {
        comment = pad_to_min(&comment, options.limits.min_len, rng);
    }
    if char_len(&comment) > options.limits.max_len {
        comment = cut_to_word_boundary(&comment, options.limits.max_len);
    }

    comment
}
