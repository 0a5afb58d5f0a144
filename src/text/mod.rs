//! Comment text pipeline: normalization, completeness repair, length shaping
//! and canned fallbacks.

mod completeness;
mod normalize;
mod shaper;
mod template;

pub use completeness::{complete, is_complete};
pub use normalize::{inject_typos, normalize};
pub use shaper::{
    cut_to_word_boundary, pad_to_min, shape, ShapeLimits, DEFAULT_MAX_LEN, DEFAULT_MIN_LEN,
};
pub use template::{template_comment, TemplateOptions};
