//! Prompt configuration file.
//!
//! The file is plain text split into three named sections:
//!
//! ```text
//! [TITLE_PROMPT]
//! ...{topic}...
//! [CONTENT_PROMPT]
//! ...{topic}...
//! [COMMENT_PROMPT]
//! ...{title}...{content}...
//! ```
//!
//! Placeholders are substituted verbatim before a prompt is sent.

use std::fs;
use std::path::Path;

use log::info;

use crate::utils::truncate_chars;

const TITLE_HEADER: &str = "[TITLE_PROMPT]";
const CONTENT_HEADER: &str = "[CONTENT_PROMPT]";
const COMMENT_HEADER: &str = "[COMMENT_PROMPT]";

/// Thread content beyond this many characters is left out of the prompt.
pub const CONTENT_EXCERPT_CHARS: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("IO error on prompt file: {0}")]
    Io(#[from] std::io::Error),
}

/// The three prompt templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptSet {
    pub title: String,
    pub content: String,
    pub comment: String,
}

impl PromptSet {
    /// Parse the sectioned file format. Missing sections come back empty.
    pub fn parse(text: &str) -> Self {
        Self {
            title: section(text, TITLE_HEADER, Some(CONTENT_HEADER)),
            content: section(text, CONTENT_HEADER, Some(COMMENT_HEADER)),
            comment: section(text, COMMENT_HEADER, None),
        }
    }

    /// Load prompts, writing the built-in defaults first if the file is missing.
    pub fn load_or_create(path: &Path) -> Result<Self, PromptError> {
        if !path.exists() {
            Self::default_prompts().save(path)?;
            info!("Created default prompts file: {}", path.display());
        }
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn save(&self, path: &Path) -> Result<(), PromptError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, self.render())?;
        Ok(())
    }

    pub fn render(&self) -> String {
        format!(
            "{}\n{}\n\n{}\n{}\n\n{}\n{}\n",
            TITLE_HEADER,
            self.title,
            CONTENT_HEADER,
            self.content,
            COMMENT_HEADER,
            self.comment
        )
    }

    pub fn default_prompts() -> Self {
        Self::parse(DEFAULT_PROMPTS)
    }

    /// Title and content prompts with `{topic}` filled in.
    pub fn for_topic(&self, topic: &str) -> (String, String) {
        (
            render_topic_prompt(&self.title, topic),
            render_topic_prompt(&self.content, topic),
        )
    }
}

/// Text after `header` up to `next` (or the end), trimmed. A section whose
/// terminating header is missing is treated as absent.
fn section(text: &str, header: &str, next: Option<&str>) -> String {
    let Some((_, rest)) = text.split_once(header) else {
        return String::new();
    };
    match next {
        Some(next) => rest
            .split_once(next)
            .map(|(body, _)| body.trim().to_string())
            .unwrap_or_default(),
        None => rest.trim().to_string(),
    }
}

/// Fill the comment template with a title and a bounded content excerpt.
pub fn render_comment_prompt(template: &str, title: &str, content: &str) -> String {
    template
        .replace("{title}", title)
        .replace("{content}", truncate_chars(content, CONTENT_EXCERPT_CHARS))
}

/// Fill a title or content template with a topic.
pub fn render_topic_prompt(template: &str, topic: &str) -> String {
    template.replace("{topic}", topic)
}

const DEFAULT_PROMPTS: &str = r#"[TITLE_PROMPT]
Write a short forum thread title about: {topic}
Sound like a regular person, not a journalist:
- 60 to 100 characters
- no exclamation marks or quotes
- casual and relaxed, slang is fine
- WRITE IN RUSSIAN ONLY
Only the title, nothing else.

[CONTENT_PROMPT]
You are a regular forum user. Write a short post about: {topic}
- first person, short simple sentences
- conversational, like texting a friend
- no lists, no punctuation
- one short paragraph of 60 to 100 letters
- WRITE IN RUSSIAN ONLY
- THE SENTENCE MUST BE COMPLETE

[COMMENT_PROMPT]
Read the forum post and write a natural reply.
Post title: {title}
Post text: {content}

RULES:
- 20 to 60 CHARACTERS (not words)
- NO punctuation at all: no periods, commas, exclamation or question marks, dashes
- write like a quick phone message, one stream of thought
- words like вобще короче щас кстати ну типа are welcome
- THE SENTENCE MUST BE COMPLETE

Examples:
да у меня так же было недавно интересно
вобще годная тема надо попробовать
согласен кстати у меня похоже

Reply with the comment only, no greeting or signature. WRITE IN RUSSIAN ONLY
"#;
