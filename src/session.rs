//! The posting session: pick a thread, comment once, wait, repeat.
//!
//! The forum itself sits behind the [`Forum`] trait. [`FileForum`] reads
//! threads from a JSON file and prints what it would post.

use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cancel;
use crate::generate::CommentGenerator;
use crate::llm::{LlmConfig, LlmProvider};
use crate::text::{template_comment, TemplateOptions};
use crate::utils::preview;

/// Operators may not pace comments faster than this.
pub const MIN_PACING_FLOOR: Duration = Duration::from_secs(10);
pub const DEFAULT_PACING_MIN: Duration = Duration::from_secs(30);
pub const DEFAULT_PACING_MAX: Duration = Duration::from_secs(60);

const SLEEP_SLICE: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Login and password must not be empty")]
    EmptyCredentials,
    #[error("Minimum delay must be at least {} seconds", .floor.as_secs())]
    PacingBelowFloor { floor: Duration },
    #[error("Maximum delay must not be less than the minimum")]
    PacingInverted,
    #[error("Comment count must be at least 1")]
    ZeroCount,
    #[error("The openai provider needs an API key")]
    MissingApiKey,
}

#[derive(Debug, thiserror::Error)]
pub enum ForumError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid thread list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Forum rejected the comment: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingMode {
    /// Stop after this many posted comments.
    Limited(usize),
    Unlimited,
}

/// Operator controls for one session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Only needed by forums that log in.
    pub credentials: Option<Credentials>,
    pub pacing_min: Duration,
    pub pacing_max: Duration,
    pub mode: PostingMode,
    pub use_ai: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            credentials: None,
            pacing_min: DEFAULT_PACING_MIN,
            pacing_max: DEFAULT_PACING_MAX,
            mode: PostingMode::Unlimited,
            use_ai: true,
        }
    }
}

impl SessionSettings {
    /// Check the settings before any thread is touched.
    pub fn validate(&self, llm: &LlmConfig) -> Result<(), SettingsError> {
        if let Some(creds) = &self.credentials {
            if creds.login.trim().is_empty() || creds.password.is_empty() {
                return Err(SettingsError::EmptyCredentials);
            }
        }
        if self.pacing_min < MIN_PACING_FLOOR {
            return Err(SettingsError::PacingBelowFloor {
                floor: MIN_PACING_FLOOR,
            });
        }
        if self.pacing_max < self.pacing_min {
            return Err(SettingsError::PacingInverted);
        }
        if self.mode == PostingMode::Limited(0) {
            return Err(SettingsError::ZeroCount);
        }
        let has_key = llm
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty());
        if self.use_ai && llm.provider == LlmProvider::OpenAi && !has_key {
            return Err(SettingsError::MissingApiKey);
        }
        Ok(())
    }

    pub fn pacing(&self) -> Pacing {
        Pacing::new(self.pacing_min, self.pacing_max)
    }
}

/// Random delay between comments, in whole seconds.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    min_secs: u64,
    max_secs: u64,
}

impl Pacing {
    pub fn new(min: Duration, max: Duration) -> Self {
        let (min_secs, max_secs) = (min.as_secs(), max.as_secs());
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: min_secs.max(max_secs),
        }
    }

    /// No waiting at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_secs(rng.gen_range(self.min_secs..=self.max_secs))
    }

    /// Sleep for a random delay. Returns `false` if cancelled while waiting.
    pub fn wait<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        let delay = self.delay(rng);
        if delay.is_zero() {
            return !cancel::is_cancelled();
        }
        info!("Next comment in {} seconds", delay.as_secs());

        let mut remaining = delay;
        while !remaining.is_zero() {
            if cancel::is_cancelled() {
                return false;
            }
            let slice = remaining.min(SLEEP_SLICE);
            thread::sleep(slice);
            remaining -= slice;
            let secs = remaining.as_secs();
            if secs > 0 && secs % 30 == 0 {
                debug!("{} seconds left", secs);
            }
        }
        !cancel::is_cancelled()
    }
}

/// Threads already commented on, keyed by canonical URL.
#[derive(Debug, Clone)]
pub struct AnsweredThreads {
    base_url: String,
    urls: HashSet<String>,
}

impl AnsweredThreads {
    /// `base_url` resolves site-relative thread links.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            urls: HashSet::new(),
        }
    }

    /// Absolute URL without the `/unread` suffix or a trailing slash.
    pub fn canonicalize(&self, url: &str) -> String {
        let url = url.trim();
        let absolute = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else if let Some(path) = url.strip_prefix('/') {
            format!("{}/{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, url)
        };
        absolute.replace("/unread", "").trim_end_matches('/').to_string()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(&self.canonicalize(url))
    }

    /// Returns `false` if the thread was already recorded.
    pub fn insert(&mut self, url: &str) -> bool {
        let canonical = self.canonicalize(url);
        self.urls.insert(canonical)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn clear(&mut self) {
        self.urls.clear();
    }
}

/// A forum thread as seen by the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// Where threads come from and where comments go.
pub trait Forum {
    /// The next candidate thread, or `None` when there is nothing left.
    fn next_thread(&mut self) -> Result<Option<Thread>, ForumError>;

    fn post_comment(&mut self, thread: &Thread, comment: &str) -> Result<(), ForumError>;
}

/// Threads from a JSON file; comments are printed instead of posted.
#[derive(Debug, Default)]
pub struct FileForum {
    pending: VecDeque<Thread>,
    posted: Vec<(String, String)>,
}

impl FileForum {
    pub fn new(threads: Vec<Thread>) -> Self {
        Self {
            pending: threads.into(),
            posted: Vec::new(),
        }
    }

    /// Load a JSON array of `{url, title, content}` objects.
    pub fn open(path: &Path) -> Result<Self, ForumError> {
        let text = fs::read_to_string(path)?;
        let threads: Vec<Thread> = serde_json::from_str(&text)?;
        info!("Loaded {} threads from {}", threads.len(), path.display());
        Ok(Self::new(threads))
    }

    /// `(url, comment)` pairs in posting order.
    pub fn posted(&self) -> &[(String, String)] {
        &self.posted
    }
}

impl Forum for FileForum {
    fn next_thread(&mut self) -> Result<Option<Thread>, ForumError> {
        Ok(self.pending.pop_front())
    }

    fn post_comment(&mut self, thread: &Thread, comment: &str) -> Result<(), ForumError> {
        println!("{}\n  {}", thread.url, comment);
        self.posted.push((thread.url.clone(), comment.to_string()));
        Ok(())
    }
}

/// How a posted comment was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentSource {
    Generated,
    Template,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostedComment {
    pub url: String,
    pub title: String,
    pub comment: String,
    pub source: CommentSource,
}

/// Outcome of [`Session::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionReport {
    pub posted: Vec<PostedComment>,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl SessionReport {
    pub fn count(&self, source: CommentSource) -> usize {
        self.posted.iter().filter(|p| p.source == source).count()
    }
}

pub struct Session<F: Forum> {
    forum: F,
    settings: SessionSettings,
    generator: Option<CommentGenerator>,
    template_options: TemplateOptions,
    answered: AnsweredThreads,
    pacing: Pacing,
}

impl<F: Forum> Session<F> {
    pub fn new(forum: F, settings: SessionSettings, answered: AnsweredThreads) -> Self {
        let pacing = settings.pacing();
        Self {
            forum,
            settings,
            generator: None,
            template_options: TemplateOptions::default(),
            answered,
            pacing,
        }
    }

    pub fn with_generator(mut self, generator: CommentGenerator) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_template_options(mut self, options: TemplateOptions) -> Self {
        self.template_options = options;
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn forum(&self) -> &F {
        &self.forum
    }

    pub fn answered(&self) -> &AnsweredThreads {
        &self.answered
    }

    /// Comment on threads until the limit, the end of the forum, or Ctrl+C.
    pub fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<SessionReport, ForumError> {
        let mut report = SessionReport::default();

        loop {
            if cancel::is_cancelled() {
                report.cancelled = true;
                break;
            }
            if self.limit_reached(&report) {
                break;
            }

            let Some(thread) = self.forum.next_thread()? else {
                info!("No more threads");
                break;
            };
            if self.answered.contains(&thread.url) {
                info!("Already commented, skipping: {}", preview(&thread.title, 50));
                report.skipped += 1;
                continue;
            }

            info!("Selected thread: {}", preview(&thread.title, 60));
            let (comment, source) = self.compose(&thread, rng);

            match self.forum.post_comment(&thread, &comment) {
                Ok(()) => {
                    self.answered.insert(&thread.url);
                    report.posted.push(PostedComment {
                        url: self.answered.canonicalize(&thread.url),
                        title: thread.title.clone(),
                        comment,
                        source,
                    });
                    info!(
                        "Comment posted ({})",
                        match self.settings.mode {
                            PostingMode::Limited(n) => format!("{}/{}", report.posted.len(), n),
                            PostingMode::Unlimited => report.posted.len().to_string(),
                        }
                    );
                }
                Err(e) => {
                    warn!("Posting failed: {}", e);
                    report.failed += 1;
                }
            }

            if self.limit_reached(&report) {
                break;
            }
            if !self.pacing.wait(rng) {
                report.cancelled = true;
                break;
            }
        }

        if report.cancelled {
            warn!("Session cancelled");
        }
        info!(
            "Session finished: {} posted, {} skipped, {} failed",
            report.posted.len(),
            report.skipped,
            report.failed
        );
        Ok(report)
    }

    fn limit_reached(&self, report: &SessionReport) -> bool {
        match self.settings.mode {
            PostingMode::Limited(n) => report.posted.len() >= n,
            PostingMode::Unlimited => false,
        }
    }

    fn compose<R: Rng + ?Sized>(&self, thread: &Thread, rng: &mut R) -> (String, CommentSource) {
        if self.settings.use_ai {
            if let Some(generator) = &self.generator {
                match generator.generate(&thread.title, &thread.content, rng) {
                    Ok(comment) => return (comment, CommentSource::Generated),
                    Err(e) => warn!("Generation failed, using a template: {}", e),
                }
            }
        }
        let comment = template_comment(&thread.title, &thread.content, self.template_options, rng);
        (comment, CommentSource::Template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::{MockLlmClient, ScriptedClient};
    use crate::llm::LlmError;
    use crate::test_utils::seeded_rng;
    use crate::text::is_complete;

    const BASE: &str = "https://forum.example";

    fn thread(url: &str, title: &str) -> Thread {
        Thread {
            url: url.to_string(),
            title: title.to_string(),
            content: "Собрал новую модель, поделюсь впечатлениями".to_string(),
        }
    }

    fn settings(mode: PostingMode, use_ai: bool) -> SessionSettings {
        SessionSettings {
            mode,
            use_ai,
            ..SessionSettings::default()
        }
    }

    /// Rejects posts to one URL.
    struct FlakyForum {
        inner: FileForum,
        reject: String,
    }

    impl Forum for FlakyForum {
        fn next_thread(&mut self) -> Result<Option<Thread>, ForumError> {
            self.inner.next_thread()
        }

        fn post_comment(&mut self, thread: &Thread, comment: &str) -> Result<(), ForumError> {
            if thread.url == self.reject {
                return Err(ForumError::Rejected("flood control".to_string()));
            }
            self.inner.post_comment(thread, comment)
        }
    }

    #[test]
    fn test_validate_defaults() {
        assert_eq!(SessionSettings::default().validate(&LlmConfig::new()), Ok(()));
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let llm = LlmConfig::new();
        let mut s = SessionSettings::default();
        s.pacing_min = Duration::from_secs(5);
        assert!(matches!(
            s.validate(&llm),
            Err(SettingsError::PacingBelowFloor { .. })
        ));

        let mut s = SessionSettings::default();
        s.pacing_min = Duration::from_secs(40);
        s.pacing_max = Duration::from_secs(20);
        assert_eq!(s.validate(&llm), Err(SettingsError::PacingInverted));

        let s = settings(PostingMode::Limited(0), true);
        assert_eq!(s.validate(&llm), Err(SettingsError::ZeroCount));

        let mut s = SessionSettings::default();
        s.credentials = Some(Credentials {
            login: "  ".to_string(),
            password: "secret".to_string(),
        });
        assert_eq!(s.validate(&llm), Err(SettingsError::EmptyCredentials));
    }

    #[test]
    fn test_validate_api_key_only_when_ai_is_used() {
        let llm = LlmConfig::new().with_provider(LlmProvider::OpenAi);
        assert_eq!(
            settings(PostingMode::Unlimited, true).validate(&llm),
            Err(SettingsError::MissingApiKey)
        );
        assert_eq!(settings(PostingMode::Unlimited, false).validate(&llm), Ok(()));
        let llm = llm.with_api_key("sk-test");
        assert_eq!(settings(PostingMode::Unlimited, true).validate(&llm), Ok(()));
    }

    #[test]
    fn test_pacing_delay_in_window() {
        let pacing = Pacing::new(Duration::from_secs(30), Duration::from_secs(60));
        let mut rng = seeded_rng();
        for _ in 0..50 {
            let delay = pacing.delay(&mut rng).as_secs();
            assert!((30..=60).contains(&delay));
        }
        assert_eq!(Pacing::none().delay(&mut rng), Duration::ZERO);
    }

    #[test]
    fn test_canonical_urls() {
        let answered = AnsweredThreads::new("https://forum.example/");
        assert_eq!(
            answered.canonicalize("/threads/motors.123/unread"),
            "https://forum.example/threads/motors.123"
        );
        assert_eq!(
            answered.canonicalize("https://forum.example/threads/motors.123/"),
            "https://forum.example/threads/motors.123"
        );
        assert_eq!(
            answered.canonicalize("threads/x.1"),
            "https://forum.example/threads/x.1"
        );
    }

    #[test]
    fn test_answered_threads_match_variants() {
        let mut answered = AnsweredThreads::new(BASE);
        assert!(answered.insert("/threads/a.1/unread"));
        assert!(!answered.insert("https://forum.example/threads/a.1/"));
        assert!(answered.contains("/threads/a.1"));
        assert_eq!(answered.len(), 1);
        answered.clear();
        assert!(answered.is_empty());
    }

    #[test]
    fn test_run_stops_at_limit() {
        let forum = FileForum::new(vec![
            thread("/threads/a.1", "Первая"),
            thread("/threads/b.2", "Вторая"),
            thread("/threads/c.3", "Третья"),
        ]);
        let mut session = Session::new(
            forum,
            settings(PostingMode::Limited(2), false),
            AnsweredThreads::new(BASE),
        )
        .with_pacing(Pacing::none());

        let report = session.run(&mut seeded_rng()).unwrap();
        assert_eq!(report.posted.len(), 2);
        assert_eq!(report.count(CommentSource::Template), 2);
        assert_eq!(session.forum().posted().len(), 2);
        assert_eq!(session.answered().len(), 2);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_run_skips_answered_threads() {
        let forum = FileForum::new(vec![
            thread("/threads/a.1/unread", "Первая"),
            thread("/threads/a.1", "Первая снова"),
            thread("/threads/b.2", "Вторая"),
        ]);
        let mut session = Session::new(
            forum,
            settings(PostingMode::Unlimited, false),
            AnsweredThreads::new(BASE),
        )
        .with_pacing(Pacing::none());

        let report = session.run(&mut seeded_rng()).unwrap();
        assert_eq!(report.posted.len(), 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.posted[0].url, "https://forum.example/threads/a.1");
    }

    #[test]
    fn test_run_uses_generator_when_ai_enabled() {
        let generator = CommentGenerator::new(
            Box::new(MockLlmClient::new("Да, у меня так же было недавно!")),
            "{title} {content}",
        )
        .with_backoff(Duration::ZERO, Duration::ZERO);
        let forum = FileForum::new(vec![thread("/threads/a.1", "Первая")]);
        let mut session = Session::new(
            forum,
            settings(PostingMode::Unlimited, true),
            AnsweredThreads::new(BASE),
        )
        .with_generator(generator)
        .with_pacing(Pacing::none());

        let report = session.run(&mut seeded_rng()).unwrap();
        assert_eq!(report.count(CommentSource::Generated), 1);
        assert!(is_complete(&report.posted[0].comment));
    }

    #[test]
    fn test_run_falls_back_to_template_on_provider_failure() {
        let generator = CommentGenerator::new(
            Box::new(ScriptedClient::new(vec![Err(LlmError::Unavailable(
                "offline".to_string(),
            ))])),
            "{title}",
        )
        .with_max_retries(1)
        .with_backoff(Duration::ZERO, Duration::ZERO);
        let forum = FileForum::new(vec![thread("/threads/a.1", "Первая")]);
        let mut session = Session::new(
            forum,
            settings(PostingMode::Unlimited, true),
            AnsweredThreads::new(BASE),
        )
        .with_generator(generator)
        .with_pacing(Pacing::none());

        let report = session.run(&mut seeded_rng()).unwrap();
        assert_eq!(report.count(CommentSource::Template), 1);
        assert!(!report.posted[0].comment.is_empty());
    }

    #[test]
    fn test_rejected_post_is_not_recorded() {
        let forum = FlakyForum {
            inner: FileForum::new(vec![
                thread("/threads/a.1", "Первая"),
                thread("/threads/b.2", "Вторая"),
            ]),
            reject: "/threads/a.1".to_string(),
        };
        let mut session = Session::new(
            forum,
            settings(PostingMode::Unlimited, false),
            AnsweredThreads::new(BASE),
        )
        .with_pacing(Pacing::none());

        let report = session.run(&mut seeded_rng()).unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.posted.len(), 1);
        assert!(!session.answered().contains("/threads/a.1"));
    }

    #[test]
    fn test_file_forum_loads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("threads.json");
        fs::write(
            &path,
            r#"[{"url": "/threads/a.1", "title": "Тема"}, {"url": "/threads/b.2", "title": "Ещё", "content": "текст"}]"#,
        )
        .unwrap();
        let mut forum = FileForum::open(&path).unwrap();
        assert_eq!(forum.next_thread().unwrap().unwrap().content, "");
        assert_eq!(forum.next_thread().unwrap().unwrap().content, "текст");
        assert!(forum.next_thread().unwrap().is_none());

        fs::write(&path, "not json").unwrap();
        assert!(matches!(FileForum::open(&path), Err(ForumError::Json(_))));
    }
}
