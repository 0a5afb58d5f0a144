//! Comment generation: provider calls with retry, then shaping.
//!
//! The generator never falls back to templates itself. On exhaustion it
//! returns `LlmError::Exhausted` and the caller decides what to post.

use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use rand::Rng;

use crate::cancel;
use crate::llm::{LlmClient, LlmConfig, LlmError, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT};
use crate::prompts::render_comment_prompt;
use crate::text::{is_complete, normalize, shape, ShapeLimits};
use crate::utils::{char_len, preview};

/// Responses this short are treated as provider failures.
const MIN_RESPONSE_CHARS: usize = 10;

const DEFAULT_BACKOFF_SECS: (f64, f64) = (2.0, 5.0);

pub struct CommentGenerator {
    client: Box<dyn LlmClient>,
    prompt_template: String,
    model: String,
    fallback_model: Option<String>,
    timeout: Duration,
    max_retries: usize,
    backoff_secs: (f64, f64),
    limits: ShapeLimits,
}

impl CommentGenerator {
    pub fn new(client: Box<dyn LlmClient>, prompt_template: impl Into<String>) -> Self {
        Self {
            client,
            prompt_template: prompt_template.into(),
            model: String::new(),
            fallback_model: None,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_secs: DEFAULT_BACKOFF_SECS,
            limits: ShapeLimits::default(),
        }
    }

    /// Build a generator for the configured provider.
    pub fn from_config(
        config: &LlmConfig,
        prompt_template: impl Into<String>,
    ) -> Result<Self, LlmError> {
        Ok(Self::new(config.create_client()?, prompt_template)
            .with_model(config.resolved_model())
            .with_fallback_model(config.resolved_fallback_model())
            .with_timeout(config.timeout)
            .with_max_retries(config.max_retries))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_fallback_model(mut self, model: Option<String>) -> Self {
        self.fallback_model = model;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Random delay range between attempts. A zero range disables sleeping.
    pub fn with_backoff(mut self, min: Duration, max: Duration) -> Self {
        let (min, max) = (min.as_secs_f64(), max.as_secs_f64());
        self.backoff_secs = (min.min(max), min.max(max));
        self
    }

    pub fn with_limits(mut self, limits: ShapeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Generate and shape a comment for a thread.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        title: &str,
        content: &str,
        rng: &mut R,
    ) -> Result<String, LlmError> {
        let prompt = render_comment_prompt(&self.prompt_template, title, content);
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            if cancel::is_cancelled() {
                debug!("Cancelled before attempt {}", attempt);
                break;
            }

            info!("Generating comment (attempt {}/{})...", attempt, self.max_retries);
            match self.call(&prompt, &self.model) {
                Ok(raw) => return Ok(self.finish(&raw, rng)),
                Err(e) => {
                    warn!("Attempt {} failed: {}", attempt, e);
                    last_error = Some(e);
                }
            }

            if attempt < self.max_retries {
                self.backoff(rng);
            }
        }

        if let Some(ref fallback) = self.fallback_model {
            if !cancel::is_cancelled() {
                info!("Trying fallback model {}...", fallback);
                match self.call(&prompt, fallback) {
                    Ok(raw) => return Ok(self.finish(&raw, rng)),
                    Err(e) => {
                        warn!("Fallback model failed: {}", e);
                        last_error = Some(e);
                    }
                }
            }
        }

        warn!("All generation attempts exhausted");
        Err(LlmError::Exhausted {
            attempts: self.max_retries,
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "cancelled".to_string()),
        })
    }

    fn call(&self, prompt: &str, model: &str) -> Result<String, LlmError> {
        let raw = self.client.complete(prompt, self.timeout, model)?;
        let raw = raw.trim();
        if char_len(raw) <= MIN_RESPONSE_CHARS {
            return Err(LlmError::Provider(format!(
                "empty or short response: {:?}",
                raw
            )));
        }
        Ok(raw.to_string())
    }

    fn finish<R: Rng + ?Sized>(&self, raw: &str, rng: &mut R) -> String {
        let normalized = normalize(raw, rng);
        let comment = shape(&normalized, self.limits, rng);
        if is_complete(&comment) {
            info!(
                "Generated comment ({} chars): {}",
                char_len(&comment),
                preview(&comment, 50)
            );
        } else {
            warn!("Comment may be incomplete: {}", comment);
        }
        comment
    }

    fn backoff<R: Rng + ?Sized>(&self, rng: &mut R) {
        let (min, max) = self.backoff_secs;
        if max <= 0.0 {
            return;
        }
        let secs = if max > min { rng.gen_range(min..max) } else { max };
        info!("Retrying in {:.1} seconds...", secs);
        thread::sleep(Duration::from_secs_f64(secs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::{MockLlmClient, ScriptedClient};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    const TEMPLATE: &str = "Тема: {title}\nТекст: {content}";

    /// Shares a scripted client between the generator and the test body.
    struct Shared(Arc<ScriptedClient>);

    impl LlmClient for Shared {
        fn complete(&self, prompt: &str, timeout: Duration, model: &str) -> Result<String, LlmError> {
            self.0.complete(prompt, timeout, model)
        }
    }

    fn generator(client: Arc<ScriptedClient>) -> CommentGenerator {
        CommentGenerator::new(Box::new(Shared(client)), TEMPLATE)
            .with_model("primary")
            .with_backoff(Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_success_is_normalized_and_shaped() {
        let client = MockLlmClient::new("Да, согласен! Тема реально полезная.");
        let generator = CommentGenerator::new(Box::new(client), TEMPLATE)
            .with_backoff(Duration::ZERO, Duration::ZERO);
        let mut rng = StdRng::seed_from_u64(1);
        let comment = generator.generate("title", "content", &mut rng).unwrap();
        assert!(!comment.contains(['!', ',', '.']));
        assert!(is_complete(&comment));
        assert!(char_len(&comment) >= 20);
    }

    #[test]
    fn test_retries_then_succeeds() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(LlmError::Timeout(Duration::from_secs(45))),
            Ok("short".to_string()),
            Ok("ну да у меня так же было недавно".to_string()),
        ]));
        let mut rng = StdRng::seed_from_u64(2);
        let comment = generator(client.clone())
            .generate("t", "c", &mut rng)
            .unwrap();
        assert!(is_complete(&comment));
        assert_eq!(client.models(), vec!["primary", "primary", "primary"]);
    }

    #[test]
    fn test_fallback_model_after_exhaustion() {
        let client = Arc::new(ScriptedClient::new(vec![
            Err(LlmError::Provider("boom".to_string())),
            Err(LlmError::Provider("boom".to_string())),
            Err(LlmError::Provider("boom".to_string())),
            Ok("вобще годная тема надо попробовать".to_string()),
        ]));
        let generator = generator(client.clone()).with_fallback_model(Some("backup".to_string()));
        let mut rng = StdRng::seed_from_u64(3);
        assert!(generator.generate("t", "c", &mut rng).is_ok());
        assert_eq!(
            client.models(),
            vec!["primary", "primary", "primary", "backup"]
        );
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let generator = generator(client.clone()).with_max_retries(2);
        let mut rng = StdRng::seed_from_u64(4);
        match generator.generate("t", "c", &mut rng) {
            Err(LlmError::Exhausted { attempts, last }) => {
                assert_eq!(attempts, 2);
                assert!(last.contains("script exhausted"));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(client.models().len(), 2);
    }

    #[test]
    fn test_prompt_contains_title_and_excerpt() {
        let client = Arc::new(ScriptedClient::new(vec![Ok(
            "согласен с этим полностью кстати".to_string()
        )]));
        let content = "x".repeat(5000);
        let mut rng = StdRng::seed_from_u64(5);
        generator(client.clone())
            .generate("Моя тема", &content, &mut rng)
            .unwrap();
        let calls = client.calls.lock().unwrap();
        let prompt = &calls[0].0;
        assert!(prompt.contains("Тема: Моя тема"));
        assert_eq!(prompt.matches('x').count(), 1000);
    }
}
