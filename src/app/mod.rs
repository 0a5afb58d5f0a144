use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::cancel;
use crate::cli::{
    Command, ExportArgs, GenerateArgs, LengthArgs, PromptsArgs, RateArgs, RunArgs, ShapeArgs,
    StatsArgs, TemplateArgs,
};
use crate::features::Feature;
use crate::generate::CommentGenerator;
use crate::llm::{LlmConfig, LlmError};
use crate::prompts::{PromptError, PromptSet};
use crate::session::{
    AnsweredThreads, CommentSource, Credentials, FileForum, ForumError, PostingMode, Session,
    SessionSettings, SettingsError,
};
use crate::text::{normalize, shape, template_comment, ShapeLimits, TemplateOptions};
use crate::training::{
    FileEvaluationLog, PatternAnalysis, TrainingError, TrainingStatistics, TrainingStore,
};
use crate::utils::char_len;

pub const TRAINING_FILE: &str = "training_data.json";
pub const SUMMARY_FILE: &str = "training_summary.txt";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Training(#[from] TrainingError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Forum(#[from] ForumError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    User(String),
}

#[derive(Serialize)]
struct StatsReport<'a> {
    statistics: &'a TrainingStatistics,
    patterns: Option<&'a PatternAnalysis>,
}

pub struct App {
    data_dir: PathBuf,
    prompts_path: PathBuf,
    llm_config: LlmConfig,
    rng: StdRng,
}

impl App {
    /// Without a seed the generator is seeded from the OS.
    pub fn new(
        data_dir: PathBuf,
        prompts_path: PathBuf,
        llm_config: LlmConfig,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            data_dir,
            prompts_path,
            llm_config,
            rng,
        }
    }

    pub fn training_path(&self) -> PathBuf {
        training_file_in(&self.data_dir)
    }

    pub fn run(&mut self, command: Command) -> Result<(), AppError> {
        match command {
            Command::Shape(args) => self.handle_shape(args),
            Command::Template(args) => self.handle_template(args),
            Command::Generate(args) => self.handle_generate(args),
            Command::Rate(args) => self.handle_rate(args),
            Command::Stats(args) => self.handle_stats(args),
            Command::Export(args) => self.handle_export(args),
            Command::ClearTraining => self.handle_clear(),
            Command::Prompts(args) => self.handle_prompts(args),
            Command::Run(args) => self.handle_run(args),
        }
    }

    fn handle_shape(&mut self, args: ShapeArgs) -> Result<(), AppError> {
        let limits = limits_from(&args.lengths)?;
        let text = if args.normalize {
            normalize(&args.text, &mut self.rng)
        } else {
            args.text
        };
        let comment = shape(&text, limits, &mut self.rng);
        info!("Shaped to {} characters", char_len(&comment));
        println!("{}", comment);
        Ok(())
    }

    fn handle_template(&mut self, args: TemplateArgs) -> Result<(), AppError> {
        let options = template_options(limits_from(&args.lengths)?);
        for _ in 0..args.count {
            println!("{}", template_comment("", "", options, &mut self.rng));
        }
        Ok(())
    }

    fn handle_generate(&mut self, args: GenerateArgs) -> Result<(), AppError> {
        let limits = limits_from(&args.lengths)?;
        let outcome = self
            .build_generator(limits)
            .and_then(|generator| generator.generate(&args.title, &args.content, &mut self.rng));

        let comment = match outcome {
            Ok(comment) => comment,
            Err(e) if args.no_fallback => return Err(e.into()),
            Err(e) => {
                warn!("Generation failed, using a template: {}", e);
                template_comment(
                    &args.title,
                    &args.content,
                    template_options(limits),
                    &mut self.rng,
                )
            }
        };
        println!("{}", comment);
        Ok(())
    }

    fn handle_rate(&mut self, args: RateArgs) -> Result<(), AppError> {
        let mut store = self.open_store();
        store.record(
            &args.title,
            &args.content,
            &args.comment,
            args.rating,
            &args.feedback,
        )?;
        info!(
            "Saved rating {} ({} evaluations total)",
            args.rating,
            store.evaluations().len()
        );
        Ok(())
    }

    fn handle_stats(&mut self, args: StatsArgs) -> Result<(), AppError> {
        let store = self.open_store();
        let statistics = store.statistics();
        let patterns = store.analyze_patterns();

        if args.json {
            let report = StatsReport {
                statistics: &statistics,
                patterns: patterns.as_ref(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        if statistics.total_evaluations == 0 {
            println!("No evaluations recorded yet.");
            return Ok(());
        }

        println!("Total evaluations: {}", statistics.total_evaluations);
        println!("Average rating: {:.2}/5", statistics.average_rating);
        println!("Average length: {:.1} characters", statistics.average_length);
        println!("Rating distribution:");
        for rating in (1..=5).rev() {
            let count = statistics.count_for(rating);
            println!("  {} stars: {:3} {}", rating, count, "#".repeat(count));
        }
        match patterns {
            Some(patterns) => {
                println!("Optimal length: {:.0} characters", patterns.optimal_length);
                println!("Preferred words: {}", patterns.preferred_words.join(", "));
                if !patterns.avoid_words.is_empty() {
                    println!("Avoid words: {}", patterns.avoid_words.join(", "));
                }
            }
            None => println!("No high-rated comments yet, no patterns to show."),
        }
        Ok(())
    }

    fn handle_export(&mut self, args: ExportArgs) -> Result<(), AppError> {
        let path = args
            .output
            .unwrap_or_else(|| self.data_dir.join(SUMMARY_FILE));
        self.open_store().export_summary(&path)?;
        info!("Summary written to {}", path.display());
        Ok(())
    }

    fn handle_clear(&mut self) -> Result<(), AppError> {
        let mut store = self.open_store();
        let removed = store.evaluations().len();
        store.clear()?;
        info!("Removed {} evaluations", removed);
        Ok(())
    }

    fn handle_prompts(&mut self, args: PromptsArgs) -> Result<(), AppError> {
        let prompts = if args.reset {
            let defaults = PromptSet::default_prompts();
            defaults.save(&self.prompts_path)?;
            info!("Reset {} to defaults", self.prompts_path.display());
            defaults
        } else {
            PromptSet::load_or_create(&self.prompts_path)?
        };
        info!("Prompt file: {}", self.prompts_path.display());
        match args.topic {
            Some(topic) => {
                let (title, content) = prompts.for_topic(&topic);
                println!("{}\n\n{}", title, content);
            }
            None => print!("{}", prompts.render()),
        }
        Ok(())
    }

    fn handle_run(&mut self, args: RunArgs) -> Result<(), AppError> {
        let settings = SessionSettings {
            credentials: match (args.login, args.password) {
                (Some(login), Some(password)) => Some(Credentials { login, password }),
                _ => None,
            },
            pacing_min: Duration::from_secs(args.min_delay),
            pacing_max: Duration::from_secs(args.max_delay),
            mode: args
                .count
                .map(PostingMode::Limited)
                .unwrap_or(PostingMode::Unlimited),
            use_ai: !args.no_ai,
        };
        settings.validate(&self.llm_config)?;

        let forum = FileForum::open(&args.threads)?;
        let limits = ShapeLimits::default();
        let mut session = Session::new(forum, settings, AnsweredThreads::new(args.forum_url))
            .with_template_options(template_options(limits));
        if !args.no_ai {
            match self.build_generator(limits) {
                Ok(generator) => session = session.with_generator(generator),
                Err(e) => warn!("Provider not available, posting templates only: {}", e),
            }
        }

        cancel::reset();
        cancel::register_handler();

        let report = session.run(&mut self.rng)?;
        info!(
            "{} generated, {} from templates",
            report.count(CommentSource::Generated),
            report.count(CommentSource::Template)
        );
        if report.cancelled {
            return Err(AppError::User("Cancelled by user".to_string()));
        }
        Ok(())
    }

    fn open_store(&self) -> TrainingStore<FileEvaluationLog> {
        TrainingStore::open_file(self.training_path())
    }

    /// Comment prompt from the prompt file, with learned patterns appended
    /// when guided prompts are enabled.
    fn comment_prompt(&self) -> Result<String, AppError> {
        let prompts = PromptSet::load_or_create(&self.prompts_path)?;
        if prompts.comment.is_empty() {
            return Err(AppError::User(format!(
                "{} has no [COMMENT_PROMPT] section",
                self.prompts_path.display()
            )));
        }
        if Feature::GuidedPrompts.is_enabled() {
            return Ok(self.open_store().build_guided_prompt(&prompts.comment));
        }
        Ok(prompts.comment)
    }

    fn build_generator(&self, limits: ShapeLimits) -> Result<CommentGenerator, LlmError> {
        let prompt = self
            .comment_prompt()
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;
        Ok(CommentGenerator::from_config(&self.llm_config, prompt)?.with_limits(limits))
    }
}

fn limits_from(args: &LengthArgs) -> Result<ShapeLimits, AppError> {
    ShapeLimits::new(args.min_len, args.max_len).map_err(AppError::User)
}

fn template_options(limits: ShapeLimits) -> TemplateOptions {
    TemplateOptions {
        limits,
        typos: !Feature::PlainTemplates.is_enabled(),
    }
}

/// Path of the evaluation log inside a data directory.
pub fn training_file_in(data_dir: &Path) -> PathBuf {
    data_dir.join(TRAINING_FILE)
}
