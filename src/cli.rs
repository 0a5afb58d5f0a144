use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::features::Feature;
use crate::llm::{LlmOverrides, LlmProvider};

/// Command line interface definition for ghost-commenter.
#[derive(Parser, Debug)]
#[command(name = "ghost-commenter")]
#[command(about = "Generate short casual forum comments and learn from operator ratings")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbosity: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,

    /// Seed for the random generator, for reproducible output
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Directory holding the evaluation log and summary
    #[arg(
        long,
        global = true,
        env = "GHOST_COMMENTER_DATA_DIR",
        default_value = "data"
    )]
    pub data_dir: PathBuf,

    /// Prompt file; created with defaults if missing
    #[arg(long, global = true, default_value = "config/prompts.txt")]
    pub prompts: PathBuf,

    /// Enable feature flags (comma-separated)
    #[arg(long, global = true, value_enum, value_delimiter = ',')]
    pub features: Option<Vec<Feature>>,

    #[command(flatten)]
    pub llm: LlmArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Provider options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct LlmArgs {
    /// Provider: free, openai or command
    #[arg(long, global = true)]
    pub provider: Option<LlmProvider>,

    /// Model for the primary attempts
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Model tried once after the primary attempts fail
    #[arg(long, global = true)]
    pub fallback_model: Option<String>,

    /// Endpoint of an OpenAI-compatible API
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// API key for the openai provider
    #[arg(long, global = true, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Command line for the command provider; `{model}` is substituted
    #[arg(long, global = true)]
    pub provider_command: Option<String>,

    /// Per-call timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Attempts with the primary model
    #[arg(long, global = true)]
    pub retries: Option<usize>,
}

impl LlmArgs {
    pub fn to_overrides(&self) -> LlmOverrides {
        LlmOverrides {
            provider: self.provider,
            model: self.model.clone(),
            fallback_model: self.fallback_model.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            command: self.provider_command.clone(),
            timeout: self.timeout.map(std::time::Duration::from_secs),
            max_retries: self.retries,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fit raw text to the comment length window
    Shape(ShapeArgs),
    /// Print canned fallback comments
    Template(TemplateArgs),
    /// Generate a comment for a thread
    Generate(GenerateArgs),
    /// Record an operator rating for a comment
    Rate(RateArgs),
    /// Show training statistics
    Stats(StatsArgs),
    /// Write the training summary report
    Export(ExportArgs),
    /// Delete all recorded ratings
    ClearTraining,
    /// Show or reset the prompt file
    Prompts(PromptsArgs),
    /// Comment on threads listed in a JSON file, printing instead of posting
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct LengthArgs {
    /// Minimum comment length in characters
    #[arg(long, default_value_t = crate::text::DEFAULT_MIN_LEN)]
    pub min_len: usize,

    /// Maximum comment length in characters
    #[arg(long, default_value_t = crate::text::DEFAULT_MAX_LEN)]
    pub max_len: usize,
}

#[derive(Args, Debug, Clone)]
pub struct ShapeArgs {
    /// Text to shape
    pub text: String,

    /// Run the normalizer first
    #[arg(long)]
    pub normalize: bool,

    #[command(flatten)]
    pub lengths: LengthArgs,
}

#[derive(Args, Debug, Clone)]
pub struct TemplateArgs {
    /// How many comments to print
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    #[command(flatten)]
    pub lengths: LengthArgs,
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Thread title
    #[arg(long)]
    pub title: String,

    /// Thread text
    #[arg(long, default_value = "")]
    pub content: String,

    /// Fail instead of printing a template when generation fails
    #[arg(long)]
    pub no_fallback: bool,

    #[command(flatten)]
    pub lengths: LengthArgs,
}

#[derive(Args, Debug, Clone)]
pub struct RateArgs {
    /// Comment being rated
    pub comment: String,

    /// Rating from 1 (bad) to 5 (great)
    #[arg(short, long)]
    pub rating: u8,

    /// Thread title the comment answered
    #[arg(long, default_value = "")]
    pub title: String,

    /// Thread text the comment answered
    #[arg(long, default_value = "")]
    pub content: String,

    /// Free-form operator notes
    #[arg(long, default_value = "")]
    pub feedback: String,
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// Print statistics and patterns as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Output file (default: <data-dir>/training_summary.txt)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PromptsArgs {
    /// Overwrite the prompt file with the built-in defaults
    #[arg(long)]
    pub reset: bool,

    /// Print the title and content prompts filled in for this topic
    #[arg(long)]
    pub topic: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// JSON array of {url, title, content} threads
    pub threads: PathBuf,

    /// Stop after this many comments (default: until the list runs out)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,

    /// Minimum delay between comments, in seconds
    #[arg(long, default_value_t = 30)]
    pub min_delay: u64,

    /// Maximum delay between comments, in seconds
    #[arg(long, default_value_t = 60)]
    pub max_delay: u64,

    /// Use templates only
    #[arg(long)]
    pub no_ai: bool,

    /// Site root used to resolve relative thread links
    #[arg(long, default_value = "https://enjoyrc.io")]
    pub forum_url: String,

    /// Forum login
    #[arg(long, env = "GHOST_COMMENTER_LOGIN", requires = "password")]
    pub login: Option<String>,

    /// Forum password
    #[arg(long, env = "GHOST_COMMENTER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}
