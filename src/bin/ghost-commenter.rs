use clap::Parser;
use log::LevelFilter;

use ghost_commenter::app::App;
use ghost_commenter::cli::Cli;
use ghost_commenter::features::{Feature, Features};
use ghost_commenter::llm::LlmConfig;

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity flags
    let log_level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbosity {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_target(false)
        .format_timestamp(None)
        .init();

    // Initialize feature flags from environment, then apply CLI overrides
    let features = Features::from_env().with_overrides(cli.features.as_deref());
    let enabled: Vec<Feature> = features.enabled_features().collect();
    if !enabled.is_empty() {
        log::debug!("Enabled features: {:?}", enabled);
    }
    Features::init_global(features);

    // Build provider config from environment, then apply CLI overrides
    let llm_config = LlmConfig::from_env().with_overrides(cli.llm.to_overrides());

    let mut app = App::new(cli.data_dir, cli.prompts, llm_config, cli.seed);
    if let Err(err) = app.run(cli.command) {
        log::error!("{}", err);
        std::process::exit(1);
    }
}
