//! Feature flags for optional generation behaviour.
//!
//! Features can be enabled via:
//! - CLI: `--features guided-prompts,plain-templates`
//! - Environment: `GHOST_COMMENTER_FEATURES=guided-prompts`

use std::collections::HashSet;
use std::env;
use std::sync::OnceLock;

use clap::ValueEnum;
use log::warn;
use serde::{Deserialize, Serialize};

const FEATURES_VAR: &str = "GHOST_COMMENTER_FEATURES";

/// Available feature flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    /// Append patterns learned from operator ratings to the comment prompt.
    GuidedPrompts,
    /// Post template comments exactly as written, without typo injection.
    PlainTemplates,
}

impl Feature {
    /// Check if this feature is enabled in the global config.
    pub fn is_enabled(&self) -> bool {
        Features::global().is_enabled(*self)
    }
}

/// Collection of enabled features.
#[derive(Debug, Clone, Default)]
pub struct Features {
    enabled: HashSet<Feature>,
}

static GLOBAL_FEATURES: OnceLock<Features> = OnceLock::new();

impl Features {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `GHOST_COMMENTER_FEATURES`. Unknown names are logged and skipped.
    pub fn from_env() -> Self {
        match env::var(FEATURES_VAR) {
            Ok(value) => Self::parse_list(&value),
            Err(_) => Self::new(),
        }
    }

    /// Parse a comma-separated list of feature names.
    pub fn parse_list(value: &str) -> Self {
        let mut features = Self::new();
        for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match Feature::from_str(name, true) {
                Ok(feature) => features.enable(feature),
                Err(_) => warn!("Unknown feature '{}' in {}", name, FEATURES_VAR),
            }
        }
        features
    }

    pub fn enable(&mut self, feature: Feature) {
        self.enabled.insert(feature);
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.enabled.contains(&feature)
    }

    /// Merge with CLI overrides.
    pub fn with_overrides(mut self, cli_features: Option<&[Feature]>) -> Self {
        for feature in cli_features.unwrap_or_default() {
            self.enable(*feature);
        }
        self
    }

    /// Get the global feature configuration.
    pub fn global() -> &'static Features {
        GLOBAL_FEATURES.get_or_init(Features::from_env)
    }

    /// Initialize the global feature configuration.
    /// Should be called once at startup with CLI overrides.
    pub fn init_global(features: Features) {
        let _ = GLOBAL_FEATURES.set(features);
    }

    pub fn enabled_features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.enabled.iter().copied()
    }
}
