use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::browser::BrowserConfig;
use crate::capture::CaptureConfig;
use crate::session::SessionConfig;

/// Environment variable prefix, e.g. `MEET_GUEST__CAPTURE__FRAMERATE=30`
pub const ENV_PREFIX: &str = "MEET_GUEST";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub session: SessionConfig,
    pub capture: CaptureConfig,
}

impl Config {
    /// Defaults, then the optional file, then `MEET_GUEST__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to load configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}
