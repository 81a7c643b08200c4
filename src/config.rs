use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SpreedlyError};

pub const CONFIG_FILE: &str = "spreedly.toml";
pub const ENV_PREFIX: &str = "SPREEDLY_";

/// Site settings the application would hand to the real client. The mock
/// only stores them so they can be read back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    pub site_name: Option<String>,
    pub api_token: Option<String>,
}

impl MockConfig {
    pub fn new(site_name: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            site_name: Some(site_name.into()),
            api_token: Some(api_token.into()),
        }
    }

    /// Reads `spreedly.toml` from the working directory, then `SPREEDLY_*`
    /// variables (a `.env` file is loaded first if present).
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_figment(Self::figment(CONFIG_FILE))
    }

    pub fn figment(path: impl AsRef<Path>) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        figment
            .extract()
            .map_err(|e| SpreedlyError::Config(e.to_string()))
    }
}
