use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "http://jpdic.naver.com/search_word.nhn";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub endpoint: String,
    pub cache_dir: PathBuf,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Settings {
    /// Defaults, overridden by `JPDIC_*` environment variables
    /// (`JPDIC_ENDPOINT`, `JPDIC_CACHE_DIR`, `JPDIC_TIMEOUT_SECS`, `JPDIC_USER_AGENT`).
    pub fn load() -> Result<Self> {
        let default_cache = std::env::temp_dir().join("naver");
        Config::builder()
            .set_default("endpoint", DEFAULT_ENDPOINT)?
            .set_default("cache_dir", default_cache.to_string_lossy().into_owned())?
            .set_default("timeout_secs", 30_i64)?
            .set_default(
                "user_agent",
                concat!("jpdic_scraper/", env!("CARGO_PKG_VERSION")),
            )?
            .add_source(Environment::with_prefix("JPDIC"))
            .build()
            .and_then(|c| c.try_deserialize())
            .context("Failed to load settings")
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
