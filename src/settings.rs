use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::fetch::FetcherKind;
use crate::store::ConsistencyWait;

pub const DEFAULT_DB_PATH: &str = "data/jobs.sqlite";
pub const DEFAULT_WRITE_DELAY_SECS: u64 = 30;
const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db_path: PathBuf,
    /// Seconds to wait after a batch is written before re-reading the listings tab.
    pub write_delay_secs: u64,
    pub fetcher: FetcherKind,
    pub user_agent: String,
}

impl Settings {
    /// Defaults, then `ingest.toml` if present, then `INGEST_*` env vars.
    pub fn load() -> Result<Self> {
        Self::from_builder(
            Config::builder()
                .add_source(File::with_name("ingest").required(false))
                .add_source(Environment::with_prefix("INGEST")),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        builder
            .set_default("db_path", DEFAULT_DB_PATH)?
            .set_default("write_delay_secs", DEFAULT_WRITE_DELAY_SECS as i64)?
            .set_default("fetcher", "http")?
            .set_default("user_agent", DEFAULT_USER_AGENT)?
            .build()?
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn consistency_wait(&self) -> ConsistencyWait {
        if self.write_delay_secs == 0 {
            ConsistencyWait::None
        } else {
            ConsistencyWait::Fixed(Duration::from_secs(self.write_delay_secs))
        }
    }
}
