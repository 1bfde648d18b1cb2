use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = "hero_sync.toml";
const ENV_PREFIX: &str = "HERO_SYNC";

/// Run configuration. Passed to the pipeline at construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub listing_path: String,
    /// Path segment that marks a hero link on the listing, e.g. `/hero/{slug}`.
    pub entity_segment: String,
    pub wiki_base_url: String,
    pub asset_path: String,
    pub asset_extensions: Vec<String>,
    pub min_asset_bytes: u64,
    pub docs_dir: PathBuf,
    pub images_dir: PathBuf,
    pub image_url_prefix: String,
    pub aggregate_path: PathBuf,
    pub guides_path: String,
    /// Root for the guide pages (`mechanics/`, `meta/`).
    pub guides_dir: PathBuf,
    pub delay_ms: u64,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_url: "https://topheroes.info".into(),
            listing_path: "/hero.php".into(),
            entity_segment: "hero".into(),
            wiki_base_url: "https://topheroes1.fandom.com/wiki/".into(),
            asset_path: "/assets/heroes".into(),
            asset_extensions: vec!["webp".into(), "png".into(), "jpg".into()],
            min_asset_bytes: 1000,
            docs_dir: PathBuf::from("rag-content/heroes"),
            images_dir: PathBuf::from("public/img/heroes"),
            image_url_prefix: "/img/heroes".into(),
            aggregate_path: PathBuf::from("src/data/heroes.json"),
            guides_path: "/hero-guide.php".into(),
            guides_dir: PathBuf::from("rag-content"),
            delay_ms: 400,
            concurrency: 4,
            timeout_secs: 20,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.114 Safari/537.36"
                .into(),
        }
    }
}

impl Settings {
    /// Defaults, then the TOML file (explicit path or `hero_sync.toml` if present),
    /// then `HERO_SYNC_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };
        let settings = Config::builder()
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to load configuration")?
            .try_deserialize::<Settings>()
            .context("Invalid configuration")?;
        Ok(settings)
    }

    pub fn listing_url(&self) -> String {
        join_url(&self.base_url, &self.listing_path)
    }

    pub fn guides_url(&self) -> String {
        join_url(&self.base_url, &self.guides_path)
    }

    pub fn asset_base_url(&self) -> String {
        join_url(&self.base_url, &self.asset_path)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Join a base URL and a path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
