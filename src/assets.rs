use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::fetch::Fetcher;
use crate::settings::Settings;
use crate::store::{file_size, write_atomic};

const PLACEHOLDER_FILE: &str = "placeholder.png";

/// Public reference used when no portrait can be resolved.
pub fn placeholder_reference(url_prefix: &str) -> String {
    format!("{}/{}", url_prefix.trim_end_matches('/'), PLACEHOLDER_FILE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSource {
    Cached,
    Fetched,
    Placeholder,
}

/// Outcome of resolving one entity's portrait.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetRecord {
    /// `{slug}.{ext}` once a valid file exists locally.
    pub canonical_filename: Option<String>,
    pub local_path: Option<PathBuf>,
    /// Public reference stored on the entity.
    pub reference: String,
    /// `(name, extension)` pairs fetched this run, in order.
    pub candidates_tried: Vec<(String, String)>,
    pub source: AssetSource,
}

/// Resolves portraits against the local cache first, then the asset endpoint.
pub struct AssetResolver<F> {
    fetcher: Arc<F>,
    base_url: String,
    dir: PathBuf,
    url_prefix: String,
    extensions: Vec<String>,
    min_bytes: u64,
}

impl<F: Fetcher> AssetResolver<F> {
    pub fn new(fetcher: Arc<F>, settings: &Settings) -> Self {
        AssetResolver {
            fetcher,
            base_url: settings.asset_base_url(),
            dir: settings.images_dir.clone(),
            url_prefix: settings.image_url_prefix.trim_end_matches('/').to_string(),
            extensions: settings.asset_extensions.clone(),
            min_bytes: settings.min_asset_bytes,
        }
    }

    pub fn placeholder(&self) -> String {
        placeholder_reference(&self.url_prefix)
    }

    pub async fn resolve(&self, game_id: &str, slug: &str) -> AssetRecord {
        if let Some(record) = self.cached(slug) {
            debug!(slug, file = ?record.canonical_filename, "asset cached");
            return record;
        }

        let mut tried = Vec::new();
        for name in candidate_names(game_id, slug) {
            for ext in &self.extensions {
                tried.push((name.clone(), ext.clone()));
                let url = format!("{}/{}.{}", self.base_url, name, ext);
                let bytes = match self.fetcher.fetch_bytes(&url).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        debug!(slug, error = %e, "asset candidate failed");
                        continue;
                    }
                };
                if (bytes.len() as u64) <= self.min_bytes {
                    debug!(slug, url = %url, size = bytes.len(), "asset too small");
                    continue;
                }

                let filename = format!("{}.{}", slug, ext);
                let path = self.dir.join(&filename);
                if let Err(e) = write_atomic(&path, &bytes) {
                    warn!(slug, path = ?path, error = %e, "cannot persist asset");
                    return self.fallback(tried);
                }
                return AssetRecord {
                    reference: format!("{}/{}", self.url_prefix, filename),
                    canonical_filename: Some(filename),
                    local_path: Some(path),
                    candidates_tried: tried,
                    source: AssetSource::Fetched,
                };
            }
        }

        self.fallback(tried)
    }

    /// First `{slug}.{ext}` already on disk and larger than the size floor.
    fn cached(&self, slug: &str) -> Option<AssetRecord> {
        self.extensions.iter().find_map(|ext| {
            let filename = format!("{}.{}", slug, ext);
            let path = self.dir.join(&filename);
            let size = file_size(&path)?;
            (size > self.min_bytes).then(|| AssetRecord {
                reference: format!("{}/{}", self.url_prefix, filename),
                canonical_filename: Some(filename),
                local_path: Some(path),
                candidates_tried: Vec::new(),
                source: AssetSource::Cached,
            })
        })
    }

    fn fallback(&self, tried: Vec<(String, String)>) -> AssetRecord {
        AssetRecord {
            canonical_filename: None,
            local_path: None,
            reference: self.placeholder(),
            candidates_tried: tried,
            source: AssetSource::Placeholder,
        }
    }
}

/// Remote names to try, in order: game id, slug, then both without dashes.
pub fn candidate_names(game_id: &str, slug: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in [
        game_id.to_string(),
        slug.to_string(),
        game_id.replace('-', ""),
        slug.replace('-', ""),
    ] {
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}
