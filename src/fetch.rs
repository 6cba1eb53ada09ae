use std::fs;
use std::path::{Path, PathBuf};

use indicatif::ProgressBar;
use reqwest::blocking::Client;
use tracing::{debug, info};

use crate::config::Settings;
use crate::error::FetchError;

/// Printed by the site when the search has no hits.
pub const NOT_FOUND_MARKER: &str = "검색결과가 없습니다.";

/// Flat directory of raw pages, one file per keyword. No expiry.
pub struct PageCache {
    dir: PathBuf,
}

impl PageCache {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, FetchError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| FetchError::Cache {
            path: dir.clone(),
            source,
        })?;
        Ok(PageCache { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The keyword is used verbatim as the file name.
    fn path_for(&self, keyword: &str) -> PathBuf {
        self.dir.join(keyword)
    }

    pub fn load(&self, keyword: &str) -> Result<Option<String>, FetchError> {
        let path = self.path_for(keyword);
        if !path.is_file() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|source| FetchError::Cache { path, source })
    }

    pub fn store(&self, keyword: &str, page: &str) -> Result<(), FetchError> {
        let path = self.path_for(keyword);
        fs::write(&path, page).map_err(|source| FetchError::Cache { path, source })
    }
}

pub struct Fetcher {
    client: Client,
    endpoint: String,
    cache: Option<PageCache>,
}

impl Fetcher {
    pub fn new(settings: &Settings, cache: Option<PageCache>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(FetchError::Client)?;
        Ok(Fetcher {
            client,
            endpoint: settings.endpoint.clone(),
            cache,
        })
    }

    /// Returns the search page for `keyword`, from the cache when present.
    /// Fails with `WordNotFound` if the page reports no results.
    pub fn fetch(&self, keyword: &str) -> Result<String, FetchError> {
        let page = match self.cache.as_ref().map(|c| c.load(keyword)).transpose()? {
            Some(Some(page)) => {
                info!(keyword, "cache hit");
                page
            }
            _ => {
                let page = self.download(keyword)?;
                if let Some(cache) = &self.cache {
                    cache.store(keyword, &page)?;
                    debug!(keyword, dir = ?cache.dir(), "cached page");
                }
                page
            }
        };

        check_found(keyword, &page)?;
        Ok(page)
    }

    fn download(&self, keyword: &str) -> Result<String, FetchError> {
        let network = |source| FetchError::Network {
            keyword: keyword.to_string(),
            source,
        };

        let spinner = ProgressBar::new_spinner();
        spinner.set_message(format!("Fetching {}", keyword));
        spinner.enable_steady_tick(std::time::Duration::from_millis(100));

        let result = self
            .client
            .get(&self.endpoint)
            .query(&[("query", keyword)])
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.bytes());
        spinner.finish_and_clear();

        let bytes = result.map_err(network)?;
        info!(keyword, bytes = bytes.len(), "fetched page");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub fn check_found(keyword: &str, page: &str) -> Result<(), FetchError> {
    if page.contains(NOT_FOUND_MARKER) {
        return Err(FetchError::WordNotFound(keyword.to_string()));
    }
    Ok(())
}
