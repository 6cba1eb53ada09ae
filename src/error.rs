use std::path::PathBuf;

use thiserror::Error;

/// Failures while obtaining the raw search page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("word not found: {0}")]
    WordNotFound(String),

    #[error("failed to fetch page for {keyword:?}")]
    Network {
        keyword: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("page cache i/o failed at {path:?}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal extraction failures. Any of these means the page layout drifted
/// past what the repair rules cover.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("entry listing has no closing </dl>")]
    UnterminatedListing,

    #[error("repaired fragment is not well-formed: {0}")]
    Markup(String),

    #[error("unexpected entry structure: {0}")]
    Structure(String),
}

/// A meaning whose bullet is not a number (e.g. `『사람』`). Skipped, never fatal.
#[derive(Debug, Error)]
#[error("meaning bullet is not an ordinal: {0:?}")]
pub struct MalformedOrdinal(pub String);
