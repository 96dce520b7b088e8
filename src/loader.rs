//! Reading definition documents.
//!
//! A definition document is the JSON form of a validator, in the same
//! vocabulary `describe` produces (`type`, `properties`, `items`,
//! `$defs`/`$ref`, ...). This module only fetches and parses it;
//! `from_definition` turns the parsed value into a validator.

use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::LoadError;

#[cfg(feature = "remote")]
use std::time::Duration;

#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Read and parse the definition document at `path`.
///
/// # Errors
///
/// `LoadError::FileNotFound` for a missing file, `LoadError::ReadError`
/// for other I/O failures and `LoadError::InvalidJson` when the document
/// does not parse.
pub fn load_definition(path: &Path) -> Result<Value, LoadError> {
    debug!(path = %path.display(), "loading definition");
    let content = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => LoadError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => LoadError::ReadError {
            path: path.to_path_buf(),
            source,
        },
    })?;
    load_definition_str(&content)
}

/// Parse a definition document held in memory.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if `content` does not parse.
pub fn load_definition_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Fetch a definition document over HTTP(S), with a 10 second timeout.
///
/// Non-success statuses are errors.
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails, the server
/// answers with an error status, or the body does not parse.
#[cfg(feature = "remote")]
pub fn load_definition_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };
    debug!(%url, "fetching definition");

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.json())
        .map_err(network)
}

/// Whether a definition source names an `http://` or `https://` location.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Load a definition document from a URL or a file path.
///
/// Without the `remote` feature a URL source is reported as a missing
/// file.
///
/// # Errors
///
/// Whatever [`load_definition_url`] or [`load_definition`] returns.
pub fn load_definition_auto(source: &str) -> Result<Value, LoadError> {
    if !is_url(source) {
        return load_definition(Path::new(source));
    }
    #[cfg(feature = "remote")]
    {
        load_definition_url(source)
    }
    #[cfg(not(feature = "remote"))]
    {
        Err(LoadError::FileNotFound {
            path: std::path::PathBuf::from(source),
        })
    }
}
