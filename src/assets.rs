// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Fetching pad audio files by location.
//!
//! A location is the asset base path joined with a key's file name. Base
//! paths starting with `http://` or `https://` are fetched over HTTP,
//! everything else is read from disk.

use std::future::Future;

mod file;
mod http;

pub use file::FileFetcher;
pub use http::HttpFetcher;

/// Errors produced while fetching an asset.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("asset {location} not found")]
    NotFound { location: String },

    #[error("error reading {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("error fetching {location}: HTTP status {status}")]
    Status { location: String, status: u16 },

    #[error("error fetching {location}: {source}")]
    Http {
        location: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Something that can fetch the raw bytes of an asset.
pub trait AssetFetcher: Send + Sync + 'static {
    /// Fetches the complete asset at `location`.
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send;
}

impl<F: AssetFetcher> AssetFetcher for std::sync::Arc<F> {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send {
        F::fetch(self, location)
    }
}

/// The fetcher chosen for a base path.
pub enum Assets {
    File(FileFetcher),
    Http(HttpFetcher),
}

impl Assets {
    /// Picks a fetcher for the given base path.
    pub fn for_base_path(base_path: &str) -> Assets {
        if is_url(base_path) {
            Assets::Http(HttpFetcher::new())
        } else {
            Assets::File(FileFetcher::new())
        }
    }
}

impl AssetFetcher for Assets {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send {
        let location = location.to_string();
        async move {
            match self {
                Assets::File(fetcher) => fetcher.fetch(&location).await,
                Assets::Http(fetcher) => fetcher.fetch(&location).await,
            }
        }
    }
}

/// Returns true if the base path should be fetched over HTTP.
pub fn is_url(base_path: &str) -> bool {
    base_path.starts_with("http://") || base_path.starts_with("https://")
}

/// Joins a base path and a file name into an asset location.
pub fn asset_location(base_path: &str, file_name: &str) -> String {
    if base_path.is_empty() || base_path.ends_with('/') {
        format!("{}{}", base_path, file_name)
    } else {
        format!("{}/{}", base_path, file_name)
    }
}
