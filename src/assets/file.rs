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
use std::future::Future;
use std::io::ErrorKind;

use tracing::debug;

use super::{AssetFetcher, LoadError};

/// Reads assets from the local filesystem.
#[derive(Default)]
pub struct FileFetcher {}

impl FileFetcher {
    pub fn new() -> FileFetcher {
        FileFetcher {}
    }
}

impl AssetFetcher for FileFetcher {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send {
        let location = location.to_string();
        async move {
            debug!(location = %location, "Reading asset");
            tokio::fs::read(&location).await.map_err(|source| {
                if source.kind() == ErrorKind::NotFound {
                    LoadError::NotFound { location }
                } else {
                    LoadError::Io { location, source }
                }
            })
        }
    }
}
