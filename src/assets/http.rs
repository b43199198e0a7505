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

use tracing::debug;

use super::{AssetFetcher, LoadError};

/// Fetches assets from a static file server.
#[derive(Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> HttpFetcher {
        HttpFetcher {
            client: reqwest::Client::new(),
        }
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send {
        let location = location.to_string();
        let request = self.client.get(&location);
        async move {
            debug!(location = %location, "Fetching asset");
            let response = match request.send().await {
                Ok(response) => response,
                Err(source) => return Err(LoadError::Http { location, source }),
            };

            let status = response.status();
            if !status.is_success() {
                return Err(LoadError::Status {
                    location,
                    status: status.as_u16(),
                });
            }

            match response.bytes().await {
                Ok(bytes) => Ok(bytes.to_vec()),
                Err(source) => Err(LoadError::Http { location, source }),
            }
        }
    }
}
