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
use std::path::Path;

use tracing::info;

mod audio;
mod error;
mod pads;

pub use audio::{Audio, StreamBufferSize};
pub use error::ConfigError;
pub use pads::{AssetsConfig, Pads};

/// Loads the pad player configuration. Without a path, every setting takes its default.
pub fn load(path: Option<&Path>) -> Result<Pads, ConfigError> {
    match path {
        Some(path) => {
            info!(path = %path.display(), "Loading configuration");
            Pads::deserialize(path)
        }
        None => Ok(Pads::default()),
    }
}
