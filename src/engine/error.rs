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
use crate::assets::LoadError;
use crate::audio::DecodeError;

/// Errors that abort a single engine action. None of them leave the engine unusable,
/// except [`EngineError::Closed`], which is returned for everything after a close.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("audio output is not supported here: {0}")]
    UnsupportedPlatform(String),

    #[error("the pad engine has been closed")]
    Closed,

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
