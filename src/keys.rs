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
use std::{fmt, str::FromStr};

use serde::Deserialize;

/// One of the twelve chromatic keys a pad can be played in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl Key {
    /// All keys in display order.
    pub const ALL: [Key; 12] = [
        Key::C,
        Key::CSharp,
        Key::D,
        Key::DSharp,
        Key::E,
        Key::F,
        Key::FSharp,
        Key::G,
        Key::GSharp,
        Key::A,
        Key::ASharp,
        Key::B,
    ];

    /// The note name as displayed, e.g. `C#`.
    pub fn name(self) -> &'static str {
        match self {
            Key::C => "C",
            Key::CSharp => "C#",
            Key::D => "D",
            Key::DSharp => "D#",
            Key::E => "E",
            Key::F => "F",
            Key::FSharp => "F#",
            Key::G => "G",
            Key::GSharp => "G#",
            Key::A => "A",
            Key::ASharp => "A#",
            Key::B => "B",
        }
    }

    /// Returns the asset file name for this key under the given naming convention.
    pub fn file_name(self, naming: AssetNaming, extension: &str) -> String {
        let stem = match naming {
            AssetNaming::Sharp => self.name().replace('#', "sharp"),
            AssetNaming::Percent => self.name().replace('#', "%23"),
        };
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            stem
        } else {
            format!("{}.{}", stem, extension)
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when a string doesn't name one of the twelve keys.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("unknown key '{0}', expected one of C, C#, D, D#, E, F, F#, G, G#, A, A#, B")]
pub struct UnknownKeyError(String);

impl FromStr for Key {
    type Err = UnknownKeyError;

    /// Accepts `C#`, `c#`, `Csharp` and `C%23` for sharps.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let normalized = normalized
            .strip_suffix("sharp")
            .or_else(|| normalized.strip_suffix("%23"))
            .map(|note| format!("{}#", note))
            .unwrap_or_else(|| normalized.clone());

        Key::ALL
            .into_iter()
            .find(|key| key.name().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| UnknownKeyError(s.to_string()))
    }
}

/// How a key's name is turned into a URL-safe asset file name.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetNaming {
    /// `C#` becomes `Csharp`.
    #[default]
    Sharp,
    /// `C#` becomes `C%23`.
    Percent,
}
