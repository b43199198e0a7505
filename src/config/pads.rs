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
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::audio::Audio;
use super::error::ConfigError;
use crate::engine::EngineSettings;
use crate::keys::AssetNaming;

const DEFAULT_FADE: Duration = Duration::from_millis(2000);
const DEFAULT_BASE_PATH: &str = "pads/";
const DEFAULT_EXTENSION: &str = "mp3";
const DEFAULT_INITIAL_VOLUME: f32 = 0.8;

/// Where pad audio files live.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct AssetsConfig {
    /// Directory or URL prefix the file names are appended to.
    base_path: Option<String>,
    /// File extension of every pad, without the dot.
    extension: Option<String>,
    /// How sharps are spelled in file names.
    naming: Option<AssetNaming>,
}

/// A YAML representation of the pad player configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Pads {
    /// The audio output configuration.
    audio: Option<Audio>,
    /// Where pads are fetched from.
    assets: Option<AssetsConfig>,
    /// How long a crossfade takes, e.g. `2000ms` or `3s`.
    fade: Option<String>,
    /// Master volume at startup, from 0.0 to 1.0.
    initial_volume: Option<f32>,
}

impl Pads {
    /// Parses the configuration from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Pads, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Pads>()?)
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> Audio {
        self.audio.clone().unwrap_or_default()
    }

    /// Returns the asset base path.
    pub fn base_path(&self) -> &str {
        self.assets
            .as_ref()
            .and_then(|assets| assets.base_path.as_deref())
            .unwrap_or(DEFAULT_BASE_PATH)
    }

    /// Returns the asset file extension.
    pub fn extension(&self) -> &str {
        self.assets
            .as_ref()
            .and_then(|assets| assets.extension.as_deref())
            .unwrap_or(DEFAULT_EXTENSION)
    }

    /// Returns the asset naming convention.
    pub fn naming(&self) -> AssetNaming {
        self.assets
            .as_ref()
            .and_then(|assets| assets.naming)
            .unwrap_or_default()
    }

    /// Returns the crossfade duration.
    pub fn fade(&self) -> Result<Duration, ConfigError> {
        match &self.fade {
            Some(fade) => Ok(DurationString::from_string(fade.clone())
                .map_err(|reason| ConfigError::Invalid {
                    field: "fade",
                    reason: reason.to_string(),
                })?
                .into()),
            None => Ok(DEFAULT_FADE),
        }
    }

    /// Returns the initial master volume.
    pub fn initial_volume(&self) -> Result<f32, ConfigError> {
        let volume = self.initial_volume.unwrap_or(DEFAULT_INITIAL_VOLUME);
        if !(0.0..=1.0).contains(&volume) {
            return Err(ConfigError::Invalid {
                field: "initial_volume",
                reason: format!("{} is outside 0.0 to 1.0", volume),
            });
        }
        Ok(volume)
    }

    /// Returns the engine settings described by this configuration.
    pub fn settings(&self) -> Result<EngineSettings, ConfigError> {
        Ok(EngineSettings {
            fade: self.fade()?,
            base_path: self.base_path().to_string(),
            extension: self.extension().to_string(),
            naming: self.naming(),
            initial_volume: self.initial_volume()?,
        })
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Pads {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = Pads::default().settings().unwrap();
        assert_eq!(Duration::from_millis(2000), settings.fade);
        assert_eq!("pads/", settings.base_path);
        assert_eq!("mp3", settings.extension);
        assert_eq!(AssetNaming::Sharp, settings.naming);
        assert_eq!(0.8, settings.initial_volume);
        assert_eq!("default", Pads::default().audio().device());
    }

    #[test]
    fn test_full_config() {
        let pads = parse(
            r#"
            audio:
              device: mock-device
              sample_rate: 48000
            assets:
              base_path: https://example.com/pads/
              extension: wav
              naming: percent
            fade: 3s
            initial_volume: 0.5
        "#,
        );

        let settings = pads.settings().unwrap();
        assert_eq!("mock-device", pads.audio().device());
        assert_eq!(Some(48000), pads.audio().sample_rate());
        assert_eq!(Duration::from_secs(3), settings.fade);
        assert_eq!("https://example.com/pads/", settings.base_path);
        assert_eq!("wav", settings.extension);
        assert_eq!(AssetNaming::Percent, settings.naming);
        assert_eq!(0.5, settings.initial_volume);
    }

    #[test]
    fn test_invalid_values() {
        assert!(parse("fade: soon").fade().is_err());
        assert!(parse("initial_volume: 1.5").initial_volume().is_err());
    }

    #[test]
    fn test_deserialize_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ambipad.yaml");
        std::fs::write(&path, "fade: 500ms\n").unwrap();

        let pads = Pads::deserialize(&path).unwrap();
        assert_eq!(Duration::from_millis(500), pads.fade().unwrap());

        assert!(Pads::deserialize(&dir.path().join("missing.yaml")).is_err());
    }
}
