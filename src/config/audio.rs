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
use std::error::Error;

use serde::Deserialize;

const DEFAULT_DEVICE: &str = "default";

/// How to choose the CPAL stream buffer size (period size). Affects latency vs underrun tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StreamBufferSize {
    /// Use the backend's default.
    Default,
    /// Use the device's minimum supported period size.
    Min,
    /// Use a fixed size in frames.
    Fixed(u32),
}

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Audio {
    /// The audio device. `default` picks the host's default output.
    device: Option<String>,

    /// Sample rate in Hz. Defaults to the device's preferred rate.
    sample_rate: Option<u32>,

    /// Output channel count. Defaults to the device's preferred count.
    channels: Option<u16>,

    /// CPAL stream buffer: "default" (backend default), "min" (lowest latency), or a number (frames).
    stream_buffer_size: Option<String>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: Some(device.to_string()),
            ..Default::default()
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the requested sample rate, if any.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Returns the requested channel count, if any.
    pub fn channels(&self) -> Option<u16> {
        self.channels
    }

    /// Returns the stream buffer size choice for CPAL.
    pub fn stream_buffer_size(&self) -> Result<StreamBufferSize, Box<dyn Error>> {
        match self.stream_buffer_size.as_deref() {
            None | Some("default") => Ok(StreamBufferSize::Default),
            Some("min") => Ok(StreamBufferSize::Min),
            Some(frames) => Ok(StreamBufferSize::Fixed(frames.parse().map_err(|e| {
                format!("invalid stream_buffer_size '{}': {}", frames, e)
            })?)),
        }
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    fn parse(yaml: &str) -> Audio {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let audio = Audio::default();
        assert_eq!("default", audio.device());
        assert_eq!(None, audio.sample_rate());
        assert_eq!(StreamBufferSize::Default, audio.stream_buffer_size().unwrap());
    }

    #[test]
    fn test_stream_buffer_size() {
        let audio = parse(
            r#"
            device: mock-device
            sample_rate: 48000
            stream_buffer_size: "256"
        "#,
        );
        assert_eq!("mock-device", audio.device());
        assert_eq!(Some(48000), audio.sample_rate());
        assert_eq!(StreamBufferSize::Fixed(256), audio.stream_buffer_size().unwrap());

        let audio = parse("stream_buffer_size: min");
        assert_eq!(StreamBufferSize::Min, audio.stream_buffer_size().unwrap());

        let audio = parse("stream_buffer_size: lots");
        assert!(audio.stream_buffer_size().is_err());
    }
}
