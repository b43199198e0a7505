// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
use std::any::Any;
use std::{error::Error, fmt, sync::Arc};

use crate::config;

pub mod automation;
pub mod buffer;
pub mod context;
pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod voice;

pub use automation::GainParam;
pub use buffer::{DecodeError, PadBuffer};
pub use context::{AudioContext, ContextState};
pub use mixer::PadMixer;
pub use voice::SourceHandle;

/// Errors raised by output devices and their streams.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no output device found with name {0}")]
    NotFound(String),

    #[error("no audio output available: {0}")]
    Unavailable(String),

    #[error("unsupported sample format {0}")]
    UnsupportedFormat(String),

    #[error("output stream error: {0}")]
    Stream(String),

    #[error("audio context is closed")]
    Closed,
}

/// The shape of the audio a device consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    /// Number of interleaved output channels.
    pub channels: u16,
    /// Frames per second.
    pub sample_rate: u32,
}

/// An open output stream pulling audio from a mixer.
pub trait OutputStream: Send + Sync {
    /// Starts (or restarts) pulling audio.
    fn resume(&self) -> Result<(), DeviceError>;

    /// Pauses audio without tearing down the stream.
    fn suspend(&self) -> Result<(), DeviceError>;

    /// Tears the stream down. Safe to call more than once.
    fn close(&self);
}

pub trait Device: Any + fmt::Display + std::marker::Send + std::marker::Sync {
    /// The format the mixer should render in for this device.
    fn output_format(&self) -> Result<OutputFormat, DeviceError>;

    /// Opens a stream that renders from the given mixer. The stream starts suspended.
    fn open(&self, mixer: Arc<PadMixer>) -> Result<Box<dyn OutputStream>, DeviceError>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device matching the configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(config.clone())?))
}
