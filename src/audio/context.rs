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
// The audio context ties an output stream to a mixer and exposes the pieces
// pads are built from: a clock, gain stages and looping sources.
//

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::automation::GainParam;
use super::buffer::PadBuffer;
use super::mixer::PadMixer;
use super::voice::{SourceHandle, Voice};
use super::{Device, DeviceError, OutputStream};
use crate::keys::Key;

/// Lifecycle of an audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created but not producing audio.
    Suspended,
    /// Producing audio.
    Running,
    /// Torn down. A closed context can't be resumed.
    Closed,
}

/// An open connection to an output device.
pub struct AudioContext {
    /// Name of the device, for logging.
    device_name: String,
    /// The mixer the stream pulls from.
    mixer: Arc<PadMixer>,
    /// The output stream.
    stream: Box<dyn OutputStream>,
    /// Current lifecycle state.
    state: Mutex<ContextState>,
}

impl AudioContext {
    /// Opens a context on the given device. Contexts start suspended.
    pub fn new(device: &dyn Device, master_volume: f32) -> Result<AudioContext, DeviceError> {
        let format = device.output_format()?;
        let mixer = Arc::new(PadMixer::new(
            format.channels,
            format.sample_rate,
            master_volume,
        ));
        let stream = device.open(mixer.clone())?;

        info!(
            device = device.to_string(),
            channels = format.channels,
            sample_rate = format.sample_rate,
            "Audio context created"
        );

        Ok(AudioContext {
            device_name: device.to_string(),
            mixer,
            stream,
            state: Mutex::new(ContextState::Suspended),
        })
    }

    /// Returns the current state.
    pub fn state(&self) -> ContextState {
        *self.state.lock()
    }

    /// Resumes a suspended context. Resuming a running context does nothing.
    pub fn resume(&self) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        match *state {
            ContextState::Running => Ok(()),
            ContextState::Closed => Err(DeviceError::Closed),
            ContextState::Suspended => {
                self.stream.resume()?;
                *state = ContextState::Running;
                debug!(device = self.device_name, "Audio context resumed");
                Ok(())
            }
        }
    }

    /// Suspends a running context.
    pub fn suspend(&self) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        match *state {
            ContextState::Suspended => Ok(()),
            ContextState::Closed => Err(DeviceError::Closed),
            ContextState::Running => {
                self.stream.suspend()?;
                *state = ContextState::Suspended;
                debug!(device = self.device_name, "Audio context suspended");
                Ok(())
            }
        }
    }

    /// Stops all audio and tears down the stream.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if *state == ContextState::Closed {
            return;
        }
        self.mixer.clear();
        self.stream.close();
        *state = ContextState::Closed;
        info!(device = self.device_name, "Audio context closed");
    }

    /// The context clock in seconds.
    pub fn current_time(&self) -> f64 {
        self.mixer.current_time()
    }

    /// The sample rate everything in this context runs at.
    pub fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    /// The master gain stage.
    pub fn master_gain(&self) -> &Arc<GainParam> {
        self.mixer.master()
    }

    /// Creates a gain stage that feeds the master gain.
    pub fn create_gain(&self, value: f32) -> Arc<GainParam> {
        Arc::new(GainParam::new(value))
    }

    /// Starts looping `buffer` through `gain` immediately.
    pub fn start_looping(&self, key: Key, buffer: &PadBuffer, gain: Arc<GainParam>) -> SourceHandle {
        let buffer = buffer.resample(self.sample_rate());
        let (voice, handle) = Voice::new(key, buffer, gain);
        self.mixer.add_voice(voice);
        handle
    }

    /// The mixer backing this context.
    pub fn mixer(&self) -> &Arc<PadMixer> {
        &self.mixer
    }
}

impl Drop for AudioContext {
    fn drop(&mut self) {
        self.close();
    }
}
