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
// Core pad mixing logic that can be used by both CPAL and mock devices
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use super::automation::{Automation, GainParam};
use super::voice::Voice;

/// Mixes every playing voice through its own gain and the shared master gain.
/// The mixer also owns the context clock: time only moves forward as frames
/// are rendered.
pub struct PadMixer {
    /// Voices currently playing.
    voices: RwLock<Vec<Voice>>,
    /// The master gain stage all voices pass through.
    master: Arc<GainParam>,
    /// Number of output channels.
    num_channels: u16,
    /// Sample rate.
    sample_rate: u32,
    /// Total frames rendered so far.
    frames_rendered: AtomicU64,
}

impl PadMixer {
    /// Creates a new mixer with the master gain at `master_volume`.
    pub fn new(num_channels: u16, sample_rate: u32, master_volume: f32) -> Self {
        Self {
            voices: RwLock::new(Vec::new()),
            master: Arc::new(GainParam::new(master_volume)),
            num_channels: num_channels.max(1),
            sample_rate,
            frames_rendered: AtomicU64::new(0),
        }
    }

    /// Adds a voice. It's heard from the next rendered frame.
    pub fn add_voice(&self, voice: Voice) {
        debug!(voice = voice.id(), key = %voice.key(), "Adding voice");
        self.voices.write().push(voice);
    }

    /// Renders interleaved frames into `output`. The length of `output` should
    /// be a multiple of the channel count; any remainder is zeroed.
    pub fn render(&self, output: &mut [f32]) {
        let channels = self.num_channels as usize;
        let num_frames = output.len() / channels;
        output.fill(0.0);

        let start_frame = self.frames_rendered.load(Ordering::Acquire);
        let sample_rate = self.sample_rate as f64;
        let master = self.master.snapshot();

        let mut voices = self.voices.write();
        let curves: Vec<Automation> = voices.iter().map(|voice| voice.gain().snapshot()).collect();

        for (frame_index, frame) in output.chunks_exact_mut(channels).enumerate() {
            let frame_number = start_frame + frame_index as u64;
            let t = frame_number as f64 / sample_rate;

            for (voice, curve) in voices.iter_mut().zip(curves.iter()) {
                if voice.is_stopped_at(frame_number) {
                    continue;
                }
                let gain = curve.value_at(t);
                if gain != 0.0 {
                    for (channel, sample) in frame.iter_mut().enumerate() {
                        *sample += voice.sample(channel) * gain;
                    }
                }
                voice.advance();
            }

            let master_gain = master.value_at(t);
            for sample in frame.iter_mut() {
                *sample *= master_gain;
            }
        }

        let end_frame = start_frame + num_frames as u64;
        self.frames_rendered.store(end_frame, Ordering::Release);

        voices.retain(|voice| {
            if voice.is_stopped_at(end_frame) {
                debug!(voice = voice.id(), key = %voice.key(), "Voice stopped");
                voice.finish();
                false
            } else {
                true
            }
        });

        let now = end_frame as f64 / sample_rate;
        for voice in voices.iter() {
            voice.gain().prune(now);
        }
        self.master.prune(now);
    }

    /// Renders `num_frames` frames and returns them.
    pub fn render_frames(&self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0f32; num_frames * self.num_channels as usize];
        self.render(&mut frames);
        frames
    }

    /// The current time of the clock, in seconds.
    pub fn current_time(&self) -> f64 {
        self.frames_rendered.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    /// The master gain.
    pub fn master(&self) -> &Arc<GainParam> {
        &self.master
    }

    /// Number of voices still playing (including those fading out).
    pub fn active_voices(&self) -> usize {
        self.voices.read().len()
    }

    /// Drops every voice immediately.
    pub fn clear(&self) {
        let mut voices = self.voices.write();
        for voice in voices.iter() {
            voice.finish();
        }
        voices.clear();
    }

    /// Gets the number of output channels
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Gets the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
