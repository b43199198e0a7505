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

//! Decoded pad audio held entirely in memory.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info};

/// Errors produced while turning a fetched payload into audio.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unrecognized audio format: {0}")]
    Format(SymphoniaError),

    #[error("no audio track found")]
    NoAudioTrack,

    #[error("sample rate not specified")]
    UnknownSampleRate,

    #[error("decoding failed: {0}")]
    Codec(#[from] SymphoniaError),

    #[error("payload decoded to no audio")]
    Empty,
}

/// Decoded audio data for a single pad. The samples are interleaved and
/// shared so every voice playing the same key reads the same memory.
#[derive(Clone)]
pub struct PadBuffer {
    samples: Arc<Vec<f32>>,
    channel_count: u16,
    sample_rate: u32,
}

impl PadBuffer {
    /// Creates a buffer from interleaved samples.
    pub fn new(samples: Vec<f32>, channel_count: u16, sample_rate: u32) -> PadBuffer {
        PadBuffer {
            samples: Arc::new(samples),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Decodes a complete audio file held in memory and resamples it to
    /// `target_sample_rate`. `extension` is used as a hint for the format probe.
    pub fn decode(
        bytes: Vec<u8>,
        extension: Option<&str>,
        target_sample_rate: u32,
    ) -> Result<PadBuffer, DecodeError> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(DecodeError::Format)?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;
        let mut channel_count = track
            .codec_params
            .channels
            .map(|channels| channels.count() as u16);

        let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break
                }
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // A single corrupt packet shouldn't sink the whole pad.
                    debug!(err = e, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            sample_rate.get_or_insert(spec.rate);
            channel_count.get_or_insert(spec.channels.count() as u16);

            let mut sample_buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buffer.samples());
        }

        let sample_rate = sample_rate.ok_or(DecodeError::UnknownSampleRate)?;
        let channel_count = channel_count.unwrap_or(1).max(1);
        if samples.len() < channel_count as usize {
            return Err(DecodeError::Empty);
        }

        let buffer = PadBuffer::new(samples, channel_count, sample_rate);
        let buffer = if sample_rate != target_sample_rate {
            info!(
                source_rate = sample_rate,
                target_rate = target_sample_rate,
                "Resampling pad"
            );
            buffer.resample(target_sample_rate)
        } else {
            buffer
        };

        debug!(
            channels = buffer.channel_count,
            sample_rate = buffer.sample_rate,
            duration_ms = buffer.duration().as_millis(),
            memory_kb = buffer.memory_size() / 1024,
            "Pad decoded"
        );

        Ok(buffer)
    }

    /// Resamples to the given rate using linear interpolation. Pads are long,
    /// slowly evolving textures, so this is plenty.
    pub fn resample(&self, target_rate: u32) -> PadBuffer {
        if target_rate == self.sample_rate || self.sample_rate == 0 {
            return self.clone();
        }

        let channels = self.channel_count as usize;
        let ratio = target_rate as f64 / self.sample_rate as f64;
        let source_frames = self.frames();
        let target_frames = (source_frames as u64 * target_rate as u64)
            .div_ceil(self.sample_rate as u64) as usize;

        let mut output = Vec::with_capacity(target_frames * channels);
        for target_frame in 0..target_frames {
            let source_pos = target_frame as f64 / ratio;
            let source_frame = source_pos.floor() as usize;
            let frac = source_pos.fract() as f32;

            for channel in 0..channels {
                let s0 = self
                    .samples
                    .get(source_frame * channels + channel)
                    .copied()
                    .unwrap_or(0.0);
                let s1 = self
                    .samples
                    .get((source_frame + 1) * channels + channel)
                    .copied()
                    .unwrap_or(s0);
                output.push(s0 + (s1 - s0) * frac);
            }
        }

        PadBuffer::new(output, self.channel_count, target_rate)
    }

    /// Returns the sample for the given frame and channel. Channels beyond
    /// the buffer's own wrap around, so a mono pad feeds every output channel.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.channel_count as usize;
        self.samples[frame * channels + channel % channels]
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channel_count as usize
    }

    /// Number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Sample rate of the audio data.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length of one loop iteration.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Memory held by the samples in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for PadBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PadBuffer")
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}
