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

//! Looping playback sources.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::automation::GainParam;
use super::buffer::PadBuffer;
use crate::keys::Key;

/// Global voice ID counter.
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(1);

/// Sentinel for "no stop scheduled".
const NO_STOP: u64 = u64::MAX;

/// A pad buffer being played in a loop by the mixer.
pub struct Voice {
    /// Unique ID for this voice.
    id: u64,
    /// The key being played.
    key: Key,
    /// The audio being looped.
    buffer: PadBuffer,
    /// Current frame within the buffer.
    position: usize,
    /// The gain this voice is routed through.
    gain: Arc<GainParam>,
    /// Frame at which this voice should stop.
    stop_at_frame: Arc<AtomicU64>,
    /// Set once the mixer has dropped this voice.
    finished: Arc<AtomicBool>,
}

impl Voice {
    /// Creates a voice and the handle used to stop it later.
    pub fn new(key: Key, buffer: PadBuffer, gain: Arc<GainParam>) -> (Voice, SourceHandle) {
        let id = NEXT_VOICE_ID.fetch_add(1, Ordering::SeqCst);
        let stop_at_frame = Arc::new(AtomicU64::new(NO_STOP));
        let finished = Arc::new(AtomicBool::new(false));

        let handle = SourceHandle {
            id,
            key,
            sample_rate: buffer.sample_rate(),
            stop_at_frame: stop_at_frame.clone(),
            finished: finished.clone(),
        };
        let voice = Voice {
            id,
            key,
            buffer,
            position: 0,
            gain,
            stop_at_frame,
            finished,
        };
        (voice, handle)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> Key {
        self.key
    }

    pub fn gain(&self) -> &Arc<GainParam> {
        &self.gain
    }

    /// Returns true if the voice should no longer be heard at the given frame.
    #[inline]
    pub fn is_stopped_at(&self, frame: u64) -> bool {
        frame >= self.stop_at_frame.load(Ordering::Relaxed)
    }

    /// Reads the sample for `channel` at the current position.
    #[inline]
    pub fn sample(&self, channel: usize) -> f32 {
        if self.buffer.frames() == 0 {
            return 0.0;
        }
        self.buffer.sample(self.position, channel)
    }

    /// Moves to the next frame, wrapping at the end of the buffer.
    #[inline]
    pub fn advance(&mut self) {
        self.position += 1;
        if self.position >= self.buffer.frames() {
            self.position = 0;
        }
    }

    /// Marks the voice as finished. Called by the mixer when it's removed.
    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }
}

/// A handle to a playing voice, held by whoever started it.
#[derive(Clone, Debug)]
pub struct SourceHandle {
    id: u64,
    key: Key,
    sample_rate: u32,
    stop_at_frame: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
}

impl SourceHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> Key {
        self.key
    }

    /// Schedules the voice to stop at `when` seconds on the context clock.
    /// Only the first call has an effect; stopping an already stopped or
    /// stopping voice is a no-op.
    pub fn stop(&self, when: f64) {
        // Tolerate float error so a time computed from a frame maps back to that frame.
        let frame = (when.max(0.0) * self.sample_rate as f64 - 1e-6).ceil().max(0.0) as u64;
        if self
            .stop_at_frame
            .compare_exchange(NO_STOP, frame, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(voice = self.id, key = %self.key, "Voice already stopped");
        }
    }

    /// Returns true once a stop has been scheduled.
    pub fn is_stop_scheduled(&self) -> bool {
        self.stop_at_frame.load(Ordering::SeqCst) != NO_STOP
    }

    /// The frame the voice will stop at, if scheduled.
    pub fn stop_frame(&self) -> Option<u64> {
        match self.stop_at_frame.load(Ordering::SeqCst) {
            NO_STOP => None,
            frame => Some(frame),
        }
    }

    /// Returns true once the mixer has dropped the voice.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_voice_loops() {
        let buffer = PadBuffer::new(vec![0.1, 0.2, 0.3], 1, 10);
        let (mut voice, _handle) = Voice::new(Key::A, buffer, Arc::new(GainParam::new(1.0)));

        let mut read = Vec::new();
        for _ in 0..7 {
            read.push(voice.sample(0));
            voice.advance();
        }
        assert_eq!(vec![0.1, 0.2, 0.3, 0.1, 0.2, 0.3, 0.1], read);
    }

    #[test]
    fn test_double_stop_is_noop() {
        let buffer = PadBuffer::new(vec![0.0; 100], 1, 10);
        let (voice, handle) = Voice::new(Key::C, buffer, Arc::new(GainParam::new(1.0)));

        assert!(!handle.is_stop_scheduled());
        assert!(!voice.is_stopped_at(1_000_000));

        handle.stop(2.0);
        assert_eq!(Some(20), handle.stop_frame());

        // A later stop doesn't move the deadline.
        handle.stop(0.5);
        assert_eq!(Some(20), handle.stop_frame());

        assert!(!voice.is_stopped_at(19));
        assert!(voice.is_stopped_at(20));
    }
}
