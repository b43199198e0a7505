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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::{DeviceError, OutputFormat, OutputStream, PadMixer};

const MOCK_SAMPLE_RATE: u32 = 44100;
const MOCK_CHANNELS: u16 = 2;

/// How often the real-time clock renders a block.
const TICK: Duration = Duration::from_millis(10);

/// How a mock device advances its clock.
#[derive(Clone, Copy, PartialEq, Debug)]
enum Clock {
    /// A background thread renders (and discards) audio in real time while running.
    Realtime,
    /// Nothing renders unless the caller drives the mixer.
    Manual,
    /// The device refuses to open, as on a machine without audio output.
    Unsupported,
}

/// A mock device. Doesn't actually play anything.
#[derive(Clone)]
pub struct Device {
    name: String,
    clock: Clock,
    format: OutputFormat,
    opened: Arc<AtomicUsize>,
}

impl Device {
    /// Gets the given mock device. Its clock runs in real time.
    pub fn get(name: &str) -> Device {
        Device::new(name, Clock::Realtime)
    }

    /// A mock device whose clock only moves when the mixer is rendered directly.
    pub fn manual(name: &str) -> Device {
        Device::new(name, Clock::Manual)
    }

    /// A mock device that can't be opened.
    pub fn unsupported(name: &str) -> Device {
        Device::new(name, Clock::Unsupported)
    }

    fn new(name: &str, clock: Clock) -> Device {
        Device {
            name: name.to_string(),
            clock,
            format: OutputFormat {
                channels: MOCK_CHANNELS,
                sample_rate: MOCK_SAMPLE_RATE,
            },
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times a stream has been opened on this device.
    pub fn times_opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

impl super::Device for Device {
    fn output_format(&self) -> Result<OutputFormat, DeviceError> {
        Ok(self.format)
    }

    fn open(&self, mixer: Arc<PadMixer>) -> Result<Box<dyn OutputStream>, DeviceError> {
        let span = span!(Level::INFO, "open stream (mock)");
        let _enter = span.enter();

        if self.clock == Clock::Unsupported {
            return Err(DeviceError::Unavailable(format!(
                "{} has no audio output",
                self.name
            )));
        }

        self.opened.fetch_add(1, Ordering::Relaxed);
        info!(device = self.name, "Opening mock stream.");

        let running = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));
        let clock_thread = if self.clock == Clock::Realtime {
            let running = running.clone();
            let closed = closed.clone();
            let block_frames = (mixer.sample_rate() as u128 * TICK.as_millis() / 1000) as usize;
            Some(thread::spawn(move || {
                let mut scratch = vec![0.0f32; block_frames * mixer.num_channels() as usize];
                while !closed.load(Ordering::Relaxed) {
                    if running.load(Ordering::Relaxed) {
                        mixer.render(&mut scratch);
                    }
                    thread::sleep(TICK);
                }
            }))
        } else {
            None
        };

        Ok(Box::new(Stream {
            running,
            closed,
            clock_thread: Mutex::new(clock_thread),
        }))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}

/// The stream for a mock device.
struct Stream {
    running: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    clock_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl OutputStream for Stream {
    fn resume(&self) -> Result<(), DeviceError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(DeviceError::Closed);
        }
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn suspend(&self) -> Result<(), DeviceError> {
        self.running.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn close(&self) {
        self.running.store(false, Ordering::Relaxed);
        self.closed.store(true, Ordering::Relaxed);
        if let Some(thread) = self.clock_thread.lock().take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::Device as _;
    use crate::testutil::eventually;

    #[test]
    fn test_realtime_clock_advances_only_while_running() {
        let device = Device::get("mock-realtime");
        let mixer = Arc::new(PadMixer::new(2, MOCK_SAMPLE_RATE, 1.0));
        let stream = device.open(mixer.clone()).unwrap();
        assert_eq!(1, device.times_opened());

        thread::sleep(Duration::from_millis(30));
        assert_eq!(0.0, mixer.current_time());

        stream.resume().unwrap();
        eventually(|| mixer.current_time() > 0.0, "Clock never advanced");

        stream.close();
        let stopped_at = mixer.current_time();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(stopped_at, mixer.current_time());
        assert!(stream.resume().is_err());
    }

    #[test]
    fn test_manual_clock() {
        let device = Device::manual("mock-manual");
        let mixer = Arc::new(PadMixer::new(2, MOCK_SAMPLE_RATE, 1.0));
        let stream = device.open(mixer.clone()).unwrap();
        stream.resume().unwrap();

        thread::sleep(Duration::from_millis(30));
        assert_eq!(0.0, mixer.current_time());
        stream.close();
    }

    #[test]
    fn test_unsupported() {
        let device = Device::unsupported("mock-none");
        let mixer = Arc::new(PadMixer::new(2, MOCK_SAMPLE_RATE, 1.0));
        assert!(device.open(mixer).is_err());
        assert_eq!(0, device.times_opened());
    }
}
