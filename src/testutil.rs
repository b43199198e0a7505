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
use std::{
    collections::HashMap,
    future::Future,
    io::Cursor,
    sync::Arc,
    thread,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::assets::{AssetFetcher, LoadError};

const TICK: Duration = Duration::from_millis(10);
const TIMEOUT: Duration = Duration::from_secs(3);

/// Wait for the given predicate to return true or fail.
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = SystemTime::now();
    loop {
        let elapsed = start.elapsed().expect("System time error");
        if elapsed > TIMEOUT {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(TICK);
    }
}

/// Wait for the given async predicate to return true or fail.
pub async fn eventually_async<F, Fut>(mut predicate: F, error_msg: &str)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = SystemTime::now();
    loop {
        let elapsed = start.elapsed().expect("System time error");
        if elapsed > TIMEOUT {
            panic!("{}", error_msg);
        }
        if predicate().await {
            return;
        }
        tokio::time::sleep(TICK).await;
    }
}

/// Encodes the given channels as a 32 bit float WAV file held in memory.
pub fn wav_bytes(channels: &[Vec<f32>], sample_rate: u32) -> Vec<u8> {
    assert!(!channels.is_empty(), "At least one channel is required");
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels: channels.len() as u16,
                sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
        )
        .expect("Unable to create WAV writer");

        let frames = channels[0].len();
        for frame in 0..frames {
            for channel in channels {
                writer
                    .write_sample(channel[frame])
                    .expect("Unable to write sample");
            }
        }
        writer.finalize().expect("Unable to finalize WAV");
    }
    cursor.into_inner()
}

/// An in-memory asset fetcher that records every fetch. Locations can be
/// gated so their fetch doesn't finish until released.
#[derive(Default)]
pub struct TestFetcher {
    assets: Mutex<HashMap<String, Vec<u8>>>,
    fetches: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl TestFetcher {
    pub fn new() -> Arc<TestFetcher> {
        Arc::new(TestFetcher::default())
    }

    /// Serves `bytes` for `location`, replacing anything served before.
    pub fn insert(&self, location: &str, bytes: Vec<u8>) {
        self.assets.lock().insert(location.to_string(), bytes);
    }

    /// Holds fetches of `location` until [`TestFetcher::release`] is called.
    pub fn gate(&self, location: &str) {
        self.gates
            .lock()
            .insert(location.to_string(), Arc::new(Semaphore::new(0)));
    }

    /// Lets every held and future fetch of `location` finish.
    pub fn release(&self, location: &str) {
        if let Some(gate) = self.gates.lock().remove(location) {
            gate.close();
        }
    }

    /// Number of times `location` has been fetched.
    pub fn fetch_count(&self, location: &str) -> usize {
        self.fetches
            .lock()
            .iter()
            .filter(|fetched| fetched.as_str() == location)
            .count()
    }
}

impl AssetFetcher for TestFetcher {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send {
        let location = location.to_string();
        async move {
            self.fetches.lock().push(location.clone());

            let gate = self.gates.lock().get(&location).cloned();
            if let Some(gate) = gate {
                // Closing the semaphore is the release signal.
                let _ = gate.acquire().await;
            }

            let bytes = self.assets.lock().get(&location).cloned();
            bytes.ok_or(LoadError::NotFound { location })
        }
    }
}
