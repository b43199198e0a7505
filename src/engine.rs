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

//! The pad engine: one looping pad at a time, crossfaded on every change.
//!
//! Selecting a key fetches and decodes its pad (once, after which it's cached),
//! then fades it in while the previous pad fades out. Selections may overlap;
//! every action takes a fresh action id and a selection whose id has been
//! superseded by the time its audio is ready is dropped without touching
//! anything. Every such check happens under the current pad lock, which is
//! what serializes completing plays against stops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info, span, Level};

use crate::assets::{self, AssetFetcher};
use crate::audio::{AudioContext, ContextState, Device, GainParam, PadBuffer, SourceHandle};
use crate::keys::{AssetNaming, Key};

mod error;

pub use error::EngineError;

/// Extra time after a fade out before the faded source is stopped, so the
/// stop never lands while the ramp is still audible.
const STOP_SAFETY_MARGIN: f64 = 0.05;

/// Settings that shape the engine's behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// How long crossfades, fade ins and fade outs take.
    pub fade: Duration,
    /// Directory or URL prefix the pad files live under.
    pub base_path: String,
    /// File extension of the pad files.
    pub extension: String,
    /// How sharps are spelled in pad file names.
    pub naming: AssetNaming,
    /// Master volume before anything sets it.
    pub initial_volume: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            fade: Duration::from_millis(2000),
            base_path: "pads/".to_string(),
            extension: "mp3".to_string(),
            naming: AssetNaming::Sharp,
            initial_volume: 0.8,
        }
    }
}

/// What the UI needs to render.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PadState {
    /// The key most recently selected, or none. Set as soon as a key is
    /// selected, before its audio is ready.
    pub active_key: Option<Key>,
    /// Master volume, 0.0 to 1.0.
    pub volume: f32,
}

/// How a call to [`PadEngine::play`] resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The pad is fading in.
    Started,
    /// The key was already playing, so it was stopped instead.
    Stopped,
    /// Another action happened while the pad was loading. Nothing was changed.
    Superseded,
}

/// How [`PadEngine::select`] resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The key was already playing and has been stopped.
    Stopped,
    /// The key is active and its pad should be loaded under this action id.
    Loading(u64),
}

/// The pad that's currently audible (or fading in).
struct CurrentPad {
    key: Key,
    source: SourceHandle,
    gain: Arc<GainParam>,
}

/// Plays looping pads on an audio device.
pub struct PadEngine<F: AssetFetcher> {
    settings: EngineSettings,
    device: Arc<dyn Device>,
    fetcher: F,
    /// Created on first use.
    context: Mutex<Option<Arc<AudioContext>>>,
    closed: AtomicBool,
    buffers: RwLock<HashMap<Key, PadBuffer>>,
    current: Mutex<Option<CurrentPad>>,
    action_id: AtomicU64,
    state: watch::Sender<PadState>,
}

impl<F: AssetFetcher> PadEngine<F> {
    /// Creates an engine. Nothing touches the device until the first pad is played.
    pub fn new(settings: EngineSettings, device: Arc<dyn Device>, fetcher: F) -> PadEngine<F> {
        let volume = clamp_volume(settings.initial_volume);
        let (state, _) = watch::channel(PadState {
            active_key: None,
            volume,
        });

        PadEngine {
            settings,
            device,
            fetcher,
            context: Mutex::new(None),
            closed: AtomicBool::new(false),
            buffers: RwLock::new(HashMap::new()),
            current: Mutex::new(None),
            action_id: AtomicU64::new(0),
            state,
        }
    }

    /// Returns the audio context, opening the device on first use and
    /// resuming the context if it's suspended.
    pub fn ensure_context(&self) -> Result<Arc<AudioContext>, EngineError> {
        let mut slot = self.context.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }

        let context = match slot.as_ref() {
            Some(context) => context.clone(),
            None => {
                let volume = self.state.borrow().volume;
                let context = AudioContext::new(self.device.as_ref(), volume)
                    .map_err(|e| EngineError::UnsupportedPlatform(e.to_string()))?;
                let context = Arc::new(context);
                *slot = Some(context.clone());
                context
            }
        };

        if context.state() == ContextState::Suspended {
            context
                .resume()
                .map_err(|e| EngineError::UnsupportedPlatform(e.to_string()))?;
        }

        Ok(context)
    }

    /// Returns the decoded pad for `key`, fetching and decoding it if it isn't cached.
    /// Failures are never cached.
    pub async fn load_buffer(&self, key: Key) -> Result<PadBuffer, EngineError> {
        let cached = self.buffers.read().get(&key).cloned();
        if let Some(buffer) = cached {
            debug!(key = %key, "Pad cache hit");
            return Ok(buffer);
        }

        let context = self.ensure_context()?;
        let location = self.asset_location(key);
        info!(key = %key, location = %location, "Loading pad");

        let bytes = self.fetcher.fetch(&location).await?;
        let extension = self.settings.extension.trim_start_matches('.').to_string();
        let sample_rate = context.sample_rate();
        let buffer = tokio::task::spawn_blocking(move || {
            PadBuffer::decode(bytes, Some(&extension), sample_rate)
        })
        .await??;

        // Overlapping loads of the same key keep whichever finished first.
        Ok(self.buffers.write().entry(key).or_insert(buffer).clone())
    }

    /// Selects `key`. Selecting the key that's already playing stops it,
    /// otherwise the key's pad is crossfaded in over whatever is playing.
    pub async fn play(&self, key: Key) -> Result<PlayOutcome, EngineError> {
        match self.select(key)? {
            Selection::Stopped => Ok(PlayOutcome::Stopped),
            Selection::Loading(action) => self.finish(key, action).await,
        }
    }

    /// The synchronous half of [`PadEngine::play`]: decides whether `key` toggles
    /// off, otherwise stamps the action and marks the key active. Callers that
    /// dispatch selections concurrently call this in order and spawn [`PadEngine::finish`].
    pub fn select(&self, key: Key) -> Result<Selection, EngineError> {
        let mut current = self.current.lock();
        if self.closed.load(Ordering::SeqCst) {
            return Err(EngineError::Closed);
        }

        if current.as_ref().is_some_and(|pad| pad.key == key) {
            self.stop_locked(&mut current);
            return Ok(Selection::Stopped);
        }

        let action = self.action_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_active_key(Some(key));
        Ok(Selection::Loading(action))
    }

    /// Loads the pad for a selection and crossfades it in, unless a later
    /// action superseded it in the meantime.
    pub async fn finish(&self, key: Key, action: u64) -> Result<PlayOutcome, EngineError> {
        match self.start_pad(key, action).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(key = %key, err = %e, "Unable to play pad");
                let _current = self.current.lock();
                if self.action_id.load(Ordering::SeqCst) == action {
                    self.set_active_key(None);
                }
                Err(e)
            }
        }
    }

    async fn start_pad(&self, key: Key, action: u64) -> Result<PlayOutcome, EngineError> {
        let context = self.ensure_context()?;
        let buffer = self.load_buffer(key).await?;

        let span = span!(Level::INFO, "crossfade", key = %key);
        let _enter = span.enter();

        let mut current = self.current.lock();
        if self.action_id.load(Ordering::SeqCst) != action {
            debug!(action, "Selection superseded, dropping it");
            return Ok(PlayOutcome::Superseded);
        }

        let fade = self.settings.fade.as_secs_f64();
        let now = context.current_time();

        let gain = context.create_gain(0.0);
        gain.schedule_fade(0.0, 1.0, now, fade);
        let source = context.start_looping(key, &buffer, gain.clone());

        if let Some(previous) = current.take() {
            info!(from = %previous.key, to = %key, "Crossfading");
            self.fade_out(&previous, now);
        } else {
            info!("Fading in");
        }

        *current = Some(CurrentPad { key, source, gain });
        Ok(PlayOutcome::Started)
    }

    /// Fades out whatever is playing. Any selection still loading is abandoned.
    /// Stopping when nothing plays only clears the active key.
    pub fn stop(&self) {
        let mut current = self.current.lock();
        self.stop_locked(&mut current);
    }

    fn stop_locked(&self, current: &mut Option<CurrentPad>) {
        self.action_id.fetch_add(1, Ordering::SeqCst);

        if let Some(previous) = current.take() {
            let context = self.context.lock().clone();
            if let Some(context) = context {
                info!(key = %previous.key, "Fading out");
                self.fade_out(&previous, context.current_time());
            }
        }
        self.set_active_key(None);
    }

    /// Ramps a pad from wherever its gain is at `now` down to silence, then stops it.
    fn fade_out(&self, pad: &CurrentPad, now: f64) {
        let fade = self.settings.fade.as_secs_f64();
        let value = pad.gain.value_at(now);
        pad.gain.schedule_fade(value, 0.0, now, fade);
        pad.source.stop(now + fade + STOP_SAFETY_MARGIN);
    }

    /// Sets the master volume immediately, dropping any pending master automation.
    /// Out of range values are clamped to 0.0 to 1.0.
    pub fn set_volume(&self, level: f32) {
        let level = clamp_volume(level);
        let context = self.context.lock();
        if let Some(context) = context.as_ref() {
            context.master_gain().set_value(level);
        }
        self.state.send_modify(|state| state.volume = level);
        debug!(volume = level, "Volume set");
    }

    /// Sets the master volume from a percentage.
    pub fn set_volume_percent(&self, percent: u8) {
        self.set_volume(f32::from(percent.min(100)) / 100.0);
    }

    /// The key most recently selected.
    pub fn active_key(&self) -> Option<Key> {
        self.state.borrow().active_key
    }

    /// The master volume, 0.0 to 1.0.
    pub fn volume(&self) -> f32 {
        self.state.borrow().volume
    }

    /// The master volume as a percentage.
    pub fn volume_percent(&self) -> u8 {
        (self.volume() * 100.0).round() as u8
    }

    /// Watches the active key and volume.
    pub fn subscribe(&self) -> watch::Receiver<PadState> {
        self.state.subscribe()
    }

    /// Where the pad for `key` is fetched from.
    pub fn asset_location(&self, key: Key) -> String {
        assets::asset_location(
            &self.settings.base_path,
            &key.file_name(self.settings.naming, &self.settings.extension),
        )
    }

    /// Silences everything and releases the device. The engine can't be used afterwards.
    pub fn close(&self) {
        self.stop();
        self.closed.store(true, Ordering::SeqCst);
        if let Some(context) = self.context.lock().take() {
            context.close();
        }
        self.buffers.write().clear();
        info!("Pad engine closed");
    }

    /// The audio context, if one has been created.
    pub fn context(&self) -> Option<Arc<AudioContext>> {
        self.context.lock().clone()
    }

    fn set_active_key(&self, key: Option<Key>) {
        self.state.send_if_modified(|state| {
            let changed = state.active_key != key;
            state.active_key = key;
            changed
        });
    }
}

fn clamp_volume(level: f32) -> f32 {
    if level.is_nan() {
        0.0
    } else {
        level.clamp(0.0, 1.0)
    }
}
