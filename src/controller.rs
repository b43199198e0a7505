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
use std::io;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, error, info, span, Instrument, Level};

use crate::assets::AssetFetcher;
use crate::engine::{PadEngine, PadState, Selection};
use crate::keys::Key;

pub mod keyboard;

/// Controller events that will trigger behavior in the pad engine.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// Selects a key. Selecting the key that's playing stops it.
    Select(Key),

    /// Fades out whatever is playing.
    Stop,

    /// Sets the master volume, in percent.
    Volume(u8),

    /// Lists the keys, marking the active one.
    Keys,

    /// Stops everything and shuts the controller down.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Drives a pad engine from a driver's events.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new<F: AssetFetcher>(engine: Arc<PadEngine<F>>, driver: Arc<dyn Driver>) -> Controller {
        Controller {
            handle: tokio::spawn(async move { Controller::trigger_events(engine, driver).await }),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers engine actions by watching the driver and getting events from it.
    async fn trigger_events<F: AssetFetcher>(engine: Arc<PadEngine<F>>, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);
        let status_handle = tokio::spawn(Controller::print_status(engine.subscribe()));

        async move {
            info!("Controller started.");

            while let Some(event) = events_rx.recv().await {
                debug!(event = format!("{:?}", event), "Received event.");

                match event {
                    // The selection is stamped here, in event order, so a later
                    // stop or selection always wins. Only the load runs on its own.
                    Event::Select(key) => match engine.select(key) {
                        Ok(Selection::Loading(action)) => {
                            let engine = engine.clone();
                            tokio::spawn(async move {
                                match engine.finish(key, action).await {
                                    Ok(outcome) => debug!(
                                        key = %key,
                                        outcome = format!("{:?}", outcome),
                                        "Selection resolved."
                                    ),
                                    Err(e) => debug!(key = %key, err = %e, "Selection failed."),
                                }
                            });
                        }
                        Ok(Selection::Stopped) => debug!(key = %key, "Selection toggled off."),
                        Err(e) => error!(key = %key, err = %e, "Unable to select key."),
                    },
                    Event::Stop => engine.stop(),
                    Event::Volume(percent) => engine.set_volume_percent(percent),
                    Event::Keys => println!("{}", key_list(engine.active_key())),
                    Event::Quit => break,
                }
            }

            info!("Controller closing.");
            engine.close();
            status_handle.abort();
            if let Err(e) = join_handle.await {
                error!("Error waiting for event monitor to stop: {}", e);
            }
        }
        .instrument(span)
        .await
    }

    /// Prints the engine state every time it changes.
    async fn print_status(mut state: tokio::sync::watch::Receiver<PadState>) {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            println!("{}", status_line(&current));
        }
    }
}

/// One line describing the engine state.
pub fn status_line(state: &PadState) -> String {
    let key = state
        .active_key
        .map_or("-".to_string(), |key| key.to_string());
    format!(
        "Key: {:<2}  Volume: {}%",
        key,
        (state.volume * 100.0).round() as u8
    )
}

/// All keys on one line, with the active one in brackets.
pub fn key_list(active_key: Option<Key>) -> String {
    Key::ALL
        .iter()
        .map(|key| {
            if Some(*key) == active_key {
                format!("[{}]", key)
            } else {
                key.to_string()
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod test {
    use std::{io, sync::Arc, time::Duration};

    use parking_lot::Mutex;
    use tokio::{sync::mpsc::Sender, task::JoinHandle};

    use crate::{
        audio::mock,
        engine::{EngineError, EngineSettings, PadEngine, PadState},
        keys::{AssetNaming, Key},
        testutil::{eventually_async, wav_bytes, TestFetcher},
    };

    use super::{key_list, status_line, Controller, Driver, Event};

    /// Hands the event sender to the test so it can inject events directly.
    #[derive(Default)]
    struct TestDriver {
        events_tx: Mutex<Option<Sender<Event>>>,
    }

    impl TestDriver {
        fn sender(&self) -> Option<Sender<Event>> {
            self.events_tx.lock().clone()
        }
    }

    impl Driver for TestDriver {
        fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
            *self.events_tx.lock() = Some(events_tx);
            tokio::spawn(async { Ok(()) })
        }
    }

    #[test]
    fn test_status_line() {
        assert_eq!(
            "Key: C#  Volume: 80%",
            status_line(&PadState {
                active_key: Some(Key::CSharp),
                volume: 0.8,
            })
        );
        assert_eq!(
            "Key: -   Volume: 0%",
            status_line(&PadState {
                active_key: None,
                volume: 0.0,
            })
        );
    }

    #[test]
    fn test_key_list() {
        assert_eq!(
            "C C# D D# E F F# G G# [A] A# B",
            key_list(Some(Key::A))
        );
        assert!(!key_list(None).contains('['));
    }

    fn test_engine(fetcher: &Arc<TestFetcher>) -> Arc<PadEngine<Arc<TestFetcher>>> {
        Arc::new(PadEngine::new(
            EngineSettings {
                fade: Duration::from_millis(10),
                base_path: "pads/".to_string(),
                extension: "wav".to_string(),
                naming: AssetNaming::Sharp,
                initial_volume: 0.8,
            },
            Arc::new(mock::Device::manual("mock-controller")),
            fetcher.clone(),
        ))
    }

    async fn start_controller(
        engine: &Arc<PadEngine<Arc<TestFetcher>>>,
    ) -> (Controller, Sender<Event>) {
        let driver = Arc::new(TestDriver::default());
        let controller = Controller::new(engine.clone(), driver.clone());
        eventually_async(
            || async { driver.sender().is_some() },
            "Driver never started",
        )
        .await;
        let events_tx = driver.sender().unwrap();
        (controller, events_tx)
    }

    /// Sends a volume change and waits for it. Events are handled in order, so
    /// everything sent before it has been handled too.
    async fn sync_events(
        engine: &Arc<PadEngine<Arc<TestFetcher>>>,
        events_tx: &Sender<Event>,
        percent: u8,
    ) {
        events_tx.send(Event::Volume(percent)).await.unwrap();
        eventually_async(
            || async { engine.volume_percent() == percent },
            "Volume change never handled",
        )
        .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_controller() {
        let fetcher = TestFetcher::new();
        fetcher.insert("pads/C.wav", wav_bytes(&[vec![0.5; 4410]], 44100));
        let engine = test_engine(&fetcher);
        let (mut controller, events_tx) = start_controller(&engine).await;

        events_tx.send(Event::Select(Key::C)).await.unwrap();
        events_tx.send(Event::Volume(40)).await.unwrap();
        eventually_async(
            || async {
                engine
                    .context()
                    .is_some_and(|context| context.mixer().active_voices() == 1)
            },
            "Pad never started",
        )
        .await;
        assert_eq!(Some(Key::C), engine.active_key());
        assert_eq!(40, engine.volume_percent());

        events_tx.send(Event::Stop).await.unwrap();
        eventually_async(
            || async { engine.active_key().is_none() },
            "Pad never stopped",
        )
        .await;

        events_tx.send(Event::Quit).await.unwrap();
        controller.join().await.unwrap();
        assert!(matches!(
            engine.play(Key::C).await,
            Err(EngineError::Closed)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_later_events_win() {
        let fetcher = TestFetcher::new();
        fetcher.insert("pads/C.wav", wav_bytes(&[vec![0.5; 4410]], 44100));
        fetcher.insert("pads/D.wav", wav_bytes(&[vec![0.25; 4410]], 44100));
        let engine = test_engine(&fetcher);

        // Decode both pads up front so selections resolve as fast as possible.
        engine.load_buffer(Key::C).await.unwrap();
        engine.load_buffer(Key::D).await.unwrap();
        let mixer = engine.context().unwrap().mixer().clone();
        // Well past the fade and the stop margin.
        let settle_frames = 4410;

        let (mut controller, events_tx) = start_controller(&engine).await;

        for round in 0..50u8 {
            let percent = 10 + (round % 2) * 10;

            events_tx.send(Event::Select(Key::C)).await.unwrap();
            events_tx.send(Event::Stop).await.unwrap();
            sync_events(&engine, &events_tx, percent).await;
            assert_eq!(None, engine.active_key(), "round {}", round);
            mixer.render_frames(settle_frames);
            assert_eq!(0, mixer.active_voices(), "round {}", round);

            events_tx.send(Event::Select(Key::C)).await.unwrap();
            events_tx.send(Event::Select(Key::D)).await.unwrap();
            sync_events(&engine, &events_tx, percent + 5).await;
            assert_eq!(Some(Key::D), engine.active_key(), "round {}", round);

            // Only D is left once everything has faded.
            let expected = 0.25 * f32::from(percent + 5) / 100.0;
            eventually_async(
                || async {
                    let frames = mixer.render_frames(settle_frames);
                    mixer.active_voices() == 1
                        && (frames[frames.len() - 1] - expected).abs() < 1e-4
                },
                "D never took over",
            )
            .await;

            events_tx.send(Event::Stop).await.unwrap();
        }

        events_tx.send(Event::Quit).await.unwrap();
        controller.join().await.unwrap();
    }
}
