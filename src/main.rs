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
use std::path::PathBuf;
use std::sync::Arc;

use ambipad::assets::Assets;
use ambipad::audio::{self, mock};
use ambipad::config;
use ambipad::controller::{keyboard, Controller};
use ambipad::engine::PadEngine;
use ambipad::keys::Key;
use clap::{crate_version, Parser, Subcommand};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A looping ambient pad player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the supported keys and where their pads are loaded from.
    Keys {
        /// The path to the pad player config.
        #[arg[short, long]]
        config: Option<PathBuf>,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Loads and decodes the pad for every key.
    Verify {
        /// The path to the pad player config.
        config: Option<PathBuf>,
    },
    /// Start will start the pad player.
    Start {
        /// The path to the pad player config.
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keys { config } => {
            let pads = config::load(config.as_deref())?;
            let engine = PadEngine::new(
                pads.settings()?,
                Arc::new(mock::Device::manual("keys")),
                Assets::for_base_path(pads.base_path()),
            );

            println!("Keys:");
            for key in Key::ALL {
                println!("- {}: {}", key, engine.asset_location(key));
            }
        }
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Verify { config } => {
            let pads = config::load(config.as_deref())?;
            // Decoding only needs a clock, so nothing is sent to a real device.
            let engine = PadEngine::new(
                pads.settings()?,
                Arc::new(mock::Device::manual("verify")),
                Assets::for_base_path(pads.base_path()),
            );

            let mut failures = 0;
            for key in Key::ALL {
                match engine.load_buffer(key).await {
                    Ok(buffer) => println!(
                        "- {}: ok ({:.1}s, {} channels)",
                        key,
                        buffer.duration().as_secs_f64(),
                        buffer.channel_count()
                    ),
                    Err(e) => {
                        failures += 1;
                        println!("- {}: {} ({})", key, e, engine.asset_location(key));
                    }
                }
            }
            engine.close();

            if failures > 0 {
                return Err(format!("{} of {} pads failed to load", failures, Key::ALL.len()).into());
            }
            println!("All pads loaded.");
        }
        Commands::Start { config } => {
            let pads = config::load(config.as_deref())?;
            let device = audio::get_device(&pads.audio())?;
            let engine = Arc::new(PadEngine::new(
                pads.settings()?,
                device,
                Assets::for_base_path(pads.base_path()),
            ));

            Controller::new(engine, Arc::new(keyboard::Driver::new()))
                .join()
                .await?;
        }
    }

    Ok(())
}
