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

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::keys::Key;

const STOP: &str = "stop";
const VOLUME: &str = "volume";
const KEYS: &str = "keys";
const QUIT: &str = "quit";

/// A controller that drives the pad engine from lines typed on stdin.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and dispatches one line. Returns false once the input is exhausted
    /// or the user quit.
    fn monitor_io<R, W>(events_tx: &Sender<Event>, mut reader: R, mut writer: W) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command (<key>, {}, {} <0-100>, {}, {}): ",
            STOP, VOLUME, KEYS, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            events_tx
                .blocking_send(Event::Quit)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            return Ok(false);
        }

        let event = match parse_command(&input) {
            Ok(Some(event)) => event,
            Ok(None) => return Ok(true),
            Err(e) => {
                warn!(input = input.trim(), err = %e, "Unrecognized input");
                return Ok(true);
            }
        };

        let keep_going = event != Event::Quit;
        events_tx
            .blocking_send(event)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(keep_going)
    }
}

/// Parses one line of input into an event. Blank lines produce no event.
fn parse_command(input: &str) -> Result<Option<Event>, String> {
    let input = input.trim().to_lowercase();
    let mut parts = input.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };

    let event = match command {
        STOP => Event::Stop,
        KEYS => Event::Keys,
        QUIT | "exit" => Event::Quit,
        VOLUME | "vol" => {
            let level = parts
                .next()
                .ok_or_else(|| "volume needs a level".to_string())?;
            let percent = level
                .trim_end_matches('%')
                .parse::<u8>()
                .map_err(|e| format!("invalid volume '{}': {}", level, e))?;
            if percent > 100 {
                return Err(format!("volume {} is above 100", percent));
            }
            Event::Volume(percent)
        }
        _ => Event::Select(command.parse::<Key>().map_err(|e| e.to_string())?),
    };

    if parts.next().is_some() {
        return Err(format!("unexpected arguments after '{}'", command));
    }
    Ok(Some(event))
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::{self, BufReader, BufWriter};

    use tokio::sync::mpsc;

    use crate::controller::{keyboard::*, Event};
    use crate::keys::Key;

    fn get_event(line: &str) -> Result<(bool, Option<Event>), io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(line.as_bytes());

        let writer_bytes: Vec<u8> = vec![0; 255];
        let writer = BufWriter::new(writer_bytes);
        let keep_going = Driver::monitor_io(&sender, reader, writer)?;

        // Force the sender to close.
        drop(sender);
        Ok((keep_going, receiver.blocking_recv()))
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        assert_eq!((true, Some(Event::Select(Key::C))), get_event("C\n")?);
        assert_eq!((true, Some(Event::Select(Key::CSharp))), get_event("c#\n")?);
        assert_eq!((true, Some(Event::Select(Key::FSharp))), get_event("Fsharp\n")?);
        assert_eq!((true, Some(Event::Stop)), get_event("stop\n")?);
        assert_eq!((true, Some(Event::Keys)), get_event(KEYS)?);
        assert_eq!((true, Some(Event::Volume(65))), get_event("volume 65\n")?);
        assert_eq!((true, Some(Event::Volume(100))), get_event("vol 100%\n")?);
        assert_eq!((false, Some(Event::Quit)), get_event("quit\n")?);
        Ok(())
    }

    #[test]
    fn test_bad_input_is_ignored() -> Result<(), io::Error> {
        assert_eq!((true, None), get_event("\n")?);
        assert_eq!((true, None), get_event("H\n")?);
        assert_eq!((true, None), get_event("volume\n")?);
        assert_eq!((true, None), get_event("volume 101\n")?);
        assert_eq!((true, None), get_event("volume loud\n")?);
        assert_eq!((true, None), get_event("stop now\n")?);
        Ok(())
    }

    #[test]
    fn test_end_of_input_quits() -> Result<(), io::Error> {
        assert_eq!((false, Some(Event::Quit)), get_event("")?);
        Ok(())
    }
}
