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
use std::{error::Error, fmt, sync::Arc, thread};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{error, info, span, warn, Level};

use super::{Device as AudioDevice, DeviceError, OutputFormat, OutputStream, PadMixer};
use crate::config::{self, StreamBufferSize};

/// A small wrapper around a cpal::Device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The maximum number of channels the device supports.
    max_channels: u16,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The underlying cpal device.
    device: cpal::Device,
    /// Audio configuration for the stream.
    audio_config: config::Audio,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, Box<dyn Error>> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, Box<dyn Error>> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                if let Some(device) = Device::from_cpal(host_id, device) {
                    devices.push(device);
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Wraps a cpal device if it has any output channels.
    fn from_cpal(host_id: cpal::HostId, device: cpal::Device) -> Option<Device> {
        let max_channels = max_output_channels(
            device
                .supported_output_configs()
                .ok()?
                .map(|output_config| output_config.channels()),
        )?;

        Some(Device {
            name: device.name().ok()?,
            max_channels,
            host_id,
            device,
            audio_config: config::Audio::default(),
        })
    }

    /// Gets the given cpal device. `default` selects the default host's default output.
    pub fn get(config: config::Audio) -> Result<Device, Box<dyn Error>> {
        let name = config.device().to_string();
        let device = if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| DeviceError::Unavailable("no default output device".into()))?;
            Device::from_cpal(host.id(), device)
        } else {
            Device::list_cpal_devices()?
                .into_iter()
                .find(|device| device.name.trim() == name)
        };

        match device {
            Some(mut device) => {
                device.audio_config = config;
                Ok(device)
            }
            None => Err(DeviceError::NotFound(name).into()),
        }
    }

    /// Builds the cpal stream config and reports the sample format to use.
    fn stream_config(&self) -> Result<(cpal::StreamConfig, cpal::SampleFormat), DeviceError> {
        let supported = self
            .device
            .default_output_config()
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        let buffer_size = buffer_size(
            self.audio_config
                .stream_buffer_size()
                .map_err(|e| DeviceError::Stream(e.to_string()))?,
            supported.buffer_size(),
        );

        let config = cpal::StreamConfig {
            channels: self.audio_config.channels().unwrap_or(supported.channels()),
            sample_rate: cpal::SampleRate(
                self.audio_config
                    .sample_rate()
                    .unwrap_or(supported.sample_rate().0),
            ),
            buffer_size,
        };
        Ok((config, supported_sample_format(supported.sample_format())?))
    }
}

/// The highest channel count among a device's output configs, or none if it has no outputs.
fn max_output_channels(channels: impl Iterator<Item = u16>) -> Option<u16> {
    channels.max().filter(|channels| *channels > 0)
}

/// Maps the configured buffer size choice onto what the device supports.
fn buffer_size(choice: StreamBufferSize, supported: &cpal::SupportedBufferSize) -> cpal::BufferSize {
    match choice {
        StreamBufferSize::Default => cpal::BufferSize::Default,
        StreamBufferSize::Fixed(frames) => cpal::BufferSize::Fixed(frames),
        StreamBufferSize::Min => match supported {
            cpal::SupportedBufferSize::Range { min, .. } => cpal::BufferSize::Fixed(*min),
            cpal::SupportedBufferSize::Unknown => cpal::BufferSize::Default,
        },
    }
}

/// Sample formats the output callbacks can render.
fn supported_sample_format(
    sample_format: cpal::SampleFormat,
) -> Result<cpal::SampleFormat, DeviceError> {
    match sample_format {
        cpal::SampleFormat::F32
        | cpal::SampleFormat::I16
        | cpal::SampleFormat::I32
        | cpal::SampleFormat::U16 => Ok(sample_format),
        other => Err(DeviceError::UnsupportedFormat(format!("{:?}", other))),
    }
}

/// Fails if the mixer wasn't created for the stream's format.
fn check_mixer_format(config: &cpal::StreamConfig, mixer: &PadMixer) -> Result<(), DeviceError> {
    if config.channels != mixer.num_channels() || config.sample_rate.0 != mixer.sample_rate() {
        return Err(DeviceError::Stream(format!(
            "mixer format ({} channels, {}Hz) doesn't match the stream ({} channels, {}Hz)",
            mixer.num_channels(),
            mixer.sample_rate(),
            config.channels,
            config.sample_rate.0
        )));
    }
    Ok(())
}

/// Converts rendered f32 samples into the device's sample type.
fn convert_samples<T>(source: &[f32], dest: &mut [T])
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    for (dst, &src) in dest.iter_mut().zip(source.iter()) {
        *dst = T::from_sample(src);
    }
}

/// f32 callback: render directly into the CPAL buffer.
fn create_f32_callback(
    mixer: Arc<PadMixer>,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        mixer.render(data);
    }
}

/// Integer callback: render into scratch and convert.
fn create_converting_callback<T>(
    mixer: Arc<PadMixer>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        scratch.resize(data.len(), 0.0);
        mixer.render(&mut scratch);
        convert_samples(&scratch, data);
    }
}

/// Builds an output stream in the given sample format.
fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: Arc<PadMixer>,
) -> Result<cpal::Stream, DeviceError> {
    let on_error = |err: cpal::StreamError| error!("CPAL output stream error: {}", err);
    let result = match sample_format {
        cpal::SampleFormat::F32 => {
            device.build_output_stream(config, create_f32_callback(mixer), on_error, None)
        }
        cpal::SampleFormat::I16 => device.build_output_stream(
            config,
            create_converting_callback::<i16>(mixer),
            on_error,
            None,
        ),
        cpal::SampleFormat::I32 => device.build_output_stream(
            config,
            create_converting_callback::<i32>(mixer),
            on_error,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_output_stream(
            config,
            create_converting_callback::<u16>(mixer),
            on_error,
            None,
        ),
        other => return Err(DeviceError::UnsupportedFormat(format!("{:?}", other))),
    };
    result.map_err(|e| DeviceError::Unavailable(e.to_string()))
}

/// Commands sent to the thread that owns the cpal stream.
enum Command {
    Resume(crossbeam_channel::Sender<Result<(), DeviceError>>),
    Suspend(crossbeam_channel::Sender<Result<(), DeviceError>>),
    Close,
}

/// A cpal stream. cpal streams can't move between threads, so the stream
/// lives on its own thread and is driven over a channel.
struct Stream {
    commands: crossbeam_channel::Sender<Command>,
    output_thread: Mutex<Option<thread::JoinHandle<()>>>,
}

impl Stream {
    fn request(
        &self,
        command: impl FnOnce(crossbeam_channel::Sender<Result<(), DeviceError>>) -> Command,
    ) -> Result<(), DeviceError> {
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);
        self.commands
            .send(command(reply_tx))
            .map_err(|_| DeviceError::Closed)?;
        reply_rx.recv().map_err(|_| DeviceError::Closed)?
    }
}

impl OutputStream for Stream {
    fn resume(&self) -> Result<(), DeviceError> {
        self.request(Command::Resume)
    }

    fn suspend(&self) -> Result<(), DeviceError> {
        self.request(Command::Suspend)
    }

    fn close(&self) {
        let _ = self.commands.send(Command::Close);
        if let Some(thread) = self.output_thread.lock().take() {
            let _ = thread.join();
        }
    }
}

impl AudioDevice for Device {
    fn output_format(&self) -> Result<OutputFormat, DeviceError> {
        let (config, _) = self.stream_config()?;
        Ok(OutputFormat {
            channels: config.channels,
            sample_rate: config.sample_rate.0,
        })
    }

    fn open(&self, mixer: Arc<PadMixer>) -> Result<Box<dyn OutputStream>, DeviceError> {
        let span = span!(Level::INFO, "open stream (cpal)");
        let _enter = span.enter();

        let (config, sample_format) = self.stream_config()?;
        check_mixer_format(&config, &mixer)?;

        let (setup_tx, setup_rx) = crossbeam_channel::bounded::<Result<(), DeviceError>>(1);
        let (commands, command_rx) = crossbeam_channel::unbounded::<Command>();
        let device = self.device.clone();
        let name = self.name.clone();
        let stream_config = config.clone();

        let output_thread = thread::spawn(move || {
            let stream = match build_stream(&device, &stream_config, sample_format, mixer) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = setup_tx.send(Err(e));
                    return;
                }
            };
            // Some backends start streams on creation; the context expects them suspended.
            if let Err(e) = stream.pause() {
                warn!(err = e.to_string(), "Unable to pause new stream");
            }
            let _ = setup_tx.send(Ok(()));

            while let Ok(command) = command_rx.recv() {
                match command {
                    Command::Resume(reply) => {
                        let _ = reply.send(
                            stream
                                .play()
                                .map_err(|e| DeviceError::Stream(e.to_string())),
                        );
                    }
                    Command::Suspend(reply) => {
                        let _ = reply.send(
                            stream
                                .pause()
                                .map_err(|e| DeviceError::Stream(e.to_string())),
                        );
                    }
                    Command::Close => break,
                }
            }
            info!(device = name, "CPAL output stream closed");
        });

        match setup_rx.recv() {
            Ok(Ok(())) => {
                info!(
                    device = self.name,
                    channels = config.channels,
                    sample_rate = config.sample_rate.0,
                    format = format!("{:?}", sample_format),
                    "CPAL output stream created"
                );
                Ok(Box::new(Stream {
                    commands,
                    output_thread: Mutex::new(Some(output_thread)),
                }))
            }
            Ok(Err(e)) => {
                let _ = output_thread.join();
                Err(e)
            }
            Err(_) => Err(DeviceError::Unavailable(
                "output thread exited before the stream was created".into(),
            )),
        }
    }
}
