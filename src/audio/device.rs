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

//! The shared realtime output device.
//!
//! The device is process-wide and lazily created on first use. The cpal
//! stream lives on its own thread (streams are not sendable) and pulls
//! blocks from the mixer; the engine only ever schedules sources, it
//! never blocks on or touches the audio thread directly. If the stream
//! reports an error the device marks itself dead and the next
//! `shared_output` call transparently builds a fresh one; a failure to
//! rebuild is surfaced to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use parking_lot::Mutex;
use tracing::{info, warn};

use super::error::DeviceError;
use super::mixer::Mixer;

/// The process-wide output device, if one has been opened.
static SHARED_DEVICE: Mutex<Option<Arc<OutputDevice>>> = Mutex::new(None);

/// How long stream construction may take before the open fails.
const STREAM_READY_TIMEOUT: Duration = Duration::from_secs(5);

/// A running realtime output stream fed by a mixer.
pub struct OutputDevice {
    mixer: Arc<Mixer>,
    alive: Arc<AtomicBool>,
}

impl OutputDevice {
    /// Returns the mixer feeding this device.
    pub fn mixer(&self) -> &Arc<Mixer> {
        &self.mixer
    }

    /// Returns the output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.mixer.sample_rate()
    }

    /// Returns false once the underlying stream has reported an error.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Opens the default output device and starts its stream.
    fn open() -> Result<Arc<OutputDevice>, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DeviceError::NoOutputDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;
        let sample_format = config.sample_format();
        let stream_config: StreamConfig = config.into();

        let mixer = Arc::new(Mixer::new(
            stream_config.channels,
            stream_config.sample_rate,
        ));
        let alive = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        {
            let mixer = mixer.clone();
            let alive = alive.clone();
            thread::spawn(move || {
                run_stream(device, stream_config, sample_format, mixer, alive, ready_tx)
            });
        }

        match ready_rx.recv_timeout(STREAM_READY_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                alive.store(false, Ordering::Relaxed);
                return Err(DeviceError::Stream(
                    "audio thread did not report readiness".to_string(),
                ));
            }
        }

        info!(
            sample_rate = mixer.sample_rate(),
            channels = mixer.channels(),
            "Audio output stream started"
        );
        Ok(Arc::new(OutputDevice { mixer, alive }))
    }
}

/// Returns the shared output device, creating or reviving it as needed.
///
/// An already-running device is never re-created. A device whose stream
/// reported a closed/error state is replaced with a fresh instance; if
/// that rebuild also fails, the error is returned.
pub fn shared_output() -> Result<Arc<OutputDevice>, DeviceError> {
    let mut shared = SHARED_DEVICE.lock();
    if let Some(device) = shared.as_ref() {
        if device.is_alive() {
            return Ok(Arc::clone(device));
        }
        warn!("Audio device reported closed, reopening");
    }

    let device = OutputDevice::open()?;
    *shared = Some(Arc::clone(&device));
    Ok(device)
}

/// Lists the names of the available output devices.
pub fn list_output_devices() -> Result<Vec<String>, DeviceError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| DeviceError::Stream(e.to_string()))?;
    Ok(devices
        .map(|d| d.name().unwrap_or_else(|_| "unknown device".to_string()))
        .collect())
}

/// Owns the stream for its whole lifetime on a dedicated thread.
fn run_stream(
    device: cpal::Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    mixer: Arc<Mixer>,
    alive: Arc<AtomicBool>,
    ready_tx: crossbeam_channel::Sender<Result<(), DeviceError>>,
) {
    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer, alive.clone()),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer, alive.clone()),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer, alive.clone()),
        format => Err(DeviceError::UnsupportedFormat(format.to_string())),
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            alive.store(false, Ordering::Relaxed);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    // Keep the stream alive until the device is declared dead, then let
    // it drop with the thread.
    while alive.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(50));
    }
    drop(stream);
}

/// Builds and starts an output stream for one sample format.
fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mixer: Arc<Mixer>,
    alive: Arc<AtomicBool>,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + FromSample<f32>,
{
    let err_fn = {
        let alive = alive.clone();
        move |err| {
            warn!(error = %err, "Output stream error");
            alive.store(false, Ordering::Relaxed);
        }
    };

    let mut scratch: Vec<f32> = Vec::new();
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                mixer.fill(&mut scratch);
                for (out, sample) in data.iter_mut().zip(&scratch) {
                    *out = T::from_sample(*sample);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| DeviceError::Stream(e.to_string()))?;
    stream
        .play()
        .map_err(|e| DeviceError::Stream(e.to_string()))?;
    Ok(stream)
}
