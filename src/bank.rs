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

//! The pad bank: the engine-side registry of pads.
//!
//! Each pad holds an optional decoded sample and its playback parameters.
//! Loading a fresh recording runs the capture pipeline (decode, silence
//! trim, resample to the bank rate); loading persisted audio skips the
//! trim since it was cleaned when first captured.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audio::chain;
use crate::audio::codec;
use crate::audio::device::OutputDevice;
use crate::audio::mixer::{next_source_id, ScheduledSource};
use crate::audio::transforms::{self, SILENCE_THRESHOLD};
use crate::audio::{DecodeError, DeviceError, SampleBuffer};
use crate::pad::PadParameters;
use crate::playsync::CancelHandle;

/// Number of pads created by default.
pub const PAD_COUNT: usize = 16;

/// Sample rate pads are stored at when no device dictates one.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Frames of headroom between "now" and a direct trigger's start, so the
/// source is always delivered ahead of the mixing position.
const TRIGGER_DELAY_FRAMES: u64 = 1024;

/// One pad: an optional decoded sample plus its parameters.
pub struct Pad {
    id: String,
    buffer: Option<Arc<SampleBuffer>>,
    /// Current playback parameters. Owned by the caller's UI conceptually;
    /// the engine reads them and snapshots them into recorded events.
    pub parameters: PadParameters,
}

impl Pad {
    fn new(id: String) -> Self {
        Self {
            id,
            buffer: None,
            parameters: PadParameters::default(),
        }
    }

    /// Returns the pad's ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the pad's decoded sample, if any.
    pub fn buffer(&self) -> Option<Arc<SampleBuffer>> {
        self.buffer.clone()
    }

    /// Returns true when the pad has audio loaded.
    pub fn has_audio(&self) -> bool {
        self.buffer.is_some()
    }
}

/// An ordered registry of pads sharing one sample rate.
pub struct PadBank {
    pads: Vec<Pad>,
    sample_rate: u32,
}

impl PadBank {
    /// Creates a bank with the default pad grid (`pad-0` .. `pad-15`).
    pub fn new(sample_rate: u32) -> Self {
        let pads = (0..PAD_COUNT)
            .map(|i| Pad::new(format!("pad-{}", i)))
            .collect();
        Self { pads, sample_rate }
    }

    /// Returns the bank's sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns all pads in order.
    pub fn pads(&self) -> &[Pad] {
        &self.pads
    }

    /// Returns the pad with the given ID.
    pub fn pad(&self, pad_id: &str) -> Option<&Pad> {
        self.pads.iter().find(|p| p.id == pad_id)
    }

    /// Returns the pad with the given ID mutably, creating it if the ID is
    /// outside the default grid (persisted boards may carry custom IDs).
    pub fn pad_mut(&mut self, pad_id: &str) -> &mut Pad {
        if let Some(index) = self.pads.iter().position(|p| p.id == pad_id) {
            return &mut self.pads[index];
        }
        self.pads.push(Pad::new(pad_id.to_string()));
        self.pads.last_mut().unwrap()
    }

    /// Returns the decoded sample for a pad, if present.
    pub fn buffer(&self, pad_id: &str) -> Option<Arc<SampleBuffer>> {
        self.pad(pad_id).and_then(|p| p.buffer())
    }

    /// Loads a raw captured recording onto a pad: decode, trim silence,
    /// resample to the bank rate.
    pub fn load_recording(
        &mut self,
        pad_id: &str,
        bytes: &[u8],
        extension_hint: Option<&str>,
    ) -> Result<(), DecodeError> {
        let decoded = codec::decode(bytes, extension_hint)?;
        let cleaned = transforms::trim_silence(&decoded, SILENCE_THRESHOLD);
        let stored = transforms::resample(&cleaned, self.sample_rate);

        info!(
            pad = pad_id,
            frames = stored.frame_count(),
            channels = stored.channel_count(),
            trimmed = cleaned.frame_count() != decoded.frame_count(),
            "Recording loaded"
        );
        self.pad_mut(pad_id).buffer = Some(Arc::new(stored));
        Ok(())
    }

    /// Places an already-decoded sample onto a pad (persisted loads).
    pub fn set_sample(&mut self, pad_id: &str, buffer: SampleBuffer) {
        let stored = transforms::resample(&buffer, self.sample_rate);
        self.pad_mut(pad_id).buffer = Some(Arc::new(stored));
    }

    /// Clears a pad's audio.
    pub fn clear(&mut self, pad_id: &str) {
        if let Some(index) = self.pads.iter().position(|p| p.id == pad_id) {
            self.pads[index].buffer = None;
        }
    }

    /// Plays one pad immediately through the shared output device.
    ///
    /// An empty pad is a normal, silently skipped condition: the trigger
    /// returns Ok(None) rather than an error. The returned handle cancels
    /// this one playback.
    pub fn trigger(
        &self,
        pad_id: &str,
        device: &OutputDevice,
    ) -> Result<Option<CancelHandle>, DeviceError> {
        let pad = match self.pad(pad_id) {
            Some(pad) => pad,
            None => {
                warn!(pad = pad_id, "Trigger for unknown pad ignored");
                return Ok(None);
            }
        };
        let buffer = match pad.buffer() {
            Some(buffer) => buffer,
            None => {
                debug!(pad = pad_id, "Trigger for empty pad ignored");
                return Ok(None);
            }
        };

        let rendered = chain::render_pad(&buffer, &pad.parameters, chain::pad_seed(pad_id));
        let rendered = transforms::resample(&rendered, device.sample_rate());

        let mixer = device.mixer();
        let cancel_handle = CancelHandle::new();
        let source = ScheduledSource {
            id: next_source_id(),
            buffer: Arc::new(rendered),
            gain: pad.parameters.gain(),
            start_frame: mixer.current_frame() + TRIGGER_DELAY_FRAMES,
            cancel_handle: cancel_handle.clone(),
        };
        if mixer.sender().send(source).is_err() {
            warn!(pad = pad_id, "Failed to send source to mixer");
        }

        debug!(pad = pad_id, "Pad triggered");
        Ok(Some(cancel_handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{burst_buffer, sine_buffer};

    #[test]
    fn test_default_grid() {
        let bank = PadBank::new(DEFAULT_SAMPLE_RATE);
        assert_eq!(bank.pads().len(), PAD_COUNT);
        assert_eq!(bank.pads()[0].id(), "pad-0");
        assert_eq!(bank.pads()[15].id(), "pad-15");
        assert!(bank.pads().iter().all(|p| !p.has_audio()));
    }

    #[test]
    fn test_load_recording_runs_capture_pipeline() {
        let mut bank = PadBank::new(DEFAULT_SAMPLE_RATE);

        // Half a second of silence around a half-second tone; the capture
        // pipeline must trim the silence away.
        let raw = burst_buffer(44100, 22050, 22050, 22050, 0.5);
        let bytes = codec::encode(&raw).unwrap();
        bank.load_recording("pad-2", &bytes, Some("wav")).unwrap();

        let loaded = bank.buffer("pad-2").unwrap();
        assert!(loaded.frame_count() < raw.frame_count());
        assert_eq!(loaded.sample_rate(), DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_load_recording_rejects_garbage() {
        let mut bank = PadBank::new(DEFAULT_SAMPLE_RATE);
        let result = bank.load_recording("pad-0", b"not audio", None);
        assert!(result.is_err());
        assert!(!bank.pad("pad-0").unwrap().has_audio());
    }

    #[test]
    fn test_set_sample_resamples_to_bank_rate() {
        let mut bank = PadBank::new(48000);
        bank.set_sample("pad-1", sine_buffer(440.0, 44100, 44100, 1));

        let loaded = bank.buffer("pad-1").unwrap();
        assert_eq!(loaded.sample_rate(), 48000);
        assert_eq!(loaded.frame_count(), 48000);
    }

    #[test]
    fn test_custom_pad_ids_are_created_on_demand() {
        let mut bank = PadBank::new(DEFAULT_SAMPLE_RATE);
        bank.set_sample("loop-a", sine_buffer(440.0, 44100, 100, 1));
        assert!(bank.pad("loop-a").unwrap().has_audio());
        assert_eq!(bank.pads().len(), PAD_COUNT + 1);
    }

    #[test]
    fn test_clear() {
        let mut bank = PadBank::new(DEFAULT_SAMPLE_RATE);
        bank.set_sample("pad-4", sine_buffer(440.0, 44100, 100, 1));
        bank.clear("pad-4");
        assert!(!bank.pad("pad-4").unwrap().has_audio());
    }
}
