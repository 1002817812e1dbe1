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

//! Sequence playback scheduling.
//!
//! Both execution modes run the same algorithm and differ only in how
//! time advances. Every event's buffer is fully pre-rendered (trim,
//! reverse, rate and reverb baked in) before the first event is
//! scheduled, so scheduling itself does no DSP work and cannot add
//! jitter. Events are scheduled independently at their own absolute
//! offsets: issue order does not matter, and a hand-built out-of-order
//! sequence plays correctly.
//!
//! An event whose pad has no audio is logged and skipped; one broken pad
//! never prevents the rest of the sequence from playing or rendering.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use super::recorder::{Sequence, SequenceEvent};
use crate::audio::chain;
use crate::audio::device::OutputDevice;
use crate::audio::mixer::{next_source_id, Mixer, ScheduledSource};
use crate::audio::transforms;
use crate::audio::SampleBuffer;
use crate::bank::PadBank;
use crate::playsync::CancelHandle;

/// Fixed tail appended to offline renders so the longest reverb tail is
/// never truncated.
pub const RENDER_TAIL_SECS: f64 = 3.0;

/// Offline renders are always stereo.
const RENDER_CHANNELS: u16 = 2;

/// Frames of headroom between "now" and the first realtime event, so
/// every source is delivered ahead of the mixing position.
const SCHEDULE_AHEAD_FRAMES: u64 = 2048;

/// Why an event could not be scheduled. These are logged and skipped,
/// never fatal to the sequence.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("pad {0} is not present in the bank")]
    UnknownPad(String),

    #[error("pad {0} has no audio loaded")]
    EmptyPad(String),
}

/// Cancels a scheduled sequence playback.
///
/// Cancellation is idempotent: sources that already finished are skipped
/// silently, pending sources never start, sounding sources stop on the
/// next mixed block.
pub struct PlaybackHandle {
    handles: Vec<CancelHandle>,
}

impl PlaybackHandle {
    /// Stops every still-pending or in-flight scheduled playback.
    pub fn cancel(&self) {
        for handle in &self.handles {
            handle.cancel();
        }
    }

    /// Returns true once every scheduled event finished or was cancelled.
    pub fn is_finished(&self) -> bool {
        self.handles.iter().all(|h| h.is_finished())
    }

    /// Returns the number of events that were actually scheduled.
    pub fn scheduled_count(&self) -> usize {
        self.handles.len()
    }
}

/// One event after pre-rendering: ready to hand to a mixer as-is.
struct PreparedEvent {
    buffer: Arc<SampleBuffer>,
    gain: f32,
    timestamp_ms: f64,
}

/// Plays a sequence in realtime against the device's audio clock.
///
/// Each event starts at `clock_start + timestamp` on the mixer's frame
/// clock. The pads' current parameters are irrelevant here: every event
/// plays its own frozen parameter snapshot.
pub fn play(sequence: &Sequence, bank: &PadBank, device: &OutputDevice) -> PlaybackHandle {
    let mixer = device.mixer();
    let (prepared, skipped) = prepare_events(sequence, bank, mixer.sample_rate());

    let clock_start = mixer.current_frame() + SCHEDULE_AHEAD_FRAMES;
    let sender = mixer.sender();
    let sample_rate = mixer.sample_rate();

    let mut handles = Vec::with_capacity(prepared.len());
    for event in prepared {
        let cancel_handle = CancelHandle::new();
        let source = ScheduledSource {
            id: next_source_id(),
            buffer: event.buffer,
            gain: event.gain,
            start_frame: clock_start + ms_to_frames(event.timestamp_ms, sample_rate),
            cancel_handle: cancel_handle.clone(),
        };
        if sender.send(source).is_err() {
            warn!("Failed to send source to mixer");
            continue;
        }
        handles.push(cancel_handle);
    }

    info!(
        events = handles.len(),
        skipped, "Sequence playback scheduled"
    );
    PlaybackHandle { handles }
}

/// Renders a sequence offline into a stereo buffer at the bank rate.
///
/// Output length is fixed at `end_time + 3` seconds. The render is
/// deterministic: the same sequence and pad audio produce byte-identical
/// output on every call, because each event's reverb impulse is seeded
/// from the event itself.
pub fn render(sequence: &Sequence, bank: &PadBank) -> SampleBuffer {
    let sample_rate = bank.sample_rate();
    let (prepared, skipped) = prepare_events(sequence, bank, sample_rate);

    // Trust the events over the recorded end time in case the sequence
    // was assembled by hand.
    let end_ms = sequence
        .events()
        .iter()
        .map(|e| e.timestamp_ms)
        .fold(sequence.end_time_ms(), f64::max);
    let total_frames = ((end_ms / 1000.0 + RENDER_TAIL_SECS) * sample_rate as f64).round() as usize;

    let mixer = Mixer::new(RENDER_CHANNELS, sample_rate);
    let sender = mixer.sender();
    for event in prepared {
        let source = ScheduledSource {
            id: next_source_id(),
            buffer: event.buffer,
            gain: event.gain,
            start_frame: ms_to_frames(event.timestamp_ms, sample_rate),
            cancel_handle: CancelHandle::new(),
        };
        let _ = sender.send(source);
    }

    let samples = mixer.render(total_frames);
    info!(
        events = sequence.len(),
        skipped,
        frames = total_frames,
        "Sequence rendered offline"
    );
    SampleBuffer::from_interleaved(&samples, RENDER_CHANNELS as usize, sample_rate)
}

/// Pre-renders every event's effect chain at the target rate.
///
/// Events are independent pure transforms over their own buffers, so they
/// render in parallel; capture order is preserved in the result.
fn prepare_events(
    sequence: &Sequence,
    bank: &PadBank,
    target_rate: u32,
) -> (Vec<PreparedEvent>, usize) {
    let results: Vec<Result<PreparedEvent, SchedulingError>> = sequence
        .events()
        .par_iter()
        .map(|event| prepare_event(event, bank, target_rate))
        .collect();

    let mut prepared = Vec::with_capacity(results.len());
    let mut skipped = 0;
    for result in results {
        match result {
            Ok(event) => prepared.push(event),
            Err(e) => {
                warn!(error = %e, "Skipping event");
                skipped += 1;
            }
        }
    }
    (prepared, skipped)
}

fn prepare_event(
    event: &SequenceEvent,
    bank: &PadBank,
    target_rate: u32,
) -> Result<PreparedEvent, SchedulingError> {
    let pad = bank
        .pad(&event.pad_id)
        .ok_or_else(|| SchedulingError::UnknownPad(event.pad_id.clone()))?;
    let buffer = pad
        .buffer()
        .ok_or_else(|| SchedulingError::EmptyPad(event.pad_id.clone()))?;

    let rendered = chain::render_pad(
        &buffer,
        &event.parameters,
        chain::event_seed(&event.pad_id, event.timestamp_ms),
    );
    let rendered = transforms::resample(&rendered, target_rate);
    Ok(PreparedEvent {
        buffer: Arc::new(rendered),
        gain: event.parameters.gain(),
        timestamp_ms: event.timestamp_ms,
    })
}

/// Converts a millisecond offset to mixer frames.
fn ms_to_frames(ms: f64, sample_rate: u32) -> u64 {
    (ms / 1000.0 * sample_rate as f64).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::DEFAULT_SAMPLE_RATE;
    use crate::pad::PadParameters;
    use crate::sequence::recorder::RecordingSession;
    use crate::testutil::sine_buffer;

    fn click_bank() -> PadBank {
        let mut bank = PadBank::new(DEFAULT_SAMPLE_RATE);
        bank.set_sample(
            "pad-0",
            SampleBuffer::new(vec![vec![1.0]], DEFAULT_SAMPLE_RATE),
        );
        bank.set_sample("pad-1", sine_buffer(440.0, DEFAULT_SAMPLE_RATE, 2205, 1));
        bank
    }

    fn two_event_sequence() -> Sequence {
        let mut session = RecordingSession::start();
        let mut reverbed = PadParameters::default();
        reverbed.reverb = true;
        reverbed.reverb_time = 0.1;
        session.record("pad-0", 120.0, &PadParameters::default());
        session.record("pad-1", 450.0, &reverbed);
        session.stop()
    }

    #[test]
    fn test_render_length_is_end_plus_tail() {
        let bank = click_bank();
        let rendered = render(&two_event_sequence(), &bank);

        let expected = ((0.45 + RENDER_TAIL_SECS) * DEFAULT_SAMPLE_RATE as f64).round() as usize;
        assert_eq!(rendered.frame_count(), expected);
        assert_eq!(rendered.channel_count(), 2);
        assert_eq!(rendered.sample_rate(), DEFAULT_SAMPLE_RATE);
    }

    #[test]
    fn test_render_places_events_at_exact_offsets() {
        let bank = click_bank();
        let mut session = RecordingSession::start();
        session.record("pad-0", 500.0, &PadParameters::default());
        let rendered = render(&session.stop(), &bank);

        // The single-frame click lands exactly at 500ms on both channels.
        let frame = DEFAULT_SAMPLE_RATE as usize / 2;
        assert_eq!(rendered.channel(0)[frame], 1.0);
        assert_eq!(rendered.channel(1)[frame], 1.0);
        assert!(rendered.channel(0)[..frame].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_render_applies_event_volume_snapshot() {
        let bank = click_bank();
        let mut session = RecordingSession::start();
        let mut half = PadParameters::default();
        half.volume = 5;
        session.record("pad-0", 0.0, &half);
        let rendered = render(&session.stop(), &bank);

        assert_eq!(rendered.channel(0)[0], 0.5);
    }

    #[test]
    fn test_render_is_deterministic() {
        let bank = click_bank();
        let sequence = two_event_sequence();

        let first = render(&sequence, &bank);
        let second = render(&sequence, &bank);
        assert_eq!(first.to_interleaved(), second.to_interleaved());
    }

    #[test]
    fn test_broken_events_never_abort_the_sequence() {
        let bank = click_bank();
        let mut session = RecordingSession::start();
        session.record("pad-0", 100.0, &PadParameters::default());
        session.record("pad-7", 200.0, &PadParameters::default()); // empty pad
        session.record("no-such-pad", 300.0, &PadParameters::default());
        let with_broken = render(&session.stop(), &bank);

        let mut session = RecordingSession::start();
        session.record("pad-0", 100.0, &PadParameters::default());
        let only_valid = render(&session.stop(), &bank);

        // The valid event still renders; the broken ones contribute
        // nothing but do keep their place in the timeline length.
        let frame = (0.1 * DEFAULT_SAMPLE_RATE as f64).round() as usize;
        assert_eq!(with_broken.channel(0)[frame], 1.0);
        assert_eq!(only_valid.channel(0)[frame], 1.0);
    }

    #[test]
    fn test_out_of_order_sequences_render_correctly() {
        let bank = click_bank();
        let make = |ts: f64| crate::sequence::recorder::SequenceEvent {
            pad_id: "pad-0".to_string(),
            timestamp_ms: ts,
            parameters: PadParameters::default(),
        };
        let sequence = Sequence::from_events(vec![make(800.0), make(200.0)]);
        let rendered = render(&sequence, &bank);

        let at = |ms: f64| (ms / 1000.0 * DEFAULT_SAMPLE_RATE as f64).round() as usize;
        assert_eq!(rendered.channel(0)[at(200.0)], 1.0);
        assert_eq!(rendered.channel(0)[at(800.0)], 1.0);
        let expected = ((0.8 + RENDER_TAIL_SECS) * DEFAULT_SAMPLE_RATE as f64).round() as usize;
        assert_eq!(rendered.frame_count(), expected);
    }

    #[test]
    fn test_empty_sequence_renders_tail_of_silence() {
        let bank = click_bank();
        let rendered = render(&Sequence::default(), &bank);
        let expected = (RENDER_TAIL_SECS * DEFAULT_SAMPLE_RATE as f64).round() as usize;
        assert_eq!(rendered.frame_count(), expected);
        assert!(rendered.channel(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_playback_handle_cancel_is_idempotent() {
        let handle = PlaybackHandle {
            handles: vec![CancelHandle::new(), CancelHandle::new()],
        };
        assert_eq!(handle.scheduled_count(), 2);
        assert!(!handle.is_finished());

        handle.cancel();
        handle.cancel();
        assert!(handle.handles.iter().all(|h| h.is_cancelled()));
    }
}
