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

//! Trigger-sequence capture.
//!
//! A recording session is an explicit object owned by the caller; there is
//! no hidden process-wide recorder state, so concurrent sessions remain
//! representable. Every recorded event carries a value copy of the pad's
//! parameters at trigger time: later edits to a pad must never alter an
//! already-captured event.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::pad::PadParameters;

/// Hard safety cap on recording length. A stuck capture source cannot
/// grow a sequence past this point.
pub const MAX_RECORDING_MS: f64 = 60_000.0;

/// One captured pad trigger.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SequenceEvent {
    /// The pad that was triggered.
    pub pad_id: String,
    /// Milliseconds since the recording epoch. Non-negative.
    pub timestamp_ms: f64,
    /// The pad's parameters as they were at trigger time.
    pub parameters: PadParameters,
}

/// An ordered, frozen-after-recording list of trigger events.
///
/// The start reference is always 0; `end_time_ms` tracks the latest event
/// timestamp seen while recording.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Sequence {
    events: Vec<SequenceEvent>,
    end_time_ms: f64,
}

impl Sequence {
    /// Builds a sequence directly from events, deriving the end time.
    /// Useful for deserialized and hand-built sequences.
    pub fn from_events(events: Vec<SequenceEvent>) -> Self {
        let end_time_ms = events.iter().map(|e| e.timestamp_ms).fold(0.0, f64::max);
        Self {
            events,
            end_time_ms,
        }
    }

    /// Returns the captured events in capture order.
    pub fn events(&self) -> &[SequenceEvent] {
        &self.events
    }

    /// Returns the timestamp of the last event, in milliseconds.
    pub fn end_time_ms(&self) -> f64 {
        self.end_time_ms
    }

    /// Returns the number of captured events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true when no events were captured.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// An in-progress recording. Created by `start`, consumed by `stop`.
pub struct RecordingSession {
    sequence: Sequence,
    started_at: Instant,
    frozen: bool,
}

impl RecordingSession {
    /// Starts a new recording anchored at time 0.
    pub fn start() -> Self {
        info!("Recording session started");
        Self {
            sequence: Sequence::default(),
            started_at: Instant::now(),
            frozen: false,
        }
    }

    /// Milliseconds elapsed since the session epoch.
    pub fn elapsed_ms(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64() * 1000.0
    }

    /// Records one trigger at the session's own clock position.
    pub fn record_now(&mut self, pad_id: &str, parameters: &PadParameters) -> bool {
        self.record(pad_id, self.elapsed_ms(), parameters)
    }

    /// Records one trigger at an explicit offset from the epoch.
    ///
    /// Rapid repeated triggers of the same pad are all kept; polyphony is
    /// never deduplicated. Returns false when the event was dropped: the
    /// session is frozen, or the trigger landed past the safety cap (which
    /// force-freezes the session).
    pub fn record(&mut self, pad_id: &str, elapsed_ms: f64, parameters: &PadParameters) -> bool {
        if self.frozen {
            warn!(pad = pad_id, "Event after recording stopped, dropping");
            return false;
        }
        if elapsed_ms >= MAX_RECORDING_MS {
            warn!(
                pad = pad_id,
                elapsed_ms, "Recording safety cap reached, force-stopping"
            );
            self.frozen = true;
            return false;
        }

        let timestamp_ms = elapsed_ms.max(0.0);
        self.sequence.events.push(SequenceEvent {
            pad_id: pad_id.to_string(),
            timestamp_ms,
            // Value copy: the invariant that later pad edits do not touch
            // recorded events is enforced here, by the type.
            parameters: parameters.clone(),
        });
        self.sequence.end_time_ms = self.sequence.end_time_ms.max(timestamp_ms);

        debug!(
            pad = pad_id,
            timestamp_ms,
            events = self.sequence.events.len(),
            "Event recorded"
        );
        true
    }

    /// Returns true once the session no longer accepts events.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Stops recording and returns the frozen sequence.
    pub fn stop(mut self) -> Sequence {
        self.frozen = true;
        info!(
            events = self.sequence.events.len(),
            end_time_ms = self.sequence.end_time_ms,
            "Recording session stopped"
        );
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pad::Effect;

    #[test]
    fn test_record_and_trigger_scenario() {
        let mut session = RecordingSession::start();

        let params_a = PadParameters::default();
        let mut params_b = PadParameters::default();
        params_b.volume = 5;

        assert!(session.record("pad-a", 120.0, &params_a));
        assert!(session.record("pad-b", 450.0, &params_b));

        let sequence = session.stop();
        assert_eq!(sequence.len(), 2);
        assert_eq!(sequence.end_time_ms(), 450.0);
        assert_eq!(sequence.events()[0].pad_id, "pad-a");
        assert_eq!(sequence.events()[1].parameters.volume, 5);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_edits() {
        let mut session = RecordingSession::start();
        let mut params = PadParameters::default();
        params.effect = Effect::PitchUp;
        session.record("pad-0", 10.0, &params);

        // Edit the pad after the event was captured.
        params.effect = Effect::PitchDown;
        params.volume = 1;

        let sequence = session.stop();
        assert_eq!(sequence.events()[0].parameters.effect, Effect::PitchUp);
        assert_eq!(sequence.events()[0].parameters.volume, 10);
    }

    #[test]
    fn test_rapid_fire_keeps_every_event() {
        let mut session = RecordingSession::start();
        let params = PadParameters::default();
        for i in 0..8 {
            assert!(session.record("pad-3", 100.0 + i as f64, &params));
        }
        assert_eq!(session.stop().len(), 8);
    }

    #[test]
    fn test_stop_freezes_the_sequence() {
        let mut session = RecordingSession::start();
        let params = PadParameters::default();
        session.record("pad-0", 10.0, &params);

        let sequence = session.stop();
        assert_eq!(sequence.len(), 1);
        // The sequence itself is a frozen value from here on; there is no
        // way to append to it.
    }

    #[test]
    fn test_safety_cap_force_stops() {
        let mut session = RecordingSession::start();
        let params = PadParameters::default();

        assert!(session.record("pad-0", 59_999.0, &params));
        assert!(!session.record("pad-0", 60_000.0, &params));
        assert!(session.is_frozen());
        // And nothing further is accepted, even at valid offsets.
        assert!(!session.record("pad-0", 100.0, &params));

        assert_eq!(session.stop().len(), 1);
    }

    #[test]
    fn test_negative_timestamps_clamp_to_zero() {
        let mut session = RecordingSession::start();
        session.record("pad-0", -5.0, &PadParameters::default());
        let sequence = session.stop();
        assert_eq!(sequence.events()[0].timestamp_ms, 0.0);
        assert_eq!(sequence.end_time_ms(), 0.0);
    }

    #[test]
    fn test_from_events_derives_end_time() {
        let make = |ts: f64| SequenceEvent {
            pad_id: "pad-0".to_string(),
            timestamp_ms: ts,
            parameters: PadParameters::default(),
        };
        // Deliberately out of order; the end time is still the maximum.
        let sequence = Sequence::from_events(vec![make(900.0), make(100.0), make(400.0)]);
        assert_eq!(sequence.end_time_ms(), 900.0);
        assert_eq!(sequence.len(), 3);
    }

    #[test]
    fn test_sequence_serde_round_trip() {
        let mut session = RecordingSession::start();
        session.record("pad-1", 33.0, &PadParameters::default());
        let sequence = session.stop();

        let json = serde_json::to_string(&sequence).unwrap();
        let parsed: Sequence = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sequence);
    }
}
