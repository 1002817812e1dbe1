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

//! Per-pad playback parameters.
//!
//! These are value types owned by the caller (typically a UI layer). The
//! engine reads them but never mutates them; recording a sequence clones
//! them into each event so later edits cannot alter captured events.

use serde::{Deserialize, Serialize};

/// Default reverb tail length in seconds.
pub const DEFAULT_REVERB_TIME: f32 = 1.7;

/// Default reverb decay parameter (0..10).
pub const DEFAULT_REVERB_DECAY: f32 = 1.10;

/// Default reverb wet/dry mix (0..1).
pub const DEFAULT_REVERB_MIX: f32 = 0.36;

/// Maximum pad volume step.
pub const MAX_VOLUME: u8 = 10;

/// The pitch effect applied to a pad.
///
/// Both variants are rate-based: pitch and duration change together, which
/// is the intended lo-fi character of the effect.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// No pitch effect.
    #[default]
    None,
    /// Plays the sample faster (rate 1.5), raising the pitch.
    PitchUp,
    /// Plays the sample slower (rate 0.6), lowering the pitch.
    PitchDown,
}

impl Effect {
    /// Returns the playback-rate multiplier for this effect, or None when
    /// no rate change applies.
    pub fn rate(&self) -> Option<f32> {
        match self {
            Effect::None => None,
            Effect::PitchUp => Some(1.5),
            Effect::PitchDown => Some(0.6),
        }
    }
}

/// The full set of playback parameters for one pad.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PadParameters {
    /// The pitch effect for this pad.
    pub effect: Effect,

    /// Whether the sample plays back reversed.
    pub reversed: bool,

    /// Volume step from 0 (silent) to 10 (full).
    pub volume: u8,

    /// Whether the synthetic convolution reverb is applied.
    pub reverb: bool,

    /// Reverb tail length in seconds.
    pub reverb_time: f32,

    /// Reverb decay parameter (0..10). Larger values fade slower; the
    /// value feeds the envelope exponent as a divisor.
    pub reverb_decay: f32,

    /// Reverb wet/dry mix (0..1).
    pub reverb_mix: f32,

    /// Start of the playable region in seconds. None plays from the start.
    pub trim_start: Option<f32>,

    /// End of the playable region in seconds. None plays to the end.
    pub trim_end: Option<f32>,
}

impl Default for PadParameters {
    fn default() -> Self {
        Self {
            effect: Effect::None,
            reversed: false,
            volume: MAX_VOLUME,
            reverb: false,
            reverb_time: DEFAULT_REVERB_TIME,
            reverb_decay: DEFAULT_REVERB_DECAY,
            reverb_mix: DEFAULT_REVERB_MIX,
            trim_start: None,
            trim_end: None,
        }
    }
}

impl PadParameters {
    /// Returns the linear gain for this pad's volume step.
    pub fn gain(&self) -> f32 {
        self.volume.min(MAX_VOLUME) as f32 / MAX_VOLUME as f32
    }

    /// Returns the trim region in seconds when either bound is set.
    ///
    /// The fallback end bound is the given buffer duration so that a record
    /// with only a start bound still resolves to a concrete region.
    pub fn trim_region(&self, duration_secs: f32) -> Option<(f32, f32)> {
        if self.trim_start.is_none() && self.trim_end.is_none() {
            return None;
        }
        let start = self.trim_start.unwrap_or(0.0);
        let end = self.trim_end.unwrap_or(duration_secs);
        Some((start, end))
    }
}
