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

//! The per-pad effect chain.
//!
//! Effects apply in a fixed order: trim region, reverse, rate effect,
//! reverb. Reordering changes the audible output, so both playback modes
//! and the offline renderer go through this one function.

use crate::pad::PadParameters;

use super::buffer::SampleBuffer;
use super::reverb::{self, ImpulseResponse};
use super::transforms;

/// Renders a pad's parameters onto a decoded sample, producing the buffer
/// that actually plays. Volume is not baked in here; it is applied as
/// source gain at mix time.
///
/// The seed feeds the reverb impulse noise; equal inputs and seed always
/// produce an identical buffer.
pub fn render_pad(buffer: &SampleBuffer, params: &PadParameters, seed: u64) -> SampleBuffer {
    let mut rendered = match params.trim_region(buffer.duration_secs()) {
        Some((start, end)) => transforms::slice_region(buffer, start, end),
        None => buffer.clone(),
    };

    if params.reversed {
        rendered = transforms::reverse(&rendered);
    }
    if let Some(rate) = params.effect.rate() {
        rendered = transforms::apply_rate_effect(&rendered, rate);
    }
    if params.reverb {
        let impulse = ImpulseResponse::synthesize(
            params.reverb_time,
            params.reverb_decay,
            rendered.sample_rate(),
            seed,
        );
        rendered = reverb::apply_reverb(&rendered, &impulse, params.reverb_mix);
    }
    rendered
}

/// Derives the impulse seed for a recorded event.
///
/// Stable across runs so offline renders of the same sequence are
/// byte-identical, while distinct events still get distinct noise.
pub fn event_seed(pad_id: &str, timestamp_ms: f64) -> u64 {
    pad_seed(pad_id) ^ timestamp_ms.to_bits()
}

/// Derives the impulse seed for a direct (unsequenced) pad trigger.
pub fn pad_seed(pad_id: &str) -> u64 {
    // FNV-1a over the pad id.
    pad_id.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ byte as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}
