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

//! Test utilities for generating signals and comparing results.

use crate::audio::SampleBuffer;

/// Generates a sine tone buffer. Every channel carries the same signal.
pub fn sine_buffer(freq: f32, sample_rate: u32, frames: usize, channels: usize) -> SampleBuffer {
    let samples: Vec<f32> = (0..frames)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
        .collect();
    SampleBuffer::new(vec![samples; channels], sample_rate)
}

/// Generates a buffer of pure silence.
pub fn silent_buffer(sample_rate: u32, frames: usize, channels: usize) -> SampleBuffer {
    SampleBuffer::new(vec![vec![0.0; frames]; channels], sample_rate)
}

/// Generates silence, then a 440Hz tone at the given amplitude, then
/// silence again. Used to exercise the silence trimmer.
pub fn burst_buffer(
    sample_rate: u32,
    leading_silence: usize,
    tone_frames: usize,
    trailing_silence: usize,
    amplitude: f32,
) -> SampleBuffer {
    let mut samples = vec![0.0; leading_silence];
    samples.extend((0..tone_frames).map(|i| {
        amplitude * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sample_rate as f32).sin()
    }));
    samples.extend(std::iter::repeat(0.0).take(trailing_silence));
    SampleBuffer::new(vec![samples], sample_rate)
}

/// Asserts two sample slices are equal within a tolerance.
pub fn assert_samples_close(actual: &[f32], expected: &[f32], tolerance: f32) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!(
            (a - e).abs() <= tolerance,
            "sample {} differs: {} vs {} (tolerance {})",
            i,
            a,
            e,
            tolerance
        );
    }
}
