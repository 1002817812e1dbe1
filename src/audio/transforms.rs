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

//! Pure, deterministic transforms over decoded sample buffers.
//!
//! Every function takes a buffer by reference and returns a new buffer;
//! nothing here mutates in place or touches shared state, so independent
//! buffers can be transformed from any number of threads.

use super::buffer::SampleBuffer;

/// Default RMS threshold for silence trimming.
pub const SILENCE_THRESHOLD: f32 = 0.005;

/// RMS analysis window length in milliseconds.
const RMS_WINDOW_MS: usize = 10;

/// How far the trimmed region backs off before the first sound (and pads
/// after the last), preserving attack transients.
const TRIM_PAD_MS: usize = 50;

/// Regions shorter than this are left untrimmed so the detector cannot eat
/// short percussive sounds.
const MIN_TRIM_REGION_MS: usize = 100;

/// Gain compensation for rate-shifted playback.
const RATE_UP_GAIN: f32 = 1.2;
const RATE_DOWN_GAIN: f32 = 1.1;

/// Reverses the sample order of every channel.
pub fn reverse(buffer: &SampleBuffer) -> SampleBuffer {
    let channels = buffer
        .channels()
        .iter()
        .map(|channel| channel.iter().rev().copied().collect())
        .collect();
    SampleBuffer::new(channels, buffer.sample_rate())
}

/// Trims leading and trailing silence using windowed RMS analysis.
///
/// Energy is measured over successive 10 ms windows of channel 0 only
/// (energy is assumed correlated across channels). The detected region
/// backs off 50 ms before the first audible window and pads 50 ms after
/// the last. When nothing exceeds the gate, or the detected region is
/// inverted or shorter than 100 ms, the buffer is returned unchanged.
pub fn trim_silence(buffer: &SampleBuffer, threshold: f32) -> SampleBuffer {
    let sample_rate = buffer.sample_rate() as usize;
    let window = (sample_rate * RMS_WINDOW_MS / 1000).max(1);
    let gate = threshold * 0.5;
    let samples = buffer.channel(0);

    let first_window = samples
        .chunks(window)
        .position(|chunk| rms(chunk) > gate);
    let last_window = samples
        .chunks(window)
        .rposition(|chunk| rms(chunk) > gate);

    let (first_window, last_window) = match (first_window, last_window) {
        (Some(first), Some(last)) => (first, last),
        // Nothing above the gate: leave the buffer alone rather than
        // trimming it to nothing.
        _ => return buffer.clone(),
    };

    let pad = sample_rate * TRIM_PAD_MS / 1000;
    let start = (first_window * window).saturating_sub(pad);
    let end = ((last_window + 1) * window + pad).min(buffer.frame_count());

    let min_region = sample_rate * MIN_TRIM_REGION_MS / 1000;
    if start >= end || end - start < min_region {
        return buffer.clone();
    }

    let channels = buffer
        .channels()
        .iter()
        .map(|channel| channel[start..end].to_vec())
        .collect();
    SampleBuffer::new(channels, buffer.sample_rate())
}

/// Resamples the buffer by a playback-rate multiplier.
///
/// The source is read faster (rate > 1) or slower (rate < 1) than it is
/// written, so pitch and duration change together. Output length is
/// `ceil(len / rate)`. Gain compensation (+20% up, +10% down) offsets the
/// perceived loudness change of rate-shifted playback.
pub fn apply_rate_effect(buffer: &SampleBuffer, rate: f32) -> SampleBuffer {
    debug_assert!(rate > 0.0, "playback rate must be positive");
    if rate <= 0.0 || rate == 1.0 {
        return buffer.clone();
    }
    let gain = if rate > 1.0 { RATE_UP_GAIN } else { RATE_DOWN_GAIN };

    let frame_count = buffer.frame_count();
    let out_frames = (frame_count as f64 / rate as f64).ceil() as usize;
    let channels = buffer
        .channels()
        .iter()
        .map(|channel| {
            (0..out_frames)
                .map(|i| interpolate(channel, i as f64 * rate as f64) * gain)
                .collect()
        })
        .collect();
    SampleBuffer::new(channels, buffer.sample_rate())
}

/// Resamples the buffer to a new sample rate, preserving pitch.
///
/// Linear interpolation is used rather than a windowed-sinc resampler;
/// for one-shot pad samples the quality difference is inaudible.
pub fn resample(buffer: &SampleBuffer, target_rate: u32) -> SampleBuffer {
    if buffer.sample_rate() == target_rate {
        return buffer.clone();
    }
    let ratio = target_rate as f64 / buffer.sample_rate() as f64;
    let out_frames = (buffer.frame_count() as f64 * ratio).ceil() as usize;
    let channels = buffer
        .channels()
        .iter()
        .map(|channel| {
            (0..out_frames)
                .map(|i| interpolate(channel, i as f64 / ratio))
                .collect()
        })
        .collect();
    SampleBuffer::new(channels, target_rate)
}

/// Extracts the playable region between two points in seconds.
///
/// Bounds clamp to the buffer; an inverted or empty region yields the
/// full buffer unchanged.
pub fn slice_region(buffer: &SampleBuffer, start_secs: f32, end_secs: f32) -> SampleBuffer {
    let sample_rate = buffer.sample_rate() as f32;
    let frame_count = buffer.frame_count();
    let start = ((start_secs.max(0.0) * sample_rate) as usize).min(frame_count);
    let end = ((end_secs.max(0.0) * sample_rate) as usize).min(frame_count);
    if start >= end {
        return buffer.clone();
    }

    let channels = buffer
        .channels()
        .iter()
        .map(|channel| channel[start..end].to_vec())
        .collect();
    SampleBuffer::new(channels, buffer.sample_rate())
}

/// Reads a channel at a fractional position with linear interpolation.
/// Positions past the end read as the last sample, then zero.
fn interpolate(channel: &[f32], position: f64) -> f32 {
    let index = position.floor() as usize;
    let frac = position.fract() as f32;
    let s0 = channel.get(index).copied().unwrap_or(0.0);
    let s1 = channel.get(index + 1).copied().unwrap_or(s0);
    s0 + (s1 - s0) * frac
}

/// Root-mean-square energy of a slice of samples.
fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
