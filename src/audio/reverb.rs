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

//! Synthetic convolution reverb.
//!
//! The impulse response is procedurally generated decaying white noise;
//! convolving a sample with it imparts the reverberant character. Impulses
//! are ephemeral: synthesized fresh per application from the reverb
//! parameters and never shared across pads, since parameters may differ
//! per pad and per recorded event.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use realfft::RealFftPlanner;

use super::buffer::SampleBuffer;

/// Impulse responses are always synthesized with two channels.
const IMPULSE_CHANNELS: usize = 2;

/// A synthesized impulse response.
pub struct ImpulseResponse {
    buffer: SampleBuffer,
}

impl ImpulseResponse {
    /// Synthesizes a decaying-noise impulse response.
    ///
    /// Each sample is `uniform(-1, 1) * (1 - i/len)^exponent` with
    /// `exponent = 1 / (1 + clamp(decay, 0.01, 10))`. Note that `decay`
    /// feeds the exponent as a divisor: larger values flatten the envelope
    /// and lengthen the perceived tail. That inverse mapping is part of
    /// the parameter contract and must not be "corrected" here.
    ///
    /// The seed fully determines the noise, so equal parameters and seed
    /// yield an identical impulse.
    pub fn synthesize(time_secs: f32, decay: f32, sample_rate: u32, seed: u64) -> Self {
        let frame_count = ((sample_rate as f32 * time_secs).round() as usize).max(1);
        let exponent = 1.0 / (1.0 + decay.clamp(0.01, 10.0));
        let mut rng = StdRng::seed_from_u64(seed);

        let channels = (0..IMPULSE_CHANNELS)
            .map(|_| {
                (0..frame_count)
                    .map(|i| {
                        let envelope = (1.0 - i as f32 / frame_count as f32).powf(exponent);
                        rng.gen_range(-1.0_f32..1.0) * envelope
                    })
                    .collect()
            })
            .collect();
        Self {
            buffer: SampleBuffer::new(channels, sample_rate),
        }
    }

    /// Wraps an existing buffer as an impulse response (test only).
    #[cfg(test)]
    pub fn from_buffer(buffer: SampleBuffer) -> Self {
        Self { buffer }
    }

    /// Returns the impulse length in frames.
    pub fn frame_count(&self) -> usize {
        self.buffer.frame_count()
    }

    /// Returns the underlying sample data.
    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }
}

/// Convolves the buffer with an impulse response and blends the result.
///
/// Output length is `input + impulse - 1` frames so the reverb tail is
/// never truncated. The result is `(1 - mix) * dry + mix * wet` per
/// sample, with the dry signal zero-padded to the output length; `mix`
/// is clamped to [0, 1].
pub fn apply_reverb(buffer: &SampleBuffer, impulse: &ImpulseResponse, mix: f32) -> SampleBuffer {
    let mix = mix.clamp(0.0, 1.0);
    let out_frames = buffer.frame_count() + impulse.frame_count() - 1;
    let impulse_channels = impulse.buffer().channel_count();

    let channels = buffer
        .channels()
        .iter()
        .enumerate()
        .map(|(ch, dry)| {
            let kernel = impulse.buffer().channel(ch % impulse_channels);
            let wet = convolve(dry, kernel);
            (0..out_frames)
                .map(|i| {
                    let dry_sample = dry.get(i).copied().unwrap_or(0.0);
                    (1.0 - mix) * dry_sample + mix * wet[i]
                })
                .collect()
        })
        .collect();
    SampleBuffer::new(channels, buffer.sample_rate())
}

/// Linear convolution of a signal with a kernel via the FFT.
///
/// Direct convolution is quadratic and unusable for seconds-long
/// impulses; one forward/inverse pair over the padded length keeps this
/// at O(n log n).
fn convolve(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    let out_len = signal.len() + kernel.len() - 1;
    let fft_len = out_len.next_power_of_two().max(2);

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(fft_len);
    let ifft = planner.plan_fft_inverse(fft_len);

    let mut padded_signal = vec![0.0; fft_len];
    padded_signal[..signal.len()].copy_from_slice(signal);
    let mut padded_kernel = vec![0.0; fft_len];
    padded_kernel[..kernel.len()].copy_from_slice(kernel);

    let mut signal_spectrum = fft.make_output_vec();
    let mut kernel_spectrum = fft.make_output_vec();
    fft.process(&mut padded_signal, &mut signal_spectrum)
        .expect("buffer lengths are fixed by the planner");
    fft.process(&mut padded_kernel, &mut kernel_spectrum)
        .expect("buffer lengths are fixed by the planner");

    for (s, k) in signal_spectrum.iter_mut().zip(&kernel_spectrum) {
        *s *= *k;
    }
    // The inverse transform requires a strictly hermitian spectrum: the DC
    // and Nyquist bins must carry no imaginary part.
    signal_spectrum[0].im = 0.0;
    if let Some(last) = signal_spectrum.last_mut() {
        last.im = 0.0;
    }

    let mut output = vec![0.0; fft_len];
    ifft.process(&mut signal_spectrum, &mut output)
        .expect("buffer lengths are fixed by the planner");

    let norm = 1.0 / fft_len as f32;
    output.truncate(out_len);
    for sample in output.iter_mut() {
        *sample *= norm;
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{assert_samples_close, sine_buffer};

    /// A single-frame unit impulse: convolution with it is the identity.
    fn unit_impulse(sample_rate: u32) -> ImpulseResponse {
        ImpulseResponse::from_buffer(SampleBuffer::new(vec![vec![1.0], vec![1.0]], sample_rate))
    }

    #[test]
    fn test_impulse_length_and_shape() {
        let impulse = ImpulseResponse::synthesize(1.7, 1.10, 44100, 7);
        assert_eq!(impulse.frame_count(), (44100.0_f32 * 1.7).round() as usize);
        assert_eq!(impulse.buffer().channel_count(), 2);

        // The envelope bounds every sample by (1 - i/len)^e.
        let exponent = 1.0 / (1.0 + 1.10_f32);
        let len = impulse.frame_count();
        for (i, sample) in impulse.buffer().channel(0).iter().enumerate().step_by(997) {
            let bound = (1.0 - i as f32 / len as f32).powf(exponent);
            assert!(sample.abs() <= bound + 1e-6);
        }
    }

    #[test]
    fn test_impulse_is_seed_deterministic() {
        let a = ImpulseResponse::synthesize(0.25, 3.0, 44100, 42);
        let b = ImpulseResponse::synthesize(0.25, 3.0, 44100, 42);
        assert_eq!(a.buffer(), b.buffer());

        let c = ImpulseResponse::synthesize(0.25, 3.0, 44100, 43);
        assert_ne!(a.buffer(), c.buffer());
    }

    #[test]
    fn test_decay_parameter_is_clamped() {
        // Out-of-range decay values clamp rather than blowing up the
        // exponent; both ends must still produce a bounded impulse.
        for decay in [-5.0_f32, 0.0, 100.0] {
            let impulse = ImpulseResponse::synthesize(0.05, decay, 44100, 1);
            assert!(impulse.buffer().channel(0).iter().all(|s| s.abs() <= 1.0));
        }
    }

    #[test]
    fn test_convolution_with_unit_impulse_is_identity() {
        let signal: Vec<f32> = (0..64).map(|i| (i as f32 * 0.1).sin()).collect();
        let wet = convolve(&signal, &[1.0]);
        assert_samples_close(&wet, &signal, 1e-4);
    }

    #[test]
    fn test_convolution_with_delayed_impulse_shifts() {
        let signal = vec![1.0, 0.5, 0.25];
        let wet = convolve(&signal, &[0.0, 1.0]);
        assert_samples_close(&wet, &[0.0, 1.0, 0.5, 0.25], 1e-4);
    }

    #[test]
    fn test_mix_zero_is_exactly_dry() {
        let buffer = sine_buffer(440.0, 44100, 256, 2);
        let impulse = ImpulseResponse::synthesize(0.01, 1.10, 44100, 9);
        let out = apply_reverb(&buffer, &impulse, 0.0);

        assert_eq!(out.frame_count(), 256 + impulse.frame_count() - 1);
        for ch in 0..2 {
            // The audible region is bit-identical to the input and the
            // tail is exactly silent.
            assert_eq!(&out.channel(ch)[..256], buffer.channel(ch));
            assert!(out.channel(ch)[256..].iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn test_mix_one_is_exactly_wet() {
        let buffer = sine_buffer(440.0, 44100, 256, 1);
        let out = apply_reverb(&buffer, &unit_impulse(44100), 1.0);

        // With a unit impulse the wet signal is the input itself.
        assert_eq!(out.frame_count(), 256);
        assert_samples_close(out.channel(0), buffer.channel(0), 1e-4);
    }

    #[test]
    fn test_mix_is_clamped() {
        let buffer = sine_buffer(440.0, 44100, 64, 1);
        let impulse = unit_impulse(44100);
        let over = apply_reverb(&buffer, &impulse, 7.5);
        let one = apply_reverb(&buffer, &impulse, 1.0);
        assert_eq!(over.channel(0), one.channel(0));
    }
}
