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

//! The decoded audio data model shared by every transform.
//!
//! Samples are stored in planar format: one Vec per channel. This matches
//! the native output of most decoders and keeps per-channel transforms
//! simple. Buffers are immutable once built; transforms return new buffers.

/// A decoded, multi-channel floating point audio clip.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleBuffer {
    /// Planar sample storage, one Vec per channel. Every channel has the
    /// same length.
    channels: Vec<Vec<f32>>,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl SampleBuffer {
    /// Creates a buffer from planar channel data.
    ///
    /// All channels must have the same length; there must be at least one
    /// channel. These are construction invariants, not runtime conditions.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        assert!(!channels.is_empty(), "buffer must have at least one channel");
        let frame_count = channels[0].len();
        assert!(
            channels.iter().all(|c| c.len() == frame_count),
            "all channels must have the same length"
        );
        Self {
            channels,
            sample_rate,
        }
    }

    /// Creates a buffer from interleaved samples.
    ///
    /// Trailing samples that do not fill a whole frame are dropped.
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Self {
        assert!(channel_count > 0, "buffer must have at least one channel");
        let frame_count = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frame_count); channel_count];
        for frame in 0..frame_count {
            for (ch, data) in channels.iter_mut().enumerate() {
                data.push(samples[frame * channel_count + ch]);
            }
        }
        Self {
            channels,
            sample_rate,
        }
    }

    /// Returns the samples in interleaved order.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let frame_count = self.frame_count();
        let mut interleaved = Vec::with_capacity(frame_count * self.channels.len());
        for frame in 0..frame_count {
            for channel in &self.channels {
                interleaved.push(channel[frame]);
            }
        }
        interleaved
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns the number of frames (samples per channel).
    pub fn frame_count(&self) -> usize {
        self.channels[0].len()
    }

    /// Returns the sample rate of the audio data.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the duration of the buffer in seconds.
    pub fn duration_secs(&self) -> f32 {
        self.frame_count() as f32 / self.sample_rate as f32
    }

    /// Returns the samples of one channel.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    /// Returns all channels.
    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Returns the memory size of the sample data in bytes.
    pub fn memory_size(&self) -> usize {
        self.channels.iter().map(|c| c.len()).sum::<usize>() * std::mem::size_of::<f32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_round_trip() {
        let interleaved = vec![0.1, -0.1, 0.2, -0.2, 0.3, -0.3];
        let buffer = SampleBuffer::from_interleaved(&interleaved, 2, 44100);

        assert_eq!(buffer.channel_count(), 2);
        assert_eq!(buffer.frame_count(), 3);
        assert_eq!(buffer.channel(0), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.channel(1), &[-0.1, -0.2, -0.3]);
        assert_eq!(buffer.to_interleaved(), interleaved);
    }

    #[test]
    fn test_partial_trailing_frame_is_dropped() {
        let buffer = SampleBuffer::from_interleaved(&[0.1, 0.2, 0.3], 2, 48000);
        assert_eq!(buffer.frame_count(), 1);
        assert_eq!(buffer.channel(0), &[0.1]);
        assert_eq!(buffer.channel(1), &[0.2]);
    }

    #[test]
    fn test_duration() {
        let buffer = SampleBuffer::new(vec![vec![0.0; 22050]], 44100);
        assert_eq!(buffer.duration_secs(), 0.5);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn test_mismatched_channel_lengths_rejected() {
        SampleBuffer::new(vec![vec![0.0; 10], vec![0.0; 9]], 44100);
    }
}
