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

//! Frame-clocked additive mixing of scheduled sources.
//!
//! The mixer is the one algorithm shared by both execution modes: in
//! realtime mode the audio callback pulls blocks from it against the live
//! clock, in offline mode `render` pulls the same blocks as fast as they
//! can be computed. A source placed at frame N lands at frame N either
//! way.
//!
//! Sources arrive through a channel so that scheduling threads never
//! contend with the audio callback for the source list; concurrent
//! sources sum additively into the output, which is all the mixing the
//! engine does.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use super::buffer::SampleBuffer;
use crate::playsync::CancelHandle;

/// Global source ID counter.
static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Returns a process-unique source ID.
pub fn next_source_id() -> u64 {
    NEXT_SOURCE_ID.fetch_add(1, Ordering::SeqCst)
}

/// Channel used to hand sources to the mixer.
pub type SourceSender = Sender<ScheduledSource>;

/// A fully pre-rendered buffer scheduled to start at an absolute frame.
pub struct ScheduledSource {
    /// Unique ID for this source.
    pub id: u64,
    /// The pre-rendered audio. All effects are baked in; scheduling
    /// performs no decoding or DSP work.
    pub buffer: Arc<SampleBuffer>,
    /// Linear gain applied while mixing.
    pub gain: f32,
    /// Absolute mixer frame at which the first sample plays.
    pub start_frame: u64,
    /// Cancel handle for stopping this source. Marked finished when the
    /// source is exhausted or dropped.
    pub cancel_handle: CancelHandle,
}

/// Additively mixes scheduled sources against a monotonic frame clock.
pub struct Mixer {
    /// Sources currently pending or sounding.
    sources: Mutex<Vec<ScheduledSource>>,
    /// Sending half of the source delivery channel.
    source_tx: Sender<ScheduledSource>,
    /// Receiving half, drained at the start of every block.
    source_rx: Receiver<ScheduledSource>,
    /// The number of frames mixed so far.
    frame_clock: AtomicU64,
    /// Number of output channels.
    channels: u16,
    /// Output sample rate.
    sample_rate: u32,
}

impl Mixer {
    /// Creates a new mixer.
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        let (source_tx, source_rx) = crossbeam_channel::unbounded();
        Self {
            sources: Mutex::new(Vec::new()),
            source_tx,
            source_rx,
            frame_clock: AtomicU64::new(0),
            channels,
            sample_rate,
        }
    }

    /// Returns a sender for scheduling sources onto this mixer.
    pub fn sender(&self) -> SourceSender {
        self.source_tx.clone()
    }

    /// Returns the current frame clock position.
    pub fn current_frame(&self) -> u64 {
        self.frame_clock.load(Ordering::Relaxed)
    }

    /// Returns the number of output channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Returns the output sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Mixes the next block of interleaved output frames.
    ///
    /// Each call advances the frame clock by `output.len() / channels`.
    /// Only one thread may drive this at a time (the audio callback in
    /// realtime mode, the render loop offline).
    pub fn fill(&self, output: &mut [f32]) {
        output.fill(0.0);
        let channels = self.channels as usize;
        let frames = output.len() / channels;
        if frames == 0 {
            return;
        }
        let block_start = self.frame_clock.fetch_add(frames as u64, Ordering::Relaxed);
        let block_end = block_start + frames as u64;

        let mut sources = self.sources.lock();
        while let Ok(source) = self.source_rx.try_recv() {
            sources.push(source);
        }

        sources.retain(|source| {
            if source.cancel_handle.is_cancelled() {
                source.cancel_handle.mark_finished();
                return false;
            }

            let end_frame = source.start_frame + source.buffer.frame_count() as u64;
            if end_frame <= block_start {
                // Scheduled entirely in the past; nothing left to play.
                source.cancel_handle.mark_finished();
                return false;
            }
            if source.start_frame >= block_end {
                return true;
            }

            let source_channels = source.buffer.channel_count();
            for frame in 0..frames {
                let absolute = block_start + frame as u64;
                if absolute < source.start_frame || absolute >= end_frame {
                    continue;
                }
                let position = (absolute - source.start_frame) as usize;
                for ch in 0..channels {
                    let samples = source.buffer.channel(ch % source_channels);
                    output[frame * channels + ch] += samples[position] * source.gain;
                }
            }

            if end_frame <= block_end {
                source.cancel_handle.mark_finished();
                false
            } else {
                true
            }
        });
    }

    /// Renders the given number of frames as fast as possible, returning
    /// interleaved samples. This is the offline execution mode: the same
    /// block loop the audio callback drives, against a virtual clock.
    pub fn render(&self, total_frames: usize) -> Vec<f32> {
        const RENDER_BLOCK_FRAMES: usize = 1024;
        let channels = self.channels as usize;
        let mut output = vec![0.0f32; total_frames * channels];
        for block in output.chunks_mut(RENDER_BLOCK_FRAMES * channels) {
            self.fill(block);
        }
        output
    }
}
