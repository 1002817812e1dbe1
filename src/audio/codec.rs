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

//! PCM codec: container decode and canonical WAV encode.
//!
//! Decoding goes through symphonia and accepts whatever containers the
//! enabled codec registry understands (the compressed formats produced by
//! recording devices included). Encoding always produces the same minimal
//! uncompressed container: a 44-byte WAV header followed by interleaved
//! 16-bit little-endian samples, so downstream players can open the result
//! regardless of platform codec support.

use std::io::Cursor;

use hound::{WavSpec, WavWriter};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use super::buffer::SampleBuffer;
use super::error::{DecodeError, EncodeError};

/// Decodes compressed or native container audio into a sample buffer.
///
/// The extension hint helps the probe pick a demuxer for containers with
/// weak magic bytes; pass None when the format is unknown.
pub fn decode(bytes: &[u8], extension_hint: Option<&str>) -> Result<SampleBuffer, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension_hint {
        hint.with_extension(extension);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::Malformed("no audio track found".to_string()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params
        .sample_rate
        .ok_or_else(|| DecodeError::Malformed("sample rate not specified".to_string()))?;

    let mut decoder = get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let mut channels: Vec<Vec<f32>> = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            // Some decoders signal EOF with a decode error instead of an
            // IO error.
            Err(SymphoniaError::DecodeError(_)) => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(DecodeError::Malformed(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            // A corrupt packet in the middle of the stream is skipped, not
            // fatal; remaining packets still decode.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(error = %e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(DecodeError::Malformed(e.to_string())),
        };
        append_planar(&mut channels, decoded);
    }

    if channels.is_empty() || channels[0].is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(SampleBuffer::new(channels, sample_rate))
}

/// Encodes a sample buffer into the canonical uncompressed WAV container.
pub fn encode(buffer: &SampleBuffer) -> Result<Vec<u8>, EncodeError> {
    let spec = WavSpec {
        channels: buffer.channel_count() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::new();
    let mut writer = WavWriter::new(Cursor::new(&mut bytes), spec)?;
    for frame in 0..buffer.frame_count() {
        for channel in buffer.channels() {
            writer.write_sample(quantize(channel[frame]))?;
        }
    }
    writer.finalize()?;
    Ok(bytes)
}

/// Quantizes one float sample to signed 16-bit.
///
/// Scaling is asymmetric: negative values scale by 32768, positive by
/// 32767, so that +1.0 cannot overflow the sample range.
pub(crate) fn quantize(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0).round() as i16
    } else {
        (clamped * 32767.0).round() as i16
    }
}

/// Appends one decoded packet's planes to the accumulated planar channels.
fn append_planar(channels: &mut Vec<Vec<f32>>, decoded: AudioBufferRef) {
    match decoded {
        AudioBufferRef::F32(buf) => extend_channels(channels, &buf, |s| s),
        AudioBufferRef::F64(buf) => extend_channels(channels, &buf, |s| s as f32),
        AudioBufferRef::S8(buf) => extend_channels(channels, &buf, scale_s8),
        AudioBufferRef::S16(buf) => extend_channels(channels, &buf, scale_s16),
        AudioBufferRef::S24(buf) => extend_channels(channels, &buf, |s| scale_s24(s.inner())),
        AudioBufferRef::S32(buf) => extend_channels(channels, &buf, scale_s32),
        AudioBufferRef::U8(buf) => extend_channels(channels, &buf, scale_u8),
        AudioBufferRef::U16(buf) => extend_channels(channels, &buf, scale_u16),
        AudioBufferRef::U24(buf) => extend_channels(channels, &buf, |s| scale_u24(s.inner())),
        AudioBufferRef::U32(buf) => extend_channels(channels, &buf, scale_u32),
    }
}

/// Extends the planar channel accumulators from a generic decoded buffer.
/// The closure converts one sample value to f32.
fn extend_channels<T, F>(channels: &mut Vec<Vec<f32>>, buf: &AudioBuffer<T>, convert: F)
where
    T: symphonia::core::sample::Sample,
    F: Fn(T) -> f32,
{
    let planes = buf.planes();
    let planes = planes.planes();
    if channels.is_empty() {
        channels.resize(planes.len(), Vec::new());
    }
    for (channel, plane) in channels.iter_mut().zip(planes) {
        channel.extend(plane.iter().map(|s| convert(*s)));
    }
}

// Scaling helpers for the integer sample formats. These are `pub(crate)`
// so they can be validated directly in unit tests.

#[inline]
pub(crate) fn scale_s8(sample: i8) -> f32 {
    sample as f32 / (1i64 << 7) as f32
}

#[inline]
pub(crate) fn scale_s16(sample: i16) -> f32 {
    sample as f32 / (1i64 << 15) as f32
}

#[inline]
pub(crate) fn scale_s24(sample: i32) -> f32 {
    sample as f32 / (1i64 << 23) as f32
}

#[inline]
pub(crate) fn scale_s32(sample: i32) -> f32 {
    sample as f32 / (1i64 << 31) as f32
}

#[inline]
pub(crate) fn scale_u8(sample: u8) -> f32 {
    (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u16(sample: u16) -> f32 {
    (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u24(sample: u32) -> f32 {
    let max = (1u32 << 24) - 1;
    (sample as f32 / max as f32) * 2.0 - 1.0
}

#[inline]
pub(crate) fn scale_u32(sample: u32) -> f32 {
    (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
}
