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
/// Error types for audio decode operations.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The container or codec data could not be parsed.
    #[error("Unparseable audio data: {0}")]
    Malformed(String),

    /// The container parsed but contained zero audio frames.
    #[error("Decoded audio contains no frames")]
    Empty,
}

/// Error types for audio encode operations.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("WAV write failed: {0}")]
    Wav(#[from] hound::Error),
}

/// Error types for the shared output device.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("No default audio output device available")]
    NoOutputDevice,

    #[error("Unsupported output sample format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio stream error: {0}")]
    Stream(String),
}
