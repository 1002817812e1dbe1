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

//! Persisted pad state.
//!
//! A board file is the JSON record of every pad (parameters plus the
//! encoded audio payload as base64) and optionally a captured sequence.
//! This module only marshals; all encoding and decoding of the audio
//! itself goes through the codec, and no DSP happens here.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audio::codec;
use crate::bank::PadBank;
use crate::pad::PadParameters;
use crate::sequence::Sequence;

/// Error types for board file marshalling.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Board JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Audio payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// The persisted record of one pad.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PadRecord {
    /// The pad's ID.
    pub id: String,

    /// The pad's encoded audio bytes as base64, if it has audio.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,

    /// The pad's playback parameters.
    #[serde(flatten)]
    pub parameters: PadParameters,
}

impl PadRecord {
    /// Builds a record from a pad's parameters and its encoded audio.
    pub fn new(id: &str, parameters: &PadParameters, encoded_audio: Option<&[u8]>) -> Self {
        Self {
            id: id.to_string(),
            audio_base64: encoded_audio.map(|bytes| BASE64.encode(bytes)),
            parameters: parameters.clone(),
        }
    }

    /// Returns the decoded audio payload bytes, if any.
    pub fn audio_bytes(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match &self.audio_base64 {
            Some(encoded) => Ok(Some(BASE64.decode(encoded)?)),
            None => Ok(None),
        }
    }
}

/// A persisted board: pad records plus an optional captured sequence.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BoardFile {
    /// All persisted pads.
    pub pads: Vec<PadRecord>,

    /// The captured sequence, if one was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<Sequence>,
}

impl BoardFile {
    /// Parses a board from JSON.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serializes the board to JSON.
    pub fn to_json(&self) -> Result<String, StorageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Builds a pad bank from this board.
    ///
    /// Pads whose payload cannot be unmarshalled or decoded are loaded
    /// without audio rather than failing the whole board; the parameters
    /// are kept either way.
    pub fn to_bank(&self, sample_rate: u32) -> PadBank {
        let mut bank = PadBank::new(sample_rate);
        let mut loaded = 0;
        for record in &self.pads {
            bank.pad_mut(&record.id).parameters = record.parameters.clone();

            let bytes = match record.audio_bytes() {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    warn!(pad = %record.id, error = %e, "Dropping unreadable audio payload");
                    continue;
                }
            };
            match codec::decode(&bytes, None) {
                Ok(buffer) => {
                    bank.set_sample(&record.id, buffer);
                    loaded += 1;
                }
                Err(e) => {
                    warn!(pad = %record.id, error = %e, "Dropping undecodable audio payload");
                }
            }
        }
        info!(
            pads = self.pads.len(),
            with_audio = loaded,
            "Board loaded"
        );
        bank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codec::encode;
    use crate::pad::Effect;
    use crate::sequence::RecordingSession;
    use crate::testutil::sine_buffer;

    #[test]
    fn test_pad_record_audio_round_trip() {
        let buffer = sine_buffer(440.0, 44100, 441, 2);
        let encoded = encode(&buffer).unwrap();
        let record = PadRecord::new("pad-0", &PadParameters::default(), Some(&encoded));

        let bytes = record.audio_bytes().unwrap().unwrap();
        assert_eq!(bytes, encoded);

        let decoded = codec::decode(&bytes, None).unwrap();
        assert_eq!(decoded.frame_count(), 441);
        assert_eq!(decoded.channel_count(), 2);
    }

    #[test]
    fn test_board_json_round_trip() {
        let buffer = sine_buffer(330.0, 44100, 100, 1);
        let encoded = encode(&buffer).unwrap();

        let mut parameters = PadParameters::default();
        parameters.effect = Effect::PitchUp;
        parameters.reverb = true;

        let mut session = RecordingSession::start();
        session.record("pad-0", 250.0, &parameters);

        let board = BoardFile {
            pads: vec![
                PadRecord::new("pad-0", &parameters, Some(&encoded)),
                PadRecord::new("pad-1", &PadParameters::default(), None),
            ],
            sequence: Some(session.stop()),
        };

        let json = board.to_json().unwrap();
        let parsed = BoardFile::from_json(&json).unwrap();
        assert_eq!(parsed, board);
    }

    #[test]
    fn test_to_bank_restores_audio_and_parameters() {
        let buffer = sine_buffer(330.0, 44100, 4410, 1);
        let encoded = encode(&buffer).unwrap();

        let mut parameters = PadParameters::default();
        parameters.volume = 3;

        let board = BoardFile {
            pads: vec![PadRecord::new("pad-5", &parameters, Some(&encoded))],
            sequence: None,
        };
        let bank = board.to_bank(44100);

        assert_eq!(bank.pad("pad-5").unwrap().parameters.volume, 3);
        assert_eq!(bank.buffer("pad-5").unwrap().frame_count(), 4410);
    }

    #[test]
    fn test_to_bank_survives_corrupt_payloads() {
        let board = BoardFile {
            pads: vec![
                PadRecord {
                    id: "pad-0".to_string(),
                    audio_base64: Some("&&& not base64 &&&".to_string()),
                    parameters: PadParameters::default(),
                },
                PadRecord {
                    id: "pad-1".to_string(),
                    audio_base64: Some(BASE64.encode(b"not an audio container")),
                    parameters: PadParameters::default(),
                },
            ],
            sequence: None,
        };

        // Both payloads are broken; the bank still loads with the pads
        // present but empty.
        let bank = board.to_bank(44100);
        assert!(!bank.pad("pad-0").unwrap().has_audio());
        assert!(!bank.pad("pad-1").unwrap().has_audio());
    }
}
