//! # IEEE C37.118 Header Frames
//!
//! Header frames carry free-form, human-readable ASCII text describing the
//! data source: station details, scaling notes, algorithm descriptions.
//! Their payload is delimited by the declared frame size and has no further
//! structure.

use serde::{Deserialize, Serialize};

use crate::channel::checksum::{append_trailing, validate_trailing, CrcCcitt};
use crate::channel::frame::{Frame, FrameKind, TimeTag};
use crate::channel::state::{BaseParsingState, ParsingState};
use crate::channel::{Attributes, Channel, StatefulChannel, Tag};
use crate::error::ParseError;

use super::common::{
    create_sync, FrameType, PrefixFrame, Version, CHECKSUM_LENGTH, PREFIX_LENGTH,
};
use super::config::frame_span;

/// Represents an IEEE C37.118 header frame.
///
/// # Fields
///
/// * `prefix`: Common frame prefix.
/// * `data`: The free-form ASCII payload.
/// * `chk`: CRC-CCITT check value as read from the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderFrame {
    pub prefix: PrefixFrame,
    pub data: String,
    pub chk: u16,
    #[serde(skip)]
    state: Option<BaseParsingState>,
    #[serde(skip)]
    tag: Option<Tag>,
}

impl HeaderFrame {
    pub fn new(version: Version, idcode: u16, data: impl Into<String>) -> Self {
        HeaderFrame {
            prefix: PrefixFrame::new(version, FrameType::Header, idcode),
            data: data.into(),
            chk: 0,
            state: None,
            tag: None,
        }
    }

    /// Decodes a header frame from `buffer[start_index..]`. Non-ASCII bytes
    /// in the payload are replaced rather than rejected.
    pub fn decode(buffer: &[u8], start_index: usize) -> Result<(Self, usize), ParseError> {
        let (prefix, _) = PrefixFrame::decode(buffer, start_index)?;
        match prefix.frame_type()? {
            FrameType::Header => {}
            other => {
                return Err(ParseError::InvalidFrameType {
                    message: format!("expected a header frame, got {}", other),
                })
            }
        }

        let declared = prefix.framesize as usize;
        let span = frame_span(buffer, start_index, declared)?;
        validate_trailing(&CrcCcitt, span)?;

        let data = String::from_utf8_lossy(&span[PREFIX_LENGTH..declared - CHECKSUM_LENGTH])
            .into_owned();
        let chk = u16::from_be_bytes([span[declared - 2], span[declared - 1]]);

        Ok((
            HeaderFrame {
                prefix,
                data,
                chk,
                state: Some(BaseParsingState::new(declared)),
                tag: None,
            },
            declared,
        ))
    }

    fn computed_length(&self) -> usize {
        PREFIX_LENGTH + self.data.len() + CHECKSUM_LENGTH
    }
}

impl Channel for HeaderFrame {
    fn decoded_length(&self) -> usize {
        self.state
            .map(|state| state.parsed_binary_length())
            .unwrap_or_else(|| self.computed_length())
    }

    fn append_attributes(&self, attributes: &mut Attributes) {
        attributes.push("kind", self.kind());
        attributes.push("id code", self.prefix.idcode);
        attributes.push("payload bytes", self.data.len());
    }

    fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    fn set_tag(&mut self, tag: Option<Tag>) {
        self.tag = tag;
    }
}

impl StatefulChannel for HeaderFrame {
    type State = BaseParsingState;

    fn parsing_state(&self) -> Option<&Self::State> {
        self.state.as_ref()
    }

    fn replace_parsing_state(&mut self, state: Self::State) -> Option<Self::State> {
        self.state.replace(state)
    }
}

impl Frame for HeaderFrame {
    fn kind(&self) -> FrameKind {
        FrameKind::Header
    }

    fn id_code(&self) -> u16 {
        self.prefix.idcode
    }

    fn time_tag(&self) -> TimeTag {
        self.prefix.time_tag()
    }

    fn encode(&self) -> Vec<u8> {
        let frame_size = self.computed_length();
        let mut prefix = self.prefix.clone();
        prefix.framesize = frame_size as u16;
        prefix.sync = create_sync(prefix.version, FrameType::Header);

        let mut result = Vec::with_capacity(frame_size);
        result.extend_from_slice(&prefix.encode());
        result.extend_from_slice(self.data.as_bytes());
        append_trailing(&CrcCcitt, &mut result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let frame = HeaderFrame::new(
            Version::V2005,
            17,
            "Station A relay bay, phasors scaled per site survey 2024-06",
        );
        let bytes = frame.encode();
        assert_eq!(bytes.len(), frame.decoded_length());

        let (decoded, length) = HeaderFrame::decode(&bytes, 0).unwrap();
        assert_eq!(length, bytes.len());
        assert_eq!(decoded.prefix.version, Version::V2005);
        assert_eq!(
            decoded.data,
            "Station A relay bay, phasors scaled per site survey 2024-06"
        );
        assert_eq!(decoded.encode(), bytes);
    }

    #[test]
    fn test_empty_payload_is_legal() {
        let frame = HeaderFrame::new(Version::V2011, 17, "");
        let bytes = frame.encode();
        assert_eq!(bytes.len(), PREFIX_LENGTH + CHECKSUM_LENGTH);
        let (decoded, _) = HeaderFrame::decode(&bytes, 0).unwrap();
        assert!(decoded.data.is_empty());
    }

    #[test]
    fn test_header_tamper_detected() {
        let frame = HeaderFrame::new(Version::V2011, 17, "hello");
        let mut bytes = frame.encode();
        bytes[PREFIX_LENGTH] ^= 0x20;
        assert!(matches!(
            HeaderFrame::decode(&bytes, 0),
            Err(ParseError::ChecksumMismatch { .. })
        ));
    }
}
