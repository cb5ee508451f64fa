//! # IEEE C37.118 Command Frames
//!
//! Construction and parsing of IEEE C37.118 command frames, the control
//! instructions sent to synchrophasor devices: turning real-time
//! transmission on or off, requesting header or configuration frames, and
//! carrying extended vendor payloads, as defined in IEEE C37.118-2005,
//! IEEE C37.118.2-2011, and IEEE C37.118.2-2024.
//!
//! Command frames have no cells; their payload is a single command word
//! optionally followed by extended data delimited by the declared frame
//! size.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::channel::checksum::{append_trailing, validate_trailing, CrcCcitt};
use crate::channel::frame::{Frame, FrameKind, TimeTag};
use crate::channel::state::{BaseParsingState, ParsingState};
use crate::channel::{Attributes, Channel, StatefulChannel, Tag};
use crate::error::ParseError;

use super::common::{
    create_sync, FrameType, PrefixFrame, Version, CHECKSUM_LENGTH, PREFIX_LENGTH,
};
use super::config::frame_span;

/// Minimum command frame length: prefix + command word + checksum.
pub const MIN_COMMAND_LENGTH: usize = PREFIX_LENGTH + 2 + CHECKSUM_LENGTH;

/// Enumerates the standard command codes.
///
/// # Variants
///
/// * `TurnOffTransmission` (1): Stop real-time data transmission.
/// * `TurnOnTransmission` (2): Start real-time data transmission.
/// * `SendHeaderFrame` (3): Request a header frame.
/// * `SendConfigFrame1` (4): Request configuration frame 1.
/// * `SendConfigFrame2` (5): Request configuration frame 2.
/// * `SendConfigFrame3` (6): Request configuration frame 3.
/// * `SendExtendedFrame` (8): Extended command with additional data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandType {
    TurnOffTransmission,
    TurnOnTransmission,
    SendHeaderFrame,
    SendConfigFrame1,
    SendConfigFrame2,
    SendConfigFrame3,
    SendExtendedFrame,
}

impl CommandType {
    pub fn from_raw(raw: u16) -> Result<Self, ParseError> {
        match raw {
            1 => Ok(CommandType::TurnOffTransmission),
            2 => Ok(CommandType::TurnOnTransmission),
            3 => Ok(CommandType::SendHeaderFrame),
            4 => Ok(CommandType::SendConfigFrame1),
            5 => Ok(CommandType::SendConfigFrame2),
            6 => Ok(CommandType::SendConfigFrame3),
            8 => Ok(CommandType::SendExtendedFrame),
            other => Err(ParseError::invalid_field(
                "command",
                format!("unrecognized command code {}", other),
            )),
        }
    }

    pub fn to_raw(&self) -> u16 {
        match self {
            CommandType::TurnOffTransmission => 1,
            CommandType::TurnOnTransmission => 2,
            CommandType::SendHeaderFrame => 3,
            CommandType::SendConfigFrame1 => 4,
            CommandType::SendConfigFrame2 => 5,
            CommandType::SendConfigFrame3 => 6,
            CommandType::SendExtendedFrame => 8,
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandType::TurnOffTransmission => write!(f, "turn off transmission"),
            CommandType::TurnOnTransmission => write!(f, "turn on transmission"),
            CommandType::SendHeaderFrame => write!(f, "send header frame"),
            CommandType::SendConfigFrame1 => write!(f, "send configuration frame 1"),
            CommandType::SendConfigFrame2 => write!(f, "send configuration frame 2"),
            CommandType::SendConfigFrame3 => write!(f, "send configuration frame 3"),
            CommandType::SendExtendedFrame => write!(f, "send extended frame"),
        }
    }
}

/// Represents an IEEE C37.118 command frame.
///
/// # Fields
///
/// * `prefix`: Common frame prefix; `idcode` addresses the target device.
/// * `command`: The command code.
/// * `extended_data`: Optional payload for extended commands.
/// * `chk`: CRC-CCITT check value as read from the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandFrame {
    pub prefix: PrefixFrame,
    pub command: CommandType,
    pub extended_data: Option<Vec<u8>>,
    pub chk: u16,
    #[serde(skip)]
    state: Option<BaseParsingState>,
    #[serde(skip)]
    tag: Option<Tag>,
}

impl CommandFrame {
    pub fn new(version: Version, idcode: u16, command: CommandType) -> Self {
        CommandFrame {
            prefix: PrefixFrame::new(version, FrameType::Command, idcode),
            command,
            extended_data: None,
            chk: 0,
            state: None,
            tag: None,
        }
    }

    /// An extended command carrying an opaque payload.
    pub fn new_extended(version: Version, idcode: u16, data: Vec<u8>) -> Self {
        let mut frame = CommandFrame::new(version, idcode, CommandType::SendExtendedFrame);
        frame.extended_data = Some(data);
        frame
    }

    /// Decodes a command frame from `buffer[start_index..]`.
    ///
    /// The extended payload, if any, is delimited by the declared frame
    /// size; the checksum is always enforced.
    pub fn decode(buffer: &[u8], start_index: usize) -> Result<(Self, usize), ParseError> {
        let (prefix, _) = PrefixFrame::decode(buffer, start_index)?;
        match prefix.frame_type()? {
            FrameType::Command => {}
            other => {
                return Err(ParseError::InvalidFrameType {
                    message: format!("expected a command frame, got {}", other),
                })
            }
        }

        let declared = prefix.framesize as usize;
        if declared < MIN_COMMAND_LENGTH {
            return Err(ParseError::invalid_field(
                "framesize",
                format!(
                    "declared size {} is below the command frame minimum {}",
                    declared, MIN_COMMAND_LENGTH
                ),
            ));
        }
        let span = frame_span(buffer, start_index, declared)?;
        validate_trailing(&CrcCcitt, span)?;

        let command = CommandType::from_raw(u16::from_be_bytes([
            span[PREFIX_LENGTH],
            span[PREFIX_LENGTH + 1],
        ]))?;
        let extended_data = if declared > MIN_COMMAND_LENGTH {
            Some(span[PREFIX_LENGTH + 2..declared - CHECKSUM_LENGTH].to_vec())
        } else {
            None
        };
        let chk = u16::from_be_bytes([span[declared - 2], span[declared - 1]]);

        Ok((
            CommandFrame {
                prefix,
                command,
                extended_data,
                chk,
                state: Some(BaseParsingState::new(declared)),
                tag: None,
            },
            declared,
        ))
    }

    fn computed_length(&self) -> usize {
        MIN_COMMAND_LENGTH
            + self
                .extended_data
                .as_ref()
                .map(Vec::len)
                .unwrap_or(0)
    }
}

impl Channel for CommandFrame {
    fn decoded_length(&self) -> usize {
        self.state
            .map(|state| state.parsed_binary_length())
            .unwrap_or_else(|| self.computed_length())
    }

    fn append_attributes(&self, attributes: &mut Attributes) {
        attributes.push("kind", self.kind());
        attributes.push("id code", self.prefix.idcode);
        attributes.push("command", self.command);
        if let Some(data) = &self.extended_data {
            attributes.push("extended data bytes", data.len());
        }
    }

    fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    fn set_tag(&mut self, tag: Option<Tag>) {
        self.tag = tag;
    }
}

impl StatefulChannel for CommandFrame {
    type State = BaseParsingState;

    fn parsing_state(&self) -> Option<&Self::State> {
        self.state.as_ref()
    }

    fn replace_parsing_state(&mut self, state: Self::State) -> Option<Self::State> {
        self.state.replace(state)
    }
}

impl Frame for CommandFrame {
    fn kind(&self) -> FrameKind {
        FrameKind::Command
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
        prefix.sync = create_sync(prefix.version, FrameType::Command);

        let mut result = Vec::with_capacity(frame_size);
        result.extend_from_slice(&prefix.encode());
        result.extend_from_slice(&self.command.to_raw().to_be_bytes());
        if let Some(data) = &self.extended_data {
            result.extend_from_slice(data);
        }
        append_trailing(&CrcCcitt, &mut result);
        result
    }
}
