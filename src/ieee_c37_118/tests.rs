//! End-to-end protocol tests: a configuration frame is decoded first, then
//! data frames are decoded against it, the way a live stream is consumed.

use std::sync::Arc;

use crate::channel::frame::{Frame, FrameKind};
use crate::channel::ConnectionParameters;
use crate::error::ParseError;

use super::command::{CommandFrame, CommandType};
use super::common::{FrameType, Version};
use super::config::ConfigurationFrame;
use super::data::DataFrame;
use super::header::HeaderFrame;
use super::random::{random_configuration_frame, random_data_frame};
use super::C37Settings;

#[test]
fn test_settings_validity() {
    let settings = C37Settings::default();
    assert!(settings.values_are_valid());
    assert!(settings.trust_header_length);
    assert!(settings.validate_checksum);

    let zero_base = C37Settings::new(Version::V2011, 0);
    assert!(!zero_base.values_are_valid());
}

#[test]
fn test_configuration_then_data_stream() {
    let settings = C37Settings::new(Version::V2011, 1_000_000);

    let configuration = random_configuration_frame(2, Version::V2011, false, false).unwrap();
    let config_bytes = configuration.encode();
    let (decoded_configuration, consumed) =
        ConfigurationFrame::decode(&config_bytes, 0, settings.configuration_state()).unwrap();
    assert_eq!(consumed, config_bytes.len());
    assert_eq!(decoded_configuration.cells.len(), 2);
    assert_eq!(decoded_configuration.time_base, 1_000_000);

    let decoded_configuration = Arc::new(decoded_configuration);
    let data = random_data_frame(&decoded_configuration).unwrap();
    let data_bytes = data.encode();
    assert_eq!(data_bytes.len(), decoded_configuration.data_frame_length());

    let (decoded_data, consumed) =
        DataFrame::decode(&data_bytes, 0, settings.data_state(&decoded_configuration)).unwrap();
    assert_eq!(consumed, data_bytes.len());
    assert_eq!(decoded_data.cells.len(), 2);

    for (decoded_cell, sent_cell) in decoded_data.cells.iter().zip(data.cells.iter()) {
        assert_eq!(
            decoded_cell.phasor_values.len(),
            sent_cell.phasor_values.len()
        );
        for (decoded, sent) in decoded_cell
            .phasor_values
            .iter()
            .zip(sent_cell.phasor_values.iter())
        {
            let decoded = decoded.as_phasor().unwrap();
            let sent = sent.as_phasor().unwrap();
            // Fixed-integer magnitudes survive within half a count.
            assert!((decoded.magnitude - sent.magnitude).abs() <= decoded.scale);
        }
        for (decoded, sent) in decoded_cell
            .digital_values
            .iter()
            .zip(sent_cell.digital_values.iter())
        {
            assert_eq!(
                decoded.as_digital().unwrap().word,
                sent.as_digital().unwrap().word
            );
        }
        let decoded_frequency = &decoded_cell.frequency_value;
        let sent_frequency = &sent_cell.frequency_value;
        assert!((decoded_frequency.deviation_hz - sent_frequency.deviation_hz).abs() < 1e-9);
    }
}

#[test]
fn test_frame_type_dispatch_from_sync() {
    let configuration = random_configuration_frame(1, Version::V2011, false, false).unwrap();
    let data = random_data_frame(&configuration).unwrap();
    let header = HeaderFrame::new(Version::V2011, 7, "PMU in bay 4");
    let command = CommandFrame::new(Version::V2011, 7, CommandType::TurnOnTransmission);

    let frames: Vec<(Vec<u8>, FrameType, FrameKind)> = vec![
        (configuration.encode(), FrameType::Config2, FrameKind::Configuration),
        (data.encode(), FrameType::Data, FrameKind::Data),
        (header.encode(), FrameType::Header, FrameKind::Header),
        (command.encode(), FrameType::Command, FrameKind::Command),
    ];

    for (bytes, expected_type, expected_kind) in frames {
        let sync = u16::from_be_bytes([bytes[0], bytes[1]]);
        let frame_type = FrameType::from_sync(sync).unwrap();
        assert_eq!(frame_type, expected_type);
        let kind = match frame_type {
            FrameType::Data => FrameKind::Data,
            FrameType::Header => FrameKind::Header,
            FrameType::Config1 | FrameType::Config2 | FrameType::Config3 => {
                FrameKind::Configuration
            }
            FrameType::Command => FrameKind::Command,
        };
        assert_eq!(kind, expected_kind);
        assert_eq!(Version::from_sync(sync).unwrap(), Version::V2011);
    }
}

#[test]
fn test_command_request_cycle() {
    let request = CommandFrame::new(Version::V2011, 42, CommandType::SendConfigFrame2);
    let bytes = request.encode();
    let (decoded, _) = CommandFrame::decode(&bytes, 0).unwrap();
    assert_eq!(decoded.id_code(), 42);
    assert_eq!(decoded.command, CommandType::SendConfigFrame2);
}

#[test]
fn test_checksum_policy_applies_to_data_frames() {
    let configuration = Arc::new(random_configuration_frame(1, Version::V2011, false, false).unwrap());
    let data = random_data_frame(&configuration).unwrap();
    let mut bytes = data.encode();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    let strict = C37Settings::new(Version::V2011, 1_000_000);
    assert!(matches!(
        DataFrame::decode(&bytes, 0, strict.data_state(&configuration)),
        Err(ParseError::ChecksumMismatch { .. })
    ));

    let mut lenient = C37Settings::new(Version::V2011, 1_000_000);
    lenient.validate_checksum = false;
    let (decoded, _) = DataFrame::decode(&bytes, 0, lenient.data_state(&configuration)).unwrap();
    assert_eq!(decoded.cells.len(), 1);
}
