//! # IEEE C37.118 Protocol
//!
//! The IEEE C37.118 synchrophasor protocol, expressed as a plug-in over the
//! generic channel framework in [`crate::channel`]: frame prefix and sync
//! word handling, configuration frames that carry channel definitions, data
//! frames decoded against a previously received configuration, and the
//! header and command frames used to drive a stream.
//!
//! ## Submodules
//!
//! - `command`: Command frames (transmission control, configuration and
//!   header requests, extended payloads).
//! - `common`: Shared frame elements (sync word, version, prefix, STAT).
//! - `config`: Configuration cells and frames (CFG-1/CFG-2/CFG-3).
//! - `data`: Data cells and frames carrying measurements.
//! - `header`: Free-form header frames.
//! - `random`: Synthetic frame generation for tests and benchmarks.
//! - `units`: Conversion factor words (PHUNIT, ANUNIT, DIGUNIT, FNOM) and
//!   the data rate word.
//!
//! ## Usage
//!
//! A stream is decoded in two stages: first a configuration frame, then
//! data frames against it.
//!
//! ```ignore
//! let settings = C37Settings::new(Version::V2011, 1_000_000);
//! let (configuration, _) =
//!     ConfigurationFrame::decode(&config_bytes, 0, settings.configuration_state())?;
//! let configuration = Arc::new(configuration);
//! let (data, _) = DataFrame::decode(&data_bytes, 0, settings.data_state(&configuration))?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::channel::state::FrameParsingState;
use crate::channel::ConnectionParameters;

pub mod command;
pub mod common;
pub mod config;
pub mod data;
pub mod header;
pub mod random;
pub mod units;

#[cfg(test)]
mod tests;

use common::{PrefixFrame, Version};
use config::{default_configuration_cell_factory, ConfigurationCell, ConfigurationFrame};
use data::{data_cell_factory, DataCell};

/// Connection-level settings for an IEEE C37.118 stream.
///
/// # Fields
///
/// * `version`: Protocol version used when constructing outbound frames.
/// * `time_base`: Fractional-second resolution in counts per second; must
///   be non-zero.
/// * `trust_header_length`: Accept the declared frame size when it exceeds
///   the decoded byte count.
/// * `validate_checksum`: Verify the CRC-CCITT trailer on configuration and
///   data frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct C37Settings {
    pub version: Version,
    pub time_base: u32,
    pub trust_header_length: bool,
    pub validate_checksum: bool,
}

impl C37Settings {
    pub fn new(version: Version, time_base: u32) -> Self {
        C37Settings {
            version,
            time_base,
            trust_header_length: true,
            validate_checksum: true,
        }
    }

    /// Parsing state for configuration frames, with this connection's
    /// length-trust and checksum policies applied.
    pub fn configuration_state(&self) -> FrameParsingState<PrefixFrame, ConfigurationCell> {
        FrameParsingState::new(default_configuration_cell_factory())
            .trust_header_length(self.trust_header_length)
            .validate_checksum(self.validate_checksum)
    }

    /// Parsing state for data frames decoded against `configuration`.
    pub fn data_state(
        &self,
        configuration: &Arc<ConfigurationFrame>,
    ) -> FrameParsingState<PrefixFrame, DataCell> {
        FrameParsingState::new(data_cell_factory(Arc::clone(configuration)))
            .with_cell_count(configuration.cells.len())
            .trust_header_length(self.trust_header_length)
            .validate_checksum(self.validate_checksum)
    }
}

impl Default for C37Settings {
    fn default() -> Self {
        C37Settings::new(Version::default(), 1_000_000)
    }
}

impl ConnectionParameters for C37Settings {
    fn values_are_valid(&self) -> bool {
        self.time_base > 0
    }
}
