//! # Synchrophasor Frame Codec
//!
//! This crate decodes and encodes the binary frame formats exchanged by
//! synchrophasor measurement devices (PMUs and phasor data concentrators).
//! Callers hand it raw byte buffers arriving from a transport and receive
//! strongly-typed frames describing station configuration and time-stamped
//! electrical measurements; conversely, callers hand it typed frames and
//! receive wire-exact byte sequences.
//!
//! The crate is split into a protocol-neutral framework and a concrete
//! protocol built on it:
//!
//! ## Submodules
//!
//! - `channel`: The generic decoding framework.
//!   - `checksum`: Pluggable trailing-checksum algorithms (CRC-CCITT,
//!     16-bit additive sum).
//!   - `collection`: Bounded channel collections with constant- and
//!     variable-width length accounting.
//!   - `cursor`: A bounds-checked big-endian byte cursor.
//!   - `definition`: Static channel definitions (phasor, analog, digital,
//!     frequency) carried by configuration frames.
//!   - `frame`: The frame abstraction, cell decoding, and length
//!     reconciliation policy.
//!   - `state`: Parsing state and the cell/definition/value factory
//!     plug-in points.
//!   - `value`: Dynamic measurement values carried by data frames.
//! - `error`: The parse error taxonomy.
//! - `ieee_c37_118`: IEEE C37.118-2005/2011/2024 frames expressed through
//!   the framework.
//! - `replay`: A frame-rate timer for deterministic file playback.
//!
//! ## Usage
//!
//! Decode a configuration frame first, then decode data frames against it;
//! see the `ieee_c37_118` module documentation for a worked example. The
//! framework layer is protocol-neutral: a new protocol plugs in by
//! supplying byte-layout constants, a checksum, and factory closures for
//! its cells, definitions, and values.

pub mod channel;
pub mod error;
pub mod ieee_c37_118;
pub mod replay;

pub use error::ParseError;
