//! # Channel Framework
//!
//! This module provides the generic frame/cell/definition/value decoding
//! framework that concrete synchrophasor protocols plug into. A protocol
//! supplies byte-layout rules, factory functions, and a checksum algorithm;
//! the framework supplies the object model, the recursive factory-driven
//! decode algorithm, binary-length accounting, checksum enforcement, and the
//! error taxonomy.
//!
//! ## Submodules
//!
//! - `checksum`: Pluggable checksum algorithms and the uniform mismatch error.
//! - `collection`: Ordered channel containers with constant- and
//!   variable-length binary accounting.
//! - `cursor`: Bounds-checked big-endian reader over caller-owned buffers.
//! - `definition`: The four channel definition specializations (phasor,
//!   analog, frequency, digital) established by configuration frames.
//! - `frame`: Frame kinds, time tags, and the frame-body decode driver.
//! - `state`: Parsing state carried alongside decoded entities, including
//!   factory functions and decode policy flags.
//! - `value`: The four measurement value specializations carried by data
//!   frames.
//!
//! ## Usage
//!
//! Decoding is synchronous and single-threaded per frame. Independent frames
//! may be decoded concurrently on separate threads as long as each decode
//! operates on its own buffer and its own parsing state; decoded definitions
//! are read-only and may be shared freely afterwards.

pub mod checksum;
pub mod collection;
pub mod cursor;
pub mod definition;
pub mod frame;
pub mod state;
pub mod value;

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::ParseError;

use self::state::BaseParsingState;

/// An opaque, cheaply cloneable user tag attached to a decoded entity.
///
/// The framework never interprets a tag; it exists so callers can associate
/// their own bookkeeping (routing keys, source identifiers) with any entity.
/// Tags are transient and never serialized with the entity.
#[derive(Clone)]
pub struct Tag(Arc<dyn Any + Send + Sync>);

impl Tag {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Tag(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Tag(..)")
    }
}

/// Ordered diagnostic attributes exposed by every decodable entity.
///
/// Entries preserve insertion order so that each level of the object model
/// can append its own fields after delegating to its base contribution,
/// letting diagnostics tooling reconstruct the protocol structure from the
/// attribute sequence alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes {
    entries: Vec<(String, String)>,
}

impl Attributes {
    pub fn new() -> Self {
        Attributes::default()
    }

    /// Appends one attribute. Duplicate names are allowed; later entries do
    /// not replace earlier ones.
    pub fn push(&mut self, name: impl Into<String>, value: impl ToString) {
        self.entries.push((name.into(), value.to_string()));
    }

    /// Returns the first value recorded under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The root capability implemented by every decodable entity: frames, cells,
/// definitions, and values.
///
/// The contract lets the decode algorithm and diagnostics tooling treat any
/// entity uniformly regardless of protocol: report a decoded byte length,
/// expose named diagnostic attributes, and carry an opaque user tag.
pub trait Channel {
    /// The number of bytes this entity occupied (or will occupy) on the wire.
    fn decoded_length(&self) -> usize;

    /// Appends this entity's diagnostic attributes. Implementations append
    /// their own fields after delegating to their base contribution; they
    /// never replace what was already recorded.
    fn append_attributes(&self, attributes: &mut Attributes);

    /// Collects the full attribute sequence for this entity.
    fn attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();
        self.append_attributes(&mut attributes);
        attributes
    }

    fn tag(&self) -> Option<&Tag>;

    fn set_tag(&mut self, tag: Option<Tag>);
}

/// Association between a decoded entity and the parsing state that produced
/// it. The state is exclusively owned by the entity, replaced wholesale on
/// reassignment, and never structurally validated by the framework.
pub trait StatefulChannel: Channel {
    type State: state::ParsingState;

    fn parsing_state(&self) -> Option<&Self::State>;

    /// Replaces the entity's parsing state, returning the previous one.
    fn replace_parsing_state(&mut self, state: Self::State) -> Option<Self::State>;
}

/// Transient per-entity bookkeeping shared by definitions and values: the
/// opaque tag and the base parsing state. Skipped entirely during
/// serialization.
#[derive(Debug, Clone, Default)]
pub struct ChannelMeta {
    pub tag: Option<Tag>,
    pub state: Option<BaseParsingState>,
}

/// An open-ended, protocol-specific connection parameter bundle surfaced to
/// configuration tooling. The core requires only that implementations can
/// report whether their values are coherent; it never interprets the
/// contents. Implementations are expected to be serializable.
pub trait ConnectionParameters: fmt::Debug {
    fn values_are_valid(&self) -> bool;
}

/// Validates that a text label fits the framework's bounded label contract.
pub(crate) fn check_label(field: &'static str, label: &str, max: usize) -> Result<(), ParseError> {
    if label.len() > max {
        return Err(ParseError::invalid_field(
            field,
            format!("label {:?} exceeds {} bytes", label, max),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_downcast() {
        let tag = Tag::new(42u32);
        assert_eq!(tag.downcast_ref::<u32>(), Some(&42));
        assert!(tag.downcast_ref::<String>().is_none());
    }

    #[test]
    fn test_attributes_preserve_order() {
        let mut attributes = Attributes::new();
        attributes.push("kind", "data");
        attributes.push("id code", 7734);
        attributes.push("cells", 2);

        let names: Vec<&str> = attributes.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["kind", "id code", "cells"]);
        assert_eq!(attributes.get("id code"), Some("7734"));
    }

    #[test]
    fn test_label_bound() {
        assert!(check_label("label", "VA", 16).is_ok());
        assert!(check_label("label", "A-LABEL-THAT-IS-FAR-TOO-LONG", 16).is_err());
    }
}
