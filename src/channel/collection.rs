//! # Channel Collections
//!
//! Ordered, insertion-order-preserving, index-addressable containers of one
//! channel element type, with binary-length accounting specialized for the
//! two shapes real protocols produce: collections whose elements all occupy
//! one statically known byte width (per-PMU status cells, fixed-format value
//! runs), and collections whose elements vary per device (data cells with
//! differing phasor/analog/digital counts).

use serde::{Deserialize, Serialize};
use std::ops::Index;
use std::slice;

use crate::error::ParseError;

use super::Channel;

/// An ordered container of channel elements with specialized binary-length
/// accounting.
///
/// When a fixed element length is declared, the total binary length is
/// `count * length` without touching elements; otherwise it is the sum of
/// each element's individually decoded length. The fixed-element flag is
/// surfaced to protocol-specific code for serialization decisions but is not
/// enforced by the framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelCollection<T> {
    items: Vec<T>,
    last_valid_index: usize,
    fixed_element_length: Option<usize>,
}

impl<T> ChannelCollection<T> {
    /// An unbounded, variable-element-length collection.
    pub fn new() -> Self {
        ChannelCollection {
            items: Vec::new(),
            last_valid_index: usize::MAX,
            fixed_element_length: None,
        }
    }

    /// A collection that rejects insertions past `last_valid_index`.
    pub fn with_bound(last_valid_index: usize) -> Self {
        ChannelCollection {
            items: Vec::with_capacity(last_valid_index.saturating_add(1)),
            last_valid_index,
            fixed_element_length: None,
        }
    }

    /// A bounded collection whose elements are all statically known to occupy
    /// `element_length` bytes.
    pub fn with_fixed_length(last_valid_index: usize, element_length: usize) -> Self {
        ChannelCollection {
            items: Vec::with_capacity(last_valid_index.saturating_add(1)),
            last_valid_index,
            fixed_element_length: Some(element_length),
        }
    }

    /// Appends an element, enforcing the capacity bound.
    pub fn try_push(&mut self, item: T) -> Result<(), ParseError> {
        if self.items.len() > self.last_valid_index {
            return Err(ParseError::invalid_field(
                "collection",
                format!(
                    "insertion past last valid index {} (length {})",
                    self.last_valid_index,
                    self.items.len()
                ),
            ));
        }
        self.items.push(item);
        Ok(())
    }

    pub fn last_valid_index(&self) -> usize {
        self.last_valid_index
    }

    /// True when every element is statically known to occupy the same number
    /// of bytes.
    pub fn has_fixed_element_length(&self) -> bool {
        self.fixed_element_length.is_some()
    }

    pub fn fixed_element_length(&self) -> Option<usize> {
        self.fixed_element_length
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

impl<T: Channel> ChannelCollection<T> {
    /// Total encoded byte length of the collection.
    ///
    /// Constant-length collections are computed arithmetically in O(1);
    /// variable-length collections sum each element's decoded length.
    pub fn binary_length(&self) -> usize {
        match self.fixed_element_length {
            Some(length) => self.items.len() * length,
            None => self.items.iter().map(|item| item.decoded_length()).sum(),
        }
    }
}

impl<T> Default for ChannelCollection<T> {
    fn default() -> Self {
        ChannelCollection::new()
    }
}

impl<T> Index<usize> for ChannelCollection<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a ChannelCollection<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> IntoIterator for ChannelCollection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<T> FromIterator<T> for ChannelCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        ChannelCollection {
            items: iter.into_iter().collect(),
            last_valid_index: usize::MAX,
            fixed_element_length: None,
        }
    }
}
