//! Version reconciliation collaborators
//!
//! The inventory never merges outdated user data itself; it hands the pair to
//! an [`OldVersionMerger`]. When an outdated node has no current counterpart
//! under its own key, a [`SuffixResolver`] is asked whether the key is a copy
//! of a standard one (a named view or a duplicated node).

use crate::element::Element;
use crate::error::Result;
use crate::store::ElementStore;

/// Node-copy marker inside a key value
pub const NODE_COPY_MARKER: char = '%';
/// Layout-copy (named view) marker inside a key value
pub const LAYOUT_COPY_MARKER: char = '#';

/// Merges a stale user-edited element into the current shipped one.
pub trait OldVersionMerger {
    /// Produce the upgraded element. `destination` is the Main Store the
    /// result will live in; `suffix` is the named-view or duplicate-node
    /// suffix split off the outdated element's key, or empty.
    fn merge(
        &self,
        current: &Element,
        outdated: &Element,
        destination: &ElementStore,
        suffix: &str,
    ) -> Result<Element>;
}

/// Splits a copy suffix off key values.
pub trait SuffixResolver {
    /// The suffix and the standard key values it was split from, or `None`
    /// when the key does not look like a copy.
    fn split_suffix(
        &self,
        key_attrs: &[String],
        values: &[Option<String>],
    ) -> Option<(String, Vec<Option<String>>)>;
}

/// Default [`SuffixResolver`]: looks at one attribute (`name` by default) and
/// splits at the first marker found after its first character, trying
/// `#`, `%`, `_` and `-` in that order.
#[derive(Debug, Clone)]
pub struct NamedViewSuffix {
    attribute: String,
    markers: Vec<char>,
}

impl Default for NamedViewSuffix {
    fn default() -> Self {
        Self {
            attribute: "name".to_string(),
            markers: vec![LAYOUT_COPY_MARKER, NODE_COPY_MARKER, '_', '-'],
        }
    }
}

impl NamedViewSuffix {
    pub fn new(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ..Self::default()
        }
    }

    /// Split one value into (standard part, suffix including its marker).
    pub fn split_value<'v>(&self, value: &'v str) -> Option<(&'v str, &'v str)> {
        self.markers.iter().find_map(|&marker| {
            value
                .char_indices()
                .skip(1)
                .find(|&(_, c)| c == marker)
                .map(|(index, _)| value.split_at(index))
        })
    }
}

impl SuffixResolver for NamedViewSuffix {
    fn split_suffix(
        &self,
        key_attrs: &[String],
        values: &[Option<String>],
    ) -> Option<(String, Vec<Option<String>>)> {
        let slot = key_attrs.iter().position(|a| *a == self.attribute)?;
        let value = values.get(slot)?.as_deref()?;
        let (standard, suffix) = self.split_value(value)?;
        let mut standard_values = values.to_vec();
        standard_values[slot] = Some(standard.to_string());
        Some((suffix.to_string(), standard_values))
    }
}
