//! Element identity
//!
//! A `KeySchema` says which attributes identify an element of a given name.
//! An `ElementKey` is the resulting lookup key: the element name, the
//! lower-cased key attribute values and the store being searched.

use crate::element::Element;
use std::collections::HashMap;
use std::fmt;

/// The logical store an element key addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreId {
    /// Resolved elements served to consumers
    Main,
    /// Raw derived elements (those carrying a `base` attribute)
    Alterations,
    /// Originals displaced by an override
    Bases,
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreId::Main => write!(f, "main"),
            StoreId::Alterations => write!(f, "alterations"),
            StoreId::Bases => write!(f, "bases"),
        }
    }
}

/// Mapping from element name to the ordered attributes that identify it.
///
/// The last attribute of each list is the identity attribute that a `base`
/// reference has to match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySchema {
    attrs: HashMap<String, Vec<String>>,
}

impl KeySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of the key attributes for an element name.
    pub fn with(mut self, element: impl Into<String>, attrs: &[&str]) -> Self {
        self.insert(element, attrs.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn insert(&mut self, element: impl Into<String>, attrs: Vec<String>) {
        self.attrs.insert(element.into(), attrs);
    }

    /// Key attributes for an element name; empty when the name has no schema entry.
    pub fn attrs_for(&self, element: &str) -> &[String] {
        self.attrs.get(element).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The identity attribute (last key attribute), if the name has any.
    pub fn identity_attr(&self, element: &str) -> Option<&str> {
        self.attrs_for(element).last().map(String::as_str)
    }

    /// Key attribute values of `element` under this schema.
    pub fn values_of(&self, element: &Element) -> Vec<Option<String>> {
        element.key_values(self.attrs_for(&element.name))
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }
}

/// Composite lookup key. Values are lower-cased; `None` (attribute must be
/// absent) is distinct from `Some("")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementKey {
    element: String,
    values: Vec<Option<String>>,
    store: StoreId,
}

impl ElementKey {
    pub fn new<S: AsRef<str>>(element: &str, values: &[Option<S>], store: StoreId) -> Self {
        Self {
            element: element.to_string(),
            values: values
                .iter()
                .map(|v| v.as_ref().map(|s| AsRef::<str>::as_ref(s).to_lowercase()))
                .collect(),
            store,
        }
    }

    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn store(&self) -> StoreId {
        self.store
    }

    /// The same element name and values addressed to another store.
    pub fn in_store(&self, store: StoreId) -> Self {
        Self {
            store,
            ..self.clone()
        }
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<&str> = self
            .values
            .iter()
            .map(|v| v.as_deref().unwrap_or(""))
            .collect();
        write!(f, "{}: {} ({})", self.element, values.join("-"), self.store)
    }
}
