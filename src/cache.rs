//! Lookup cache
//!
//! Memoizes `ElementKey -> element` lookups, including lookups that found
//! nothing, so repeated queries never rescan a store.

use crate::element::Element;
use crate::key::{ElementKey, StoreId};
use std::collections::HashMap;
use std::rc::Rc;

/// Result of consulting the cache
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The key has never been looked up
    NotQueried,
    /// The key was looked up and resolved to nothing
    Miss,
    /// The key resolves to this element
    Found(Rc<Element>),
}

impl Lookup {
    /// The element, if the key is known to resolve to one.
    pub fn found(self) -> Option<Rc<Element>> {
        match self {
            Lookup::Found(element) => Some(element),
            Lookup::NotQueried | Lookup::Miss => None,
        }
    }
}

/// Cached lookups: ElementKey -> Miss | Found
#[derive(Debug, Default)]
pub struct LookupCache {
    entries: HashMap<ElementKey, Option<Rc<Element>>>,
}

impl LookupCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ElementKey) -> Lookup {
        match self.entries.get(key) {
            None => Lookup::NotQueried,
            Some(None) => Lookup::Miss,
            Some(Some(element)) => Lookup::Found(Rc::clone(element)),
        }
    }

    /// Record the result of a lookup, overwriting any previous entry.
    pub fn set(&mut self, key: ElementKey, element: Option<Rc<Element>>) {
        self.entries.insert(key, element);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys addressed to `store` that currently resolve to an element.
    pub fn found_keys(&self, store: StoreId) -> impl Iterator<Item = &ElementKey> {
        self.entries
            .iter()
            .filter(move |(key, element)| key.store() == store && element.is_some())
            .map(|(key, _)| key)
    }
}
