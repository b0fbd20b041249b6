//! Element tree nodes
//!
//! An `Element` is the unit of configuration: a name, an ordered attribute map
//! and an ordered list of children. Children are shared handles so that
//! unification can reuse subtrees it does not change.

use crate::error::{InventoryError, Result};
use indexmap::IndexMap;
use std::rc::Rc;

/// Attribute naming the element a derived element is based on
pub const BASE_ATTR: &str = "base";
/// Attribute carrying the version stamp of user-edited elements
pub const VERSION_ATTR: &str = "version";
/// Attribute asking unification to keep the alteration's child order
pub const REORDER_ATTR: &str = "reorder";

/// A named, attribute-bearing node with ordered children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<Rc<Element>>,
    pub text: Option<String>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Rc::new(child));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Look up an attribute that must be present.
    pub fn required_attr(&self, name: &str) -> Result<&str> {
        self.attr(name).ok_or_else(|| InventoryError::MissingAttribute {
            element: self.name.clone(),
            attribute: name.to_string(),
        })
    }

    /// Set an attribute, keeping its position if it already exists.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Read a boolean attribute (`true`/`false`, any case), falling back to
    /// `default` when absent or unparseable.
    pub fn bool_attr(&self, name: &str, default: bool) -> bool {
        match self.attr(name) {
            Some(v) if v.eq_ignore_ascii_case("true") => true,
            Some(v) if v.eq_ignore_ascii_case("false") => false,
            _ => default,
        }
    }

    /// The `base` attribute, if this is a derived element.
    pub fn base(&self) -> Option<&str> {
        self.attr(BASE_ATTR)
    }

    /// Values of the given key attributes, `None` where the attribute is absent.
    pub fn key_values(&self, key_attrs: &[String]) -> Vec<Option<String>> {
        key_attrs
            .iter()
            .map(|attr| self.attr(attr).map(str::to_string))
            .collect()
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Rc::new(child));
    }

    pub fn push_shared(&mut self, child: Rc<Element>) {
        self.children.push(child);
    }

    /// Children with the given element name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Rc<Element>> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Mutable access to the first child, cloning it out of shared storage if needed.
    pub fn first_child_mut(&mut self) -> Option<&mut Element> {
        self.children.first_mut().map(Rc::make_mut)
    }
}
