//! Element Store
//!
//! A synthetic root holding top-level elements as an index-addressable list.
//! Replacing an element is an index assignment located by handle identity.

use crate::element::Element;
use crate::key::StoreId;
use crate::query::Step;
use std::rc::Rc;

/// One logical store: the direct children of a synthetic root
#[derive(Debug)]
pub struct ElementStore {
    id: StoreId,
    elements: Vec<Rc<Element>>,
}

impl ElementStore {
    pub fn new(id: StoreId) -> Self {
        Self {
            id,
            elements: Vec::new(),
        }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn elements(&self) -> &[Rc<Element>] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn push(&mut self, element: Rc<Element>) {
        self.elements.push(element);
    }

    /// Index of this exact handle.
    pub fn position(&self, element: &Rc<Element>) -> Option<usize> {
        self.elements.iter().position(|e| Rc::ptr_eq(e, element))
    }

    pub fn contains(&self, element: &Rc<Element>) -> bool {
        self.position(element).is_some()
    }

    /// Put `replacement` where `extant` is. Appends when `extant` is `None`
    /// or no longer held by this store.
    pub fn insert_or_replace(&mut self, extant: Option<&Rc<Element>>, replacement: Rc<Element>) {
        match extant.and_then(|e| self.position(e)) {
            Some(index) => self.elements[index] = replacement,
            None => self.elements.push(replacement),
        }
    }

    pub fn remove(&mut self, element: &Rc<Element>) -> bool {
        match self.position(element) {
            Some(index) => {
                self.elements.remove(index);
                true
            }
            None => false,
        }
    }

    /// First direct child named `name` whose key attributes equal `values`.
    ///
    /// A `None` value requires the attribute to be absent; values missing
    /// from the end of `values` are treated as `None`.
    pub fn find_by_key(
        &self,
        name: &str,
        key_attrs: &[String],
        values: &[Option<&str>],
    ) -> Option<Rc<Element>> {
        let mut padded = values.to_vec();
        padded.resize(key_attrs.len(), None);
        let step = Step::for_key(name, key_attrs, &padded);
        self.first_matching(&step)
    }

    pub fn first_matching(&self, step: &Step) -> Option<Rc<Element>> {
        self.elements.iter().find(|e| step.matches(e)).cloned()
    }

    pub fn all_matching(&self, step: &Step) -> Vec<Rc<Element>> {
        self.elements.iter().filter(|e| step.matches(e)).cloned().collect()
    }

    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Rc<Element>> {
        self.elements.iter().filter(move |e| e.name == name)
    }
}
