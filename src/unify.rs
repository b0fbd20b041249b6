//! Unification of derived elements with their bases
//!
//! `unify(alteration, base)` builds the element a derived definition stands
//! for: the alteration's attributes win, missing ones are inherited from the
//! base, and children are paired up by name and key attributes and unified
//! recursively.

use crate::element::{Element, REORDER_ATTR};
use crate::key::KeySchema;
use std::collections::HashMap;
use std::rc::Rc;

/// Stateless unification under a key schema
#[derive(Debug, Clone, Copy)]
pub struct Unifier<'a> {
    keys: &'a KeySchema,
}

impl<'a> Unifier<'a> {
    pub fn new(keys: &'a KeySchema) -> Self {
        Self { keys }
    }

    /// Unify two optional shared elements. With only one side present that
    /// side is returned unchanged.
    pub fn unify(
        &self,
        alteration: Option<&Rc<Element>>,
        base: Option<&Rc<Element>>,
    ) -> Option<Rc<Element>> {
        match (alteration, base) {
            (Some(alteration), Some(base)) => Some(Rc::new(self.unify_pair(alteration, base))),
            (Some(only), None) | (None, Some(only)) => Some(Rc::clone(only)),
            (None, None) => None,
        }
    }

    /// Unify an alteration with a base that are both present.
    pub fn unify_pair(&self, alteration: &Element, base: &Element) -> Element {
        let mut unified = Element::new(alteration.name.as_str());
        unified.attributes = alteration.attributes.clone();
        for (name, value) in &base.attributes {
            if !unified.attributes.contains_key(name) {
                unified.attributes.insert(name.clone(), value.clone());
            }
        }
        unified.text = alteration.text.clone().or_else(|| base.text.clone());
        self.unify_children(alteration, base, &mut unified);
        unified
    }

    /// Append the merged children of `alteration` and `base` to `unified`.
    ///
    /// Without `reorder="true"` on the alteration the base order is kept and
    /// unmatched alteration children follow; with it the alteration order is
    /// kept and unmatched base children follow. Matched pairs are unified
    /// with the alteration child taking precedence either way.
    pub fn unify_children(&self, alteration: &Element, base: &Element, unified: &mut Element) {
        let reorder = alteration.bool_attr(REORDER_ATTR, false);
        let (order_by, others) = if reorder {
            (&alteration.children, &base.children)
        } else {
            (&base.children, &alteration.children)
        };

        let mut remaining: Vec<&Rc<Element>> = others.iter().collect();
        for item in order_by {
            let merged = match self.match_and_remove(&mut remaining, item) {
                Some(other) if reorder => Rc::new(self.unify_pair(item, other)),
                Some(other) => Rc::new(self.unify_pair(other, item)),
                None => Rc::clone(item),
            };
            unified.push_shared(merged);
        }
        for item in remaining {
            unified.push_shared(Rc::clone(item));
        }
    }

    /// Remove and return the first element of `remaining` with the same name
    /// as `target` and equal values for every key attribute of that name.
    pub fn match_and_remove<'e>(
        &self,
        remaining: &mut Vec<&'e Rc<Element>>,
        target: &Element,
    ) -> Option<&'e Rc<Element>> {
        let key_attrs = self.keys.attrs_for(&target.name);
        let index = remaining.iter().position(|candidate| {
            candidate.name == target.name
                && key_attrs
                    .iter()
                    .all(|attr| candidate.attr(attr) == target.attr(attr))
        })?;
        Some(remaining.remove(index))
    }
}

/// Handle compared by address, not content
#[derive(Debug, Clone)]
struct ByAddress(Rc<Element>);

impl PartialEq for ByAddress {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ByAddress {}

impl std::hash::Hash for ByAddress {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Rc::as_ptr(&self.0).hash(state);
    }
}

/// Memo for `get_unified`, keyed by the identity of the two source handles.
///
/// The cache holds both sources alive, so an address is never reused for a
/// different element while its entry exists.
#[derive(Debug, Default)]
pub struct UnifiedCache {
    entries: HashMap<(ByAddress, ByAddress), Rc<Element>>,
}

impl UnifiedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// An element with `main`'s name and attributes whose children are the
    /// unification of `alteration`'s children with `main`'s.
    pub fn get_or_unify(
        &mut self,
        unifier: &Unifier<'_>,
        main: &Rc<Element>,
        alteration: &Rc<Element>,
    ) -> Rc<Element> {
        let key = (ByAddress(Rc::clone(main)), ByAddress(Rc::clone(alteration)));
        let entry = self.entries.entry(key).or_insert_with(|| {
            let mut result = Element::new(main.name.as_str());
            result.attributes = main.attributes.clone();
            result.text = main.text.clone();
            unifier.unify_children(alteration, main, &mut result);
            Rc::new(result)
        });
        Rc::clone(entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
