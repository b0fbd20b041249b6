//! Building override elements from a display path
//!
//! A display path runs from a layout through the part refs that invoke
//! further layouts, down to the part the user edited. An override is a copy
//! of the outermost layout (or of the layout a `sublayout` invokes) with a
//! chain of `part ref` children leading to the edited part.

use crate::element::{Element, VERSION_ATTR};
use crate::error::{InventoryError, Result};
use std::rc::Rc;

const SUBLAYOUT: &str = "sublayout";
const PART: &str = "part";
const INDENT: &str = "indent";
const REF_ATTR: &str = "ref";
const PARAM_ATTR: &str = "param";
const CUSTOM_PART: &str = "Custom";

/// One node of a display path.
#[derive(Debug, Clone)]
pub struct PathNode {
    pub element: Rc<Element>,
    /// The element containing `element` in its own layout. Only an `indent`
    /// parent affects the override.
    pub parent: Option<Rc<Element>>,
}

impl PathNode {
    pub fn new(element: Rc<Element>) -> Self {
        Self {
            element,
            parent: None,
        }
    }

    pub fn within(mut self, parent: Rc<Element>) -> Self {
        self.parent = Some(parent);
        self
    }
}

impl From<Rc<Element>> for PathNode {
    fn from(element: Rc<Element>) -> Self {
        Self::new(element)
    }
}

/// A new override element and the position of its edited part ref.
#[derive(Debug, Clone)]
pub struct Override {
    pub element: Element,
    /// Child indices leading from `element` to the edited part ref
    pub part_ref_path: Vec<usize>,
}

impl Override {
    /// The part ref carrying the edited attribute.
    pub fn part_ref(&self) -> Option<&Element> {
        let mut node = &self.element;
        for &index in &self.part_ref_path {
            node = node.children.get(index)?;
        }
        Some(node)
    }
}

/// Build an override that sets `attr` to `value` on the last part ref of
/// `path`. The copied layout is stamped with `version`; shared subtrees of
/// the source layout are left untouched.
pub fn make_override(path: &[PathNode], attr: &str, value: &str, version: i32) -> Result<Override> {
    let mut start = 0;
    for i in (1..path.len()).rev() {
        if path[i].element.name == SUBLAYOUT {
            start = i + 1;
            break;
        }
    }
    let root = path.get(start).ok_or_else(|| {
        InventoryError::InvalidOverridePath("no layout follows the last sublayout".to_string())
    })?;

    let mut result = (*root.element).clone();
    result.set_attr(VERSION_ATTR, version.to_string());

    let mut cursor: Vec<usize> = Vec::new();
    let mut found_part = false;
    for node in &path[start + 1..] {
        let element = &node.element;
        if element.name != PART {
            continue;
        }
        let Some(part_id) = element.attr(REF_ATTR) else {
            continue;
        };

        if let Some(parent) = node.parent.as_ref().filter(|p| p.name == INDENT) {
            let current = node_at(&mut result, &cursor);
            let index = match current.children.iter().position(|c| c.name == parent.name) {
                Some(index) => index,
                None => {
                    current.push_shared(Rc::clone(parent));
                    current.children.len() - 1
                }
            };
            cursor.push(index);
        }

        let current = node_at(&mut result, &cursor);
        let existing = current.children.iter().position(|child| {
            child.attr(REF_ATTR) == Some(part_id)
                && (part_id != CUSTOM_PART || child.attr(PARAM_ATTR) == element.attr(PARAM_ATTR))
        });
        let index = match existing {
            Some(index) => index,
            None => {
                let mut part = Element::new(PART).with_attr(REF_ATTR, part_id);
                if part_id == CUSTOM_PART {
                    if let Some(param) = element.attr(PARAM_ATTR).filter(|p| !p.is_empty()) {
                        part.set_attr(PARAM_ATTR, param);
                    }
                }
                current.push_child(part);
                current.children.len() - 1
            }
        };
        cursor.push(index);
        found_part = true;
    }

    if !found_part {
        return Err(InventoryError::InvalidOverridePath(format!(
            "no part ref below <{}>",
            result.name
        )));
    }
    node_at(&mut result, &cursor).set_attr(attr, value);
    Ok(Override {
        element: result,
        part_ref_path: cursor,
    })
}

fn node_at<'a>(root: &'a mut Element, cursor: &[usize]) -> &'a mut Element {
    let mut node = root;
    for &index in cursor {
        node = Rc::make_mut(&mut node.children[index]);
    }
    node
}
