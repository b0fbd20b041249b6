//! Persistence of user overrides
//!
//! Each override is written to its own file in the user override directory,
//! named after the element's identity value. Named views (identity values
//! containing a layout-copy marker) are named after the grouping element they
//! belong to, and that grouping element is saved alongside.

use super::load::UNSCOPED_PREFIX;
use super::Inventory;
use crate::element::{Element, VERSION_ATTR};
use crate::error::{InventoryError, Result};
use crate::merge::{LAYOUT_COPY_MARKER, NODE_COPY_MARKER};
use crate::xml::XmlDocument;
use std::path::PathBuf;
use std::rc::Rc;
use tracing::{debug, info, instrument};

impl Inventory {
    /// Save `element` as a user override and register it. Returns the file
    /// written.
    #[instrument(skip(self, element), fields(element = %element.name))]
    pub fn persist_override_element(&mut self, mut element: Element) -> Result<PathBuf> {
        if self.version != 0 && !element.has_attr(VERSION_ATTR) {
            element.set_attr(VERSION_ATTR, self.version.to_string());
        }

        let identity_attr = self
            .keys
            .identity_attr(&element.name)
            .ok_or_else(|| {
                InventoryError::ConfigError(format!(
                    "No key attributes configured for <{}>",
                    element.name
                ))
            })?
            .to_string();
        let identity = element.required_attr(&identity_attr)?.to_string();

        let grouping = self.grouping_for_named_view(&identity);
        let stem = match &grouping {
            Some(grouping) => {
                let label = grouping.required_attr(&self.conventions.label_attribute)?;
                let class = grouping
                    .children
                    .first()
                    .and_then(|c| c.attr(&self.conventions.class_attribute))
                    .unwrap_or_default();
                format!("{}_{}", label, class)
            }
            None => identity,
        };

        let dir = self.require_user_override_dir()?;
        let prefix = if self.scope.is_none() { UNSCOPED_PREFIX } else { "" };
        let file_name = format!("{}{}{}", prefix, stem, self.pattern_suffix());
        let path = dir.join(file_name);
        std::fs::create_dir_all(&dir)?;

        let mut doc = if path.exists() {
            XmlDocument::load(&path)?
        } else {
            self.selection.skeleton()
        };
        let key_attrs = self.keys.attrs_for(&element.name).to_vec();
        let grouping_element = self.conventions.grouping_element.clone();
        let grouping_attr = self.conventions.grouping_attribute.clone();

        if self.selection.innermost_wrapper_mut(&mut doc).is_none() {
            debug!(path = %path.display(), "Unexpected file layout; starting a fresh document");
            doc = self.selection.skeleton();
        }
        let Some(parent) = self.selection.innermost_wrapper_mut(&mut doc) else {
            return Err(InventoryError::InvalidSelectionPath(
                self.selection.as_str().to_string(),
            ));
        };

        if let Some(index) = parent.children.iter().position(|child| {
            child.name == element.name
                && key_attrs
                    .iter()
                    .all(|attr| child.attr(attr) == element.attr(attr))
        }) {
            parent.children.remove(index);
        }
        if let Some(grouping) = &grouping {
            let layout = grouping.attr(&grouping_attr);
            if let Some(index) = parent
                .children
                .iter()
                .position(|child| child.name == grouping_element && child.attr(&grouping_attr) == layout)
            {
                parent.children.remove(index);
            }
        }

        let element = Rc::new(element);
        parent.push_shared(Rc::clone(&element));
        if let Some(grouping) = grouping {
            parent.push_shared(grouping);
        }
        doc.save(&path)?;
        info!(path = %path.display(), "Persisted user override");

        self.add_node(element)?;
        Ok(path)
    }

    /// The grouping element a named-view identity belongs to: the tag from
    /// the layout-copy marker (cut at a node-copy marker) must end its
    /// grouping attribute.
    fn grouping_for_named_view(&self, identity: &str) -> Option<Rc<Element>> {
        let index = identity.find(LAYOUT_COPY_MARKER).filter(|&i| i > 0)?;
        let mut tag = &identity[index..];
        if let Some(cut) = tag.find(NODE_COPY_MARKER).filter(|&i| i > 0) {
            tag = &tag[..cut];
        }
        self.main
            .named(&self.conventions.grouping_element)
            .find(|g| {
                g.attr(&self.conventions.grouping_attribute)
                    .is_some_and(|layout| layout.ends_with(tag))
            })
            .cloned()
    }

    /// The file pattern without its leading wildcard.
    pub fn pattern_suffix(&self) -> &str {
        let pattern = self.walker.pattern();
        pattern.strip_prefix('*').unwrap_or(pattern)
    }
}
