//! Load pipeline: file discovery, version reconciliation and change detection.

use super::{Inventory, SourceKind};
use crate::element::{Element, VERSION_ATTR};
use crate::error::{InventoryError, Result};
use crate::key::StoreId;
use crate::walker::{FileStamp, TemplateWalker};
use crate::xml::{Selected, XmlDocument};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// File name prefix for user overrides saved without a scope
pub const UNSCOPED_PREFIX: &str = "default$$";

/// File stems with more than one `_`-separated part are user-created views
const VIEW_NAME_SEPARATOR: char = '_';

/// Survivors of version reconciliation for one file
struct Reconciled {
    survivors: Vec<Rc<Element>>,
    merged: bool,
}

impl Inventory {
    /// Read every registered directory from scratch.
    #[instrument(skip(self), fields(pattern = %self.walker.pattern()))]
    pub fn load(&mut self) -> Result<()> {
        let start = Instant::now();
        self.basic_init();

        let sources: Vec<(PathBuf, SourceKind)> =
            self.sources.iter().map(|(p, k)| (p.clone(), *k)).collect();
        for (dir, kind) in sources {
            let files = self.walker_for(kind)?.scan(&dir)?;
            let paths: Vec<PathBuf> = files.into_iter().map(|s| s.path).collect();
            self.add_elements_from_files(&paths, self.version, kind == SourceKind::UserOverrides)?;
        }

        info!(
            files = self.file_stamps.len(),
            elements = self.main.len(),
            alterations = self.alterations.len(),
            merges = self.stats.merges,
            duration_ms = start.elapsed().as_millis() as u64,
            "Inventory loaded"
        );
        Ok(())
    }

    /// Reset and load elements from a document held in memory.
    pub fn load_from_str(&mut self, input: &str, version: i32) -> Result<()> {
        self.basic_init();
        self.add_elements_from_str(input, version)
    }

    /// Add the elements of an in-memory document on top of what is loaded.
    pub fn add_elements_from_str(&mut self, input: &str, version: i32) -> Result<()> {
        let doc = XmlDocument::parse(input)?;
        let selected = self.selection.select(&doc);
        let reconciled = self.merge_and_update_nodes(selected, version, false)?;
        self.load_element_list(reconciled.survivors)
    }

    /// Load `paths` in order. `user_overrides` marks files of user data, whose
    /// unversioned elements count as version 0.
    pub fn add_elements_from_files(
        &mut self,
        paths: &[PathBuf],
        version: i32,
        user_overrides: bool,
    ) -> Result<()> {
        for path in paths {
            let mut doc = self.load_one_file(path)?;
            let selected = self.selection.select(&doc);
            debug!(path = %path.display(), nodes = selected.len(), "Read template file");

            let reconciled = self.merge_and_update_nodes(selected, version, user_overrides)?;
            if reconciled.merged {
                self.refresh_file(path, &mut doc, &reconciled.survivors)?;
            }
            self.load_element_list(reconciled.survivors)?;
        }
        Ok(())
    }

    fn load_one_file(&mut self, path: &Path) -> Result<XmlDocument> {
        let modified = std::fs::metadata(path)?.modified()?;
        self.file_stamps.push(FileStamp {
            path: path.to_path_buf(),
            modified,
        });
        XmlDocument::load(path)
    }

    /// Write upgraded nodes back so the upgrade is not repeated.
    fn refresh_file(
        &mut self,
        path: &Path,
        doc: &mut XmlDocument,
        survivors: &[Rc<Element>],
    ) -> Result<()> {
        if !self.selection.replace_selected(doc, survivors) {
            return Ok(());
        }
        match doc.save(path) {
            Ok(()) => {
                if let Ok(modified) = std::fs::metadata(path).and_then(|m| m.modified()) {
                    if let Some(stamp) = self.file_stamps.iter_mut().rev().find(|s| s.path == path) {
                        stamp.modified = modified;
                    }
                }
                info!(path = %path.display(), "Rewrote upgraded template file");
                Ok(())
            }
            Err(e) if e.is_permission_denied() => {
                warn!(path = %path.display(), error = %e, "Cannot rewrite upgraded template file");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// The version a node declares, or the default for its load.
    fn node_version(node: &Element, default: i32) -> Result<i32> {
        match node.attr(VERSION_ATTR) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| InventoryError::InvalidVersion(raw.to_string())),
            None => Ok(default),
        }
    }

    /// Keep current nodes, upgrade outdated ones through the merger and drop
    /// the rest.
    fn merge_and_update_nodes(
        &mut self,
        selected: Vec<Selected>,
        version: i32,
        user_overrides: bool,
    ) -> Result<Reconciled> {
        let mut seen = HashSet::new();
        let mut unique: Vec<&Selected> = Vec::new();
        for item in &selected {
            if seen.insert(item.element.to_xml()?) {
                unique.push(item);
            }
        }

        let mut survivors = Vec::new();
        let mut merged = false;
        for item in unique {
            let node = &item.element;
            let default = if user_overrides { 0 } else { version };
            let mut file_version = Self::node_version(node, default)?;
            if file_version == 0 && user_overrides {
                let sibling = selected
                    .iter()
                    .filter(|s| s.parent == item.parent)
                    .find(|s| s.element.has_attr(VERSION_ATTR));
                if let Some(sibling) = sibling {
                    file_version = Self::node_version(&sibling.element, 0)?;
                }
            }

            if file_version == version || node.base().is_some() {
                survivors.push(Rc::clone(node));
                continue;
            }
            if self.merger.is_none() {
                debug!(element = %node.name, file_version, version, "Dropping outdated node");
                continue;
            }

            if node.name == self.conventions.grouping_element {
                let mut restamped = (**node).clone();
                restamped.set_attr(VERSION_ATTR, version.to_string());
                survivors.push(Rc::new(restamped));
                merged = true;
                continue;
            }

            match self.merge_outdated(node)? {
                Some(mut upgraded) => {
                    if user_overrides {
                        upgraded.set_attr(VERSION_ATTR, version.to_string());
                    }
                    survivors.push(Rc::new(upgraded));
                    merged = true;
                    self.stats.merges += 1;
                }
                None => {
                    debug!(element = %node.name, file_version, version, "No current element to merge with; dropping");
                }
            }
        }
        Ok(Reconciled { survivors, merged })
    }

    /// Merge an outdated node with the current element of the same key, or
    /// with the standard element it was copied from.
    fn merge_outdated(&mut self, node: &Rc<Element>) -> Result<Option<Element>> {
        let values = self.keys.values_of(node);
        let (current, suffix) = match self.find_in(StoreId::Main, &node.name, &values) {
            Some(current) => (current, String::new()),
            None => {
                let Some((suffix, standard)) = self
                    .suffixes
                    .split_suffix(self.keys.attrs_for(&node.name), &values)
                else {
                    return Ok(None);
                };
                match self.find_in(StoreId::Main, &node.name, &standard) {
                    Some(current) => (current, suffix),
                    None => return Ok(None),
                }
            }
        };
        let Some(merger) = self.merger.as_ref() else {
            return Ok(None);
        };
        debug!(element = %node.name, suffix = %suffix, "Merging outdated node");
        merger.merge(&current, node, &self.main, &suffix).map(Some)
    }

    fn load_element_list(&mut self, survivors: Vec<Rc<Element>>) -> Result<()> {
        for element in survivors {
            self.note_if_ws_tagged(&element);
            if element.name == self.conventions.grouping_element {
                self.add_layout_type_to_inventory(element)?;
            } else {
                self.add_node(element)?;
            }
        }
        Ok(())
    }

    /// Reset and read all registered directories again.
    pub fn reload(&mut self) -> Result<()> {
        self.load()
    }

    /// Reload when any registered directory gained, lost or modified a file.
    /// Returns whether a reload happened.
    pub fn reload_if_changes(&mut self) -> Result<bool> {
        if self.no_files_changed()? {
            debug!("Template files unchanged");
            return Ok(false);
        }
        self.reload()?;
        Ok(true)
    }

    /// Whether a rescan finds exactly the files and times recorded by the last load.
    pub fn no_files_changed(&self) -> Result<bool> {
        let mut current = Vec::new();
        for (dir, kind) in &self.sources {
            current.extend(self.walker_for(*kind)?.scan(dir)?);
        }
        Ok(current == self.file_stamps)
    }

    /// Load extra template directories that are not registered yet.
    pub fn add_custom_files(&mut self, dirs: &[PathBuf]) -> Result<()> {
        for dir in dirs {
            if self.sources.contains_key(dir) || !dir.is_dir() {
                continue;
            }
            self.sources.insert(dir.clone(), SourceKind::Shipped);
            let paths: Vec<PathBuf> = self.walker.scan(dir)?.into_iter().map(|s| s.path).collect();
            self.add_elements_from_files(&paths, self.version, false)?;
        }
        Ok(())
    }

    /// Pattern for user override files of the current scope.
    pub fn user_file_pattern(&self) -> String {
        match self.scope {
            Some(_) => self.walker.pattern().to_string(),
            None => format!("{}{}", UNSCOPED_PREFIX, self.walker.pattern()),
        }
    }

    fn walker_for(&self, kind: SourceKind) -> Result<TemplateWalker> {
        match kind {
            SourceKind::Shipped => Ok(self.walker.clone()),
            SourceKind::UserOverrides => TemplateWalker::new(&self.user_file_pattern()),
        }
    }

    pub(super) fn require_user_override_dir(&self) -> Result<PathBuf> {
        self.user_override_dir.clone().ok_or_else(|| {
            InventoryError::ConfigError("No user override directory configured".to_string())
        })
    }

    /// Load the user's saved overrides, expecting `version`. The directory is
    /// registered for change detection even when it does not exist yet.
    #[instrument(skip(self))]
    pub fn load_user_overrides(&mut self, version: i32, scope: Option<&str>) -> Result<()> {
        self.version = version;
        if let Some(scope) = scope {
            self.scope = Some(scope.to_string());
        }
        let dir = self.require_user_override_dir()?;
        self.sources.insert(dir.clone(), SourceKind::UserOverrides);

        let files = self.walker_for(SourceKind::UserOverrides)?.scan(&dir)?;
        let paths: Vec<PathBuf> = files.into_iter().map(|s| s.path).collect();
        info!(dir = %dir.display(), files = paths.len(), "Loading user overrides");
        self.add_elements_from_files(&paths, version, true)
    }

    /// Delete saved user overrides, keeping user-created views. Returns the
    /// number of files deleted.
    #[instrument(skip(self))]
    pub fn delete_user_overrides(&mut self, scope: Option<&str>) -> Result<usize> {
        if let Some(scope) = scope {
            self.scope = Some(scope.to_string());
        }
        let dir = self.require_user_override_dir()?;
        let mut deleted = 0;
        for stamp in self.walker_for(SourceKind::UserOverrides)?.scan(&dir)? {
            let stem = stamp
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let parts = stem
                .split(VIEW_NAME_SEPARATOR)
                .filter(|part| !part.is_empty())
                .count();
            if parts > 1 {
                debug!(path = %stamp.path.display(), "Keeping user-created view");
                continue;
            }
            match std::fs::remove_file(&stamp.path) {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                    warn!(path = %stamp.path.display(), error = %e, "Cannot delete user override");
                }
                Err(e) => return Err(e.into()),
            }
        }
        info!(dir = %dir.display(), deleted, "Deleted user overrides");
        Ok(deleted)
    }
}
