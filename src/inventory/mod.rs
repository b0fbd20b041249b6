//! Inventory
//!
//! Collects template elements from many files and resolves derived elements
//! against their bases. Three logical stores back it:
//!
//! - **main**: resolved elements handed to consumers
//! - **alterations**: raw elements carrying a `base` attribute
//! - **bases**: originals displaced by an override
//!
//! An element whose `base` equals its own identity value is an *override*: it
//! is unified with the element it replaces immediately, and the original is
//! archived. Any other `base` makes an *alteration*, which is resolved lazily
//! the first time its key is requested. Every lookup goes through a
//! [`LookupCache`] that also remembers misses.

use crate::cache::{Lookup, LookupCache};
use crate::config::{InventoryConfig, LayoutConventions, StrataConfig};
use crate::element::Element;
use crate::error::{InventoryError, Result};
use crate::key::{ElementKey, KeySchema, StoreId};
use crate::merge::{NamedViewSuffix, OldVersionMerger, SuffixResolver, NODE_COPY_MARKER};
use crate::query::{PathQuery, Step};
use crate::store::ElementStore;
use crate::unify::{UnifiedCache, Unifier};
use crate::walker::{FileStamp, TemplateWalker};
use crate::xml::SelectionPath;
use indexmap::IndexMap;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

mod load;
mod overrides;
mod persist;

pub use overrides::{make_override, Override, PathNode};

const SUBLAYOUT: &str = "sublayout";
const PART: &str = "part";
const PARAM_ATTR: &str = "param";

/// Lookup counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InventoryStats {
    /// Store scans performed because the cache had no entry
    pub tree_searches: u64,
    /// Lookups answered by the cache, hits and known misses alike
    pub cache_hits: u64,
    /// Outdated elements upgraded by the merger
    pub merges: u64,
}

/// How files in a registered directory are loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Shipped,
    UserOverrides,
}

/// A set of template elements with derivation resolution
pub struct Inventory {
    selection: SelectionPath,
    keys: KeySchema,
    conventions: LayoutConventions,
    walker: TemplateWalker,
    sources: IndexMap<PathBuf, SourceKind>,
    user_override_dir: Option<PathBuf>,
    scope: Option<String>,
    version: i32,
    main: ElementStore,
    alterations: ElementStore,
    bases: ElementStore,
    cache: LookupCache,
    unified: UnifiedCache,
    file_stamps: Vec<FileStamp>,
    ws_tagged: Vec<Rc<Element>>,
    merger: Option<Box<dyn OldVersionMerger>>,
    suffixes: Box<dyn SuffixResolver>,
    resolving: HashSet<ElementKey>,
    stats: InventoryStats,
}

impl fmt::Debug for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inventory")
            .field("selection", &self.selection.as_str())
            .field("pattern", &self.walker.pattern())
            .field("scope", &self.scope)
            .field("version", &self.version)
            .field("main", &self.main.len())
            .field("alterations", &self.alterations.len())
            .field("bases", &self.bases.len())
            .field("has_merger", &self.merger.is_some())
            .finish()
    }
}

impl Inventory {
    /// An empty inventory over `directories`. Nothing is read until
    /// [`Inventory::load`] is called.
    pub fn new(
        directories: impl IntoIterator<Item = PathBuf>,
        file_pattern: &str,
        selection_path: &str,
        keys: KeySchema,
        version: i32,
    ) -> Result<Self> {
        Ok(Self {
            selection: SelectionPath::parse(selection_path)?,
            keys,
            conventions: LayoutConventions::default(),
            walker: TemplateWalker::new(file_pattern)?,
            sources: directories
                .into_iter()
                .map(|dir| (dir, SourceKind::Shipped))
                .collect(),
            user_override_dir: None,
            scope: None,
            version,
            main: ElementStore::new(StoreId::Main),
            alterations: ElementStore::new(StoreId::Alterations),
            bases: ElementStore::new(StoreId::Bases),
            cache: LookupCache::new(),
            unified: UnifiedCache::new(),
            file_stamps: Vec::new(),
            ws_tagged: Vec::new(),
            merger: None,
            suffixes: Box::new(NamedViewSuffix::default()),
            resolving: HashSet::new(),
            stats: InventoryStats::default(),
        })
    }

    /// Build (without loading) the inventory `name` of `config`; relative
    /// paths are taken from `root`.
    pub fn from_config(config: &StrataConfig, name: &str, root: &Path) -> Result<Self> {
        let settings: &InventoryConfig = config.inventory(name)?;
        let mut inventory = Self::new(
            settings.resolved_directories(root),
            &settings.file_pattern,
            &settings.selection_path,
            settings.key_schema(),
            settings.version,
        )?
        .with_conventions(settings.conventions.clone());
        inventory.user_override_dir = config.user_override_dir(name, root);
        inventory.scope = config.project.scope.clone();
        Ok(inventory)
    }

    pub fn with_merger(mut self, merger: Box<dyn OldVersionMerger>) -> Self {
        self.merger = Some(merger);
        self
    }

    pub fn with_suffix_resolver(mut self, resolver: Box<dyn SuffixResolver>) -> Self {
        self.suffixes = resolver;
        self
    }

    pub fn with_conventions(mut self, conventions: LayoutConventions) -> Self {
        self.conventions = conventions;
        self
    }

    pub fn with_user_override_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_override_dir = Some(dir.into());
        self
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn set_scope(&mut self, scope: Option<String>) {
        self.scope = scope;
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn key_schema(&self) -> &KeySchema {
        &self.keys
    }

    pub fn selection_path(&self) -> &SelectionPath {
        &self.selection
    }

    pub fn conventions(&self) -> &LayoutConventions {
        &self.conventions
    }

    pub fn user_override_dir(&self) -> Option<&Path> {
        self.user_override_dir.as_deref()
    }

    /// Registered directories in load order.
    pub fn directories(&self) -> impl Iterator<Item = &PathBuf> {
        self.sources.keys()
    }

    /// Files read by the last load, with the modification times seen then.
    pub fn file_stamps(&self) -> &[FileStamp] {
        &self.file_stamps
    }

    pub fn stats(&self) -> InventoryStats {
        self.stats
    }

    /// Resolved top-level elements in store order.
    pub fn elements(&self) -> &[Rc<Element>] {
        self.main.elements()
    }

    /// Key values for `name`, padded with `None` or truncated to the schema length.
    fn key_values(&self, name: &str, values: &[Option<&str>]) -> Vec<Option<String>> {
        let mut owned: Vec<Option<String>> = values.iter().map(|v| v.map(str::to_string)).collect();
        owned.resize(self.keys.attrs_for(name).len(), None);
        owned
    }

    fn store(&self, id: StoreId) -> &ElementStore {
        match id {
            StoreId::Main => &self.main,
            StoreId::Alterations => &self.alterations,
            StoreId::Bases => &self.bases,
        }
    }

    /// Cache-first lookup in one store; the result, hit or miss, is cached.
    fn find_in(
        &mut self,
        store: StoreId,
        name: &str,
        values: &[Option<String>],
    ) -> Option<Rc<Element>> {
        let key = ElementKey::new(name, values, store);
        match self.cache.get(&key) {
            Lookup::Found(element) => {
                self.stats.cache_hits += 1;
                return Some(element);
            }
            Lookup::Miss => {
                self.stats.cache_hits += 1;
                return None;
            }
            Lookup::NotQueried => {}
        }

        self.stats.tree_searches += 1;
        let query: Vec<Option<&str>> = values.iter().map(Option::as_deref).collect();
        let found = self
            .store(store)
            .find_by_key(name, self.keys.attrs_for(name), &query);
        self.cache.set(key, found.clone());
        found
    }

    /// The resolved element with this name and key values.
    ///
    /// `None` in `values` means the attribute must be absent. A pending
    /// alteration for the key is unified with its base on first request and
    /// the result is kept, so later calls return the same handle.
    pub fn get_element(&mut self, name: &str, values: &[Option<&str>]) -> Option<Rc<Element>> {
        let values = self.key_values(name, values);
        self.resolve(name, values)
    }

    fn resolve(&mut self, name: &str, values: Vec<Option<String>>) -> Option<Rc<Element>> {
        if let Some(found) = self.find_in(StoreId::Main, name, &values) {
            return Some(found);
        }
        let key = ElementKey::new(name, &values, StoreId::Main);
        if self.resolving.contains(&key) {
            debug!(key = %key, "Cyclic base chain; treating as no base");
            return None;
        }
        let alteration = self.find_in(StoreId::Alterations, name, &values)?;
        Some(self.apply_alteration(name, values, alteration, key))
    }

    /// Unify `alteration` with its base and store the result under `key`.
    fn apply_alteration(
        &mut self,
        name: &str,
        values: Vec<Option<String>>,
        alteration: Rc<Element>,
        key: ElementKey,
    ) -> Rc<Element> {
        let mut base_values = values;
        let base = match (base_values.last_mut(), alteration.base()) {
            (Some(slot), Some(base_name)) => {
                *slot = Some(base_name.to_string());
                self.resolving.insert(key.clone());
                let base = self.resolve(name, base_values);
                self.resolving.remove(&key);
                base
            }
            _ => None,
        };

        let result = match base {
            Some(base) => Rc::new(Unifier::new(&self.keys).unify_pair(&alteration, &base)),
            None => {
                debug!(key = %key, "Alteration has no base; using it as is");
                Rc::clone(&alteration)
            }
        };
        self.main.push(Rc::clone(&result));
        self.cache.set(key, Some(Rc::clone(&result)));
        result
    }

    /// The raw derived element (alteration or override) for this key.
    pub fn get_alteration(&mut self, name: &str, values: &[Option<&str>]) -> Option<Rc<Element>> {
        let values = self.key_values(name, values);
        self.find_in(StoreId::Alterations, name, &values)
    }

    /// The element the derived element for this key was based on: the
    /// archived original for an override, the resolved base otherwise.
    pub fn get_base(&mut self, name: &str, values: &[Option<&str>]) -> Option<Rc<Element>> {
        let values = self.key_values(name, values);
        let alteration = self.find_in(StoreId::Alterations, name, &values)?;
        let base_name = alteration.base()?.to_string();
        let mut base_values = values;
        *base_values.last_mut()? = Some(base_name.clone());

        let identity = self
            .keys
            .identity_attr(name)
            .and_then(|attr| alteration.attr(attr));
        if identity == Some(base_name.as_str()) {
            self.find_in(StoreId::Bases, name, &base_values)
        } else {
            self.resolve(name, base_values)
        }
    }

    /// Resolved elements selected by a path such as
    /// `layout[@class='LexEntry' and not(@choiceGuid)]`.
    pub fn get_elements(&self, path: &str) -> Result<Vec<Rc<Element>>> {
        Ok(PathQuery::parse(path)?.select(self.main.elements()))
    }

    /// Resolved elements matching a possibly partial key: only as many key
    /// attributes as there are values are tested. Pending alterations are
    /// not resolved.
    pub fn get_elements_matching(&self, name: &str, values: &[Option<&str>]) -> Vec<Rc<Element>> {
        let step = Step::for_key(name, self.keys.attrs_for(name), values);
        debug!(query = %step, "Selecting elements");
        self.main.all_matching(&step)
    }

    /// Add (or replace by key) an element as if it had been loaded.
    pub fn add_node_to_inventory(&mut self, element: impl Into<Rc<Element>>) -> Result<()> {
        self.add_node(element.into())
    }

    /// Classify a node and place it in the stores.
    fn add_node(&mut self, node: Rc<Element>) -> Result<()> {
        let name = node.name.clone();
        let values = self.keys.values_of(&node);
        let key_main = ElementKey::new(&name, &values, StoreId::Main);
        let mut extant = self.cache.get(&key_main).found();

        let Some(base_name) = node.base().map(str::to_string) else {
            self.main.insert_or_replace(extant.as_ref(), Rc::clone(&node));
            self.cache.set(key_main, Some(node));
            return Ok(());
        };

        let identity_attr = self
            .keys
            .identity_attr(&name)
            .ok_or_else(|| InventoryError::BaseWithoutKey(name.clone()))?
            .to_string();
        let identity = node.required_attr(&identity_attr)?;

        if identity == base_name {
            if extant.is_none() {
                extant = self.resolve(&name, values.clone());
            }
            let extant = extant.ok_or_else(|| {
                InventoryError::NoBaseToOverride(format!("{} ({})", base_name, key_main))
            })?;
            let key_base = key_main.in_store(StoreId::Bases);
            if matches!(self.cache.get(&key_base), Lookup::Found(_)) {
                return Err(InventoryError::OverrideDepthExceeded(format!(
                    "{} ({})",
                    base_name, key_main
                )));
            }
            self.bases.push(Rc::clone(&extant));
            self.cache.set(key_base, Some(Rc::clone(&extant)));

            let unified = Rc::new(Unifier::new(&self.keys).unify_pair(&node, &extant));
            self.main.insert_or_replace(Some(&extant), Rc::clone(&unified));
            self.cache.set(key_main.clone(), Some(unified));
            debug!(key = %key_main, "Applied override");
        } else if let Some(extant) = extant {
            self.main.remove(&extant);
            self.cache.set(key_main.clone(), None);
            debug!(key = %key_main, base = %base_name, "Alteration displaced resolved element");
        }

        let key_alterations = key_main.in_store(StoreId::Alterations);
        let previous = self.cache.get(&key_alterations).found();
        self.alterations
            .insert_or_replace(previous.as_ref(), Rc::clone(&node));
        self.cache.set(key_alterations, Some(node));
        Ok(())
    }

    /// Add a grouping element, replacing the one with the same grouping
    /// attribute value.
    pub fn add_layout_type_to_inventory(&mut self, element: impl Into<Rc<Element>>) -> Result<()> {
        let element = element.into();
        let attr = &self.conventions.grouping_attribute;
        let value = element.required_attr(attr)?;
        let extant = self
            .main
            .named(&self.conventions.grouping_element)
            .find(|g| g.attr(attr) == Some(value))
            .cloned();
        self.main.insert_or_replace(extant.as_ref(), Rc::clone(&element));
        Ok(())
    }

    /// Grouping elements in store order.
    pub fn get_layout_types(&self) -> Vec<Rc<Element>> {
        self.main
            .named(&self.conventions.grouping_element)
            .cloned()
            .collect()
    }

    /// Tags following a node-copy marker in the key values of resolved elements.
    pub fn existing_duplicate_keys(&self) -> BTreeSet<String> {
        self.cache
            .found_keys(StoreId::Main)
            .flat_map(|key| key.values().iter().flatten())
            .filter_map(|value| {
                let index = value.find(NODE_COPY_MARKER)?;
                let tag = &value[index + NODE_COPY_MARKER.len_utf8()..];
                (!tag.is_empty()).then(|| tag.to_string())
            })
            .collect()
    }

    /// Add a `<name>-<tag>` copy of every writing-system tagged layout that
    /// does not have one yet. Returns how many copies were added.
    pub fn expand_ws_tagged_nodes(&mut self, tag: &str) -> Result<usize> {
        let name_attr = self.conventions.name_attribute.clone();
        let mut added = 0;
        for node in self.ws_tagged.clone() {
            let ws_name = format!("{}-{}", node.required_attr(&name_attr)?, tag);
            let mut values = self.keys.values_of(&node);
            if let Some(slot) = self
                .keys
                .attrs_for(&node.name)
                .iter()
                .position(|attr| *attr == name_attr)
            {
                values[slot] = Some(ws_name.clone());
            }
            if self.resolve(&node.name, values).is_some() {
                continue;
            }

            let mut copy = (*node).clone();
            copy.set_attr(name_attr.as_str(), ws_name);
            for child in copy.children.iter_mut() {
                if child.name == SUBLAYOUT {
                    let sub_name = format!("{}-{}", child.required_attr(&name_attr)?, tag);
                    Rc::make_mut(child).set_attr(name_attr.as_str(), sub_name);
                } else if child.name == PART {
                    if let Some(param) = child.attr(PARAM_ATTR).filter(|p| !p.is_empty()) {
                        let param = format!("{}-{}", param, tag);
                        Rc::make_mut(child).set_attr(PARAM_ATTR, param);
                    }
                }
            }
            self.add_node(Rc::new(copy))?;
            added += 1;
        }
        debug!(tag, added, "Expanded writing-system tagged layouts");
        Ok(added)
    }

    fn note_if_ws_tagged(&mut self, node: &Rc<Element>) {
        let c = &self.conventions;
        if node.name == c.ws_element
            && node.attr("type") == Some(c.ws_type.as_str())
            && node.bool_attr(&c.ws_flag, false)
        {
            self.ws_tagged.push(Rc::clone(node));
        }
    }

    /// An element with `main`'s attributes and the unification of
    /// `alteration`'s children with `main`'s. Memoized per pair of handles.
    pub fn get_unified(&mut self, main: &Rc<Element>, alteration: &Rc<Element>) -> Rc<Element> {
        let unifier = Unifier::new(&self.keys);
        self.unified.get_or_unify(&unifier, main, alteration)
    }

    /// Drop everything loaded so far.
    fn basic_init(&mut self) {
        self.main.clear();
        self.alterations.clear();
        self.bases.clear();
        self.cache.clear();
        self.unified.clear();
        self.file_stamps.clear();
        self.ws_tagged.clear();
        self.resolving.clear();
    }
}
