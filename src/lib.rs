//! Strata: Layered Configuration Template Inventories
//!
//! Loads XML template elements from shipped and user-override directories and
//! resolves each key to one effective element, applying overrides (derivation
//! from a base) and alterations (partial edits unified with the original).

pub mod cache;
pub mod cli;
pub mod config;
pub mod element;
pub mod error;
pub mod inventory;
pub mod key;
pub mod logging;
pub mod merge;
pub mod query;
pub mod registry;
pub mod store;
pub mod unify;
pub mod walker;
pub mod xml;

pub use element::Element;
pub use error::{InventoryError, Result};
pub use inventory::{make_override, Inventory, InventoryStats, PathNode};
pub use key::{ElementKey, KeySchema, StoreId};
pub use merge::{NamedViewSuffix, OldVersionMerger, SuffixResolver};
pub use registry::InventoryRegistry;
