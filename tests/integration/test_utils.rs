//! Shared test utilities for integration tests
//!
//! Builds template directories in a temp dir and layout inventories over them.

use std::path::{Path, PathBuf};
use strata::{Element, Inventory, KeySchema};

pub const LAYOUT_VERSION: i32 = 25;
pub const LAYOUT_PATTERN: &str = "*.fwlayout";
pub const LAYOUT_SELECTION: &str = "/LayoutInventory/*";

pub fn layout_schema() -> KeySchema {
    KeySchema::new()
        .with("layout", &["class", "type", "name"])
        .with("part", &["ref"])
}

/// Write `body` wrapped in `<LayoutInventory>` to `dir/file`.
pub fn write_layouts(dir: &Path, file: &str, body: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(file);
    std::fs::write(&path, format!("<LayoutInventory>{}</LayoutInventory>", body)).unwrap();
    path
}

/// An unloaded, unscoped layout inventory over `shipped` with user overrides in `user`.
pub fn layouts(shipped: &Path, user: &Path) -> Inventory {
    Inventory::new(
        vec![shipped.to_path_buf()],
        LAYOUT_PATTERN,
        LAYOUT_SELECTION,
        layout_schema(),
        LAYOUT_VERSION,
    )
    .unwrap()
    .with_user_override_dir(user)
}

/// Load shipped templates, then the user's overrides.
pub fn load_all(inventory: &mut Inventory) {
    inventory.load().unwrap();
    inventory.load_user_overrides(LAYOUT_VERSION, None).unwrap();
}

pub fn entry_key(name: &str) -> [Option<&str>; 3] {
    [Some("LexEntry"), Some("jtview"), Some(name)]
}

pub fn entry_layout(name: &str) -> Element {
    Element::new("layout")
        .with_attr("class", "LexEntry")
        .with_attr("type", "jtview")
        .with_attr("name", name)
}

/// `ref` values of an element's `part` children, in order.
pub fn part_refs(element: &Element) -> Vec<String> {
    element
        .children_named("part")
        .filter_map(|p| p.attr("ref").map(str::to_string))
        .collect()
}

/// Make a file or directory read-only. Returns false when the process can
/// still write to it (running as root), in which case permission handling
/// cannot be exercised.
#[cfg(unix)]
pub fn make_read_only(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o555)).unwrap();
    let writable = if path.is_dir() {
        let marker = path.join(".write-check");
        let created = std::fs::write(&marker, "").is_ok();
        let _ = std::fs::remove_file(&marker);
        created
    } else {
        std::fs::OpenOptions::new().append(true).open(path).is_ok()
    };
    if writable {
        restore_writable(path);
    }
    !writable
}

#[cfg(unix)]
pub fn restore_writable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
