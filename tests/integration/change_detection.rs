//! Reloading only when template files change

use super::test_utils::*;
use std::fs::File;
use std::rc::Rc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn touch_later(path: &std::path::Path) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(120))
        .unwrap();
}

#[test]
fn test_unchanged_files_keep_loaded_elements() {
    let temp_dir = TempDir::new().unwrap();
    let shipped = temp_dir.path().join("templates");
    write_layouts(
        &shipped,
        "Entry.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Normal"/>"#,
    );
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"));
    load_all(&mut inv);

    let before = inv.get_element("layout", &entry_key("Normal")).unwrap();
    assert!(inv.no_files_changed().unwrap());
    assert!(!inv.reload_if_changes().unwrap());
    let after = inv.get_element("layout", &entry_key("Normal")).unwrap();
    assert!(Rc::ptr_eq(&before, &after));
}

#[test]
fn test_modified_file_triggers_reload() {
    let temp_dir = TempDir::new().unwrap();
    let shipped = temp_dir.path().join("templates");
    let path = write_layouts(
        &shipped,
        "Entry.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Normal" color="red"/>"#,
    );
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"));
    load_all(&mut inv);
    let before = inv.get_element("layout", &entry_key("Normal")).unwrap();

    write_layouts(
        &shipped,
        "Entry.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Normal" color="green"/>"#,
    );
    touch_later(&path);

    assert!(!inv.no_files_changed().unwrap());
    assert!(inv.reload_if_changes().unwrap());
    let after = inv.get_element("layout", &entry_key("Normal")).unwrap();
    assert!(!Rc::ptr_eq(&before, &after));
    assert_eq!(after.attr("color"), Some("green"));
    assert!(inv.no_files_changed().unwrap());
}

#[test]
fn test_added_and_removed_files_trigger_reload() {
    let temp_dir = TempDir::new().unwrap();
    let shipped = temp_dir.path().join("templates");
    let user = temp_dir.path().join("user");
    write_layouts(
        &shipped,
        "Entry.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Normal"/>"#,
    );
    let mut inv = layouts(&shipped, &user);
    load_all(&mut inv);

    // The user directory is watched even though it did not exist at load.
    let added = write_layouts(
        &user,
        "default$$Short.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Short" base="Normal" version="25"/>"#,
    );
    assert!(inv.reload_if_changes().unwrap());
    assert!(inv.get_element("layout", &entry_key("Short")).is_some());

    std::fs::remove_file(&added).unwrap();
    assert!(inv.reload_if_changes().unwrap());
    assert!(inv.get_element("layout", &entry_key("Short")).is_none());
    assert!(!inv.reload_if_changes().unwrap());
}

#[test]
fn test_files_outside_the_pattern_are_not_watched() {
    let temp_dir = TempDir::new().unwrap();
    let shipped = temp_dir.path().join("templates");
    write_layouts(
        &shipped,
        "Entry.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Normal"/>"#,
    );
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"));
    load_all(&mut inv);

    std::fs::write(shipped.join("README.txt"), "notes").unwrap();
    assert!(inv.no_files_changed().unwrap());
}
