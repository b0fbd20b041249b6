//! Upgrading outdated user overrides through a merger

use super::test_utils::*;
use std::cell::RefCell;
use std::rc::Rc;
use strata::error::Result;
use strata::store::ElementStore;
use strata::xml::XmlDocument;
use strata::{Element, OldVersionMerger};
use tempfile::TempDir;

/// Keeps the outdated element's attributes on top of the current one and
/// records every call.
#[derive(Clone, Default)]
struct RecordingMerger {
    calls: Rc<RefCell<Vec<(String, String)>>>,
}

impl OldVersionMerger for RecordingMerger {
    fn merge(
        &self,
        current: &Element,
        outdated: &Element,
        _destination: &ElementStore,
        suffix: &str,
    ) -> Result<Element> {
        self.calls.borrow_mut().push((
            outdated.attr("name").unwrap_or_default().to_string(),
            suffix.to_string(),
        ));
        let mut merged = current.clone();
        for (name, value) in &outdated.attributes {
            merged.set_attr(name.as_str(), value.as_str());
        }
        merged.set_attr("merged", "true");
        Ok(merged)
    }
}

const SHIPPED: &str = r#"
<layout class="LexEntry" type="jtview" name="Normal" color="red">
  <part ref="Headword"/>
  <part ref="Senses"/>
</layout>
"#;

fn setup(user_body: &str) -> (TempDir, std::path::PathBuf, std::path::PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let shipped = temp_dir.path().join("templates");
    let user = temp_dir.path().join("user");
    write_layouts(&shipped, "Entry.fwlayout", SHIPPED);
    let file = write_layouts(&user, "default$$Normal.fwlayout", user_body);
    (temp_dir, shipped, file)
}

#[test]
fn test_outdated_override_is_merged_once_and_rewritten() {
    let (temp_dir, shipped, file) = setup(
        r#"<layout class="LexEntry" type="jtview" name="Normal" color="blue" version="24"/>"#,
    );
    let user = temp_dir.path().join("user");
    let merger = RecordingMerger::default();

    let mut inv = layouts(&shipped, &user).with_merger(Box::new(merger.clone()));
    load_all(&mut inv);

    assert_eq!(merger.calls.borrow().len(), 1);
    assert_eq!(inv.stats().merges, 1);
    let normal = inv.get_element("layout", &entry_key("Normal")).unwrap();
    assert_eq!(normal.attr("merged"), Some("true"));
    assert_eq!(normal.attr("color"), Some("blue"));
    assert_eq!(normal.attr("version"), Some("25"));
    assert_eq!(part_refs(&normal), vec!["Headword", "Senses"]);

    let doc = XmlDocument::load(&file).unwrap();
    assert_eq!(doc.root.children[0].attr("version"), Some("25"));
    assert!(inv.no_files_changed().unwrap());

    // The rewritten file is current, so a fresh load does not merge again.
    let mut fresh = layouts(&shipped, &user).with_merger(Box::new(merger.clone()));
    load_all(&mut fresh);
    assert_eq!(merger.calls.borrow().len(), 1);
    assert_eq!(
        fresh.get_element("layout", &entry_key("Normal")).unwrap().attr("merged"),
        Some("true")
    );
}

#[test]
fn test_copied_view_merges_against_its_standard_element() {
    let (temp_dir, shipped, _) = setup(
        r#"<layout class="LexEntry" type="jtview" name="Normal-en" color="blue" version="24"/>"#,
    );
    let merger = RecordingMerger::default();
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"))
        .with_merger(Box::new(merger.clone()));
    load_all(&mut inv);

    assert_eq!(
        merger.calls.borrow().as_slice(),
        &[("Normal-en".to_string(), "-en".to_string())]
    );
    let view = inv.get_element("layout", &entry_key("Normal-en")).unwrap();
    assert_eq!(view.attr("merged"), Some("true"));
    let standard = inv.get_element("layout", &entry_key("Normal")).unwrap();
    assert_eq!(standard.attr("color"), Some("red"));
}

#[test]
fn test_outdated_element_without_current_counterpart_is_dropped() {
    let (temp_dir, shipped, _) = setup(
        r#"<layout class="LexEntry" type="jtview" name="Orphan" version="24"/>"#,
    );
    let merger = RecordingMerger::default();
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"))
        .with_merger(Box::new(merger.clone()));
    load_all(&mut inv);

    assert!(merger.calls.borrow().is_empty());
    assert!(inv.get_element("layout", &entry_key("Orphan")).is_none());
}

#[test]
fn test_unversioned_user_data_is_dropped_without_merger() {
    let (temp_dir, shipped, _) = setup(
        r#"<layout class="LexEntry" type="jtview" name="Extra" color="blue"/>"#,
    );
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"));
    load_all(&mut inv);
    assert!(inv.get_element("layout", &entry_key("Extra")).is_none());
}

#[test]
fn test_unversioned_element_takes_version_from_sibling() {
    let (temp_dir, shipped, _) = setup(
        r#"<layout class="LexEntry" type="jtview" name="Extra"/>
           <layout class="LexEntry" type="jtview" name="Marker" version="25"/>"#,
    );
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"));
    load_all(&mut inv);
    assert!(inv.get_element("layout", &entry_key("Extra")).is_some());
}

#[test]
fn test_outdated_grouping_element_is_restamped() {
    let (temp_dir, shipped, file) = setup(
        r#"<layoutType label="Stem" layout="publishStem#Stem01" version="24"/>"#,
    );
    let merger = RecordingMerger::default();
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"))
        .with_merger(Box::new(merger.clone()));
    load_all(&mut inv);

    assert!(merger.calls.borrow().is_empty());
    let types = inv.get_layout_types();
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].attr("version"), Some("25"));
    let doc = XmlDocument::load(&file).unwrap();
    assert_eq!(doc.root.children[0].attr("version"), Some("25"));
}

#[cfg(unix)]
#[test]
fn test_read_only_file_is_merged_without_rewrite() {
    let (temp_dir, shipped, file) = setup(
        r#"<layout class="LexEntry" type="jtview" name="Normal" color="blue" version="24"/>"#,
    );
    if !make_read_only(&file) {
        return;
    }
    let merger = RecordingMerger::default();
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"))
        .with_merger(Box::new(merger.clone()));
    let loaded = inv
        .load()
        .and_then(|_| inv.load_user_overrides(LAYOUT_VERSION, None));
    restore_writable(&file);

    loaded.unwrap();
    assert_eq!(merger.calls.borrow().len(), 1);
    let normal = inv.get_element("layout", &entry_key("Normal")).unwrap();
    assert_eq!(normal.attr("color"), Some("blue"));
    let doc = XmlDocument::load(&file).unwrap();
    assert_eq!(doc.root.children[0].attr("version"), Some("24"));
}
