//! Loading template directories

use super::test_utils::*;
use strata::{Inventory, InventoryError};
use tempfile::TempDir;

#[test]
fn test_later_directory_replaces_earlier_element() {
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("first");
    let second = temp_dir.path().join("second");
    write_layouts(
        &first,
        "Entry.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Normal" color="red"/>
           <layout class="LexEntry" type="jtview" name="Short"/>"#,
    );
    write_layouts(
        &second,
        "Entry.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Normal" color="green"/>"#,
    );

    let mut inv = Inventory::new(
        vec![first, second],
        LAYOUT_PATTERN,
        LAYOUT_SELECTION,
        layout_schema(),
        LAYOUT_VERSION,
    )
    .unwrap();
    inv.load().unwrap();

    assert_eq!(inv.elements().len(), 2);
    let normal = inv.get_element("layout", &entry_key("Normal")).unwrap();
    assert_eq!(normal.attr("color"), Some("green"));
    assert_eq!(inv.file_stamps().len(), 2);
}

#[test]
fn test_only_matching_files_are_read() {
    let temp_dir = TempDir::new().unwrap();
    let shipped = temp_dir.path().join("templates");
    write_layouts(
        &shipped,
        "Entry.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Normal"/>"#,
    );
    write_layouts(
        &shipped,
        "Notes.xml",
        r#"<layout class="LexEntry" type="jtview" name="Hidden"/>"#,
    );
    write_layouts(
        &shipped.join("nested"),
        "Deep.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Deep"/>"#,
    );

    let mut inv = layouts(&shipped, &temp_dir.path().join("user"));
    inv.load().unwrap();
    assert!(inv.get_element("layout", &entry_key("Normal")).is_some());
    assert!(inv.get_element("layout", &entry_key("Hidden")).is_none());
    assert!(inv.get_element("layout", &entry_key("Deep")).is_none());
}

#[test]
fn test_missing_directory_loads_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let mut inv = layouts(&temp_dir.path().join("absent"), &temp_dir.path().join("user"));
    inv.load().unwrap();
    assert!(inv.elements().is_empty());
    assert!(inv.file_stamps().is_empty());
}

#[test]
fn test_outdated_elements_are_dropped_without_merger() {
    let temp_dir = TempDir::new().unwrap();
    let shipped = temp_dir.path().join("templates");
    write_layouts(
        &shipped,
        "Entry.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Normal"/>
           <layout class="LexEntry" type="jtview" name="Old" version="24"/>
           <layout class="LexEntry" type="jtview" name="Current" version="25"/>
           <layout class="LexEntry" type="jtview" name="Derived" base="Normal" version="3"/>"#,
    );
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"));
    inv.load().unwrap();

    assert!(inv.get_element("layout", &entry_key("Normal")).is_some());
    assert!(inv.get_element("layout", &entry_key("Old")).is_none());
    assert!(inv.get_element("layout", &entry_key("Current")).is_some());
    assert!(inv.get_element("layout", &entry_key("Derived")).is_some());
}

#[test]
fn test_malformed_file_reports_its_path() {
    let temp_dir = TempDir::new().unwrap();
    let shipped = temp_dir.path().join("templates");
    std::fs::create_dir_all(&shipped).unwrap();
    let bad = shipped.join("Broken.fwlayout");
    std::fs::write(&bad, "<LayoutInventory><layout name=\"x\">").unwrap();

    let mut inv = layouts(&shipped, &temp_dir.path().join("user"));
    match inv.load() {
        Err(InventoryError::Parse { path, .. }) => assert_eq!(path, bad),
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn test_invalid_utf8_reports_its_path() {
    let temp_dir = TempDir::new().unwrap();
    let shipped = temp_dir.path().join("templates");
    std::fs::create_dir_all(&shipped).unwrap();
    let bad = shipped.join("Latin1.fwlayout");
    let mut bytes = b"<LayoutInventory><layout name=\"".to_vec();
    bytes.push(0xFF);
    bytes.extend_from_slice(b"\"/></LayoutInventory>");
    std::fs::write(&bad, bytes).unwrap();

    let mut inv = layouts(&shipped, &temp_dir.path().join("user"));
    match inv.load() {
        Err(InventoryError::Parse { path, .. }) => assert_eq!(path, bad),
        other => panic!("expected a parse error, got {:?}", other),
    }
}

#[test]
fn test_layout_types_and_duplicate_keys() {
    let temp_dir = TempDir::new().unwrap();
    let shipped = temp_dir.path().join("templates");
    write_layouts(
        &shipped,
        "Types.fwlayout",
        r#"<layoutType label="Lexeme-based" layout="publishStem">
             <configure class="LexEntry" label="Main Entry" layout="publishStemEntry"/>
           </layoutType>
           <layoutType label="Root-based" layout="publishRoot"/>
           <layout class="LexEntry" type="jtview" name="Normal%01"/>
           <layout class="LexEntry" type="jtview" name="Normal%02"/>"#,
    );
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"));
    inv.load().unwrap();

    let labels: Vec<_> = inv
        .get_layout_types()
        .iter()
        .map(|t| t.attr("label").unwrap_or_default().to_string())
        .collect();
    assert_eq!(labels, vec!["Lexeme-based", "Root-based"]);

    let tags: Vec<String> = inv.existing_duplicate_keys().into_iter().collect();
    assert_eq!(tags, vec!["01", "02"]);
}

#[test]
fn test_custom_directories_and_ws_tagged_expansion() {
    let temp_dir = TempDir::new().unwrap();
    let shipped = temp_dir.path().join("templates");
    let custom = temp_dir.path().join("custom");
    write_layouts(
        &shipped,
        "Entry.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Normal"/>"#,
    );
    write_layouts(
        &custom,
        "Reversal.fwlayout",
        r#"<layout class="ReversalIndexEntry" type="jtview" name="Main" tagForWs="true">
             <sublayout name="Senses"/>
             <part ref="Form" param="Entry"/>
           </layout>"#,
    );
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"));
    inv.load().unwrap();
    inv.add_custom_files(&[custom.clone()]).unwrap();
    assert_eq!(inv.directories().count(), 2);

    assert_eq!(inv.expand_ws_tagged_nodes("fr").unwrap(), 1);
    let copy = inv
        .get_element(
            "layout",
            &[Some("ReversalIndexEntry"), Some("jtview"), Some("Main-fr")],
        )
        .unwrap();
    assert_eq!(copy.children[0].attr("name"), Some("Senses-fr"));
    assert_eq!(copy.children[1].attr("param"), Some("Entry-fr"));

    // Custom directories are read again on reload.
    inv.reload().unwrap();
    assert!(inv
        .get_element("layout", &[Some("ReversalIndexEntry"), Some("jtview"), Some("Main")])
        .is_some());
}

#[test]
fn test_path_queries_over_loaded_elements() {
    let temp_dir = TempDir::new().unwrap();
    let shipped = temp_dir.path().join("templates");
    write_layouts(
        &shipped,
        "Entry.fwlayout",
        r#"<layout class="LexEntry" type="jtview" name="Normal"/>
           <layout class="LexEntry" type="detail" name="Normal"/>
           <layout class="LexSense" type="jtview" name="Normal" choiceGuid="x"/>"#,
    );
    let mut inv = layouts(&shipped, &temp_dir.path().join("user"));
    inv.load().unwrap();

    assert_eq!(inv.get_elements("layout[@class='LexEntry']").unwrap().len(), 2);
    assert_eq!(
        inv.get_elements("layout[@name='Normal' and not(@choiceGuid)]")
            .unwrap()
            .len(),
        2
    );
    assert_eq!(
        inv.get_elements_matching("layout", &[Some("LexEntry"), Some("detail")])
            .len(),
        1
    );
}
