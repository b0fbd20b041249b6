//! Command execution against a configured workspace

use super::config_integration::workspace;
use strata::cli::{Commands, RunContext};

fn context(root: &std::path::Path) -> RunContext {
    RunContext::new(
        root.to_path_buf(),
        Some(root.join("config").join("strata.toml")),
    )
    .unwrap()
}

#[test]
fn test_get_prints_resolved_element() {
    let temp_dir = workspace();
    let ctx = context(temp_dir.path());
    let output = ctx
        .execute(&Commands::Get {
            inventory: "layouts".to_string(),
            element: "layout".to_string(),
            values: vec!["LexEntry".into(), "jtview".into(), "Normal".into()],
        })
        .unwrap();
    assert!(output.starts_with("<layout"));
    assert!(output.contains(r#"color="blue""#));
}

#[test]
fn test_get_unknown_key_fails() {
    let temp_dir = workspace();
    let ctx = context(temp_dir.path());
    let result = ctx.execute(&Commands::Get {
        inventory: "layouts".to_string(),
        element: "layout".to_string(),
        values: vec!["LexEntry".into(), "~".into(), "Normal".into()],
    });
    assert!(result.is_err());

    let result = ctx.execute(&Commands::LayoutTypes {
        inventory: "missing".to_string(),
    });
    assert!(result.is_err());
}

#[test]
fn test_list_and_check() {
    let temp_dir = workspace();
    let ctx = context(temp_dir.path());

    let listed = ctx
        .execute(&Commands::List {
            inventory: "layouts".to_string(),
            path: Some("layout[@name='Normal']".to_string()),
        })
        .unwrap();
    assert_eq!(listed, "layout\tLexEntry\tjtview\tNormal");

    let checked = ctx.execute(&Commands::Check).unwrap();
    assert!(checked.contains("layouts: 1 elements from 2 files"));
    assert!(checked.contains("parts: 1 elements from 1 files"));
}
