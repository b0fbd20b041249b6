//! Property-based tests for unification laws

use proptest::prelude::*;
use std::collections::BTreeMap;
use strata::unify::Unifier;
use strata::{Element, KeySchema};

const REFS: [&str; 8] = ["a", "b", "c", "d", "e", "f", "g", "h"];

fn refs() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::sample::subsequence(REFS.to_vec(), 0..=REFS.len()).prop_shuffle()
}

fn with_parts(mut element: Element, refs: &[&str]) -> Element {
    for r in refs {
        element.push_child(Element::new("part").with_attr("ref", *r));
    }
    element
}

fn child_refs(element: &Element) -> Vec<String> {
    element
        .children
        .iter()
        .filter_map(|c| c.attr("ref").map(str::to_string))
        .collect()
}

fn schema() -> KeySchema {
    KeySchema::new().with("part", &["ref"])
}

/// Alteration attributes win; base attributes fill the gaps.
#[test]
fn test_attribute_precedence_property() {
    let mut runner = proptest::test_runner::TestRunner::default();
    let attrs = || proptest::collection::btree_map("[a-e]", "[a-z]{1,3}", 0..5);

    runner
        .run(
            &(attrs(), attrs()),
            |(alteration_attrs, base_attrs): (BTreeMap<String, String>, BTreeMap<String, String>)| {
                let mut alteration = Element::new("layout");
                for (k, v) in &alteration_attrs {
                    alteration.set_attr(k.as_str(), v.as_str());
                }
                let mut base = Element::new("layout");
                for (k, v) in &base_attrs {
                    base.set_attr(k.as_str(), v.as_str());
                }

                let keys = schema();
                let unified = Unifier::new(&keys).unify_pair(&alteration, &base);

                let mut expected = base_attrs.clone();
                expected.extend(alteration_attrs.clone());
                prop_assert_eq!(unified.attributes.len(), expected.len());
                for (k, v) in &expected {
                    prop_assert_eq!(unified.attr(k), Some(v.as_str()));
                }
                Ok(())
            },
        )
        .unwrap();
}

proptest! {
    /// Base order is kept; alteration-only children follow in their own order.
    #[test]
    fn test_children_follow_base_order(base_refs in refs(), alteration_refs in refs()) {
        let keys = schema();
        let base = with_parts(Element::new("layout"), &base_refs);
        let alteration = with_parts(Element::new("layout"), &alteration_refs);
        let unified = Unifier::new(&keys).unify_pair(&alteration, &base);

        let mut expected: Vec<String> = base_refs.iter().map(|r| r.to_string()).collect();
        expected.extend(
            alteration_refs
                .iter()
                .filter(|r| !base_refs.contains(r))
                .map(|r| r.to_string()),
        );
        prop_assert_eq!(child_refs(&unified), expected);
    }

    /// With `reorder`, alteration order is kept; base-only children follow.
    #[test]
    fn test_reorder_follows_alteration_order(base_refs in refs(), alteration_refs in refs()) {
        let keys = schema();
        let base = with_parts(Element::new("layout"), &base_refs);
        let alteration = with_parts(
            Element::new("layout").with_attr("reorder", "true"),
            &alteration_refs,
        );
        let unified = Unifier::new(&keys).unify_pair(&alteration, &base);

        let mut expected: Vec<String> = alteration_refs.iter().map(|r| r.to_string()).collect();
        expected.extend(
            base_refs
                .iter()
                .filter(|r| !alteration_refs.contains(r))
                .map(|r| r.to_string()),
        );
        prop_assert_eq!(child_refs(&unified), expected);
    }

    /// Unifying with an empty element changes nothing observable.
    #[test]
    fn test_empty_alteration_is_identity(base_refs in refs()) {
        let keys = schema();
        let base = with_parts(Element::new("layout").with_attr("color", "red"), &base_refs);
        let unified = Unifier::new(&keys).unify_pair(&Element::new("layout"), &base);
        prop_assert_eq!(unified, base);
    }
}
