mod common;

use osm_wrangle::{
    normalize::AddressNormalizer,
    osm::{Child, Element, ElementKind, ElementStream},
    rules::NormalizationRules,
    shape::{ElementShaper, ShapeError, ShapedElement, TagRecord},
};
use proptest::prelude::*;

use common::{SAMPLE_OSM, fixture_path};

fn tag(id: &str, key: &str, value: &str, tag_type: &str) -> TagRecord {
    TagRecord {
        id: id.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        tag_type: tag_type.to_string(),
    }
}

fn shape_fixture() -> Vec<Result<Option<ShapedElement>, ShapeError>> {
    let rules = NormalizationRules::default();
    let shaper = ElementShaper::new(AddressNormalizer::new(&rules).expect("normalizer"));
    ElementStream::open(&fixture_path(SAMPLE_OSM))
        .expect("open fixture")
        .map(|element| {
            let element = element.expect("element");
            shaper
                .shape(&element)
                .map(|shaped| shaped.map(|shaped| shaped.element))
        })
        .collect()
}

#[test]
fn fixture_node_tags_are_normalized() {
    let shaped = shape_fixture();
    assert_eq!(shaped.len(), 7);
    let Ok(Some(ShapedElement::Node { node, tags })) = &shaped[1] else {
        panic!("expected node, got {:?}", shaped[1]);
    };
    assert_eq!(node.id, "26027058");
    assert_eq!(node.user.as_deref(), Some("oldtopos"));
    assert_eq!(
        tags,
        &vec![
            tag("26027058", "street", "Valencia Street", "addr"),
            tag("26027058", "postcode", "94110", "addr"),
            tag("26027058", "state", "CA", "addr"),
            tag("26027058", "city", "San Francisco", "addr"),
            tag("26027058", "amenity", "cafe", "regular"),
            tag("26027058", "en", "Ritual Coffee", "name"),
        ]
    );
}

#[test]
fn fixture_embedded_postcode_is_recovered() {
    let shaped = shape_fixture();
    let Ok(Some(element)) = &shaped[2] else {
        panic!("expected node output");
    };
    let values = element
        .tags()
        .iter()
        .map(|t| (t.key.as_str(), t.value.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        values,
        vec![
            ("street", "Broadway"),
            ("postcode", "94612"),
            ("state", "CA"),
            ("city", "Oakland"),
        ]
    );
}

#[test]
fn fixture_malformed_and_relation_elements() {
    let shaped = shape_fixture();
    assert_eq!(
        shaped[3],
        Err(ShapeError::MissingAttribute {
            kind: "node",
            attribute: "id"
        })
    );
    assert_eq!(shaped[6], Ok(None));
}

#[test]
fn fixture_way_keeps_document_positions() {
    let shaped = shape_fixture();
    let Ok(Some(ShapedElement::Way {
        way,
        way_nodes,
        tags,
    })) = &shaped[4]
    else {
        panic!("expected way output");
    };
    assert_eq!(way.id, "8915410");
    assert_eq!(way.user.as_deref(), Some("andygol"));
    let refs = way_nodes
        .iter()
        .map(|n| (n.node_id.as_str(), n.position))
        .collect::<Vec<_>>();
    assert_eq!(
        refs,
        vec![("26027057", 0), ("26027058", 1), ("26027059", 5)]
    );
    assert_eq!(
        tags,
        &vec![
            tag("8915410", "highway", "residential", "regular"),
            tag("8915410", "name", "St. Andrews St", "regular"),
            tag("8915410", "street", "St. Andrews Street", "addr"),
            tag("8915410", "county", "San Francisco, CA", "tiger"),
        ]
    );
}

fn key_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z_]{1,8}",
        "addr:(street|postcode|state|city)",
        "[a-z]{1,4}[ .,;=/@#]{1,2}[a-z]{0,4}",
    ]
}

fn child_strategy() -> impl Strategy<Value = Child> {
    prop_oneof![
        (key_strategy(), "[A-Za-z0-9 .]{0,16}").prop_map(|(k, v)| Child::tag(k, v)),
        "[0-9]{1,6}".prop_map(|reference| Child::node_ref(reference)),
    ]
}

proptest! {
    #[test]
    fn tag_records_never_exceed_tag_children(
        children in proptest::collection::vec(child_strategy(), 0..20),
        is_way in any::<bool>(),
    ) {
        let kind = if is_way { ElementKind::Way } else { ElementKind::Node };
        let element = children
            .iter()
            .cloned()
            .fold(Element::new(kind).with_attribute("id", "42"), Element::with_child);
        let rules = NormalizationRules::default();
        let shaper = ElementShaper::new(AddressNormalizer::new(&rules).expect("normalizer"));
        let shaped = shaper.shape(&element).expect("well formed").expect("output");
        let tag_children = element.tags().count();
        prop_assert!(shaped.element.tags().len() <= tag_children);
        prop_assert_eq!(shaped.element.tags().len() + shaped.dropped_tags, tag_children);
        for record in shaped.element.tags() {
            prop_assert!(!osm_wrangle::classify::is_problem_key(&record.key));
        }

        if let ShapedElement::Way { way_nodes, .. } = &shaped.element {
            let expected = element
                .children
                .iter()
                .enumerate()
                .filter(|(_, child)| matches!(child, Child::NodeRef { .. }))
                .map(|(idx, _)| idx)
                .collect::<Vec<_>>();
            let positions = way_nodes.iter().map(|n| n.position).collect::<Vec<_>>();
            prop_assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
            prop_assert_eq!(positions, expected);
        }
    }
}
