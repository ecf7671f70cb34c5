//! Decomposes one OSM element into flat table rows.
//!
//! A node becomes one [`NodeRecord`] plus its [`TagRecord`]s; a way becomes one
//! [`WayRecord`], its [`WayNodeRecord`]s and its [`TagRecord`]s. Relations
//! produce nothing. Field order of every record matches the column order of
//! the CSV table it is written to.
//!
//! Tags whose key contains a problem character are dropped without error.
//! An element without an `id`, a tag without `k`/`v` or an `nd` without `ref`
//! is malformed and yields a [`ShapeError`].

use serde::Serialize;
use thiserror::Error;

use crate::{
    classify::classify_key,
    normalize::AddressNormalizer,
    osm::{Child, Element, ElementKind},
};

/// Tag type whose values are run through address normalization.
pub const ADDRESS_TAG_TYPE: &str = "addr";

pub const NODE_FIELDS: &[&str] = &[
    "id",
    "lat",
    "lon",
    "user",
    "uid",
    "version",
    "changeset",
    "timestamp",
];
pub const WAY_FIELDS: &[&str] = &["id", "user", "uid", "version", "changeset", "timestamp"];
pub const TAG_FIELDS: &[&str] = &["id", "key", "value", "type"];
pub const WAY_NODE_FIELDS: &[&str] = &["id", "node_id", "position"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShapeError {
    #[error("<{kind}> element is missing required attribute '{attribute}'")]
    MissingAttribute {
        kind: &'static str,
        attribute: &'static str,
    },
    #[error("<{kind} id=\"{id}\">: child #{position} <{child}> is missing attribute '{attribute}'")]
    MalformedChild {
        kind: &'static str,
        id: String,
        position: usize,
        child: &'static str,
        attribute: &'static str,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NodeRecord {
    pub id: String,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub user: Option<String>,
    pub uid: Option<String>,
    pub version: Option<String>,
    pub changeset: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WayRecord {
    pub id: String,
    pub user: Option<String>,
    pub uid: Option<String>,
    pub version: Option<String>,
    pub changeset: Option<String>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub id: String,
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub tag_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WayNodeRecord {
    pub id: String,
    pub node_id: String,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapedElement {
    Node {
        node: NodeRecord,
        tags: Vec<TagRecord>,
    },
    Way {
        way: WayRecord,
        way_nodes: Vec<WayNodeRecord>,
        tags: Vec<TagRecord>,
    },
}

impl ShapedElement {
    pub fn tags(&self) -> &[TagRecord] {
        match self {
            ShapedElement::Node { tags, .. } | ShapedElement::Way { tags, .. } => tags,
        }
    }
}

/// Shaping result plus the number of tags dropped for unsafe keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shaped {
    pub element: ShapedElement,
    pub dropped_tags: usize,
}

pub struct ElementShaper<'r> {
    normalizer: AddressNormalizer<'r>,
}

impl<'r> ElementShaper<'r> {
    pub fn new(normalizer: AddressNormalizer<'r>) -> Self {
        Self { normalizer }
    }

    /// Shapes `element`; returns `Ok(None)` for kinds that produce no rows.
    pub fn shape(&self, element: &Element) -> Result<Option<Shaped>, ShapeError> {
        let kind = match element.kind {
            ElementKind::Node | ElementKind::Way => element.kind,
            ElementKind::Relation => return Ok(None),
        };
        let id = element.id().ok_or(ShapeError::MissingAttribute {
            kind: kind.tag_name(),
            attribute: "id",
        })?;
        let (tags, dropped_tags) = self.shape_tags(element, id);
        let shaped = match kind {
            ElementKind::Node => ShapedElement::Node {
                node: node_record(element, id),
                tags,
            },
            _ => ShapedElement::Way {
                way: way_record(element, id),
                way_nodes: way_nodes(element, id)?,
                tags,
            },
        };
        Ok(Some(Shaped {
            element: shaped,
            dropped_tags,
        }))
    }

    /// Tags missing `k` or `v` and tags with unsafe keys are dropped and
    /// counted; the element's other tags are unaffected.
    fn shape_tags(&self, element: &Element, id: &str) -> (Vec<TagRecord>, usize) {
        let mut tags = Vec::new();
        let mut dropped = 0usize;
        for (position, child) in element.children.iter().enumerate() {
            let Child::Tag { key, value } = child else {
                continue;
            };
            let (Some(key), Some(value)) = (key.as_deref(), value.as_deref()) else {
                log::warn!(
                    "Dropping incomplete tag #{position} on {} {id}",
                    element.kind.tag_name()
                );
                dropped += 1;
                continue;
            };
            let Some(classified) = classify_key(key) else {
                log::debug!("Dropping tag '{key}' on {} {id}", element.kind.tag_name());
                dropped += 1;
                continue;
            };
            let value = if classified.tag_type == ADDRESS_TAG_TYPE {
                self.normalizer.normalize(classified.field, value).into_owned()
            } else {
                value.to_string()
            };
            tags.push(TagRecord {
                id: id.to_string(),
                key: classified.field.to_string(),
                value,
                tag_type: classified.tag_type.to_string(),
            });
        }
        (tags, dropped)
    }
}

fn owned(element: &Element, name: &str) -> Option<String> {
    element.attribute(name).map(str::to_string)
}

fn node_record(element: &Element, id: &str) -> NodeRecord {
    NodeRecord {
        id: id.to_string(),
        lat: owned(element, "lat"),
        lon: owned(element, "lon"),
        user: owned(element, "user"),
        uid: owned(element, "uid"),
        version: owned(element, "version"),
        changeset: owned(element, "changeset"),
        timestamp: owned(element, "timestamp"),
    }
}

fn way_record(element: &Element, id: &str) -> WayRecord {
    WayRecord {
        id: id.to_string(),
        user: owned(element, "user"),
        uid: owned(element, "uid"),
        version: owned(element, "version"),
        changeset: owned(element, "changeset"),
        timestamp: owned(element, "timestamp"),
    }
}

/// Positions count every child, not only `nd` references.
fn way_nodes(element: &Element, id: &str) -> Result<Vec<WayNodeRecord>, ShapeError> {
    element
        .children
        .iter()
        .enumerate()
        .filter_map(|(position, child)| match child {
            Child::NodeRef { reference } => Some((position, reference)),
            _ => None,
        })
        .map(|(position, reference)| {
            let node_id = reference.clone().ok_or_else(|| ShapeError::MalformedChild {
                kind: "way",
                id: id.to_string(),
                position,
                child: "nd",
                attribute: "ref",
            })?;
            Ok(WayNodeRecord {
                id: id.to_string(),
                node_id,
                position,
            })
        })
        .collect()
}
