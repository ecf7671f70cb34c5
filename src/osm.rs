//! Streaming access to OSM XML documents.
//!
//! [`ElementStream`] walks a document with a buffered `quick_xml::Reader` and
//! yields one top-level [`Element`] (node, way or relation) at a time together
//! with its direct children. Only the element currently being built is held in
//! memory, so arbitrarily large exports can be processed in a single pass. The
//! stream is consumed once; open a new one to read the document again.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use crate::io_utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn from_tag_name(name: &[u8]) -> Option<Self> {
        match name {
            b"node" => Some(ElementKind::Node),
            b"way" => Some(ElementKind::Way),
            b"relation" => Some(ElementKind::Relation),
            _ => None,
        }
    }

    pub fn tag_name(self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Child {
    /// `<tag k=".." v=".."/>`; either attribute may be missing in broken data.
    Tag {
        key: Option<String>,
        value: Option<String>,
    },
    /// `<nd ref=".."/>`
    NodeRef { reference: Option<String> },
    /// Any other child element, kept verbatim.
    Other {
        name: String,
        attributes: Vec<(String, String)>,
    },
}

impl Child {
    pub fn tag(key: impl Into<String>, value: impl Into<String>) -> Self {
        Child::Tag {
            key: Some(key.into()),
            value: Some(value.into()),
        }
    }

    pub fn node_ref(reference: impl Into<String>) -> Self {
        Child::NodeRef {
            reference: Some(reference.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub kind: ElementKind,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Child>,
}

impl Element {
    pub fn new(kind: ElementKind) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: Child) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    /// Iterates over `(key, value)` of tag children that carry both attributes.
    pub fn tags(&self) -> impl Iterator<Item = (&str, &str)> {
        self.children.iter().filter_map(|child| match child {
            Child::Tag {
                key: Some(key),
                value: Some(value),
            } => Some((key.as_str(), value.as_str())),
            _ => None,
        })
    }
}

fn take_attribute(attributes: &mut Vec<(String, String)>, name: &str) -> Option<String> {
    attributes
        .iter()
        .position(|(key, _)| key == name)
        .map(|idx| attributes.remove(idx).1)
}

pub struct ElementStream<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    depth: usize,
    current: Option<(Element, usize)>,
    finished: bool,
}

impl ElementStream<BufReader<Box<dyn Read>>> {
    /// Opens `path` (or stdin for `-`) for streaming.
    pub fn open(path: &Path) -> Result<Self> {
        let source: Box<dyn Read> = if io_utils::is_dash(path) {
            Box::new(std::io::stdin().lock())
        } else {
            Box::new(File::open(path).with_context(|| format!("Opening OSM file {path:?}"))?)
        };
        Ok(Self::from_reader(BufReader::new(source)))
    }
}

impl<R: BufRead> ElementStream<R> {
    pub fn from_reader(source: R) -> Self {
        let mut reader = Reader::from_reader(source);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::new(),
            depth: 0,
            current: None,
            finished: false,
        }
    }

    fn read_attributes(&self, start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
        let mut attributes = Vec::new();
        for attr in start.attributes().with_checks(false) {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .decode_and_unescape_value(self.reader.decoder())?
                .into_owned();
            attributes.push((key, value));
        }
        Ok(attributes)
    }

    fn read_child(&self, start: &BytesStart<'_>) -> Result<Child> {
        let mut attributes = self.read_attributes(start)?;
        let child = match start.name().as_ref() {
            b"tag" => Child::Tag {
                key: take_attribute(&mut attributes, "k"),
                value: take_attribute(&mut attributes, "v"),
            },
            b"nd" => Child::NodeRef {
                reference: take_attribute(&mut attributes, "ref"),
            },
            other => Child::Other {
                name: String::from_utf8_lossy(other).into_owned(),
                attributes,
            },
        };
        Ok(child)
    }

    /// Handles an opening (or self-closing) tag. Returns a finished element
    /// when a self-closing top-level element was read.
    fn on_start(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<Option<Element>> {
        let mut finished = None;
        let element_depth = self.current.as_ref().map(|(_, depth)| *depth);
        match element_depth {
            Some(element_depth) if self.depth == element_depth + 1 => {
                let child = self.read_child(start)?;
                if let Some((element, _)) = self.current.as_mut() {
                    element.children.push(child);
                }
            }
            Some(_) => {}
            None => {
                if let Some(kind) = ElementKind::from_tag_name(start.name().as_ref()) {
                    let mut element = Element::new(kind);
                    element.attributes = self.read_attributes(start)?;
                    if empty {
                        finished = Some(element);
                    } else {
                        self.current = Some((element, self.depth));
                    }
                }
            }
        }
        if !empty {
            self.depth += 1;
        }
        Ok(finished)
    }

    fn on_end(&mut self) -> Option<Element> {
        self.depth = self.depth.saturating_sub(1);
        let closes_element =
            matches!(&self.current, Some((_, element_depth)) if *element_depth == self.depth);
        if closes_element {
            self.current.take().map(|(element, _)| element)
        } else {
            None
        }
    }

    fn next_element(&mut self) -> Result<Option<Element>> {
        loop {
            self.buf.clear();
            let position = self.reader.buffer_position();
            let event = self
                .reader
                .read_event_into(&mut self.buf)
                .with_context(|| format!("Parsing XML near byte {position}"))?
                .into_owned();
            let finished = match event {
                Event::Start(start) => self.on_start(&start, false)?,
                Event::Empty(start) => self.on_start(&start, true)?,
                Event::End(_) => self.on_end(),
                Event::Eof => {
                    if let Some((element, _)) = &self.current {
                        return Err(anyhow!(
                            "Unexpected end of document inside <{}> element",
                            element.kind.tag_name()
                        ));
                    }
                    return Ok(None);
                }
                _ => None,
            };
            if finished.is_some() {
                return Ok(finished);
            }
        }
    }
}

impl<R: BufRead> Iterator for ElementStream<R> {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_element() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}
