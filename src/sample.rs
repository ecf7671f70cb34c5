use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};
use log::info;
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, Event},
};

use crate::{
    cli::SampleArgs,
    io_utils,
    osm::{Child, Element, ElementStream},
};

pub const ROOT_ELEMENT: &str = "osm";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRatios {
    /// Every `small`-th element goes to both outputs.
    pub small: usize,
    /// Every `medium`-th element goes to the medium output.
    pub medium: usize,
}

impl Default for SampleRatios {
    fn default() -> Self {
        Self {
            small: 1000,
            medium: 10,
        }
    }
}

impl SampleRatios {
    pub fn validate(&self) -> Result<()> {
        if self.small == 0 || self.medium == 0 {
            bail!("Sample ratios must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampleSummary {
    pub elements: usize,
    pub small: usize,
    pub medium: usize,
}

/// Writes OSM elements into a document with a single `<osm>` root.
pub struct OsmDocumentWriter<W: Write> {
    xml: Writer<W>,
}

impl<W: Write> OsmDocumentWriter<W> {
    pub fn start(inner: W) -> Result<Self> {
        let mut xml = Writer::new_with_indent(inner, b' ', 2);
        xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        xml.write_event(Event::Start(BytesStart::new(ROOT_ELEMENT)))?;
        Ok(Self { xml })
    }

    pub fn write_element(&mut self, element: &Element) -> Result<()> {
        let mut start = BytesStart::new(element.kind.tag_name());
        for (name, value) in &element.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }
        if element.children.is_empty() {
            self.xml.write_event(Event::Empty(start))?;
            return Ok(());
        }
        self.xml.write_event(Event::Start(start))?;
        for child in &element.children {
            self.xml.write_event(Event::Empty(child_start(child)))?;
        }
        self.xml
            .write_event(Event::End(BytesEnd::new(element.kind.tag_name())))?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        self.xml
            .write_event(Event::End(BytesEnd::new(ROOT_ELEMENT)))?;
        let mut inner = self.xml.into_inner();
        inner.write_all(b"\n")?;
        inner.flush()?;
        Ok(inner)
    }
}

fn child_start(child: &Child) -> BytesStart<'_> {
    let (name, attributes): (&str, Vec<(&str, &str)>) = match child {
        Child::Tag { key, value } => (
            "tag",
            [("k", key), ("v", value)]
                .into_iter()
                .filter_map(|(attr, value)| value.as_deref().map(|value| (attr, value)))
                .collect(),
        ),
        Child::NodeRef { reference } => (
            "nd",
            reference
                .as_deref()
                .map(|reference| ("ref", reference))
                .into_iter()
                .collect(),
        ),
        Child::Other { name, attributes } => (
            name.as_str(),
            attributes
                .iter()
                .map(|(attr, value)| (attr.as_str(), value.as_str()))
                .collect(),
        ),
    };
    BytesStart::new(name).with_attributes(attributes)
}

/// Splits `elements` into a small and a medium sample document.
pub fn sample_stream<R: BufRead, S: Write, M: Write>(
    elements: ElementStream<R>,
    small: S,
    medium: M,
    ratios: SampleRatios,
) -> Result<(SampleSummary, S, M)> {
    ratios.validate()?;
    let mut small = OsmDocumentWriter::start(small).context("Starting small sample")?;
    let mut medium = OsmDocumentWriter::start(medium).context("Starting medium sample")?;
    let mut summary = SampleSummary::default();
    for (idx, element) in elements.enumerate() {
        let element = element.with_context(|| format!("Reading element {}", idx + 1))?;
        summary.elements += 1;
        if idx % ratios.small == 0 {
            small.write_element(&element)?;
            medium.write_element(&element)?;
            summary.small += 1;
            summary.medium += 1;
        } else if idx % ratios.medium == 0 {
            medium.write_element(&element)?;
            summary.medium += 1;
        }
    }
    let small = small.finish().context("Finishing small sample")?;
    let medium = medium.finish().context("Finishing medium sample")?;
    Ok((summary, small, medium))
}

pub fn execute(args: &SampleArgs) -> Result<()> {
    let ratios = SampleRatios {
        small: args.small_every,
        medium: args.medium_every,
    };
    info!(
        "Sampling '{}' (every {} -> {:?}, every {} -> {:?})",
        args.input.display(),
        ratios.small,
        args.small,
        ratios.medium,
        args.medium
    );
    if args.small == args.medium || (io_utils::is_dash(&args.small) && io_utils::is_dash(&args.medium))
    {
        bail!("Small and medium samples must be written to different destinations");
    }
    let elements = ElementStream::open(&args.input)?;
    let small = io_utils::open_output(&args.small)?;
    let medium = io_utils::open_output(&args.medium)?;
    let (summary, _, _) = sample_stream(elements, small, medium, ratios)
        .with_context(|| format!("Sampling {:?}", args.input))?;
    info!(
        "Kept {} element(s) in the small sample and {} in the medium sample out of {}",
        summary.small, summary.medium, summary.elements
    );
    Ok(())
}
