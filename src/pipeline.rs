use std::{
    io::{BufRead, Write},
    path::Path,
};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    cli::ShapeArgs,
    io_utils,
    normalize::AddressNormalizer,
    osm::ElementStream,
    rules::NormalizationRules,
    shape::{
        ElementShaper, NODE_FIELDS, Shaped, ShapedElement, TAG_FIELDS, WAY_FIELDS,
        WAY_NODE_FIELDS,
    },
};

pub const NODES_FILE: &str = "nodes.csv";
pub const NODE_TAGS_FILE: &str = "nodes_tags.csv";
pub const WAYS_FILE: &str = "ways.csv";
pub const WAY_NODES_FILE: &str = "ways_nodes.csv";
pub const WAY_TAGS_FILE: &str = "ways_tags.csv";

const PROGRESS_INTERVAL: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Log the element and keep going.
    #[default]
    Skip,
    /// Abort the run on the first malformed element.
    Fail,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShapeOptions {
    pub limit: Option<usize>,
    pub malformed: MalformedPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeSummary {
    pub elements: usize,
    pub nodes: usize,
    pub node_tags: usize,
    pub ways: usize,
    pub way_nodes: usize,
    pub way_tags: usize,
    pub skipped: usize,
    pub malformed: usize,
    pub dropped_tags: usize,
}

/// The five output tables of a shaping run.
pub struct TableWriters<W: Write> {
    nodes: csv::Writer<W>,
    node_tags: csv::Writer<W>,
    ways: csv::Writer<W>,
    way_nodes: csv::Writer<W>,
    way_tags: csv::Writer<W>,
}

impl TableWriters<Box<dyn Write>> {
    /// Creates the table files under `dir`, writing each header row.
    pub fn create(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Creating output directory {dir:?}"))?;
        let open = |name: &str| io_utils::open_csv_writer(&dir.join(name));
        Self::new(
            open(NODES_FILE)?,
            open(NODE_TAGS_FILE)?,
            open(WAYS_FILE)?,
            open(WAY_NODES_FILE)?,
            open(WAY_TAGS_FILE)?,
        )
    }
}

impl<W: Write> TableWriters<W> {
    pub fn new(
        mut nodes: csv::Writer<W>,
        mut node_tags: csv::Writer<W>,
        mut ways: csv::Writer<W>,
        mut way_nodes: csv::Writer<W>,
        mut way_tags: csv::Writer<W>,
    ) -> Result<Self> {
        nodes.write_record(NODE_FIELDS).context("Writing node header")?;
        node_tags
            .write_record(TAG_FIELDS)
            .context("Writing node tag header")?;
        ways.write_record(WAY_FIELDS).context("Writing way header")?;
        way_nodes
            .write_record(WAY_NODE_FIELDS)
            .context("Writing way node header")?;
        way_tags
            .write_record(TAG_FIELDS)
            .context("Writing way tag header")?;
        Ok(Self {
            nodes,
            node_tags,
            ways,
            way_nodes,
            way_tags,
        })
    }

    pub fn write(&mut self, shaped: &ShapedElement, summary: &mut ShapeSummary) -> Result<()> {
        match shaped {
            ShapedElement::Node { node, tags } => {
                self.nodes
                    .serialize(node)
                    .with_context(|| format!("Writing node {}", node.id))?;
                summary.nodes += 1;
                summary.node_tags += write_all(&mut self.node_tags, tags)
                    .with_context(|| format!("Writing tags of node {}", node.id))?;
            }
            ShapedElement::Way {
                way,
                way_nodes,
                tags,
            } => {
                self.ways
                    .serialize(way)
                    .with_context(|| format!("Writing way {}", way.id))?;
                summary.ways += 1;
                summary.way_nodes += write_all(&mut self.way_nodes, way_nodes)
                    .with_context(|| format!("Writing node references of way {}", way.id))?;
                summary.way_tags += write_all(&mut self.way_tags, tags)
                    .with_context(|| format!("Writing tags of way {}", way.id))?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        for writer in [
            &mut self.nodes,
            &mut self.node_tags,
            &mut self.ways,
            &mut self.way_nodes,
            &mut self.way_tags,
        ] {
            writer.flush().context("Flushing table writer")?;
        }
        Ok(())
    }
}

fn write_all<W: Write, T: Serialize>(writer: &mut csv::Writer<W>, rows: &[T]) -> Result<usize> {
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(rows.len())
}

/// Streams `elements` through `shaper` into `tables`.
pub fn shape_stream<R: BufRead, W: Write>(
    elements: ElementStream<R>,
    shaper: &ElementShaper<'_>,
    tables: &mut TableWriters<W>,
    options: ShapeOptions,
) -> Result<ShapeSummary> {
    let mut summary = ShapeSummary::default();
    for (idx, element) in elements.enumerate() {
        if let Some(limit) = options.limit
            && idx >= limit
        {
            debug!("Stopping after {limit} element(s)");
            break;
        }
        let element = element.with_context(|| format!("Reading element {}", idx + 1))?;
        summary.elements += 1;
        match shaper.shape(&element) {
            Ok(Some(Shaped {
                element: shaped,
                dropped_tags,
            })) => {
                summary.dropped_tags += dropped_tags;
                tables.write(&shaped, &mut summary)?;
            }
            Ok(None) => {
                summary.skipped += 1;
            }
            Err(err) => {
                summary.malformed += 1;
                match options.malformed {
                    MalformedPolicy::Skip => warn!("Skipping element {}: {err}", idx + 1),
                    MalformedPolicy::Fail => {
                        return Err(anyhow::Error::new(err)
                            .context(format!("Shaping element {}", idx + 1)));
                    }
                }
            }
        }
        if summary.elements % PROGRESS_INTERVAL == 0 {
            debug!(
                "Shaped {} element(s) ({} node(s), {} way(s))",
                summary.elements, summary.nodes, summary.ways
            );
        }
    }
    tables.flush()?;
    Ok(summary)
}

pub fn execute(args: &ShapeArgs) -> Result<()> {
    let rules = NormalizationRules::resolve(args.rules.as_deref())?;
    let shaper = ElementShaper::new(AddressNormalizer::new(&rules)?);
    info!(
        "Shaping '{}' -> {:?}",
        args.input.display(),
        args.output_dir
    );
    let elements = ElementStream::open(&args.input)?;
    let mut tables = TableWriters::create(&args.output_dir)?;
    let options = ShapeOptions {
        limit: args.limit,
        malformed: if args.fail_on_malformed {
            MalformedPolicy::Fail
        } else {
            MalformedPolicy::Skip
        },
    };
    let summary = shape_stream(elements, &shaper, &mut tables, options)
        .with_context(|| format!("Shaping {:?}", args.input))?;
    info!(
        "Wrote {} node(s) with {} tag(s), {} way(s) with {} node reference(s) and {} tag(s) from {} element(s)",
        summary.nodes,
        summary.node_tags,
        summary.ways,
        summary.way_nodes,
        summary.way_tags,
        summary.elements
    );
    if summary.skipped > 0 {
        debug!("{} element(s) had no table output", summary.skipped);
    }
    if summary.malformed > 0 || summary.dropped_tags > 0 {
        warn!(
            "Skipped {} malformed element(s) and dropped {} unsafe or incomplete tag(s)",
            summary.malformed, summary.dropped_tags
        );
    }
    Ok(())
}
