//! File plumbing shared by the subcommands.
//!
//! - **stdin/stdout**: the `-` path convention routes through standard streams.
//! - **CSV output**: every table is written with `QuoteStyle::Always` so
//!   free-form tag values round-trip safely.
//! - **Output files**: parent directories are created on demand.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use csv::QuoteStyle;

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Creating directory {parent:?}"))?;
    }
    Ok(())
}

/// Opens `path` for buffered writing, or stdout when `path` is `-`.
pub fn open_output(path: &Path) -> Result<Box<dyn Write>> {
    if is_dash(path) {
        return Ok(Box::new(std::io::stdout()));
    }
    ensure_parent_dir(path)?;
    let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    Ok(Box::new(BufWriter::new(file)))
}

pub fn open_csv_writer(path: &Path) -> Result<csv::Writer<Box<dyn Write>>> {
    let writer = open_output(path)?;
    let mut builder = csv::WriterBuilder::new();
    builder
        .has_headers(false)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    Ok(builder.from_writer(writer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_means_standard_stream() {
        assert!(is_dash(Path::new("-")));
        assert!(!is_dash(Path::new("./-")));
        assert!(!is_dash(Path::new("nodes.csv")));
    }

    #[test]
    fn csv_writer_quotes_every_field_and_creates_parents() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("out.csv");
        let mut writer = open_csv_writer(&path).expect("open writer");
        writer.write_record(["id", "a \"b\""]).expect("write");
        writer.flush().expect("flush");
        drop(writer);
        let contents = fs::read_to_string(&path).expect("read back");
        assert_eq!(contents, "\"id\",\"a \"\"b\"\"\"\n");
    }
}
