//! Tabular output: poems ↔ CSV with a fixed `author,title,text` header.
//!
//! RFC 4180 quoting (via the `csv` crate) keeps multi-line poem bodies,
//! commas and quotes intact, so a written file reads back to the same
//! tuples.

use crate::error::PoemsError;
use crate::output::Poem;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

/// Column names, in order.
pub const HEADER: [&str; 3] = ["author", "title", "text"];

/// Write the header and one row per poem, in order.
///
/// The header is written even when `poems` is empty.
pub fn write_poems<W: Write>(writer: W, poems: &[Poem]) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(HEADER)?;
    for poem in poems {
        wtr.serialize(poem)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read poems back from the format produced by [`write_poems`].
pub fn read_poems<R: Read>(reader: R) -> Result<Vec<Poem>, csv::Error> {
    csv::Reader::from_reader(reader).deserialize().collect()
}

/// Write poems to `path` atomically (temp file + rename).
pub async fn write_poems_to_path(path: &Path, poems: &[Poem]) -> Result<(), PoemsError> {
    let write_failed = |source: std::io::Error| PoemsError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let mut buf = Vec::new();
    write_poems(&mut buf, poems).map_err(|e| write_failed(e.into()))?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, &buf).await.map_err(write_failed)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_failed(e));
    }

    info!("Wrote {} poems to {}", poems.len(), path.display());
    Ok(())
}
