// Archive module: builds the in-memory zip bundle that gets uploaded with
// an order. The bundle is produced once and handed straight to the upload
// call; it is never written to disk.

use anyhow::{Context, Result};
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Bundle the named inputs into a deflate-compressed zip, one entry per
/// `(file name, contents)` pair, and return the raw archive bytes.
pub fn build_archive(entries: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, contents) in entries {
        writer
            .start_file(name.clone(), options)
            .with_context(|| format!("Failed to add {} to the upload archive", name))?;
        writer
            .write_all(contents)
            .with_context(|| format!("Failed to write {} into the upload archive", name))?;
    }

    let cursor = writer.finish().context("Failed to finish the upload archive")?;
    Ok(cursor.into_inner())
}
