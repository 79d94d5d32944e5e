//! Writing processed documents to disk
//!
//! Output names are planned up front by [`OutputPlanner`]. Every file is
//! written to a temporary sibling first and renamed into place, so a
//! destination never holds a half-written file.

pub mod encode;
pub mod naming;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use lopdf::Document;
use tracing::debug;

use crate::error::{Error, Result};

pub use encode::{encode_image, encode_jpeg, encode_png, flatten_onto_white, jpeg_page};
pub use naming::{OutputPlan, OutputPlanner};

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.partial", name))
}

/// Write `bytes` to `path`, replacing it atomically
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let partial = partial_path(path);

    let written = fs::File::create(&partial).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    let result = written.and_then(|_| fs::rename(&partial, path));

    if let Err(e) = result {
        let _ = fs::remove_file(&partial);
        return Err(Error::write(path, e));
    }

    debug!(path = %path.display(), bytes = bytes.len(), "wrote output");
    Ok(())
}

/// Serialize a PDF and write it atomically
pub fn save_document(doc: &mut Document, path: &Path) -> Result<()> {
    let mut bytes = Vec::new();
    serialize_document(doc, &mut bytes, path)?;
    write_atomic(path, &bytes)
}

/// Serialization failures are reported against the output `path`
fn serialize_document<W: Write>(doc: &mut Document, target: &mut W, path: &Path) -> Result<()> {
    doc.save_to(target)
        .map_err(|e| Error::write(path, io::Error::new(io::ErrorKind::Other, e.to_string())))
}

/// Remove files written for a document that later failed
pub fn discard(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path) {
            debug!(path = %path.display(), error = %e, "could not remove partial output");
        }
    }
}
