//! # threadgraph Storage
//!
//! Everything that touches the output folder: the JSON graph document, the
//! per-run folder layout used as pipeline sink, Graphviz rendering and the
//! annotation round trip.

pub mod annotation;
pub mod format;
pub mod layout;
pub mod render;

pub use annotation::{agreement, export, import, label_interactive, Agreement, AnnotationSet, ImportReport, LabelReport};
pub use format::GraphDocument;
pub use layout::OutputLayout;

use atomicwrites::{AtomicFile, OverwriteBehavior};
use std::io::Write;
use std::path::Path;
use threadgraph_core::{Error, Result};

/// Replace `path` with `contents` via a temporary file and rename
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|file| file.write_all(contents))
        .map_err(|e| match e {
            atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => Error::Io(e),
        })
}
