//! CSV archiving of cyclic data
//!
//! An [`Archiver`] appends one CSV row per call. Records must be flat structs (no nested structs
//! or sequences) so that `csv` can derive the header row from the field names. By convention the
//! first field of a record is `time_s`, the session time at which it was produced.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use csv::WriterBuilder;
pub use csv::Writer;
use serde::Serialize;
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
pub struct Archiver<W: Write = File> {
    writer: Writer<W>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create the archive file: {0}")]
    CreateError(std::io::Error),

    #[error("Cannot write the archive record: {0}")]
    WriteError(csv::Error),

    #[error("Cannot flush the archive: {0}")]
    FlushError(std::io::Error)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver<File> {
    /// Create a new archiver from a paricular path relative to the session's
    /// archive root. Any existing file at that path is truncated.
    pub fn from_path<P: AsRef<Path>>(
        session: &Session, path: P
    ) -> Result<Self, ArchiveError> {
        let session_path = session.arch_root.join(path);

        if let Some(parent) = session_path.parent() {
            std::fs::create_dir_all(parent).map_err(ArchiveError::CreateError)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(session_path)
            .map_err(ArchiveError::CreateError)?;

        Ok(Self::from_writer(file))
    }
}

impl<W: Write> Archiver<W> {
    /// Create an archiver writing into any `Write` implementor.
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: WriterBuilder::new()
                .has_headers(true)
                .from_writer(writer)
        }
    }

    /// Serialise a record into the archive.
    ///
    /// The header row is written before the first record.
    pub fn serialise<T: Serialize>(&mut self, record: &T) -> Result<(), ArchiveError> {
        self.writer.serialize(record)
            .map_err(ArchiveError::WriteError)?;
        self.writer.flush().map_err(ArchiveError::FlushError)
    }

    /// Consume the archiver returning the underlying writer.
    pub fn into_inner(self) -> Option<W> {
        self.writer.into_inner().ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        time_s: f64,
        phase: &'static str,
        heading_deg: f64,
        corners: u32
    }

    #[test]
    fn test_archiver_writes_header_once() {
        let mut arch = Archiver::from_writer(Vec::new());
        arch.serialise(&Row { time_s: 0.5, phase: "NoSignal", heading_deg: 1.5, corners: 0 })
            .unwrap();
        arch.serialise(&Row { time_s: 1.0, phase: "CornerMark", heading_deg: -88.0, corners: 1 })
            .unwrap();

        let out = String::from_utf8(arch.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "time_s,phase,heading_deg,corners");
        assert_eq!(lines[1], "0.5,NoSignal,1.5,0");
        assert_eq!(lines[2], "1.0,CornerMark,-88.0,1");
    }
}
