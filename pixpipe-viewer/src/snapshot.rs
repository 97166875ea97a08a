//! Snapshot sink: writes presented frames to disk as binary PPM (P6).
//!
//! PPM stores interleaved 8-bit RGB rows top to bottom, which is the
//! frame layout on the wire, so the payload is written unchanged after
//! a short text header.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use pixpipe_core::{PipeError, PresentationSink, Result};
use tracing::debug;

pub struct SnapshotSink {
    dir: PathBuf,
    every: u64,
    presented: u64,
    written: u64,
}

impl SnapshotSink {
    /// Write every `every`th frame into `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>, every: u64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            every: every.max(1),
            presented: 0,
            written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Path used for frame number `sequence`.
    pub fn path_for(&self, sequence: u64) -> PathBuf {
        self.dir.join(format!("frame-{sequence:06}.ppm"))
    }
}

impl PresentationSink for SnapshotSink {
    fn present(&mut self, width: u32, height: u32, frame: &[u8]) -> Result<()> {
        self.presented += 1;
        if self.presented % self.every != 0 {
            return Ok(());
        }

        let path = self.path_for(self.presented);
        write_ppm(&path, width, height, frame)
            .map_err(|e| PipeError::Presentation(format!("{}: {e}", path.display())))?;
        self.written += 1;
        debug!("snapshot {}", path.display());
        Ok(())
    }
}

/// Write one RGB frame as a P6 file.
pub fn write_ppm(path: &Path, width: u32, height: u32, rgb: &[u8]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write!(out, "P6\n{width} {height}\n255\n")?;
    out.write_all(rgb)?;
    out.flush()
}

// ── NullSink ─────────────────────────────────────────────────────

/// Discards frames. Used when no output is configured.
#[derive(Debug, Default)]
pub struct NullSink;

impl PresentationSink for NullSink {
    fn present(&mut self, _width: u32, _height: u32, _frame: &[u8]) -> Result<()> {
        Ok(())
    }
}
