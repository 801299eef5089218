use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::PatternStoreError;
use crate::frame::Frame;

use super::{Pattern, FRAME_SENTINEL};

/// Append-only writer for the pattern log. Existing content is never truncated.
pub struct PatternWriter {
    path: PathBuf,
    out: BufWriter<File>,
    frames_written: usize,
}

impl PatternWriter {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PatternStoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            out: BufWriter::new(file),
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    /// Writes one record per joint, then the sentinel, then flushes.
    pub fn append_frame(&mut self, frame: &Frame) -> Result<(), PatternStoreError> {
        if let Some((&joint, _)) = frame.joints().iter().find(|(_, pos)| !pos.is_finite()) {
            return Err(PatternStoreError::NonFinite { joint });
        }

        let timestamp = frame.timestamp().to_rfc3339();
        for (joint, pos) in frame.joints() {
            writeln!(self.out, "{};{};{};{};{}", joint, pos.x, pos.y, pos.z, timestamp)?;
        }
        writeln!(self.out, "{FRAME_SENTINEL}")?;
        self.out.flush()?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn append_pattern(&mut self, pattern: &Pattern) -> Result<(), PatternStoreError> {
        for frame in pattern.frames() {
            self.append_frame(frame)?;
        }
        Ok(())
    }
}
