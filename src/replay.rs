use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::ReplayError;
use crate::telemetry::frame::{CompositorTiming, FrameTimingSource};

/// Compositor timing records read from a JSON-lines recording, one record
/// per line. Missing fields default to zero.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    records: Vec<CompositorTiming>,
    position: usize,
    looping: bool,
}

impl ReplaySource {
    pub fn from_path(path: &Path, looping: bool) -> Result<Self, ReplayError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), looping)
    }

    pub fn from_reader(reader: impl BufRead, looping: bool) -> Result<Self, ReplayError> {
        let mut records = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let record = serde_json::from_str(trimmed).map_err(|source| ReplayError::Parse {
                line: idx + 1,
                source,
            })?;
            records.push(record);
        }
        tracing::debug!(records = records.len(), looping, "replay loaded");
        Ok(ReplaySource {
            records,
            position: 0,
            looping,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True once a non-looping replay has handed out every record.
    pub fn is_exhausted(&self) -> bool {
        !self.looping && self.position >= self.records.len()
    }
}

impl FrameTimingSource for ReplaySource {
    fn next_timing(&mut self) -> Option<CompositorTiming> {
        if self.records.is_empty() {
            return None;
        }
        if self.position >= self.records.len() {
            if !self.looping {
                return None;
            }
            self.position = 0;
        }
        let record = self.records[self.position];
        self.position += 1;
        Some(record)
    }
}
