//! Catalog of processed audio files and their transcriptions.
//!
//! Tracks what the pipeline has produced per input file so the results can
//! be exported in the `"<filename> <transcription>"` format the scorer
//! consumes.

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize)]
pub struct AudioFileEntry {
    pub filename: String,
    /// Audio length, once decoded.
    pub duration_ms: Option<u64>,
    pub transcription: Option<String>,
    /// Wall-clock time transcription took, once finished.
    pub transcription_duration_ms: Option<u64>,
}

/// Insertion-ordered upsert store; entries are never removed.
#[derive(Debug, Default)]
pub struct AudioFileCatalog {
    entries: Vec<AudioFileEntry>,
}

impl AudioFileCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_mut(&mut self, filename: &str) -> &mut AudioFileEntry {
        if let Some(index) = self.entries.iter().position(|e| e.filename == filename) {
            return &mut self.entries[index];
        }
        self.entries.push(AudioFileEntry {
            filename: filename.to_string(),
            ..Default::default()
        });
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    pub fn set_duration(&mut self, filename: &str, duration_ms: u64) {
        self.entry_mut(filename).duration_ms = Some(duration_ms);
    }

    pub fn set_transcription(&mut self, filename: &str, text: &str, took_ms: u64) {
        let entry = self.entry_mut(filename);
        entry.transcription = Some(text.to_string());
        entry.transcription_duration_ms = Some(took_ms);
        debug!("Catalog: '{}' transcribed in {} ms", filename, took_ms);
    }

    pub fn get(&self, filename: &str) -> Option<&AudioFileEntry> {
        self.entries.iter().find(|e| e.filename == filename)
    }

    pub fn entries(&self) -> &[AudioFileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write one `"<filename> <transcription>"` line per entry. Entries
    /// without a transcription yet export an empty text.
    pub fn export_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut file =
            File::create(path).with_context(|| format!("failed to create {:?}", path))?;
        for entry in &self.entries {
            let text = entry.transcription.as_deref().unwrap_or("");
            writeln!(file, "{} {}", entry.filename, text)
                .with_context(|| format!("failed to write {:?}", path))?;
        }
        debug!("Exported {} catalog entries to {:?}", self.entries.len(), path);
        Ok(())
    }
}

/// Append a single `"<filename> <text>"` line to a shared transcript file,
/// creating it if needed.
pub fn append_transcription<P: AsRef<Path>>(path: P, filename: &str, text: &str) -> Result<()> {
    let path = path.as_ref();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {:?} for appending", path))?;
    writeln!(file, "{} {}", filename, text)
        .with_context(|| format!("failed to append to {:?}", path))?;
    Ok(())
}
