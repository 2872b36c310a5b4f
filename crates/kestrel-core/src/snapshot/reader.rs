use super::types::PerformanceSnapshot;
use crate::{Error, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub struct SnapshotReader;

impl SnapshotReader {
    /// Read and parse a single snapshot file.
    pub fn from_file(path: &Path) -> Result<PerformanceSnapshot> {
        tracing::debug!("Reading snapshot from: {}", path.display());

        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let snapshot: PerformanceSnapshot = serde_json::from_reader(reader)?;

        Ok(snapshot)
    }

    /// Parse a snapshot from a JSON string.
    pub fn from_str(content: &str) -> Result<PerformanceSnapshot> {
        let snapshot: PerformanceSnapshot = serde_json::from_str(content)?;
        Ok(snapshot)
    }

    /// Load every `*.json` snapshot in a results directory, in filename
    /// order. Fails with `NoSnapshots` when the directory is missing or
    /// holds no snapshot files.
    pub fn load_dir(dir: &Path) -> Result<Vec<PerformanceSnapshot>> {
        tracing::debug!("Loading snapshots from: {}", dir.display());

        if !dir.is_dir() {
            return Err(Error::NoSnapshots(dir.to_path_buf()));
        }

        let pattern = dir.join("*.json");
        let pattern = pattern.to_string_lossy();

        let mut paths: Vec<_> = glob::glob(&pattern)?.filter_map(|p| p.ok()).collect();
        paths.sort();

        let mut snapshots = Vec::with_capacity(paths.len());
        for path in &paths {
            snapshots.push(Self::from_file(path)?);
        }

        if snapshots.is_empty() {
            return Err(Error::NoSnapshots(dir.to_path_buf()));
        }

        tracing::info!(
            "Loaded {} snapshot(s) from {}",
            snapshots.len(),
            dir.display()
        );

        Ok(snapshots)
    }

    /// Validate that a snapshot is structurally sound.
    pub fn validate(snapshot: &PerformanceSnapshot) -> Result<()> {
        if snapshot.url.is_empty() {
            return Err(Error::InvalidSnapshot("empty url".to_string()));
        }
        if snapshot.timestamp.is_empty() {
            return Err(Error::InvalidSnapshot("empty timestamp".to_string()));
        }
        if snapshot.dom_content_loaded < 0.0 || snapshot.load_event < 0.0 {
            return Err(Error::InvalidSnapshot(format!(
                "negative navigation timing for {}",
                snapshot.url
            )));
        }
        Ok(())
    }
}
