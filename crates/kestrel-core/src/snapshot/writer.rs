use super::types::PerformanceSnapshot;
use crate::Result;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub struct SnapshotWriter;

impl SnapshotWriter {
    /// Write a snapshot to a file as pretty-printed JSON.
    pub fn to_file(snapshot: &PerformanceSnapshot, path: &Path) -> Result<()> {
        tracing::debug!("Writing snapshot to: {}", path.display());

        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, snapshot)?;

        tracing::info!(
            "Wrote snapshot for {} to {}",
            snapshot.url,
            path.display()
        );

        Ok(())
    }

    /// Convert a snapshot to a pretty-printed JSON string.
    pub fn to_string(snapshot: &PerformanceSnapshot) -> Result<String> {
        let json = serde_json::to_string_pretty(snapshot)?;
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_snapshot() -> PerformanceSnapshot {
        PerformanceSnapshot {
            url: "https://example.com/worlds/plaza".to_string(),
            timestamp: "2026-08-07T12:00:00Z".to_string(),
            dom_content_loaded: 812.4,
            load_event: 1420.0,
            lcp: None,
            avg_fps: Some(58),
            min_fps: Some(41),
            fps_sample_duration_ms: Some(3000),
            api_calls: vec![],
            failed_requests: vec![],
        }
    }

    #[test]
    fn test_snapshot_to_string_is_indented() {
        let json = SnapshotWriter::to_string(&minimal_snapshot()).unwrap();

        assert!(json.contains("\"url\": \"https://example.com/worlds/plaza\""));
        // serde_json pretty printing uses two-space indentation
        assert!(json.contains("\n  \"avgFps\": 58"));
    }

    #[test]
    fn test_snapshot_to_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("20260807120000-0.json");

        SnapshotWriter::to_file(&minimal_snapshot(), &path).unwrap();

        let loaded = crate::snapshot::SnapshotReader::from_file(&path).unwrap();
        assert_eq!(loaded.url, "https://example.com/worlds/plaza");
        assert_eq!(loaded.avg_fps, Some(58));
        assert_eq!(loaded.lcp, None);
    }
}
