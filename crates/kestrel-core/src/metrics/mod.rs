//! Frame-rate aggregation over raw inter-frame deltas.

/// Rounded frame-rate summary over one sampling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FpsSummary {
    pub avg_fps: u32,
    pub min_fps: u32,
}

/// Aggregate raw inter-frame deltas (ms) into average and minimum FPS.
///
/// Non-positive deltas are discarded; the first sample of a window has no
/// valid predecessor and shows up as zero. With no valid deltas at all the
/// summary is (0, 0) rather than NaN.
pub fn summarize_frame_deltas(deltas_ms: &[f64]) -> FpsSummary {
    let rates: Vec<f64> = deltas_ms
        .iter()
        .filter(|delta| **delta > 0.0)
        .map(|delta| 1000.0 / delta)
        .collect();

    if rates.is_empty() {
        return FpsSummary {
            avg_fps: 0,
            min_fps: 0,
        };
    }

    let avg = rates.iter().sum::<f64>() / rates.len() as f64;
    let min = rates.iter().cloned().fold(f64::INFINITY, f64::min);

    FpsSummary {
        avg_fps: avg.round() as u32,
        min_fps: min.round() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discards_non_positive_deltas() {
        // 0 has no valid predecessor and must not poison the aggregate
        let summary = summarize_frame_deltas(&[16.0, 16.0, 20.0, 0.0, 33.0]);

        // mean(62.5, 62.5, 50.0, 30.303) = 51.33 -> 51
        assert_eq!(summary.avg_fps, 51);
        // min is 1000/33 = 30.303 -> 30
        assert_eq!(summary.min_fps, 30);
    }

    #[test]
    fn test_negative_deltas_are_discarded_too() {
        let summary = summarize_frame_deltas(&[-5.0, 10.0]);
        assert_eq!(summary.avg_fps, 100);
        assert_eq!(summary.min_fps, 100);
    }

    #[test]
    fn test_no_valid_deltas_yields_zero() {
        assert_eq!(
            summarize_frame_deltas(&[]),
            FpsSummary {
                avg_fps: 0,
                min_fps: 0
            }
        );
        assert_eq!(
            summarize_frame_deltas(&[0.0, 0.0, -1.0]),
            FpsSummary {
                avg_fps: 0,
                min_fps: 0
            }
        );
    }

    #[test]
    fn test_steady_sixty_fps() {
        let deltas = vec![1000.0 / 60.0; 180];
        let summary = summarize_frame_deltas(&deltas);
        assert_eq!(summary.avg_fps, 60);
        assert_eq!(summary.min_fps, 60);
    }
}
