//! Segmentation planning.

/// Windows shorter than this are degenerate tails and are not planned.
pub const MIN_WINDOW_SECS: f64 = 5.0;

/// One planned time window, in seconds from the start of the asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub start: f64,
    pub end: f64,
}

impl Window {
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Plan overlapping windows over an asset of the given duration.
///
/// Pure and deterministic: the same inputs always produce the same windows,
/// which is what keeps segment indices stable across reruns. An asset no
/// longer than one window gets exactly one window covering all of it, even
/// when that is shorter than the tail threshold.
pub fn plan_windows(duration: f64, window_length: f64, overlap: f64) -> Vec<Window> {
    if duration <= 0.0 {
        return Vec::new();
    }
    if duration <= window_length {
        return vec![Window {
            start: 0.0,
            end: duration,
        }];
    }

    let step = window_length - overlap;
    debug_assert!(step > 0.0, "overlap must be smaller than the window length");

    let mut windows = Vec::new();
    let mut start = 0.0;
    loop {
        let end = (start + window_length).min(duration);
        if end - start < MIN_WINDOW_SECS {
            break;
        }
        windows.push(Window { start, end });
        if end >= duration {
            break;
        }
        start += step;
    }
    windows
}
