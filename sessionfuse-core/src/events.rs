//! Event-detection outputs and causal smoothing.

use crate::RoiId;
use ndarray::Array2;

/// Default decay constant of the smoothing kernel, in frames.
pub const DEFAULT_FILTER_SCALE: f64 = 2.0;
/// Default kernel length, in frames.
pub const DEFAULT_FILTER_TAPS: usize = 20;

/// Event-detection outputs reconciled into canonical ROI order.
#[derive(Clone, Debug)]
pub struct EventDetection {
    /// Detected event magnitudes, `[roi, frame]`.
    pub events: Array2<f64>,
    /// Causally smoothed event magnitudes, `[roi, frame]`.
    pub filtered_events: Array2<f64>,
    /// Per-ROI regularization weight from detection.
    pub lambdas: Vec<f64>,
    /// Per-ROI noise estimate from detection.
    pub noise_stds: Vec<f64>,
    /// Canonical `cell_roi_id` order.
    pub roi_ids: Vec<RoiId>,
    /// Matching `cell_specimen_id` values; `None` where unassigned.
    pub specimen_ids: Vec<Option<i64>>,
}

/// Smooth an events matrix with a causal exponential kernel.
///
/// The kernel is `exp(-k / scale)` for `k` in `0..taps`, renormalized to
/// unit sum, convolved along each row so that the filtered value at frame
/// `t` depends only on frames at or before `t`.
#[must_use]
pub fn filter_events_matrix(events: &Array2<f64>, scale: f64, taps: usize) -> Array2<f64> {
    let kernel = causal_kernel(scale, taps);
    let mut filtered = Array2::zeros(events.raw_dim());
    for (roi, row) in events.outer_iter().enumerate() {
        for frame in 0..row.len() {
            let mut value = 0.0;
            for (lag, weight) in kernel.iter().enumerate() {
                if frame >= lag {
                    value += weight * row[frame - lag];
                }
            }
            filtered[[roi, frame]] = value;
        }
    }
    filtered
}

fn causal_kernel(scale: f64, taps: usize) -> Vec<f64> {
    let mut kernel: Vec<f64> = (0..taps).map(|k| (-(k as f64) / scale).exp()).collect();
    let sum: f64 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}
