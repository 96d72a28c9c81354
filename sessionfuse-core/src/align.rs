//! Imaging frame timestamp alignment.

use crate::error::{Error, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Frames dropped before the truncation diagnostic escalates to a warning.
const TRUNCATION_WARN_FRAMES: usize = 10;

/// Plane-multiplexing configuration for one experiment.
///
/// On mesoscope rigs several optical planes are acquired per cycle by
/// multiplexing the laser; `plane_group` identifies which group of the
/// cycle this experiment's frames belong to. `plane_group` is `None` for
/// rigs that image a single plane continuously.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaneGrouping {
    /// Plane group of this experiment, if acquisition was interleaved.
    pub plane_group: Option<u32>,
    /// Total number of plane groups multiplexed per acquisition cycle.
    pub group_count: u32,
}

/// Derive the per-frame timestamp axis for a trace matrix.
///
/// Non-mesoscope (`plane_group` of `None`, or a `group_count` of zero):
/// trailing sync pulses beyond the trace frame count are sentinel frames
/// left by the acquisition hardware and are dropped; a trace *longer* than
/// the pulse sequence cannot be repaired and is an error.
///
/// Mesoscope: pulses are interleaved across plane groups in ascending
/// acquisition order, so the sequence is resampled by taking every
/// `group_count`-th pulse starting at `plane_group`. The resampled length
/// must equal the trace frame count exactly; interleaving leaves no safe
/// way to identify sentinel frames, so no truncation is tolerated here.
///
/// # Errors
/// Returns [`Error::AlignmentMismatch`] with both counts on any
/// unrepairable mismatch.
pub fn align_frame_timestamps(
    timestamps: &[f64],
    trace_frames: usize,
    grouping: PlaneGrouping,
) -> Result<Vec<f64>> {
    match grouping.plane_group {
        None => truncate_to_trace(timestamps, trace_frames),
        Some(_) if grouping.group_count == 0 => truncate_to_trace(timestamps, trace_frames),
        Some(plane_group) => {
            info!(
                "mesoscope acquisition: splitting {} pulses over {} plane group(s)",
                timestamps.len(),
                grouping.group_count
            );
            let resampled =
                resample_plane_timestamps(timestamps, plane_group, grouping.group_count);
            if resampled.len() != trace_frames {
                return Err(Error::AlignmentMismatch {
                    context: format!("plane group {plane_group} resampling"),
                    trace_frames,
                    timestamp_count: resampled.len(),
                });
            }
            Ok(resampled)
        }
    }
}

/// Every `group_count`-th timestamp starting at offset `plane_group`.
///
/// Ascending plane-group order corresponds to ascending pulse order within
/// each acquisition cycle.
#[must_use]
pub fn resample_plane_timestamps(
    timestamps: &[f64],
    plane_group: u32,
    group_count: u32,
) -> Vec<f64> {
    timestamps
        .iter()
        .skip(plane_group as usize)
        .step_by(group_count as usize)
        .copied()
        .collect()
}

fn truncate_to_trace(timestamps: &[f64], trace_frames: usize) -> Result<Vec<f64>> {
    if trace_frames > timestamps.len() {
        return Err(Error::AlignmentMismatch {
            context: "frame truncation".to_string(),
            trace_frames,
            timestamp_count: timestamps.len(),
        });
    }
    let dropped = timestamps.len() - trace_frames;
    if dropped > TRUNCATION_WARN_FRAMES {
        warn!(
            "dropping {dropped} trailing acquisition pulses ({} -> {trace_frames})",
            timestamps.len()
        );
    } else if dropped > 0 {
        info!(
            "truncating acquisition pulses ({} -> {trace_frames}) to the trace frame count",
            timestamps.len()
        );
    }
    Ok(timestamps[..trace_frames].to_vec())
}
