//! Stimulus clock rebasing.

use crate::error::{Error, Result};
use crate::source::LoggedEvent;
use log::warn;

/// Monotone piecewise-linear map from a log's local clock into the sync
/// clock.
///
/// Fitted once per session from two timestamp sequences describing the
/// same physical frame events; outside the fitted domain the map
/// extrapolates with the slope of the nearest end segment.
#[derive(Clone, Debug)]
pub struct RebaseFunction {
    local: Vec<f64>,
    sync: Vec<f64>,
}

impl RebaseFunction {
    /// Fit from paired event sequences.
    ///
    /// # Errors
    /// Returns [`Error::RebaseConstruction`] if the sequences differ in
    /// length or hold fewer than two events, and [`Error::NonMonotonic`]
    /// if either sequence is out of order.
    pub fn new(local: Vec<f64>, sync: Vec<f64>) -> Result<Self> {
        if local.len() != sync.len() || local.len() < 2 {
            return Err(Error::RebaseConstruction {
                local_len: local.len(),
                sync_len: sync.len(),
            });
        }
        for (index, pair) in local.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(Error::NonMonotonic {
                    sequence: "stimulus local clock".to_string(),
                    index: index + 1,
                });
            }
        }
        for (index, pair) in sync.windows(2).enumerate() {
            if pair[1] < pair[0] {
                return Err(Error::NonMonotonic {
                    sequence: "stimulus sync clock".to_string(),
                    index: index + 1,
                });
            }
        }
        Ok(Self { local, sync })
    }

    /// Map a local-clock time into the sync clock.
    #[must_use]
    pub fn rebase(&self, local_time: f64) -> f64 {
        let n = self.local.len();
        // First fitted point >= local_time, clamped to an interior segment.
        let i = self.local.partition_point(|&x| x < local_time);
        let (a, b) = if i == 0 {
            (0, 1)
        } else if i == n {
            (n - 2, n - 1)
        } else {
            (i - 1, i)
        };
        let slope = (self.sync[b] - self.sync[a]) / (self.local[b] - self.local[a]);
        self.sync[a] + (local_time - self.local[a]) * slope
    }

    /// Map a whole sequence of local-clock times.
    #[must_use]
    pub fn rebase_all(&self, local_times: &[f64]) -> Vec<f64> {
        local_times.iter().map(|&t| self.rebase(t)).collect()
    }

    /// Number of fitted event pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.local.len()
    }

    /// True if no event pairs are fitted (never constructible).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }
}

/// Cumulative local frame clock from logged inter-frame intervals.
///
/// `[0, intervals..]` cumulative-summed, milliseconds to seconds, shifted
/// by the session-level offset. One entry per displayed frame.
#[must_use]
pub fn local_frame_clock(intervals_ms: &[f64], offset_s: f64) -> Vec<f64> {
    let mut clock = Vec::with_capacity(intervals_ms.len() + 1);
    let mut elapsed = 0.0;
    clock.push(offset_s);
    for interval in intervals_ms {
        elapsed += interval / 1000.0;
        clock.push(elapsed + offset_s);
    }
    clock
}

/// Session-level offset between the log's event wall clock and its frame
/// clock.
///
/// Median over logged events of `wall_time - frame_clock[frame]`, taken
/// against the unshifted frame clock. Events referencing frames beyond the
/// clock are skipped with a warning; with no usable events the offset is
/// zero.
#[must_use]
pub fn frame_clock_offset(events: &[LoggedEvent], frame_clock: &[f64]) -> f64 {
    let mut offsets: Vec<f64> = Vec::with_capacity(events.len());
    for event in events {
        if let Some(frame_time) = frame_clock.get(event.frame) {
            offsets.push(event.wall_time - frame_time);
        } else {
            warn!(
                "logged event at frame {} is beyond the {}-frame clock; skipping",
                event.frame,
                frame_clock.len()
            );
        }
    }
    if offsets.is_empty() {
        return 0.0;
    }
    offsets.sort_by(f64::total_cmp);
    let mid = offsets.len() / 2;
    if offsets.len() % 2 == 0 {
        (offsets[mid - 1] + offsets[mid]) / 2.0
    } else {
        offsets[mid]
    }
}
