//! Named synchronization channel timelines.

use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Logical channel names produced by sync-channel resolution.
pub mod channel {
    /// Two-photon imaging frame pulses.
    pub const OPHYS_FRAMES: &str = "ophys_frames";
    /// Stimulus frame pulses with monitor-delay correction applied.
    pub const STIMULUS_FRAMES: &str = "stimulus_frames";
    /// Stimulus frame pulses without monitor-delay correction.
    pub const STIMULUS_FRAMES_NO_DELAY: &str = "stimulus_frames_no_delay";
    /// Lick sensor pulses.
    pub const LICK_SENSOR: &str = "lick_sensor";
    /// Eye-tracking camera exposure strobe.
    pub const EYE_CAMERA_FRAMES: &str = "eye_camera_frames";
}

/// Per-channel pulse timestamps (seconds) for one session.
///
/// Immutable once resolved; each channel holds a strictly increasing
/// timestamp sequence on the session's master clock.
#[derive(Clone, Debug, Default)]
pub struct SyncChannelTimeline {
    channels: BTreeMap<String, Vec<f64>>,
}

impl SyncChannelTimeline {
    /// Create an empty timeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a channel, enforcing strict timestamp ordering.
    ///
    /// # Errors
    /// Returns [`Error::NonMonotonic`] if the timestamps are not strictly
    /// increasing.
    pub fn insert(&mut self, name: &str, timestamps: Vec<f64>) -> Result<()> {
        for (index, pair) in timestamps.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(Error::NonMonotonic {
                    sequence: name.to_string(),
                    index: index + 1,
                });
            }
        }
        self.channels.insert(name.to_string(), timestamps);
        Ok(())
    }

    /// Look up a channel by name.
    #[must_use]
    pub fn channel(&self, name: &str) -> Option<&[f64]> {
        self.channels.get(name).map(Vec::as_slice)
    }

    /// Look up a channel that the caller requires.
    ///
    /// # Errors
    /// Returns [`Error::MissingChannel`] naming the available channels if
    /// the channel is absent.
    pub fn require(&self, name: &str) -> Result<&[f64]> {
        self.channel(name).ok_or_else(|| Error::MissingChannel {
            channel: name.to_string(),
            available: self.channels.keys().cloned().collect(),
        })
    }

    /// Names of all resolved channels, sorted.
    #[must_use]
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.keys().map(String::as_str).collect()
    }

    /// Number of resolved channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True if no channels have been resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

/// Nominal frame rate of a timestamp sequence, rounded to whole Hz.
///
/// Computed as `round(1 / mean(diff(timestamps)))`. Returns `None` when
/// fewer than two timestamps are available.
#[must_use]
pub fn frame_rate_hz(timestamps: &[f64]) -> Option<f64> {
    if timestamps.len() < 2 {
        return None;
    }
    let span = timestamps[timestamps.len() - 1] - timestamps[0];
    if span <= 0.0 {
        return None;
    }
    let mean_interval = span / (timestamps.len() - 1) as f64;
    Some((1.0 / mean_interval).round())
}
