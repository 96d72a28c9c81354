//! Sync line resolution into logical channels.
//!
//! Line labels vary across rig generations; each logical channel is
//! looked up through its alias list. Frame-type channels use rising
//! edges, as does the lick sensor; polarity is owned here so the core
//! never sees it.

use crate::error::Result;
use log::warn;
use sessionfuse_core::{channel, Error as CoreError, SyncChannelTimeline};
use sessionfuse_sync::SyncRecording;

/// Imaging frame pulse line labels.
const OPHYS_FRAME_LINES: &[&str] = &["2p_vsync", "vsync_2p"];
/// Stimulus frame pulse line labels.
const STIMULUS_LINES: &[&str] = &["stim_vsync", "vsync_stim"];
/// Photodiode line labels (monitor-delay measurement).
const PHOTODIODE_LINES: &[&str] = &["stim_photodiode", "photodiode"];
/// Lick sensor line labels.
const LICK_LINES: &[&str] = &["lick_1", "lick_sensor", "lick_times"];
/// Eye-tracking camera exposure line labels.
const EYE_CAMERA_LINES: &[&str] = &["eye_tracking", "cam2_exposure", "eye_cam_exposing"];

/// Monitor delay assumed when no usable photodiode is present, seconds.
const ASSUMED_MONITOR_DELAY_S: f64 = 0.0351;
/// Plausible monitor delay bounds, seconds.
const MONITOR_DELAY_MIN_S: f64 = 0.0;
const MONITOR_DELAY_MAX_S: f64 = 0.07;

/// Resolve a recording into the session's logical channel timelines.
///
/// Imaging frames, stimulus frames (both delay-corrected and raw), and
/// the lick sensor are required; the eye camera channel is resolved only
/// when its line exists, so its absence surfaces when (and only when)
/// eye tracking is queried.
///
/// # Errors
/// Returns [`CoreError::MissingChannel`] when a required line is absent
/// under every known alias.
pub fn resolve_channels(recording: &SyncRecording) -> Result<SyncChannelTimeline> {
    let mut timeline = SyncChannelTimeline::new();

    let ophys = required_rising(recording, OPHYS_FRAME_LINES, channel::OPHYS_FRAMES)?;
    timeline.insert(channel::OPHYS_FRAMES, ophys)?;

    let stimulus = required_rising(recording, STIMULUS_LINES, channel::STIMULUS_FRAMES)?;
    let delay = monitor_delay(recording, &stimulus)?;
    timeline.insert(
        channel::STIMULUS_FRAMES,
        stimulus.iter().map(|t| t + delay).collect(),
    )?;
    timeline.insert(channel::STIMULUS_FRAMES_NO_DELAY, stimulus)?;

    let licks = required_rising(recording, LICK_LINES, channel::LICK_SENSOR)?;
    timeline.insert(channel::LICK_SENSOR, licks)?;

    if let Some(eye) = optional_rising(recording, EYE_CAMERA_LINES)? {
        timeline.insert(channel::EYE_CAMERA_FRAMES, eye)?;
    }

    Ok(timeline)
}

fn find_line<'a>(recording: &SyncRecording, aliases: &[&'a str]) -> Option<&'a str> {
    aliases
        .iter()
        .copied()
        .find(|alias| recording.has_line(alias))
}

fn required_rising(
    recording: &SyncRecording,
    aliases: &[&str],
    logical: &str,
) -> Result<Vec<f64>> {
    let Some(line) = find_line(recording, aliases) else {
        return Err(CoreError::MissingChannel {
            channel: logical.to_string(),
            available: recording.line_labels().to_vec(),
        }
        .into());
    };
    Ok(recording.rising_edges(line)?)
}

fn optional_rising(recording: &SyncRecording, aliases: &[&str]) -> Result<Option<Vec<f64>>> {
    match find_line(recording, aliases) {
        Some(line) => Ok(Some(recording.rising_edges(line)?)),
        None => Ok(None),
    }
}

/// Monitor delay between stimulus vsync and the screen actually lighting.
///
/// Estimated from the photodiode line when one is present and the
/// estimate is plausible; otherwise the rig constant is assumed.
fn monitor_delay(recording: &SyncRecording, stimulus_times: &[f64]) -> Result<f64> {
    if let Some(line) = find_line(recording, PHOTODIODE_LINES) {
        let photodiode = recording.rising_edges(line)?;
        if let Some(delay) = estimate_monitor_delay(&photodiode, stimulus_times) {
            return Ok(delay);
        }
    }
    warn!("no usable photodiode measurement; assuming {ASSUMED_MONITOR_DELAY_S} s monitor delay");
    Ok(ASSUMED_MONITOR_DELAY_S)
}

/// Median offset between each photodiode transition and the latest
/// stimulus pulse at or before it, accepted only within plausible bounds.
fn estimate_monitor_delay(photodiode: &[f64], stimulus_times: &[f64]) -> Option<f64> {
    let mut offsets: Vec<f64> = Vec::with_capacity(photodiode.len());
    for &edge in photodiode {
        let after = stimulus_times.partition_point(|&t| t <= edge);
        if after > 0 {
            offsets.push(edge - stimulus_times[after - 1]);
        }
    }
    if offsets.is_empty() {
        return None;
    }
    offsets.sort_by(f64::total_cmp);
    let delay = offsets[offsets.len() / 2];
    if (MONITOR_DELAY_MIN_S..=MONITOR_DELAY_MAX_S).contains(&delay) {
        Some(delay)
    } else {
        warn!("implausible monitor delay estimate {delay:.4} s; falling back");
        None
    }
}
