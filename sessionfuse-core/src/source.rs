//! Raw-data-source seams consumed by the session facade.
//!
//! A session is fused from two capabilities: the optical-physiology
//! recording and the behavioral stimulus log. Each capability is a trait
//! so that database-backed and pre-extracted-file-backed sessions run the
//! same alignment logic; `sessionfuse-io` provides the file-backed
//! implementation.

use crate::align::PlaneGrouping;
use crate::error::Result;
use crate::timeline::SyncChannelTimeline;
use crate::trace::RawTrace;
use crate::RoiId;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Trace modalities stored as `[roi, frame]` matrices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceKind {
    /// dF/F fluorescence traces.
    Dff,
    /// Demixed (neighbor-contamination-corrected) fluorescence traces.
    Demixed,
}

/// Projection image variants of the motion-corrected movie.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectionKind {
    /// Per-pixel maximum over the movie.
    Max,
    /// Per-pixel average over the movie.
    Average,
}

/// A reference projection image with its physical pixel size.
#[derive(Clone, Debug)]
pub struct ProjectionImage {
    /// Image data, `[height, width]`.
    pub data: Array2<f64>,
    /// Edge length of one pixel in micrometers.
    pub pixel_size_um: f64,
}

/// Raw per-ROI segmentation record, file-native.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoiRecord {
    pub cell_roi_id: RoiId,
    pub cell_specimen_id: Option<i64>,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    /// Cropped boolean mask rows, `height` rows of `width` values.
    pub mask: Vec<Vec<bool>>,
}

/// Raw segmentation table plus the full-frame shape it was drawn on.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentationData {
    pub fov_height: usize,
    pub fov_width: usize,
    pub rois: Vec<RoiRecord>,
}

/// Raw event-detection arrays in file-native ROI order.
#[derive(Clone, Debug)]
pub struct EventDetectionData {
    /// Detected event magnitudes, `[roi, frame]`.
    pub events: Array2<f64>,
    /// Per-ROI regularization weight.
    pub lambdas: Vec<f64>,
    /// Per-ROI noise estimate.
    pub noise_stds: Vec<f64>,
    /// Row identifiers, file-native order.
    pub roi_ids: Vec<RoiId>,
}

/// One logged behavioral event with its wall-clock time and display frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LoggedEvent {
    /// Display frame the event was logged against.
    pub frame: usize,
    /// Wall-clock time on the log's local clock, seconds.
    pub wall_time: f64,
}

/// One dispensed reward, logged against a display frame.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RewardEvent {
    pub frame: usize,
    /// Dispensed volume in milliliters.
    pub volume: f64,
    /// True when dispensed automatically rather than earned.
    pub auto_rewarded: bool,
}

/// One behavioral trial, bounded by display frames.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TrialRecord {
    pub index: u32,
    pub start_frame: usize,
    pub stop_frame: usize,
    /// Frame of the stimulus change, absent on catch trials.
    pub change_frame: Option<usize>,
}

/// The behavioral stimulus log for one session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StimulusLog {
    /// Behavior session identifier.
    pub session_uuid: String,
    /// Inter-frame display intervals, milliseconds; one fewer than the
    /// number of displayed frames.
    pub intervals_ms: Vec<f64>,
    /// Display frames on which the lick sensor fired.
    pub lick_frames: Vec<usize>,
    pub rewards: Vec<RewardEvent>,
    pub trials: Vec<TrialRecord>,
    /// Wall-clock-stamped events used to anchor the frame clock.
    pub logged_events: Vec<LoggedEvent>,
}

/// Static imaging metadata recorded at acquisition time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImagingMetadata {
    pub ophys_experiment_id: i64,
    pub experiment_container_id: Option<i64>,
    pub targeted_structure: String,
    pub imaging_depth_um: u32,
    pub session_type: String,
    pub equipment_name: String,
    pub full_genotype: String,
    pub reporter_line: String,
    pub driver_line: Vec<String>,
    pub sex: String,
    pub age: String,
}

/// One fitted ellipse time series from the eye-tracking camera.
#[derive(Clone, Debug, Default)]
pub struct EllipseSeries {
    pub center_x: Vec<f64>,
    pub center_y: Vec<f64>,
    pub width: Vec<f64>,
    pub height: Vec<f64>,
    pub phi: Vec<f64>,
}

impl EllipseSeries {
    /// Number of camera frames in the series.
    #[must_use]
    pub fn len(&self) -> usize {
        self.center_x.len()
    }

    /// True if the series is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.center_x.is_empty()
    }
}

/// Externally-fitted eye-tracking ellipses, one row per camera frame.
#[derive(Clone, Debug, Default)]
pub struct EyeTrackingData {
    pub corneal_reflection: EllipseSeries,
    pub eye: EllipseSeries,
    pub pupil: EllipseSeries,
}

impl EyeTrackingData {
    /// Number of camera frames (rows) in the recording.
    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.pupil.len()
    }
}

/// Optical-physiology capability of a raw data source.
///
/// Every accessor is a scoped acquisition: the underlying file is opened,
/// the needed arrays are extracted, and the handle is released before the
/// call returns.
pub trait OpticalDataSource {
    /// Identifier of the imaging experiment.
    fn ophys_experiment_id(&self) -> i64;

    /// Parse the synchronization recording into named channel timelines.
    fn sync_timeline(&self) -> Result<SyncChannelTimeline>;

    /// Read one trace modality in file-native row order.
    fn raw_trace(&self, kind: TraceKind) -> Result<RawTrace>;

    /// Read the event-detection outputs in file-native row order.
    fn event_detection(&self) -> Result<EventDetectionData>;

    /// Read the raw segmentation table.
    fn segmentation(&self) -> Result<SegmentationData>;

    /// Plane-multiplexing configuration of this experiment.
    fn plane_grouping(&self) -> Result<PlaneGrouping>;

    /// Read a reference projection image.
    fn projection(&self, kind: ProjectionKind) -> Result<ProjectionImage>;

    /// Static acquisition metadata.
    fn imaging_metadata(&self) -> Result<ImagingMetadata>;

    /// Read the externally-fitted eye-tracking ellipses.
    fn eye_tracking(&self) -> Result<EyeTrackingData>;
}

/// Behavioral capability of a raw data source.
pub trait BehavioralDataSource {
    /// Read the behavioral stimulus log.
    fn stimulus_log(&self) -> Result<StimulusLog>;
}
