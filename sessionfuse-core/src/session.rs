//! The session fusion facade.
//!
//! `SessionFusion` composes the alignment engine over one optical and one
//! behavioral data source and memoizes every derived artifact: each query
//! computes at most once per session object, and a failed derivation
//! stores nothing, so a later call retries from the raw sources.

use crate::align::align_frame_timestamps;
use crate::cell::CellTable;
use crate::error::{Error, Result};
use crate::events::{
    filter_events_matrix, EventDetection, DEFAULT_FILTER_SCALE, DEFAULT_FILTER_TAPS,
};
use crate::mask::{assemble_roi_masks, RoiMaskVolume};
use crate::rebase::{frame_clock_offset, local_frame_clock, RebaseFunction};
use crate::reconcile::{canonical_order, reorder_rows, reorder_values};
use crate::source::{
    BehavioralDataSource, EyeTrackingData, OpticalDataSource, ProjectionImage, ProjectionKind,
    StimulusLog, TraceKind,
};
use crate::timeline::{channel, frame_rate_hz, SyncChannelTimeline};
use crate::trace::{AlignedTraces, RawTrace};
use crate::RoiId;
use log::info;
use serde::Serialize;
use std::sync::Arc;

/// Physical unit of mask-volume coordinates.
const MASK_UNIT: &str = "mm";
/// Excitation wavelength of the imaging laser, nanometers.
const EXCITATION_LAMBDA_NM: f64 = 910.0;
/// Peak emission wavelength of the indicator, nanometers.
const EMISSION_LAMBDA_NM: f64 = 520.0;
/// Calcium indicator expressed in the imaged population.
const INDICATOR: &str = "GCaMP6f";

/// Unified metadata record for one fused session.
#[derive(Clone, Debug, Serialize)]
pub struct SessionMetadata {
    pub ophys_experiment_id: i64,
    pub experiment_container_id: Option<i64>,
    pub behavior_session_uuid: String,
    pub ophys_frame_rate_hz: Option<f64>,
    pub stimulus_frame_rate_hz: Option<f64>,
    pub targeted_structure: String,
    pub imaging_depth_um: u32,
    pub session_type: String,
    pub equipment_name: String,
    pub full_genotype: String,
    pub reporter_line: String,
    pub driver_line: Vec<String>,
    pub sex: String,
    pub age: String,
    pub plane_group: Option<u32>,
    pub excitation_lambda_nm: f64,
    pub emission_lambda_nm: f64,
    pub indicator: String,
    pub field_of_view_height: usize,
    pub field_of_view_width: usize,
}

/// One reward expressed on the synchronization clock.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct AlignedReward {
    pub time: f64,
    pub volume: f64,
    pub auto_rewarded: bool,
}

/// One trial with its boundaries on the synchronization clock.
#[derive(Clone, Debug, Serialize)]
pub struct AlignedTrial {
    pub index: u32,
    pub start_time: f64,
    pub stop_time: f64,
    pub change_time: Option<f64>,
    /// Lick times falling inside `[start_time, stop_time)`.
    pub lick_times: Vec<f64>,
    /// Reward times falling inside `[start_time, stop_time)`.
    pub reward_times: Vec<f64>,
}

/// Eye-tracking ellipses joined to camera frame times.
#[derive(Clone, Debug)]
pub struct AlignedEyeTracking {
    /// Camera strobe times on the synchronization clock, one per row.
    pub frame_times: Vec<f64>,
    pub data: EyeTrackingData,
}

/// Memoizing fusion facade over one session's raw data sources.
pub struct SessionFusion<O, B> {
    optical: O,
    behavior: B,
    sync: Option<Arc<SyncChannelTimeline>>,
    raw_dff: Option<Arc<RawTrace>>,
    cell_table: Option<Arc<CellTable>>,
    ophys_timestamps: Option<Arc<Vec<f64>>>,
    stimulus_timestamps: Option<Arc<Vec<f64>>>,
    stimulus_log: Option<Arc<StimulusLog>>,
    frame_clock: Option<Arc<Vec<f64>>>,
    rebase: Option<Arc<RebaseFunction>>,
    dff_traces: Option<Arc<AlignedTraces>>,
    demixed_traces: Option<Arc<AlignedTraces>>,
    events: Option<Arc<EventDetection>>,
    max_projection: Option<Arc<ProjectionImage>>,
    metadata: Option<Arc<SessionMetadata>>,
    licks: Option<Arc<Vec<f64>>>,
    rewards: Option<Arc<Vec<AlignedReward>>>,
    trials: Option<Arc<Vec<AlignedTrial>>>,
    eye_tracking: Option<Arc<AlignedEyeTracking>>,
}

impl<O: OpticalDataSource, B: BehavioralDataSource> SessionFusion<O, B> {
    /// Create a facade over the given capability sources. Nothing is read
    /// until the first query.
    pub fn new(optical: O, behavior: B) -> Self {
        Self {
            optical,
            behavior,
            sync: None,
            raw_dff: None,
            cell_table: None,
            ophys_timestamps: None,
            stimulus_timestamps: None,
            stimulus_log: None,
            frame_clock: None,
            rebase: None,
            dff_traces: None,
            demixed_traces: None,
            events: None,
            max_projection: None,
            metadata: None,
            licks: None,
            rewards: None,
            trials: None,
            eye_tracking: None,
        }
    }

    /// Identifier of the imaging experiment.
    pub fn ophys_experiment_id(&self) -> i64 {
        self.optical.ophys_experiment_id()
    }

    /// Resolved synchronization channel timelines.
    pub fn sync_timeline(&mut self) -> Result<Arc<SyncChannelTimeline>> {
        if let Some(cached) = &self.sync {
            return Ok(Arc::clone(cached));
        }
        let timeline = Arc::new(self.optical.sync_timeline()?);
        info!(
            "session {}: resolved {} sync channels",
            self.ophys_experiment_id(),
            timeline.len()
        );
        self.sync = Some(Arc::clone(&timeline));
        Ok(timeline)
    }

    fn raw_dff(&mut self) -> Result<Arc<RawTrace>> {
        if let Some(cached) = &self.raw_dff {
            return Ok(Arc::clone(cached));
        }
        let trace = Arc::new(self.optical.raw_trace(TraceKind::Dff)?);
        self.raw_dff = Some(Arc::clone(&trace));
        Ok(trace)
    }

    /// The canonical segmentation table.
    pub fn cell_table(&mut self) -> Result<Arc<CellTable>> {
        if let Some(cached) = &self.cell_table {
            return Ok(Arc::clone(cached));
        }
        let raw = self.optical.segmentation()?;
        let table = Arc::new(CellTable::from_segmentation(&raw)?);
        self.cell_table = Some(Arc::clone(&table));
        Ok(table)
    }

    /// Per-frame imaging timestamps, one per trace frame.
    pub fn ophys_timestamps(&mut self) -> Result<Arc<Vec<f64>>> {
        if let Some(cached) = &self.ophys_timestamps {
            return Ok(Arc::clone(cached));
        }
        let sync = self.sync_timeline()?;
        let trace = self.raw_dff()?;
        let grouping = self.optical.plane_grouping()?;
        let pulses = sync.require(channel::OPHYS_FRAMES)?;
        let aligned = align_frame_timestamps(pulses, trace.num_frames(), grouping)?;
        let aligned = Arc::new(aligned);
        self.ophys_timestamps = Some(Arc::clone(&aligned));
        Ok(aligned)
    }

    /// Stimulus frame timestamps, monitor-delay corrected.
    pub fn stimulus_timestamps(&mut self) -> Result<Arc<Vec<f64>>> {
        if let Some(cached) = &self.stimulus_timestamps {
            return Ok(Arc::clone(cached));
        }
        let sync = self.sync_timeline()?;
        let timestamps = Arc::new(sync.require(channel::STIMULUS_FRAMES)?.to_vec());
        self.stimulus_timestamps = Some(Arc::clone(&timestamps));
        Ok(timestamps)
    }

    /// The behavioral stimulus log.
    pub fn stimulus_log(&mut self) -> Result<Arc<StimulusLog>> {
        if let Some(cached) = &self.stimulus_log {
            return Ok(Arc::clone(cached));
        }
        let log = Arc::new(self.behavior.stimulus_log()?);
        self.stimulus_log = Some(Arc::clone(&log));
        Ok(log)
    }

    /// The stimulus log's frame clock, anchored by the session offset.
    fn local_frame_clock(&mut self) -> Result<Arc<Vec<f64>>> {
        if let Some(cached) = &self.frame_clock {
            return Ok(Arc::clone(cached));
        }
        let log = self.stimulus_log()?;
        let raw_clock = local_frame_clock(&log.intervals_ms, 0.0);
        let offset = frame_clock_offset(&log.logged_events, &raw_clock);
        let clock: Vec<f64> = raw_clock.iter().map(|t| t + offset).collect();
        let clock = Arc::new(clock);
        self.frame_clock = Some(Arc::clone(&clock));
        Ok(clock)
    }

    /// The local-to-sync clock rebase function.
    ///
    /// Fitted against the stimulus channel *without* monitor-delay
    /// correction: the log records when frames were handed to the display,
    /// not when the monitor lit.
    pub fn rebase_function(&mut self) -> Result<Arc<RebaseFunction>> {
        if let Some(cached) = &self.rebase {
            return Ok(Arc::clone(cached));
        }
        let sync = self.sync_timeline()?;
        let clock = self.local_frame_clock()?;
        let sync_times = sync.require(channel::STIMULUS_FRAMES_NO_DELAY)?;
        let rebase = Arc::new(RebaseFunction::new(
            clock.as_ref().clone(),
            sync_times.to_vec(),
        )?);
        self.rebase = Some(Arc::clone(&rebase));
        Ok(rebase)
    }

    fn aligned_trace(&mut self, kind: TraceKind, context: &str) -> Result<Arc<AlignedTraces>> {
        let table = self.cell_table()?;
        let timestamps = self.ophys_timestamps()?;
        let trace = match kind {
            TraceKind::Dff => self.raw_dff()?,
            TraceKind::Demixed => Arc::new(self.optical.raw_trace(kind)?),
        };
        if trace.num_frames() != timestamps.len() {
            return Err(Error::AlignmentMismatch {
                context: context.to_string(),
                trace_frames: trace.num_frames(),
                timestamp_count: timestamps.len(),
            });
        }
        let roi_ids = table.roi_ids();
        let order = canonical_order(&roi_ids, trace.roi_ids(), context)?;
        let data = reorder_rows(trace.data(), &order);
        info!(
            "session {}: reconciled {context} ({} ROIs, {} frames)",
            self.ophys_experiment_id(),
            roi_ids.len(),
            trace.num_frames()
        );
        Ok(Arc::new(AlignedTraces {
            roi_ids,
            specimen_ids: table.specimen_ids(),
            data,
        }))
    }

    /// dF/F traces in canonical ROI order.
    pub fn dff_traces(&mut self) -> Result<Arc<AlignedTraces>> {
        if let Some(cached) = &self.dff_traces {
            return Ok(Arc::clone(cached));
        }
        let traces = self.aligned_trace(TraceKind::Dff, "dff traces")?;
        self.dff_traces = Some(Arc::clone(&traces));
        Ok(traces)
    }

    /// Demixed fluorescence traces in canonical ROI order.
    pub fn demixed_traces(&mut self) -> Result<Arc<AlignedTraces>> {
        if let Some(cached) = &self.demixed_traces {
            return Ok(Arc::clone(cached));
        }
        let traces = self.aligned_trace(TraceKind::Demixed, "demixed traces")?;
        self.demixed_traces = Some(Arc::clone(&traces));
        Ok(traces)
    }

    /// Event-detection outputs in canonical ROI order, with the causally
    /// smoothed variant attached.
    pub fn events(&mut self) -> Result<Arc<EventDetection>> {
        if let Some(cached) = &self.events {
            return Ok(Arc::clone(cached));
        }
        let table = self.cell_table()?;
        let raw = self.optical.event_detection()?;
        let roi_ids = table.roi_ids();
        let order = canonical_order(&roi_ids, &raw.roi_ids, "event detection")?;
        let events = reorder_rows(&raw.events, &order);
        let filtered_events =
            filter_events_matrix(&events, DEFAULT_FILTER_SCALE, DEFAULT_FILTER_TAPS);
        let detection = Arc::new(EventDetection {
            events,
            filtered_events,
            lambdas: reorder_values(&raw.lambdas, &order),
            noise_stds: reorder_values(&raw.noise_stds, &order),
            roi_ids,
            specimen_ids: table.specimen_ids(),
        });
        self.events = Some(Arc::clone(&detection));
        Ok(detection)
    }

    fn max_projection(&mut self) -> Result<Arc<ProjectionImage>> {
        if let Some(cached) = &self.max_projection {
            return Ok(Arc::clone(cached));
        }
        let image = Arc::new(self.optical.projection(ProjectionKind::Max)?);
        self.max_projection = Some(Arc::clone(&image));
        Ok(image)
    }

    /// Reconstruct full-frame ROI masks for the requested identifiers
    /// (all ROIs in canonical order when `None`).
    ///
    /// Not memoized: the result depends on the requested subset, and an
    /// unknown identifier fails only this query without touching any
    /// cached artifact.
    pub fn roi_masks(&mut self, roi_ids: Option<&[RoiId]>) -> Result<RoiMaskVolume> {
        let table = self.cell_table()?;
        let projection = self.max_projection()?;
        let spacing_mm = projection.pixel_size_um / 1000.0;
        assemble_roi_masks(&table, roi_ids, [spacing_mm, spacing_mm], MASK_UNIT)
    }

    /// The unified session metadata record.
    pub fn metadata(&mut self) -> Result<Arc<SessionMetadata>> {
        if let Some(cached) = &self.metadata {
            return Ok(Arc::clone(cached));
        }
        let imaging = self.optical.imaging_metadata()?;
        let grouping = self.optical.plane_grouping()?;
        let log = self.stimulus_log()?;
        let table = self.cell_table()?;
        let ophys_rate = frame_rate_hz(&self.ophys_timestamps()?);
        let stimulus_rate = frame_rate_hz(&self.stimulus_timestamps()?);
        let (fov_height, fov_width) = table.fov_shape();
        let metadata = Arc::new(SessionMetadata {
            ophys_experiment_id: imaging.ophys_experiment_id,
            experiment_container_id: imaging.experiment_container_id,
            behavior_session_uuid: log.session_uuid.clone(),
            ophys_frame_rate_hz: ophys_rate,
            stimulus_frame_rate_hz: stimulus_rate,
            targeted_structure: imaging.targeted_structure,
            imaging_depth_um: imaging.imaging_depth_um,
            session_type: imaging.session_type,
            equipment_name: imaging.equipment_name,
            full_genotype: imaging.full_genotype,
            reporter_line: imaging.reporter_line,
            driver_line: imaging.driver_line,
            sex: imaging.sex,
            age: imaging.age,
            plane_group: grouping.plane_group,
            excitation_lambda_nm: EXCITATION_LAMBDA_NM,
            emission_lambda_nm: EMISSION_LAMBDA_NM,
            indicator: INDICATOR.to_string(),
            field_of_view_height: fov_height,
            field_of_view_width: fov_width,
        });
        self.metadata = Some(Arc::clone(&metadata));
        Ok(metadata)
    }

    fn frame_time(clock: &[f64], frame: usize, what: &str) -> Result<f64> {
        clock.get(frame).copied().ok_or_else(|| {
            Error::InvalidStimulusLog(format!(
                "{what} references frame {frame} beyond the {}-frame clock",
                clock.len()
            ))
        })
    }

    /// Lick times from the stimulus log, on the synchronization clock.
    pub fn licks(&mut self) -> Result<Arc<Vec<f64>>> {
        if let Some(cached) = &self.licks {
            return Ok(Arc::clone(cached));
        }
        let log = self.stimulus_log()?;
        let clock = self.local_frame_clock()?;
        let rebase = self.rebase_function()?;
        let mut times = Vec::with_capacity(log.lick_frames.len());
        for &frame in &log.lick_frames {
            let local = Self::frame_time(&clock, frame, "lick event")?;
            times.push(rebase.rebase(local));
        }
        let times = Arc::new(times);
        self.licks = Some(Arc::clone(&times));
        Ok(times)
    }

    /// Lick-sensor pulse times recorded directly on the sync clock.
    pub fn sync_lick_times(&mut self) -> Result<Vec<f64>> {
        let sync = self.sync_timeline()?;
        Ok(sync.require(channel::LICK_SENSOR)?.to_vec())
    }

    /// Rewards on the synchronization clock.
    pub fn rewards(&mut self) -> Result<Arc<Vec<AlignedReward>>> {
        if let Some(cached) = &self.rewards {
            return Ok(Arc::clone(cached));
        }
        let log = self.stimulus_log()?;
        let clock = self.local_frame_clock()?;
        let rebase = self.rebase_function()?;
        let mut rewards = Vec::with_capacity(log.rewards.len());
        for reward in &log.rewards {
            let local = Self::frame_time(&clock, reward.frame, "reward event")?;
            rewards.push(AlignedReward {
                time: rebase.rebase(local),
                volume: reward.volume,
                auto_rewarded: reward.auto_rewarded,
            });
        }
        let rewards = Arc::new(rewards);
        self.rewards = Some(Arc::clone(&rewards));
        Ok(rewards)
    }

    /// Trials on the synchronization clock, with licks and rewards
    /// attributed to the trial window they fall in.
    pub fn trials(&mut self) -> Result<Arc<Vec<AlignedTrial>>> {
        if let Some(cached) = &self.trials {
            return Ok(Arc::clone(cached));
        }
        let log = self.stimulus_log()?;
        let clock = self.local_frame_clock()?;
        let rebase = self.rebase_function()?;
        let licks = self.licks()?;
        let rewards = self.rewards()?;

        let mut trials = Vec::with_capacity(log.trials.len());
        for trial in &log.trials {
            let start_time =
                rebase.rebase(Self::frame_time(&clock, trial.start_frame, "trial start")?);
            let stop_time =
                rebase.rebase(Self::frame_time(&clock, trial.stop_frame, "trial stop")?);
            let change_time = match trial.change_frame {
                Some(frame) => Some(
                    rebase.rebase(Self::frame_time(&clock, frame, "stimulus change")?),
                ),
                None => None,
            };
            let in_window = |t: f64| t >= start_time && t < stop_time;
            trials.push(AlignedTrial {
                index: trial.index,
                start_time,
                stop_time,
                change_time,
                lick_times: licks.iter().copied().filter(|&t| in_window(t)).collect(),
                reward_times: rewards
                    .iter()
                    .filter(|r| in_window(r.time))
                    .map(|r| r.time)
                    .collect(),
            });
        }
        let trials = Arc::new(trials);
        self.trials = Some(Arc::clone(&trials));
        Ok(trials)
    }

    /// Eye-tracking ellipses joined to camera strobe times.
    pub fn eye_tracking(&mut self) -> Result<Arc<AlignedEyeTracking>> {
        if let Some(cached) = &self.eye_tracking {
            return Ok(Arc::clone(cached));
        }
        let sync = self.sync_timeline()?;
        let data = self.optical.eye_tracking()?;
        let frame_times = sync.require(channel::EYE_CAMERA_FRAMES)?;
        if frame_times.len() != data.num_frames() {
            return Err(Error::AlignmentMismatch {
                context: "eye tracking frames".to_string(),
                trace_frames: data.num_frames(),
                timestamp_count: frame_times.len(),
            });
        }
        let aligned = Arc::new(AlignedEyeTracking {
            frame_times: frame_times.to_vec(),
            data,
        });
        self.eye_tracking = Some(Arc::clone(&aligned));
        Ok(aligned)
    }
}
