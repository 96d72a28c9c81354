//! File-backed implementations of the core data-source capabilities.

use crate::channels::resolve_channels;
use crate::containers::{
    read_events_file, read_eye_tracking_file, read_projection_file, read_trace_file,
};
use crate::error::Result;
use crate::manifest::SessionManifest;
use sessionfuse_core::source::{
    BehavioralDataSource, EventDetectionData, EyeTrackingData, ImagingMetadata,
    OpticalDataSource, ProjectionImage, ProjectionKind, SegmentationData, StimulusLog,
};
use sessionfuse_core::{
    Error as CoreError, PlaneGrouping, RawTrace, Result as CoreResult, SyncChannelTimeline,
    TraceKind,
};
use sessionfuse_sync::SyncRecording;
use std::fs;
use std::path::Path;

/// Split a manifest into its optical and behavioral capabilities.
#[must_use]
pub fn open_session(manifest: SessionManifest) -> (FileOpticalSource, FileBehaviorSource) {
    let behavior = FileBehaviorSource {
        stimulus_log_file: manifest.stimulus_log_file.clone(),
    };
    (FileOpticalSource { manifest }, behavior)
}

/// Optical-physiology capability backed by pre-extracted session files.
pub struct FileOpticalSource {
    manifest: SessionManifest,
}

impl FileOpticalSource {
    fn read_segmentation(&self) -> Result<SegmentationData> {
        let text = fs::read_to_string(&self.manifest.segmentation_file)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl OpticalDataSource for FileOpticalSource {
    fn ophys_experiment_id(&self) -> i64 {
        self.manifest.imaging_metadata.ophys_experiment_id
    }

    fn sync_timeline(&self) -> CoreResult<SyncChannelTimeline> {
        let recording =
            SyncRecording::open(&self.manifest.sync_file).map_err(crate::Error::from)?;
        Ok(resolve_channels(&recording)?)
    }

    fn raw_trace(&self, kind: TraceKind) -> CoreResult<RawTrace> {
        let path = match kind {
            TraceKind::Dff => &self.manifest.dff_file,
            TraceKind::Demixed => &self.manifest.demix_file,
        };
        Ok(read_trace_file(path)?)
    }

    fn event_detection(&self) -> CoreResult<EventDetectionData> {
        Ok(read_events_file(&self.manifest.events_file)?)
    }

    fn segmentation(&self) -> CoreResult<SegmentationData> {
        Ok(self.read_segmentation()?)
    }

    fn plane_grouping(&self) -> CoreResult<PlaneGrouping> {
        Ok(self.manifest.plane_grouping)
    }

    fn projection(&self, kind: ProjectionKind) -> CoreResult<ProjectionImage> {
        let path = match kind {
            ProjectionKind::Max => &self.manifest.max_projection_file,
            ProjectionKind::Average => &self.manifest.average_projection_file,
        };
        Ok(read_projection_file(path)?)
    }

    fn imaging_metadata(&self) -> CoreResult<ImagingMetadata> {
        Ok(self.manifest.imaging_metadata.clone())
    }

    fn eye_tracking(&self) -> CoreResult<EyeTrackingData> {
        let Some(path) = &self.manifest.eye_tracking_file else {
            return Err(CoreError::DataSource(
                "session has no eye-tracking file".to_string(),
            ));
        };
        Ok(read_eye_tracking_file(path)?)
    }
}

/// Behavioral capability backed by a pre-extracted stimulus log.
pub struct FileBehaviorSource {
    stimulus_log_file: std::path::PathBuf,
}

impl FileBehaviorSource {
    /// Open a stimulus log directly, outside a manifest.
    pub fn new<P: AsRef<Path>>(stimulus_log_file: P) -> Self {
        Self {
            stimulus_log_file: stimulus_log_file.as_ref().to_path_buf(),
        }
    }
}

impl BehavioralDataSource for FileBehaviorSource {
    fn stimulus_log(&self) -> CoreResult<StimulusLog> {
        let read = || -> Result<StimulusLog> {
            let text = fs::read_to_string(&self.stimulus_log_file)?;
            Ok(serde_json::from_str(&text)?)
        };
        Ok(read()?)
    }
}
