//! sessionfuse-core: Data model and alignment engine for session fusion.
//!
//! This crate reconciles one experiment session's independently-acquired
//! recording streams into a time-aligned, identity-consistent dataset:
//! deriving the per-frame imaging timestamp axis, rebasing the stimulus
//! log's local clock onto the synchronization clock, enforcing ROI
//! identity between trace files and the segmentation table, and
//! reconstructing full-frame ROI masks.

pub mod align;
pub mod cell;
pub mod error;
pub mod events;
pub mod mask;
pub mod rebase;
pub mod reconcile;
pub mod session;
pub mod source;
pub mod timeline;
pub mod trace;

pub use align::{align_frame_timestamps, resample_plane_timestamps, PlaneGrouping};
pub use cell::{CellRecord, CellTable};
pub use error::{Error, Result};
pub use events::{filter_events_matrix, EventDetection};
pub use mask::{assemble_roi_masks, RoiMaskVolume};
pub use rebase::{local_frame_clock, RebaseFunction};
pub use reconcile::{canonical_order, reconcile_trace};
pub use session::{
    AlignedEyeTracking, AlignedReward, AlignedTrial, SessionFusion, SessionMetadata,
};
pub use source::{BehavioralDataSource, OpticalDataSource, ProjectionKind, TraceKind};
pub use timeline::{channel, frame_rate_hz, SyncChannelTimeline};
pub use trace::{AlignedTraces, RawTrace};

/// Stable ROI identifier assigned at segmentation time.
///
/// Identifiers arrive from files in assorted integer widths; every input
/// path normalizes them to `i64` before identity comparison.
pub type RoiId = i64;
