//! Error types for sessionfuse-core.

use crate::RoiId;
use thiserror::Error;

/// Result type alias for session fusion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal data-consistency errors raised while deriving session artifacts.
#[derive(Error, Debug)]
pub enum Error {
    /// A required synchronization channel is absent from the recording.
    #[error("sync channel '{channel}' not found (available: {available:?})")]
    MissingChannel {
        channel: String,
        available: Vec<String>,
    },

    /// Frame counts disagree after the applicable resampling/truncation
    /// policy.
    #[error(
        "{context}: trace has {trace_frames} frames but {timestamp_count} timestamps are available"
    )]
    AlignmentMismatch {
        context: String,
        trace_frames: usize,
        timestamp_count: usize,
    },

    /// Local and sync-domain stimulus clocks have different event counts.
    #[error(
        "cannot build rebase function: {local_len} local frame times vs {sync_len} sync frame times"
    )]
    RebaseConstruction { local_len: usize, sync_len: usize },

    /// ROI identifier sets disagree between a trace file and the
    /// segmentation table.
    #[error(
        "ROI identity mismatch in {context}: ids {missing_from_table:?} are absent from the \
         segmentation table, ids {missing_from_trace:?} are absent from the trace"
    )]
    IdentityMismatch {
        context: String,
        missing_from_table: Vec<RoiId>,
        missing_from_trace: Vec<RoiId>,
    },

    /// A caller requested an ROI identifier absent from the segmentation
    /// table.
    #[error("unknown ROI id: {0}")]
    UnknownRoi(RoiId),

    /// A timestamp sequence violated its strict-ordering invariant.
    #[error("timestamps of '{sequence}' are not strictly increasing at index {index}")]
    NonMonotonic { sequence: String, index: usize },

    /// A raw trace violated its own shape invariants.
    #[error("invalid trace: {0}")]
    InvalidTrace(String),

    /// A segmentation table violated its own invariants.
    #[error("invalid segmentation table: {0}")]
    InvalidSegmentation(String),

    /// The stimulus log referenced data it does not contain.
    #[error("invalid stimulus log: {0}")]
    InvalidStimulusLog(String),

    /// The underlying data source failed to produce a raw record.
    #[error("data source error: {0}")]
    DataSource(String),
}
