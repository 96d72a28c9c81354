//! sessionfuse-sync: Synchronization recording parser.
//!
//! A sync recording is the multi-channel hardware log of pulse timings
//! that provides a session's master clock: a DAQ samples up to 32 digital
//! lines and writes one event row per transition. This crate owns that
//! container format and turns it into per-line edge-time sequences.
//!
//! # Key Components
//!
//! - [`SyncRecording`] - Event-table parser with per-line edge extraction
//! - [`SyncMeta`] - Line labels and DAQ parameters from the metadata blob

mod error;
mod recording;

pub use error::{Error, Result};
pub use recording::{NiDaq, SyncMeta, SyncRecording};
