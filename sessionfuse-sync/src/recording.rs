//! Sync recording container and edge extraction.

use crate::error::{Error, Result};
use hdf5::types::VarLenUnicode;
use hdf5::File;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// DAQ acquisition parameters from the recording metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NiDaq {
    /// Sample-counter frequency in Hz.
    pub sample_freq: f64,
}

/// Recording metadata: one label per digital line, plus DAQ parameters.
///
/// Unused lines carry an empty label and can never be addressed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncMeta {
    pub line_labels: Vec<String>,
    pub ni_daq: NiDaq,
}

/// A parsed synchronization recording.
///
/// The on-disk container is an HDF5 file with an `[n, 2]` `data` event
/// table of `(sample_index, port_state)` pairs — one row per digital
/// transition, the 32-bit state column holding every line after the
/// transition — and a `meta` dataset with a JSON blob naming the lines
/// and the sample frequency. The file handle is released as soon as both
/// datasets are extracted.
#[derive(Debug)]
pub struct SyncRecording {
    meta: SyncMeta,
    samples: Vec<u32>,
    states: Vec<u32>,
}

impl SyncRecording {
    /// Open and fully parse a sync recording.
    ///
    /// # Errors
    /// Returns an error if the HDF5 file cannot be read, the event table
    /// is not `[n, 2]`, or the metadata blob is missing or malformed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;

        let data = file.dataset("data")?;
        let shape = data.shape();
        if shape.len() != 2 || shape[1] != 2 {
            return Err(Error::InvalidFormat(format!(
                "event table has shape {shape:?}, expected [n, 2]"
            )));
        }
        let raw = data.read_raw::<u32>()?;

        let meta_json = file.dataset("meta")?.read_scalar::<VarLenUnicode>()?;
        let meta: SyncMeta = serde_json::from_str(meta_json.as_str())
            .map_err(|e| Error::InvalidMeta(e.to_string()))?;

        let mut samples = Vec::with_capacity(shape[0]);
        let mut states = Vec::with_capacity(shape[0]);
        for row in raw.chunks_exact(2) {
            samples.push(row[0]);
            states.push(row[1]);
        }
        Self::from_parts(meta, samples, states)
    }

    /// Build a recording from an already-extracted event table.
    ///
    /// # Errors
    /// Returns an error on mismatched column lengths, a non-positive
    /// sample frequency, or a sample counter that runs backwards.
    pub fn from_parts(meta: SyncMeta, samples: Vec<u32>, states: Vec<u32>) -> Result<Self> {
        if samples.len() != states.len() {
            return Err(Error::InvalidFormat(format!(
                "{} sample indices vs {} states",
                samples.len(),
                states.len()
            )));
        }
        if meta.ni_daq.sample_freq <= 0.0 {
            return Err(Error::InvalidMeta(format!(
                "non-positive sample frequency {}",
                meta.ni_daq.sample_freq
            )));
        }
        if let Some(at) = samples.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(Error::InvalidFormat(format!(
                "sample counter runs backwards at event {}",
                at + 1
            )));
        }
        Ok(Self {
            meta,
            samples,
            states,
        })
    }

    /// Labels of all lines, in bit order.
    #[must_use]
    pub fn line_labels(&self) -> &[String] {
        &self.meta.line_labels
    }

    /// DAQ sample-counter frequency in Hz.
    #[must_use]
    pub fn sample_freq(&self) -> f64 {
        self.meta.ni_daq.sample_freq
    }

    /// True if the recording carries a line with this label.
    #[must_use]
    pub fn has_line(&self, label: &str) -> bool {
        !label.is_empty() && self.meta.line_labels.iter().any(|l| l == label)
    }

    /// Number of recorded transition events.
    #[must_use]
    pub fn num_events(&self) -> usize {
        self.samples.len()
    }

    /// Low-to-high transition times of a line, in seconds.
    ///
    /// The first table row establishes the initial port state and never
    /// produces an edge itself.
    ///
    /// # Errors
    /// Returns [`Error::UnknownLine`] if no line carries this label.
    pub fn rising_edges(&self, label: &str) -> Result<Vec<f64>> {
        self.edges(label, true)
    }

    /// High-to-low transition times of a line, in seconds.
    ///
    /// # Errors
    /// Returns [`Error::UnknownLine`] if no line carries this label.
    pub fn falling_edges(&self, label: &str) -> Result<Vec<f64>> {
        self.edges(label, false)
    }

    fn line_bit(&self, label: &str) -> Result<u32> {
        if !label.is_empty() {
            if let Some(bit) = self.meta.line_labels.iter().position(|l| l == label) {
                return Ok(bit as u32);
            }
        }
        Err(Error::UnknownLine {
            line: label.to_string(),
            labels: self.meta.line_labels.clone(),
        })
    }

    fn edges(&self, label: &str, rising: bool) -> Result<Vec<f64>> {
        let bit = self.line_bit(label)?;
        let freq = self.sample_freq();
        let mut times = Vec::new();
        let mut previous = self.states.first().map(|state| (state >> bit) & 1);
        for (index, state) in self.states.iter().enumerate().skip(1) {
            let level = (state >> bit) & 1;
            if previous == Some(if rising { 0 } else { 1 }) && level == u32::from(rising) {
                times.push(f64::from(self.samples[index]) / freq);
            }
            previous = Some(level);
        }
        Ok(times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn meta() -> SyncMeta {
        SyncMeta {
            line_labels: vec![
                "vsync_2p".to_string(),
                String::new(),
                "stim_vsync".to_string(),
            ],
            ni_daq: NiDaq {
                sample_freq: 1000.0,
            },
        }
    }

    #[test]
    fn test_rising_and_falling_edges() {
        // Bit 0 toggles at samples 10 (up), 20 (down), 30 (up).
        let recording = SyncRecording::from_parts(
            meta(),
            vec![0, 10, 20, 30],
            vec![0b000, 0b001, 0b000, 0b001],
        )
        .unwrap();

        let rising = recording.rising_edges("vsync_2p").unwrap();
        assert_eq!(rising.len(), 2);
        assert_relative_eq!(rising[0], 0.010);
        assert_relative_eq!(rising[1], 0.030);

        let falling = recording.falling_edges("vsync_2p").unwrap();
        assert_eq!(falling, vec![0.020]);
    }

    #[test]
    fn test_first_row_sets_initial_state_without_an_edge() {
        // Line already high at the first event: no rising edge recorded.
        let recording =
            SyncRecording::from_parts(meta(), vec![0, 10], vec![0b001, 0b000]).unwrap();
        assert!(recording.rising_edges("vsync_2p").unwrap().is_empty());
        assert_eq!(recording.falling_edges("vsync_2p").unwrap(), vec![0.010]);
    }

    #[test]
    fn test_lines_are_independent() {
        // Bit 2 rises at sample 5 while bit 0 stays low.
        let recording =
            SyncRecording::from_parts(meta(), vec![0, 5], vec![0b000, 0b100]).unwrap();
        assert_eq!(recording.rising_edges("stim_vsync").unwrap(), vec![0.005]);
        assert!(recording.rising_edges("vsync_2p").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_line_reports_labels() {
        let recording = SyncRecording::from_parts(meta(), vec![], vec![]).unwrap();
        let err = recording.rising_edges("lick_1").unwrap_err();
        match err {
            Error::UnknownLine { line, labels } => {
                assert_eq!(line, "lick_1");
                assert_eq!(labels.len(), 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_label_never_matches() {
        let recording = SyncRecording::from_parts(meta(), vec![], vec![]).unwrap();
        assert!(!recording.has_line(""));
        assert!(recording.rising_edges("").is_err());
    }

    #[test]
    fn test_backwards_sample_counter_rejected() {
        let err =
            SyncRecording::from_parts(meta(), vec![10, 5], vec![0, 1]).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
