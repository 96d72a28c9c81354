//! Trace matrices and their ROI row identifiers.

use crate::error::{Error, Result};
use crate::RoiId;
use ndarray::Array2;
use std::collections::BTreeSet;

/// A trace matrix in file-native row order, one row per ROI.
///
/// The identifier sequence length always equals the row count and contains
/// no duplicates; both are enforced at construction.
#[derive(Clone, Debug)]
pub struct RawTrace {
    data: Array2<f64>,
    roi_ids: Vec<RoiId>,
}

impl RawTrace {
    /// Create from a `[rows, timepoints]` matrix and its row identifiers.
    ///
    /// # Errors
    /// Returns [`Error::InvalidTrace`] if the identifier count does not
    /// match the row count or an identifier appears twice.
    pub fn new(data: Array2<f64>, roi_ids: Vec<RoiId>) -> Result<Self> {
        if data.nrows() != roi_ids.len() {
            return Err(Error::InvalidTrace(format!(
                "{} rows but {} ROI ids",
                data.nrows(),
                roi_ids.len()
            )));
        }
        let mut seen = BTreeSet::new();
        for id in &roi_ids {
            if !seen.insert(*id) {
                return Err(Error::InvalidTrace(format!("duplicate ROI id {id}")));
            }
        }
        Ok(Self { data, roi_ids })
    }

    /// Number of ROI rows.
    #[must_use]
    pub fn num_rois(&self) -> usize {
        self.data.nrows()
    }

    /// Number of timepoints per row.
    #[must_use]
    pub fn num_frames(&self) -> usize {
        self.data.ncols()
    }

    /// Row identifiers in file-native order.
    #[must_use]
    pub fn roi_ids(&self) -> &[RoiId] {
        &self.roi_ids
    }

    /// The trace matrix.
    #[must_use]
    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }
}

/// Traces permuted into canonical segmentation order and joined to
/// `cell_specimen_id`.
///
/// Row `i` of `data` always refers to `roi_ids[i]` / `specimen_ids[i]`,
/// and the same row index refers to the same ROI across every aligned
/// trace modality of a session.
#[derive(Clone, Debug)]
pub struct AlignedTraces {
    /// Canonical `cell_roi_id` order.
    pub roi_ids: Vec<RoiId>,
    /// Matching `cell_specimen_id` values; `None` where unassigned.
    pub specimen_ids: Vec<Option<i64>>,
    /// `[rows, timepoints]` matrix in canonical row order.
    pub data: Array2<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_row_count_must_match_id_count() {
        let data = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        assert!(RawTrace::new(data, vec![10]).is_err());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let data = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        let err = RawTrace::new(data, vec![10, 10]).unwrap_err();
        assert!(err.to_string().contains("duplicate ROI id 10"));
    }

    #[test]
    fn test_shape_accessors() {
        let data = arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        let trace = RawTrace::new(data, vec![10, 20]).unwrap();
        assert_eq!(trace.num_rois(), 2);
        assert_eq!(trace.num_frames(), 3);
        assert_eq!(trace.roi_ids(), &[10, 20]);
    }
}
