//! The canonical ROI segmentation table.

use crate::error::{Error, Result};
use crate::source::SegmentationData;
use crate::RoiId;
use ndarray::Array2;
use std::collections::BTreeMap;

/// One row of the canonical segmentation table.
#[derive(Clone, Debug)]
pub struct CellRecord {
    /// Stable identifier assigned at segmentation time.
    pub cell_roi_id: RoiId,
    /// Tracked-specimen identifier, once matched across sessions.
    pub cell_specimen_id: Option<i64>,
    /// Bounding-box left edge, full-frame column index.
    pub x: usize,
    /// Bounding-box top edge, full-frame row index.
    pub y: usize,
    /// Bounding-box width in pixels.
    pub width: usize,
    /// Bounding-box height in pixels.
    pub height: usize,
    /// Cropped boolean mask, `[height, width]`.
    pub mask: Array2<bool>,
}

/// Segmentation table in canonical ascending `cell_roi_id` order.
#[derive(Clone, Debug)]
pub struct CellTable {
    records: Vec<CellRecord>,
    by_roi_id: BTreeMap<RoiId, usize>,
    fov_height: usize,
    fov_width: usize,
}

impl CellTable {
    /// Build the canonical table from per-ROI records and the full-frame
    /// shape. Records are sorted by ascending `cell_roi_id`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSegmentation`] on duplicate `cell_roi_id`,
    /// duplicate assigned `cell_specimen_id`, a mask whose shape disagrees
    /// with its bounding box, or a bounding box outside the full frame.
    pub fn new(
        mut records: Vec<CellRecord>,
        fov_height: usize,
        fov_width: usize,
    ) -> Result<Self> {
        records.sort_by_key(|r| r.cell_roi_id);

        let mut by_roi_id = BTreeMap::new();
        let mut specimen_ids = BTreeMap::new();
        for (row, record) in records.iter().enumerate() {
            if by_roi_id.insert(record.cell_roi_id, row).is_some() {
                return Err(Error::InvalidSegmentation(format!(
                    "duplicate cell_roi_id {}",
                    record.cell_roi_id
                )));
            }
            if let Some(specimen) = record.cell_specimen_id {
                if let Some(other) = specimen_ids.insert(specimen, record.cell_roi_id) {
                    return Err(Error::InvalidSegmentation(format!(
                        "cell_specimen_id {specimen} assigned to both ROI {other} and ROI {}",
                        record.cell_roi_id
                    )));
                }
            }
            if record.mask.dim() != (record.height, record.width) {
                return Err(Error::InvalidSegmentation(format!(
                    "ROI {}: mask shape {:?} does not match bounding box {}x{}",
                    record.cell_roi_id,
                    record.mask.dim(),
                    record.height,
                    record.width
                )));
            }
            if record.x + record.width > fov_width || record.y + record.height > fov_height {
                return Err(Error::InvalidSegmentation(format!(
                    "ROI {}: bounding box exceeds the {fov_height}x{fov_width} frame",
                    record.cell_roi_id
                )));
            }
        }

        Ok(Self {
            records,
            by_roi_id,
            fov_height,
            fov_width,
        })
    }

    /// Build the canonical table from a raw segmentation record.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSegmentation`] on a ragged mask or any
    /// violation listed for [`CellTable::new`].
    pub fn from_segmentation(raw: &SegmentationData) -> Result<Self> {
        let mut records = Vec::with_capacity(raw.rois.len());
        for roi in &raw.rois {
            let mask = mask_from_rows(roi.cell_roi_id, &roi.mask)?;
            records.push(CellRecord {
                cell_roi_id: roi.cell_roi_id,
                cell_specimen_id: roi.cell_specimen_id,
                x: roi.x,
                y: roi.y,
                width: roi.width,
                height: roi.height,
                mask,
            });
        }
        Self::new(records, raw.fov_height, raw.fov_width)
    }

    /// Records in canonical order.
    #[must_use]
    pub fn records(&self) -> &[CellRecord] {
        &self.records
    }

    /// Look up a record by `cell_roi_id`.
    #[must_use]
    pub fn record(&self, roi_id: RoiId) -> Option<&CellRecord> {
        self.by_roi_id.get(&roi_id).map(|&row| &self.records[row])
    }

    /// Canonical `cell_roi_id` order.
    #[must_use]
    pub fn roi_ids(&self) -> Vec<RoiId> {
        self.records.iter().map(|r| r.cell_roi_id).collect()
    }

    /// `cell_specimen_id` values in canonical order.
    #[must_use]
    pub fn specimen_ids(&self) -> Vec<Option<i64>> {
        self.records.iter().map(|r| r.cell_specimen_id).collect()
    }

    /// Full-frame shape as `(height, width)`.
    #[must_use]
    pub fn fov_shape(&self) -> (usize, usize) {
        (self.fov_height, self.fov_width)
    }

    /// Number of ROIs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if the table holds no ROIs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn mask_from_rows(roi_id: RoiId, rows: &[Vec<bool>]) -> Result<Array2<bool>> {
    let height = rows.len();
    let width = rows.first().map_or(0, Vec::len);
    let mut mask = Array2::from_elem((height, width), false);
    for (r, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(Error::InvalidSegmentation(format!(
                "ROI {roi_id}: ragged mask row {r}"
            )));
        }
        for (c, &value) in row.iter().enumerate() {
            mask[[r, c]] = value;
        }
    }
    Ok(mask)
}
