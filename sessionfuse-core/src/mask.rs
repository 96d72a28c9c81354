//! Full-frame ROI mask reconstruction.

use crate::cell::CellTable;
use crate::error::{Error, Result};
use crate::RoiId;
use ndarray::{s, Array3};

/// Boolean ROI masks stacked with physical coordinate metadata.
#[derive(Clone, Debug)]
pub struct RoiMaskVolume {
    /// `[roi, row, column]`, true inside the ROI.
    pub masks: Array3<bool>,
    /// Row order, matching the caller-supplied identifier sequence.
    pub roi_ids: Vec<RoiId>,
    /// Physical row-center coordinates, one per frame row.
    pub row_coords: Vec<f64>,
    /// Physical column-center coordinates, one per frame column.
    pub column_coords: Vec<f64>,
    /// Pixel spacing as `(column, row)`.
    pub spacing: [f64; 2],
    /// Unit of the spacing and coordinate values.
    pub unit: String,
}

/// Reconstruct full-frame masks for the requested ROIs.
///
/// Each cropped sub-mask is placed at its bounding-box offset `(x, y)`
/// within a zero-initialized frame of the table's full-frame shape, and
/// the frames are stacked in the order the identifiers were given (which
/// need not be canonical order). When `roi_ids` is `None`, all ROIs are
/// reconstructed in canonical order.
///
/// Coordinate axes are half-pixel-centered physical positions:
/// `index * spacing + spacing / 2`.
///
/// # Errors
/// Returns [`Error::UnknownRoi`] if a requested identifier is absent from
/// the table.
pub fn assemble_roi_masks(
    table: &CellTable,
    roi_ids: Option<&[RoiId]>,
    spacing: [f64; 2],
    unit: &str,
) -> Result<RoiMaskVolume> {
    let roi_ids: Vec<RoiId> = match roi_ids {
        Some(ids) => ids.to_vec(),
        None => table.roi_ids(),
    };
    let (fov_height, fov_width) = table.fov_shape();

    let mut masks = Array3::from_elem((roi_ids.len(), fov_height, fov_width), false);
    for (index, &roi_id) in roi_ids.iter().enumerate() {
        let record = table.record(roi_id).ok_or(Error::UnknownRoi(roi_id))?;
        masks
            .slice_mut(s![
                index,
                record.y..record.y + record.height,
                record.x..record.x + record.width
            ])
            .assign(&record.mask);
    }

    let [column_spacing, row_spacing] = spacing;
    let row_coords = (0..fov_height)
        .map(|row| row as f64 * row_spacing + row_spacing / 2.0)
        .collect();
    let column_coords = (0..fov_width)
        .map(|column| column as f64 * column_spacing + column_spacing / 2.0)
        .collect();

    Ok(RoiMaskVolume {
        masks,
        roi_ids,
        row_coords,
        column_coords,
        spacing,
        unit: unit.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::CellRecord;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    fn table_with_box() -> CellTable {
        // ROI 7: all-true 5x4 mask at x=2, y=3 in a 10x10 frame.
        let record = CellRecord {
            cell_roi_id: 7,
            cell_specimen_id: Some(70),
            x: 2,
            y: 3,
            width: 4,
            height: 5,
            mask: Array2::from_elem((5, 4), true),
        };
        CellTable::new(vec![record], 10, 10).unwrap()
    }

    #[test]
    fn test_mask_placed_at_bounding_box_offset() {
        let volume = assemble_roi_masks(&table_with_box(), None, [1.0, 1.0], "mm").unwrap();
        assert_eq!(volume.masks.dim(), (1, 10, 10));
        for row in 0..10 {
            for column in 0..10 {
                let inside = (3..8).contains(&row) && (2..6).contains(&column);
                assert_eq!(
                    volume.masks[[0, row, column]],
                    inside,
                    "pixel ({row}, {column})"
                );
            }
        }
    }

    #[test]
    fn test_coordinates_are_half_pixel_centered() {
        let spacing = 0.4;
        let volume =
            assemble_roi_masks(&table_with_box(), None, [spacing, spacing], "mm").unwrap();
        assert_relative_eq!(volume.row_coords[0], spacing / 2.0);
        assert_relative_eq!(volume.column_coords[0], spacing / 2.0);
        assert_relative_eq!(volume.row_coords[3], 3.0 * spacing + spacing / 2.0);
        assert_eq!(volume.unit, "mm");
    }

    #[test]
    fn test_rows_stack_in_caller_order() {
        let a = CellRecord {
            cell_roi_id: 1,
            cell_specimen_id: None,
            x: 0,
            y: 0,
            width: 1,
            height: 1,
            mask: Array2::from_elem((1, 1), true),
        };
        let b = CellRecord {
            cell_roi_id: 2,
            cell_specimen_id: None,
            x: 4,
            y: 4,
            width: 1,
            height: 1,
            mask: Array2::from_elem((1, 1), true),
        };
        let table = CellTable::new(vec![a, b], 5, 5).unwrap();

        let volume = assemble_roi_masks(&table, Some(&[2, 1]), [1.0, 1.0], "mm").unwrap();
        assert_eq!(volume.roi_ids, vec![2, 1]);
        assert!(volume.masks[[0, 4, 4]]);
        assert!(volume.masks[[1, 0, 0]]);
    }

    #[test]
    fn test_unknown_roi_reported() {
        let err =
            assemble_roi_masks(&table_with_box(), Some(&[99]), [1.0, 1.0], "mm").unwrap_err();
        match err {
            Error::UnknownRoi(roi_id) => assert_eq!(roi_id, 99),
            other => panic!("unexpected error: {other}"),
        }
    }
}
