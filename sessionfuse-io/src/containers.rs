//! HDF5 container readers for trace, event, projection, and eye-tracking
//! files.
//!
//! Every reader is a scoped acquisition: the file is opened, the needed
//! arrays are extracted, and the handle drops before the function
//! returns.

use crate::error::{Error, Result};
use hdf5::{File, Group};
use ndarray::Array2;
use sessionfuse_core::source::{
    EllipseSeries, EventDetectionData, EyeTrackingData, ProjectionImage,
};
use sessionfuse_core::{RawTrace, RoiId};
use std::path::Path;

/// Read a `[rois, frames]` trace file (`data` matrix plus `roi_names`).
///
/// # Errors
/// Returns an error if the file cannot be read, the matrix is not
/// two-dimensional, or the identifiers violate the trace invariants.
pub fn read_trace_file<P: AsRef<Path>>(path: P) -> Result<RawTrace> {
    let file = File::open(path)?;
    let data = read_matrix(&file, "data")?;
    let roi_ids = read_roi_ids(&file, "roi_names")?;
    Ok(RawTrace::new(data, roi_ids)?)
}

/// Read an event-detection file (`events`, `lambdas`, `noise_stds`,
/// `roi_names`).
///
/// # Errors
/// Returns an error if the file cannot be read or the per-ROI arrays do
/// not all cover the same number of rows.
pub fn read_events_file<P: AsRef<Path>>(path: P) -> Result<EventDetectionData> {
    let file = File::open(path)?;
    let events = read_matrix(&file, "events")?;
    let lambdas = read_vec(&file, "lambdas")?;
    let noise_stds = read_vec(&file, "noise_stds")?;
    let roi_ids = read_roi_ids(&file, "roi_names")?;

    let rows = events.nrows();
    if lambdas.len() != rows || noise_stds.len() != rows || roi_ids.len() != rows {
        return Err(Error::InvalidFormat(format!(
            "event file rows disagree: {rows} events, {} lambdas, {} noise_stds, {} roi_names",
            lambdas.len(),
            noise_stds.len(),
            roi_ids.len()
        )));
    }
    Ok(EventDetectionData {
        events,
        lambdas,
        noise_stds,
        roi_ids,
    })
}

/// Read a projection image (`data` matrix with a `pixel_size_um`
/// attribute).
///
/// # Errors
/// Returns an error if the file cannot be read or the attribute is
/// missing.
pub fn read_projection_file<P: AsRef<Path>>(path: P) -> Result<ProjectionImage> {
    let file = File::open(path)?;
    let dataset = file.dataset("data")?;
    let shape = dataset.shape();
    if shape.len() != 2 {
        return Err(Error::InvalidFormat(format!(
            "projection image has shape {shape:?}, expected [height, width]"
        )));
    }
    let raw = dataset.read_raw::<f64>()?;
    let data = Array2::from_shape_vec((shape[0], shape[1]), raw)
        .map_err(|e| Error::InvalidFormat(e.to_string()))?;
    let pixel_size_um = dataset.attr("pixel_size_um")?.read_scalar::<f64>()?;
    Ok(ProjectionImage {
        data,
        pixel_size_um,
    })
}

/// Read externally-fitted eye-tracking ellipses (`cr`, `eye`, `pupil`
/// groups).
///
/// # Errors
/// Returns an error if the file cannot be read or the three series do not
/// cover the same number of camera frames.
pub fn read_eye_tracking_file<P: AsRef<Path>>(path: P) -> Result<EyeTrackingData> {
    let file = File::open(path)?;
    let corneal_reflection = read_ellipse_group(&file.group("cr")?)?;
    let eye = read_ellipse_group(&file.group("eye")?)?;
    let pupil = read_ellipse_group(&file.group("pupil")?)?;

    if corneal_reflection.len() != pupil.len() || eye.len() != pupil.len() {
        return Err(Error::InvalidFormat(format!(
            "ellipse series disagree: {} cr, {} eye, {} pupil rows",
            corneal_reflection.len(),
            eye.len(),
            pupil.len()
        )));
    }
    Ok(EyeTrackingData {
        corneal_reflection,
        eye,
        pupil,
    })
}

fn read_ellipse_group(group: &Group) -> Result<EllipseSeries> {
    let series = EllipseSeries {
        center_x: read_group_vec(group, "center_x")?,
        center_y: read_group_vec(group, "center_y")?,
        width: read_group_vec(group, "width")?,
        height: read_group_vec(group, "height")?,
        phi: read_group_vec(group, "phi")?,
    };
    let rows = series.center_x.len();
    if series.center_y.len() != rows
        || series.width.len() != rows
        || series.height.len() != rows
        || series.phi.len() != rows
    {
        return Err(Error::InvalidFormat(format!(
            "ellipse group '{}' has ragged columns",
            group.name()
        )));
    }
    Ok(series)
}

fn read_matrix(file: &File, name: &str) -> Result<Array2<f64>> {
    let dataset = file.dataset(name)?;
    let shape = dataset.shape();
    if shape.len() != 2 {
        return Err(Error::InvalidFormat(format!(
            "dataset '{name}' has shape {shape:?}, expected [rows, timepoints]"
        )));
    }
    let raw = dataset.read_raw::<f64>()?;
    Array2::from_shape_vec((shape[0], shape[1]), raw)
        .map_err(|e| Error::InvalidFormat(e.to_string()))
}

fn read_vec(file: &File, name: &str) -> Result<Vec<f64>> {
    Ok(file.dataset(name)?.read_raw::<f64>()?)
}

fn read_group_vec(group: &Group, name: &str) -> Result<Vec<f64>> {
    Ok(group.dataset(name)?.read_raw::<f64>()?)
}

/// Read ROI identifiers, widening whatever integer width the file stores
/// to [`RoiId`]. Identity comparison downstream happens only on the
/// widened values.
fn read_roi_ids(file: &File, name: &str) -> Result<Vec<RoiId>> {
    let dataset = file.dataset(name)?;
    if let Ok(ids) = dataset.read_raw::<i64>() {
        return Ok(ids);
    }
    if let Ok(ids) = dataset.read_raw::<u64>() {
        return ids
            .into_iter()
            .map(|id| {
                RoiId::try_from(id)
                    .map_err(|_| Error::InvalidFormat(format!("ROI id {id} overflows i64")))
            })
            .collect();
    }
    if let Ok(ids) = dataset.read_raw::<i32>() {
        return Ok(ids.into_iter().map(RoiId::from).collect());
    }
    if let Ok(ids) = dataset.read_raw::<u32>() {
        return Ok(ids.into_iter().map(RoiId::from).collect());
    }
    Err(Error::InvalidFormat(format!(
        "dataset '{name}' is not an integer identifier array"
    )))
}
