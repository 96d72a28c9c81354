//! ROI identity reconciliation.
//!
//! Trace files record their rows in file-native order under their own
//! copy of the ROI identifiers; the segmentation table is the canonical
//! ordering. Reconciliation validates that the two identifier sets agree
//! exactly and produces the permutation that places trace rows into
//! canonical order. Rows are only ever reordered, never recomputed.

use crate::error::{Error, Result};
use crate::trace::RawTrace;
use crate::RoiId;
use ndarray::Array2;
use std::collections::{BTreeMap, BTreeSet};

/// Validated permutation mapping file-native rows into canonical order.
///
/// `order[i]` is the trace row whose identifier equals `canonical[i]`.
/// Both sequences must be duplicate-free (enforced upstream by
/// [`RawTrace`] and the segmentation table).
///
/// # Errors
/// Returns [`Error::IdentityMismatch`] naming every identifier present on
/// only one side.
pub fn canonical_order(
    canonical: &[RoiId],
    trace_ids: &[RoiId],
    context: &str,
) -> Result<Vec<usize>> {
    let canonical_set: BTreeSet<RoiId> = canonical.iter().copied().collect();
    let trace_set: BTreeSet<RoiId> = trace_ids.iter().copied().collect();

    let missing_from_table: Vec<RoiId> =
        trace_set.difference(&canonical_set).copied().collect();
    let missing_from_trace: Vec<RoiId> =
        canonical_set.difference(&trace_set).copied().collect();
    if !missing_from_table.is_empty() || !missing_from_trace.is_empty() {
        return Err(Error::IdentityMismatch {
            context: context.to_string(),
            missing_from_table,
            missing_from_trace,
        });
    }

    let row_of: BTreeMap<RoiId, usize> = trace_ids
        .iter()
        .enumerate()
        .map(|(row, &id)| (id, row))
        .collect();
    // Set equality was established above, so every lookup succeeds.
    Ok(canonical.iter().map(|id| row_of[id]).collect())
}

/// Reorder matrix rows by a permutation from [`canonical_order`].
#[must_use]
pub fn reorder_rows(data: &Array2<f64>, order: &[usize]) -> Array2<f64> {
    let mut out = Array2::zeros((order.len(), data.ncols()));
    for (dst, &src) in order.iter().enumerate() {
        out.row_mut(dst).assign(&data.row(src));
    }
    out
}

/// Reorder a per-ROI value sequence by a permutation from
/// [`canonical_order`].
#[must_use]
pub fn reorder_values<T: Copy>(values: &[T], order: &[usize]) -> Vec<T> {
    order.iter().map(|&row| values[row]).collect()
}

/// Reorder a trace's rows into canonical order.
///
/// # Errors
/// Returns [`Error::IdentityMismatch`] if the trace's identifier set
/// differs from the canonical set in either direction.
pub fn reconcile_trace(
    canonical: &[RoiId],
    trace: &RawTrace,
    context: &str,
) -> Result<Array2<f64>> {
    let order = canonical_order(canonical, trace.roi_ids(), context)?;
    Ok(reorder_rows(trace.data(), &order))
}
