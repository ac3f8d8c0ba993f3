//! Regression metrics over prediction tables and the two report builders.
//!
//! All statistics use population values over the full table; truncation to
//! the display limit happens only after they are computed.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::data::loader::{borrow_snr, load_predictions};
use crate::data::model::{
    MethodMetrics, Prediction, PredictionPoint, PredictionTable, PredictionsReport, StellarType,
    StellarTypeMae, StellarTypeReport,
};

/// Coefficient of determination, `1 - SS_res / SS_tot`.
///
/// When `y_true` is constant (`SS_tot == 0`) the ratio is undefined: a
/// perfect fit scores 1.0, anything else 0.0. Returns NaN for no rows.
pub fn r_squared(rows: &[Prediction]) -> f64 {
    if rows.is_empty() {
        return f64::NAN;
    }
    let n = rows.len() as f64;
    let mean = rows.iter().map(|r| r.y_true).sum::<f64>() / n;

    let ss_res: f64 = rows.iter().map(|r| (r.y_true - r.y_pred).powi(2)).sum();
    let ss_tot: f64 = rows.iter().map(|r| (r.y_true - mean).powi(2)).sum();

    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Mean absolute error. Returns NaN for no rows.
pub fn mean_absolute_error(rows: &[Prediction]) -> f64 {
    if rows.is_empty() {
        return f64::NAN;
    }
    rows.iter().map(Prediction::abs_error).sum::<f64>() / rows.len() as f64
}

/// Global metrics over every row plus the first `display_limit` rows as
/// scatter points. Every row must already carry an snr.
pub fn method_metrics(table: &PredictionTable, display_limit: usize) -> Result<MethodMetrics> {
    let predictions = table
        .rows
        .iter()
        .take(display_limit)
        .enumerate()
        .map(|(i, r)| {
            let snr = r.snr.with_context(|| format!("Row {i}: missing snr"))?;
            Ok(PredictionPoint {
                y_true: r.y_true,
                y_pred: r.y_pred,
                snr,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MethodMetrics {
        r2: r_squared(&table.rows),
        mae: mean_absolute_error(&table.rows),
        predictions,
    })
}

/// MAE per stellar class of `y_true`. Classes with no rows are absent.
pub fn mae_by_stellar_type(table: &PredictionTable) -> StellarTypeMae {
    let mut groups: BTreeMap<StellarType, Vec<Prediction>> = BTreeMap::new();
    let mut skipped = 0usize;
    for row in &table.rows {
        match StellarType::classify(row.y_true) {
            Some(class) => groups.entry(class).or_default().push(*row),
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!("{skipped} prediction rows have a non-finite y_true and are not classified");
    }

    groups
        .into_iter()
        .map(|(class, rows)| {
            debug!("{class}: {} rows", rows.len());
            (class, mean_absolute_error(&rows))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Report builders
// ---------------------------------------------------------------------------

/// Build `predictions.json`: the specvit table lends its snr column to the
/// lightgbm table, then both get global metrics.
pub fn extract_predictions(
    specvit_csv: &Path,
    lightgbm_csv: &Path,
    display_limit: usize,
) -> Result<PredictionsReport> {
    let specvit = load_predictions(specvit_csv)?;
    let mut lightgbm = load_predictions(lightgbm_csv)?;
    borrow_snr(&specvit, &mut lightgbm)
        .with_context(|| {
            format!(
                "aligning {} with {}",
                lightgbm_csv.display(),
                specvit_csv.display()
            )
        })?;

    Ok(PredictionsReport {
        specvit: method_metrics(&specvit, display_limit).context("specvit metrics")?,
        lightgbm: method_metrics(&lightgbm, display_limit).context("lightgbm metrics")?,
    })
}

/// Build `stellar_type_metrics.json` from a fresh load of both tables.
pub fn extract_per_stellar_type_metrics(
    specvit_csv: &Path,
    lightgbm_csv: &Path,
) -> Result<StellarTypeReport> {
    let specvit = load_predictions(specvit_csv)?;
    let lightgbm = load_predictions(lightgbm_csv)?;
    Ok(StellarTypeReport {
        specvit: mae_by_stellar_type(&specvit),
        lightgbm: mae_by_stellar_type(&lightgbm),
    })
}
