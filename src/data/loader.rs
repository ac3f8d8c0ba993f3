use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

use super::model::{Prediction, PredictionTable};
use crate::error::ExtractError;

/// Two tables describe the same held-out row when their `y_true` agree to
/// this relative tolerance (loose enough for a float32 round trip).
const ROW_IDENTITY_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// Load a prediction CSV.
///
/// CSV layout: header row with column names. `y_true` and `y_pred` are
/// required, `snr` is optional, any other column (e.g. a pandas index) is
/// ignored.
pub fn load_predictions(path: &Path) -> Result<PredictionTable> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening prediction CSV {}", path.display()))?;
    let headers: Vec<String> = reader
        .headers()
        .context("reading CSV headers")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let find = |column: &'static str| -> Result<usize, ExtractError> {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| ExtractError::MissingColumn {
                path: path.to_path_buf(),
                column,
            })
    };
    let true_idx = find("y_true")?;
    let pred_idx = find("y_pred")?;
    let snr_idx = find("snr").ok();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let y_true = parse_float(record.get(true_idx).unwrap_or(""), row_no, "y_true")?;
        let y_pred = parse_float(record.get(pred_idx).unwrap_or(""), row_no, "y_pred")?;
        let snr = snr_idx
            .map(|idx| parse_float(record.get(idx).unwrap_or(""), row_no, "snr"))
            .transpose()?;
        rows.push(Prediction {
            y_true,
            y_pred,
            snr,
        });
    }

    let table = PredictionTable::new(rows);
    if table.is_empty() {
        return Err(ExtractError::EmptyTable(path.to_path_buf()).into());
    }
    debug!(
        "loaded {} predictions from {} (snr: {})",
        table.len(),
        path.display(),
        table.has_snr()
    );
    Ok(table)
}

fn parse_float(s: &str, row: usize, col: &str) -> Result<f64> {
    s.trim()
        .parse::<f64>()
        .with_context(|| format!("Row {row}, {col}: '{s}' is not a number"))
}

// ---------------------------------------------------------------------------
// SNR borrowing
// ---------------------------------------------------------------------------

/// Copy the `snr` column of `donor` into `recipient`.
///
/// Both tables must describe the same held-out set in the same order: equal
/// row counts and matching `y_true` per row. Any existing `snr` values in
/// `recipient` are replaced.
pub fn borrow_snr(donor: &PredictionTable, recipient: &mut PredictionTable) -> Result<()> {
    if donor.len() != recipient.len() {
        return Err(ExtractError::RowCountMismatch {
            donor: donor.len(),
            recipient: recipient.len(),
        }
        .into());
    }

    if !donor.has_snr() {
        anyhow::bail!("donor table has no snr column");
    }

    for (row, (d, r)) in donor.rows.iter().zip(&recipient.rows).enumerate() {
        if !same_row(d.y_true, r.y_true) {
            return Err(ExtractError::RowIdentityMismatch {
                row,
                donor: d.y_true,
                recipient: r.y_true,
            }
            .into());
        }
    }

    for (d, r) in donor.rows.iter().zip(recipient.rows.iter_mut()) {
        r.snr = d.snr;
    }
    Ok(())
}

fn same_row(a: f64, b: f64) -> bool {
    (a - b).abs() <= ROW_IDENTITY_TOLERANCE * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_csv(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    fn table(rows: &[(f64, f64, Option<f64>)]) -> PredictionTable {
        PredictionTable::new(
            rows.iter()
                .map(|&(y_true, y_pred, snr)| Prediction { y_true, y_pred, snr })
                .collect(),
        )
    }

    #[test]
    fn loads_columns_by_name_and_ignores_extras() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "vit.csv",
            ",snr,y_pred,y_true\n0,12.5,4.1,4.0\n1,30,2.2,2.4\n",
        );
        let t = load_predictions(&path).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(
            t.rows[0],
            Prediction {
                y_true: 4.0,
                y_pred: 4.1,
                snr: Some(12.5)
            }
        );
        assert!(t.has_snr());
    }

    #[test]
    fn snr_column_is_optional() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "lgbm.csv", "y_true,y_pred\n1.0,1.5\n");
        let t = load_predictions(&path).unwrap();
        assert_eq!(t.rows[0].snr, None);
        assert!(!t.has_snr());
    }

    #[test]
    fn missing_required_column_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "bad.csv", "y_true,prediction\n1.0,1.5\n");
        let err = load_predictions(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExtractError>(),
            Some(ExtractError::MissingColumn { column: "y_pred", .. })
        ));
    }

    #[test]
    fn malformed_cell_and_empty_table_fail() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write_csv(dir.path(), "bad.csv", "y_true,y_pred\n1.0,abc\n");
        assert!(load_predictions(&bad).is_err());

        let empty = write_csv(dir.path(), "empty.csv", "y_true,y_pred\n");
        let err = load_predictions(&empty).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExtractError>(),
            Some(ExtractError::EmptyTable(_))
        ));
    }

    #[test]
    fn borrow_snr_copies_aligned_values() {
        let donor = table(&[(1.0, 1.1, Some(10.0)), (3.0, 2.9, Some(50.0))]);
        let mut recipient = table(&[(1.0, 0.8, None), (3.0, 3.3, Some(99.0))]);
        borrow_snr(&donor, &mut recipient).unwrap();
        assert_eq!(recipient.rows[0].snr, Some(10.0));
        assert_eq!(recipient.rows[1].snr, Some(50.0));
        assert_eq!(recipient.rows[1].y_pred, 3.3);
    }

    #[test]
    fn borrow_snr_rejects_misaligned_tables() {
        let donor = table(&[(1.0, 1.1, Some(10.0)), (3.0, 2.9, Some(50.0))]);

        let mut short = table(&[(1.0, 0.8, None)]);
        let err = borrow_snr(&donor, &mut short).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExtractError>(),
            Some(ExtractError::RowCountMismatch {
                donor: 2,
                recipient: 1
            })
        ));

        let mut shuffled = table(&[(3.0, 2.9, None), (1.0, 0.8, None)]);
        let err = borrow_snr(&donor, &mut shuffled).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExtractError>(),
            Some(ExtractError::RowIdentityMismatch { row: 0, .. })
        ));
        assert_eq!(shuffled.rows[0].snr, None);
    }

    #[test]
    fn borrow_snr_accepts_float32_rounded_truth() {
        let truth = [4.123456789_f64, 0.7, 2.5];
        let donor = table(&[
            (truth[0], 4.0, Some(11.0)),
            (truth[1], 0.6, Some(22.0)),
            (truth[2], 2.4, Some(33.0)),
        ]);
        let mut recipient = table(&[
            (truth[0] as f32 as f64, 4.2, None),
            (truth[1] as f32 as f64, 0.9, None),
            (truth[2] as f32 as f64, 2.6, None),
        ]);
        borrow_snr(&donor, &mut recipient).unwrap();
        assert_eq!(recipient.rows[2].snr, Some(33.0));

        let mut shifted = table(&[(4.1235, 4.2, None), (0.7, 0.9, None), (2.5, 2.6, None)]);
        assert!(borrow_snr(&donor, &mut shifted).is_err());
    }

    #[test]
    fn borrow_snr_requires_donor_snr() {
        let donor = table(&[(1.0, 1.1, None)]);
        let mut recipient = table(&[(1.0, 0.8, None)]);
        assert!(borrow_snr(&donor, &mut recipient).is_err());
    }
}
