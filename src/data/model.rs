use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// StellarType – physical class derived from surface gravity
// ---------------------------------------------------------------------------

/// Giant / subgiant / dwarf split by log g.
///
/// Variant order is the output order used everywhere (sampling, JSON maps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StellarType {
    Giants,
    Subgiants,
    Dwarfs,
}

impl StellarType {
    /// Upper log g bound (exclusive) of the giant class.
    pub const GIANT_MAX_LOGG: f64 = 2.5;
    /// Upper log g bound (exclusive) of the subgiant class.
    pub const SUBGIANT_MAX_LOGG: f64 = 3.5;

    pub const ALL: [StellarType; 3] = [
        StellarType::Giants,
        StellarType::Subgiants,
        StellarType::Dwarfs,
    ];

    /// Classify a log g value. Each boundary belongs to the higher class.
    /// Returns `None` for NaN and infinities, which have no physical class.
    pub fn classify(logg: f64) -> Option<Self> {
        if !logg.is_finite() {
            None
        } else if logg < Self::GIANT_MAX_LOGG {
            Some(StellarType::Giants)
        } else if logg < Self::SUBGIANT_MAX_LOGG {
            Some(StellarType::Subgiants)
        } else {
            Some(StellarType::Dwarfs)
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StellarType::Giants => "giants",
            StellarType::Subgiants => "subgiants",
            StellarType::Dwarfs => "dwarfs",
        }
    }
}

impl fmt::Display for StellarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Prediction tables – one row per held-out example
// ---------------------------------------------------------------------------

/// A single row of a prediction CSV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub y_true: f64,
    pub y_pred: f64,
    pub snr: Option<f64>,
}

impl Prediction {
    pub fn abs_error(&self) -> f64 {
        (self.y_true - self.y_pred).abs()
    }
}

/// All rows of one method's prediction CSV, in file order.
#[derive(Debug, Clone, Default)]
pub struct PredictionTable {
    pub rows: Vec<Prediction>,
}

impl PredictionTable {
    pub fn new(rows: Vec<Prediction>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether every row carries a signal-to-noise value.
    pub fn has_snr(&self) -> bool {
        !self.rows.is_empty() && self.rows.iter().all(|r| r.snr.is_some())
    }
}

// ---------------------------------------------------------------------------
// spectra_examples.json
// ---------------------------------------------------------------------------

/// One example spectrum selected for the front end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumRecord {
    pub idx: usize,
    pub flux: Vec<f64>,
    pub true_logg: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pred_logg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snr: Option<f64>,
}

/// Shared wavelength grid plus the selected spectra, in selection order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectraSample {
    pub wavelengths: Vec<f64>,
    pub spectra: Vec<SpectrumRecord>,
}

// ---------------------------------------------------------------------------
// predictions.json / stellar_type_metrics.json
// ---------------------------------------------------------------------------

/// A scatter-plot point. `snr` is always present once borrowing succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionPoint {
    pub y_true: f64,
    pub y_pred: f64,
    pub snr: f64,
}

/// Global metrics of one method plus its truncated prediction list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodMetrics {
    pub r2: f64,
    pub mae: f64,
    pub predictions: Vec<PredictionPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionsReport {
    pub specvit: MethodMetrics,
    pub lightgbm: MethodMetrics,
}

/// Per-class MAE; classes without rows are absent.
pub type StellarTypeMae = BTreeMap<StellarType, f64>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StellarTypeReport {
    pub specvit: StellarTypeMae,
    pub lightgbm: StellarTypeMae,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries_are_lower_inclusive() {
        assert_eq!(StellarType::classify(2.4999), Some(StellarType::Giants));
        assert_eq!(StellarType::classify(2.5), Some(StellarType::Subgiants));
        assert_eq!(StellarType::classify(3.4999), Some(StellarType::Subgiants));
        assert_eq!(StellarType::classify(3.5), Some(StellarType::Dwarfs));
        assert_eq!(StellarType::classify(-1.0), Some(StellarType::Giants));
        assert_eq!(StellarType::classify(f64::NAN), None);
        assert_eq!(StellarType::classify(f64::INFINITY), None);
        assert_eq!(StellarType::classify(f64::NEG_INFINITY), None);
    }

    #[test]
    fn spectrum_record_omits_missing_prediction() {
        let rec = SpectrumRecord {
            idx: 3,
            flux: vec![1.0, 0.5],
            true_logg: 4.0,
            pred_logg: None,
            snr: None,
        };
        let json = serde_json::to_value(&rec).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 3);
        assert!(!obj.contains_key("pred_logg"));
        assert!(!obj.contains_key("snr"));
    }

    #[test]
    fn stellar_type_map_serializes_with_class_names() {
        let mut mae = StellarTypeMae::new();
        mae.insert(StellarType::Dwarfs, 0.25);
        mae.insert(StellarType::Giants, 0.5);
        let json = serde_json::to_value(&mae).unwrap();
        assert_eq!(json, serde_json::json!({"giants": 0.5, "dwarfs": 0.25}));
    }
}
