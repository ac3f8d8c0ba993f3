use std::env;
use std::path::{Path, PathBuf};

use crate::sampler::ClassQuota;

/// Root of the experiment checkout (dataset store and results).
pub const BASE_DIR_ENV: &str = "SPECVIT_BASE_DIR";
/// Root of the web front end (JSON outputs land in `public/data`).
pub const WEB_DIR_ENV: &str = "SPECVIT_WEB_DIR";

pub const SPECTRA_EXAMPLES_FILE: &str = "spectra_examples.json";
pub const PREDICTIONS_FILE: &str = "predictions.json";
pub const STELLAR_TYPE_METRICS_FILE: &str = "stellar_type_metrics.json";

// ---------------------------------------------------------------------------
// ExtractConfig
// ---------------------------------------------------------------------------

/// Every path and constant the extraction run uses.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    pub store_path: PathBuf,
    pub specvit_predictions: PathBuf,
    pub lightgbm_predictions: PathBuf,
    pub output_dir: PathBuf,
    pub n_examples: usize,
    pub quota: ClassQuota,
    pub seed: u64,
    /// Rows kept per method in `predictions.json`.
    pub display_limit: usize,
}

impl ExtractConfig {
    /// The fixed layout below the experiment root and the web root.
    pub fn from_roots(base_dir: &Path, web_dir: &Path) -> Self {
        let results = base_dir.join("results/scaling");
        Self {
            store_path: base_dir.join("data/bosz/z0_mag205/test_10k/dataset"),
            specvit_predictions: results.join("vit_1m_predictions_test10k.csv"),
            lightgbm_predictions: results.join("lgbm_1m_predictions_test10k.csv"),
            output_dir: web_dir.join("public/data"),
            n_examples: 20,
            quota: ClassQuota::default(),
            seed: 42,
            display_limit: 1000,
        }
    }

    /// Roots from `SPECVIT_BASE_DIR` / `SPECVIT_WEB_DIR`, defaulting to the
    /// current directory.
    pub fn from_env() -> Self {
        let root = |var: &str| {
            env::var_os(var)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
        };
        Self::from_roots(&root(BASE_DIR_ENV), &root(WEB_DIR_ENV))
    }

    pub fn spectra_examples_path(&self) -> PathBuf {
        self.output_dir.join(SPECTRA_EXAMPLES_FILE)
    }

    pub fn predictions_path(&self) -> PathBuf {
        self.output_dir.join(PREDICTIONS_FILE)
    }

    pub fn stellar_type_metrics_path(&self) -> PathBuf {
        self.output_dir.join(STELLAR_TYPE_METRICS_FILE)
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self::from_roots(Path::new("."), Path::new("."))
    }
}
