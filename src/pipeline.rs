use anyhow::{Context, Result};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::ExtractConfig;
use crate::data::loader::load_predictions;
use crate::data::model::{PredictionsReport, SpectraSample, StellarTypeReport};
use crate::metrics;
use crate::output::write_json;
use crate::sampler;
use crate::spectra;

/// What a completed run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub spectra: SpectraSample,
    pub predictions: PredictionsReport,
    pub stellar_types: StellarTypeReport,
}

/// Run the three extraction stages in order. Each stage writes its own
/// file before the next starts; a failure leaves earlier files in place.
pub fn run(config: &ExtractConfig) -> Result<RunSummary> {
    info!("Extracting data for SpecViT web demos");

    let spectra = extract_spectra_examples(config).context("extracting example spectra")?;
    let predictions = extract_predictions(config).context("extracting prediction comparisons")?;
    let stellar_types =
        extract_stellar_type_metrics(config).context("extracting per-stellar-type metrics")?;

    info!(
        "Data extraction complete, files saved to {}",
        config.output_dir.display()
    );
    Ok(RunSummary {
        spectra,
        predictions,
        stellar_types,
    })
}

fn extract_spectra_examples(config: &ExtractConfig) -> Result<SpectraSample> {
    info!("[1/3] Extracting example spectra");
    let mut rng = StdRng::seed_from_u64(config.seed);
    let indices = sampler::select_diverse_examples(
        &config.store_path,
        config.n_examples,
        config.quota,
        &mut rng,
    )?;
    let mut sample =
        spectra::load_spectra_sample(&config.store_path, &indices, config.n_examples)?;

    let specvit = load_predictions(&config.specvit_predictions)?;
    let attached = spectra::attach_predictions(&mut sample, &specvit);

    let path = config.spectra_examples_path();
    write_json(&path, &sample)?;
    info!(
        "  saved {} examples ({attached} with predictions) to {}",
        sample.spectra.len(),
        path.display()
    );
    Ok(sample)
}

fn extract_predictions(config: &ExtractConfig) -> Result<PredictionsReport> {
    info!("[2/3] Extracting prediction comparisons");
    let report = metrics::extract_predictions(
        &config.specvit_predictions,
        &config.lightgbm_predictions,
        config.display_limit,
    )?;

    write_json(&config.predictions_path(), &report)?;
    info!(
        "  SpecViT  R²: {:.3}, MAE: {:.3}",
        report.specvit.r2, report.specvit.mae
    );
    info!(
        "  LightGBM R²: {:.3}, MAE: {:.3}",
        report.lightgbm.r2, report.lightgbm.mae
    );
    Ok(report)
}

fn extract_stellar_type_metrics(config: &ExtractConfig) -> Result<StellarTypeReport> {
    info!("[3/3] Extracting per-stellar-type metrics");
    let report = metrics::extract_per_stellar_type_metrics(
        &config.specvit_predictions,
        &config.lightgbm_predictions,
    )?;

    write_json(&config.stellar_type_metrics_path(), &report)?;
    for (method, mae) in [("SPECVIT", &report.specvit), ("LIGHTGBM", &report.lightgbm)] {
        info!("  {method}:");
        for (class, value) in mae {
            info!("    - {class}: MAE = {value:.3}");
        }
    }
    Ok(report)
}
