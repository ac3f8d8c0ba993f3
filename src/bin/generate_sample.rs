use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use specvit_extract::config::ExtractConfig;
use specvit_extract::data::model::StellarType;
use specvit_extract::data::store::{ParamSchema, StoreContents, write_store};

const N_SPECTRA: usize = 400;
const N_WAVE: usize = 1000;

/// Absorption lines (centre Å, width Å, base depth, gravity sensitivity).
const LINES: [(f64, f64, f64, f64); 5] = [
    (8498.0, 1.5, 0.45, 0.04),
    (8542.0, 2.0, 0.60, 0.05),
    (8662.0, 1.8, 0.55, 0.05),
    (8688.0, 0.8, 0.20, -0.02),
    (8806.0, 0.9, 0.25, 0.03),
];

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Box-Muller transform for normal distribution
fn gauss(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

fn generate_spectrum(wave: &[f64], logg: f64, snr: f64, rng: &mut StdRng) -> Vec<f64> {
    wave.iter()
        .map(|&w| {
            let absorption: f64 = LINES
                .iter()
                .map(|&(mu, sigma, depth, slope)| {
                    gaussian(w, mu, sigma * (1.0 + 0.1 * logg), depth + slope * logg)
                })
                .sum();
            (1.0 - absorption) + gauss(rng, 0.0, 1.0 / snr)
        })
        .collect()
}

fn write_predictions(path: &Path, header: &[&str], rows: &[Vec<f64>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ExtractConfig::from_env();
    let mut rng = StdRng::seed_from_u64(config.seed);

    // Ca II triplet region, 8450 → 8950 Å
    let wave: Vec<f64> = (0..N_WAVE).map(|i| 8450.0 + i as f64 * 0.5).collect();

    let mut teff: Vec<f64> = Vec::with_capacity(N_SPECTRA);
    let mut logg: Vec<f64> = Vec::with_capacity(N_SPECTRA);
    let mut m_h: Vec<f64> = Vec::with_capacity(N_SPECTRA);
    let mut a_m: Vec<f64> = Vec::with_capacity(N_SPECTRA);
    let mut snr: Vec<f64> = Vec::with_capacity(N_SPECTRA);
    let mut flux = Vec::with_capacity(N_SPECTRA);

    for _ in 0..N_SPECTRA {
        let g: f64 = rng.gen_range(0.5..5.0);
        let s: f64 = rng.gen_range(5.0..80.0);
        teff.push(rng.gen_range(3500.0..7000.0));
        m_h.push(rng.gen_range(-2.0..0.5));
        a_m.push(rng.gen_range(-0.25..0.5));
        flux.push(generate_spectrum(&wave, g, s, &mut rng));
        logg.push(g);
        snr.push(s);
    }

    let columns = ParamSchema::BOSZ_COLUMNS;
    let contents = StoreContents {
        wavelengths: wave,
        params: vec![
            (columns[0].to_string(), teff.clone()),
            (columns[1].to_string(), logg.clone()),
            (columns[2].to_string(), m_h),
            (columns[3].to_string(), a_m),
        ],
        flux,
    };
    write_store(&config.store_path, &contents)?;

    // Both models are noisier at low snr; the gradient-boosted baseline more so.
    let specvit: Vec<Vec<f64>> = logg
        .iter()
        .zip(&snr)
        .map(|(&g, &s)| vec![g, g + gauss(&mut rng, 0.0, 1.5 / s.sqrt()), s])
        .collect();
    let lightgbm: Vec<Vec<f64>> = logg
        .iter()
        .zip(&snr)
        .map(|(&g, &s)| vec![g, g + gauss(&mut rng, 0.0, 3.0 / s.sqrt())])
        .collect();
    write_predictions(&config.specvit_predictions, &["y_true", "y_pred", "snr"], &specvit)?;
    write_predictions(&config.lightgbm_predictions, &["y_true", "y_pred"], &lightgbm)?;

    let preview = 5;
    let classes: Vec<&str> = logg[..preview]
        .iter()
        .map(|&g| StellarType::classify(g).map_or("?", |c| c.as_str()))
        .collect();
    let batch = RecordBatch::try_new(
        Arc::new(Schema::new(vec![
            Field::new("T_eff", DataType::Float64, false),
            Field::new("log_g", DataType::Float64, false),
            Field::new("snr", DataType::Float64, false),
            Field::new("class", DataType::Utf8, false),
        ])),
        vec![
            Arc::new(Float64Array::from(teff[..preview].to_vec())),
            Arc::new(Float64Array::from(logg[..preview].to_vec())),
            Arc::new(Float64Array::from(snr[..preview].to_vec())),
            Arc::new(StringArray::from(classes)),
        ],
    )?;

    println!(
        "Wrote {N_SPECTRA} spectra ({N_WAVE} wavelengths each) to {}",
        config.store_path.display()
    );
    println!("{}", pretty_format_batches(&[batch])?);
    Ok(())
}
