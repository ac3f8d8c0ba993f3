use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use log::debug;

use crate::data::model::{PredictionTable, SpectraSample, SpectrumRecord};
use crate::data::store::SpectrumStore;

/// Load the spectra at `indices` (first `limit` of them) from a store.
///
/// The store is read once, at the sorted distinct indices. Records come
/// back in the caller's order, duplicates included.
pub fn load_spectra_sample(
    store_path: &Path,
    indices: &[usize],
    limit: usize,
) -> Result<SpectraSample> {
    let requested = &indices[..indices.len().min(limit)];

    let mut sorted = requested.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let position: HashMap<usize, usize> =
        sorted.iter().enumerate().map(|(pos, &idx)| (idx, pos)).collect();

    let store = SpectrumStore::open(store_path)?;
    let wavelengths = store.wavelengths()?;
    let rows = store.read_rows(&sorted)?;
    debug!(
        "read {} distinct spectra ({} wavelengths) for {} requested indices",
        sorted.len(),
        wavelengths.len(),
        requested.len()
    );

    let spectra = requested
        .iter()
        .map(|&idx| {
            let pos = position[&idx];
            SpectrumRecord {
                idx,
                flux: rows.flux[pos].clone(),
                true_logg: rows.logg[pos],
                pred_logg: None,
                snr: None,
            }
        })
        .collect();

    Ok(SpectraSample {
        wavelengths,
        spectra,
    })
}

/// Attach point predictions (and snr, when the table has it) to every
/// spectrum whose index lies within `predictions`. Others stay bare.
pub fn attach_predictions(sample: &mut SpectraSample, predictions: &PredictionTable) -> usize {
    let mut attached = 0;
    for spectrum in &mut sample.spectra {
        if let Some(row) = predictions.rows.get(spectrum.idx) {
            spectrum.pred_logg = Some(row.y_pred);
            spectrum.snr = row.snr;
            attached += 1;
        }
    }
    attached
}
