/// Data layer: core types, the dataset store and prediction tables.
///
/// Architecture:
/// ```text
///  <store>/wave.parquet        vit.csv / lgbm.csv
///  <store>/dataset.parquet            │
///        │                            ▼
///        ▼                      ┌──────────┐
///   ┌──────────┐                │  loader   │  parse CSV → PredictionTable
///   │  store    │  log g,       └──────────┘
///   └──────────┘  sorted batched      │
///        │        flux reads          │ borrow_snr
///        ▼                            ▼
///   ┌──────────────────────────────────────┐
///   │ model   SpectraSample, PredictionTable, │
///   │         StellarType, report documents   │
///   └──────────────────────────────────────┘
/// ```

pub mod loader;
pub mod model;
pub mod store;
