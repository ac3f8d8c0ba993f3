use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, ArrayRef, Float32Array, Float64Array, Float64Builder, LargeListArray, ListArray,
    ListBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::debug;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReaderBuilder, RowSelection};
use parquet::arrow::{ArrowWriter, ProjectionMask};

use crate::error::ExtractError;

/// Store layout (a directory):
///
/// ```text
///  <store>/
///    wave.parquet      wave: Float64             shared wavelength grid
///    dataset.parquet   <params...>: Float64      one row per example
///                      flux: List<Float64>
/// ```
pub const WAVE_FILE: &str = "wave.parquet";
pub const DATASET_FILE: &str = "dataset.parquet";
pub const WAVE_COLUMN: &str = "wave";
pub const FLUX_COLUMN: &str = "flux";

// ---------------------------------------------------------------------------
// ParamSchema – where surface gravity lives in the parameter table
// ---------------------------------------------------------------------------

/// Describes the parameter table layout the extractor understands.
///
/// Both the column name and its position are checked: a store whose
/// parameter columns were reordered or renamed is rejected instead of
/// silently yielding another parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSchema {
    pub logg_column: &'static str,
    pub logg_position: usize,
}

impl ParamSchema {
    pub const BOSZ: ParamSchema = ParamSchema {
        logg_column: "log_g",
        logg_position: 1,
    };

    /// Parameter columns written by [`write_store`] callers in this crate.
    pub const BOSZ_COLUMNS: [&'static str; 4] = ["T_eff", "log_g", "M_H", "a_M"];

    fn validate(&self, param_columns: &[String]) -> Result<(), ExtractError> {
        match param_columns.get(self.logg_position) {
            Some(name) if name == self.logg_column => Ok(()),
            _ => Err(ExtractError::UnsupportedSchema {
                expected: self.logg_column,
                position: self.logg_position,
                found: param_columns.to_vec(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// Flux rows and log g values returned by a batched read, in position order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreRows {
    pub flux: Vec<Vec<f64>>,
    pub logg: Vec<f64>,
}

/// Read-only handle on a dataset store directory.
#[derive(Debug, Clone)]
pub struct SpectrumStore {
    root: PathBuf,
    schema: ParamSchema,
}

impl SpectrumStore {
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_with_schema(root, ParamSchema::BOSZ)
    }

    pub fn open_with_schema(root: &Path, schema: ParamSchema) -> Result<Self> {
        for file in [WAVE_FILE, DATASET_FILE] {
            let path = root.join(file);
            if !path.is_file() {
                return Err(ExtractError::MissingStoreFile(path).into());
            }
        }
        Ok(Self {
            root: root.to_path_buf(),
            schema,
        })
    }

    /// The wavelength grid shared by every spectrum.
    pub fn wavelengths(&self) -> Result<Vec<f64>> {
        let path = self.root.join(WAVE_FILE);
        let builder = open_parquet(&path)?;
        let wave_idx = builder
            .schema()
            .index_of(WAVE_COLUMN)
            .with_context(|| format!("{} has no '{WAVE_COLUMN}' column", path.display()))?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), [wave_idx]);
        let reader = builder
            .with_projection(mask)
            .build()
            .context("building wavelength reader")?;

        let mut wave = Vec::new();
        for batch in reader {
            let batch = batch.context("reading wavelength grid")?;
            wave.extend(f64_values(column(&batch, WAVE_COLUMN)?)?);
        }
        Ok(wave)
    }

    /// Surface gravity for every row, in dataset order.
    pub fn read_logg(&self) -> Result<Vec<f64>> {
        let builder = open_parquet(&self.root.join(DATASET_FILE))?;
        let logg_idx = self.logg_index(&builder)?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), [logg_idx]);
        let reader = builder
            .with_projection(mask)
            .build()
            .context("building parameter reader")?;

        let mut logg = Vec::new();
        for batch in reader {
            let batch = batch.context("reading parameter table")?;
            logg.extend(f64_values(column(&batch, self.schema.logg_column)?)?);
        }
        debug!("read {} log g values from {}", logg.len(), self.root.display());
        Ok(logg)
    }

    /// One batched read of flux and log g at `positions`.
    ///
    /// Positions must be strictly increasing; the read is expressed as a
    /// Parquet row selection, which only walks forward through the file.
    pub fn read_rows(&self, positions: &[usize]) -> Result<StoreRows> {
        if positions.windows(2).any(|w| w[0] >= w[1]) {
            bail!("row positions must be strictly increasing");
        }

        let builder = open_parquet(&self.root.join(DATASET_FILE))?;
        let rows = builder.metadata().file_metadata().num_rows() as usize;
        if let Some(&last) = positions.last() {
            if last >= rows {
                return Err(ExtractError::IndexOutOfRange { index: last, rows }.into());
            }
        }
        if positions.is_empty() {
            return Ok(StoreRows::default());
        }

        let logg_idx = self.logg_index(&builder)?;
        let flux_idx = builder
            .schema()
            .index_of(FLUX_COLUMN)
            .context("dataset has no 'flux' column")?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), [logg_idx, flux_idx]);
        let selection =
            RowSelection::from_consecutive_ranges(consecutive_ranges(positions).into_iter(), rows);
        let reader = builder
            .with_projection(mask)
            .with_row_selection(selection)
            .build()
            .context("building row reader")?;

        let mut out = StoreRows::default();
        for batch in reader {
            let batch = batch.context("reading selected rows")?;
            out.logg
                .extend(f64_values(column(&batch, self.schema.logg_column)?)?);
            let flux_col = column(&batch, FLUX_COLUMN)?;
            for row in 0..batch.num_rows() {
                let flux = extract_f64_list(flux_col, row)
                    .with_context(|| format!("Row {}: failed to read 'flux'", out.flux.len()))?;
                out.flux.push(flux);
            }
        }

        if out.logg.len() != positions.len() || out.flux.len() != positions.len() {
            bail!(
                "requested {} rows but the store returned {}",
                positions.len(),
                out.logg.len()
            );
        }
        Ok(out)
    }

    fn logg_index(&self, builder: &ParquetRecordBatchReaderBuilder<File>) -> Result<usize> {
        let schema = builder.schema();
        let params: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .filter(|name| name != FLUX_COLUMN)
            .collect();
        self.schema.validate(&params)?;
        schema
            .index_of(self.schema.logg_column)
            .context("locating log g column")
    }
}

/// Surface gravity for every row of the store at `store_path`.
pub fn read_logg(store_path: &Path) -> Result<Vec<f64>> {
    SpectrumStore::open(store_path)?.read_logg()
}

fn open_parquet(path: &Path) -> Result<ParquetRecordBatchReaderBuilder<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("reading parquet metadata of {}", path.display()))
}

/// Collapse sorted positions into runs: `[1, 2, 3, 7]` → `[1..4, 7..8]`.
fn consecutive_ranges(positions: &[usize]) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    for &pos in positions {
        match ranges.last_mut() {
            Some(run) if run.end == pos => run.end += 1,
            _ => ranges.push(pos..pos + 1),
        }
    }
    ranges
}

// -- Arrow helpers --

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .with_context(|| format!("record batch has no '{name}' column"))
}

/// Read a Float64 or Float32 column; nulls become NaN.
fn f64_values(col: &ArrayRef) -> Result<Vec<f64>> {
    if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
        Ok(arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
        Ok(arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
    } else {
        bail!("expected Float64 or Float32 column, got {:?}", col.data_type())
    }
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &ArrayRef, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .context("expected ListArray")?
            .value(row),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .context("expected LargeListArray")?
            .value(row),
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    f64_values(&values)
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Everything needed to materialise a store on disk.
#[derive(Debug, Clone, Default)]
pub struct StoreContents {
    pub wavelengths: Vec<f64>,
    /// Parameter columns in schema order.
    pub params: Vec<(String, Vec<f64>)>,
    /// One flux vector per example, each as long as `wavelengths`.
    pub flux: Vec<Vec<f64>>,
}

/// Write `contents` as a store directory at `root` (created if missing).
pub fn write_store(root: &Path, contents: &StoreContents) -> Result<()> {
    let n_rows = contents.flux.len();
    for (name, values) in &contents.params {
        if name == FLUX_COLUMN {
            bail!("'{FLUX_COLUMN}' is reserved and cannot be a parameter column");
        }
        if values.len() != n_rows {
            bail!(
                "parameter '{name}' has {} values but there are {n_rows} spectra",
                values.len()
            );
        }
    }
    if let Some((i, row)) = contents
        .flux
        .iter()
        .enumerate()
        .find(|(_, row)| row.len() != contents.wavelengths.len())
    {
        bail!(
            "Row {i}: flux has {} values but the wavelength grid has {}",
            row.len(),
            contents.wavelengths.len()
        );
    }

    std::fs::create_dir_all(root)
        .with_context(|| format!("creating store directory {}", root.display()))?;

    let wave_schema = Arc::new(Schema::new(vec![Field::new(
        WAVE_COLUMN,
        DataType::Float64,
        false,
    )]));
    let wave_batch = RecordBatch::try_new(
        wave_schema,
        vec![Arc::new(Float64Array::from(contents.wavelengths.clone()))],
    )
    .context("building wavelength batch")?;
    write_batch(&root.join(WAVE_FILE), &wave_batch)?;

    let mut fields: Vec<Field> = contents
        .params
        .iter()
        .map(|(name, _)| Field::new(name, DataType::Float64, false))
        .collect();
    fields.push(Field::new(
        FLUX_COLUMN,
        DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
        false,
    ));

    let mut columns: Vec<ArrayRef> = contents
        .params
        .iter()
        .map(|(_, values)| Arc::new(Float64Array::from(values.clone())) as ArrayRef)
        .collect();

    let mut flux_builder = ListBuilder::new(Float64Builder::new());
    for row in &contents.flux {
        let values = flux_builder.values();
        for &v in row {
            values.append_value(v);
        }
        flux_builder.append(true);
    }
    columns.push(Arc::new(flux_builder.finish()));

    let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
        .context("building dataset batch")?;
    write_batch(&root.join(DATASET_FILE), &batch)?;

    debug!(
        "wrote store with {n_rows} spectra x {} wavelengths to {}",
        contents.wavelengths.len(),
        root.display()
    );
    Ok(())
}

fn write_batch(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}
