use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{
    Array, Float32Array, Float64Array, Int32Array, Int64Array, LargeListArray, ListArray,
};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;

use super::model::{LineId, LineList, SpectralImage, Spectrum};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

/// Load a 2D frame.  Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one record per image row, either a list column `row` or
///   one numeric column per pixel
/// * `.json`    – `[[...], [...], ...]`, an array of rows
/// * `.csv`     – headerless numeric rows
pub fn load_image(path: &Path) -> Result<SpectralImage> {
    let image = match extension(path).as_str() {
        "parquet" | "pq" => load_image_parquet(path),
        "json" => load_image_json(path),
        "csv" | "txt" => load_image_csv(path),
        other => bail!("Unsupported image extension: .{other}"),
    }?;

    let non_finite = image.values().iter().filter(|v| !v.is_finite()).count();
    if non_finite > 0 {
        log::warn!("{}: {non_finite} non-finite pixels", path.display());
    }
    Ok(image)
}

/// Load a 1D spectrum.  Dispatch by extension.
///
/// * `.parquet` – numeric column `intensity` (one sample per record)
/// * `.json`    – `[...]` or `{ "intensity": [...] }`
/// * `.csv`     – column `intensity`, else the first column; header optional
pub fn load_spectrum(path: &Path) -> Result<Spectrum> {
    match extension(path).as_str() {
        "parquet" | "pq" => load_spectrum_parquet(path),
        "json" => load_spectrum_json(path),
        "csv" | "txt" => load_spectrum_csv(path),
        other => bail!("Unsupported spectrum extension: .{other}"),
    }
}

/// Load arc line identifications.
///
/// * `.csv`  – header `pixel,wavelength[,label]`
/// * `.json` – `[{ "pixel": 512.3, "wavelength": 5460.74, "label": "Hg" }, ...]`
pub fn load_line_list(path: &Path) -> Result<LineList> {
    let lines: Vec<LineId> = match extension(path).as_str() {
        "csv" => {
            let mut reader = csv::ReaderBuilder::new()
                .trim(csv::Trim::All)
                .from_path(path)
                .context("opening line list CSV")?;
            reader
                .deserialize::<LineId>()
                .enumerate()
                .map(|(i, rec)| rec.with_context(|| format!("line list row {i}")))
                .collect::<Result<_>>()?
        }
        "json" => {
            let text = std::fs::read_to_string(path).context("reading line list JSON")?;
            serde_json::from_str(&text).context("parsing line list JSON")?
        }
        other => bail!("Unsupported line list extension: .{other}"),
    };
    for (i, line) in lines.iter().enumerate() {
        if !line.pixel.is_finite() || !line.wavelength.is_finite() {
            bail!("line {i}: pixel and wavelength must be finite numbers");
        }
    }
    Ok(LineList::new(lines))
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

fn load_image_json(path: &Path) -> Result<SpectralImage> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let rows: Vec<Vec<f64>> = serde_json::from_str(&text).context("parsing JSON image rows")?;
    SpectralImage::from_rows(rows)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SpectrumJson {
    Bare(Vec<f64>),
    Object { intensity: Vec<f64> },
}

fn load_spectrum_json(path: &Path) -> Result<Spectrum> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let parsed: SpectrumJson = serde_json::from_str(&text)
        .context("Expected a JSON array of numbers or an object with 'intensity'")?;
    let intensity = match parsed {
        SpectrumJson::Bare(v) | SpectrumJson::Object { intensity: v } => v,
    };
    if intensity.is_empty() {
        bail!("spectrum is empty");
    }
    Ok(Spectrum::new(intensity))
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn load_image_csv(path: &Path) -> Result<SpectralImage> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening CSV")?;

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("CSV row {row_no}"))?;
        let row = record
            .iter()
            .enumerate()
            .map(|(j, tok)| parse_float(tok, row_no, j))
            .collect::<Result<Vec<f64>>>()?;
        rows.push(row);
    }
    SpectralImage::from_rows(rows)
}

fn load_spectrum_csv(path: &Path) -> Result<Spectrum> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening CSV")?;
    let records: Vec<csv::StringRecord> = reader
        .records()
        .collect::<std::result::Result<_, _>>()
        .context("reading CSV records")?;

    let Some(first) = records.first() else {
        bail!("CSV file is empty");
    };
    // A non-numeric first row is a header.
    let has_header = first.iter().any(|tok| tok.parse::<f64>().is_err());
    let column = if has_header {
        first.iter().position(|h| h == "intensity").unwrap_or(0)
    } else {
        0
    };
    let skip = usize::from(has_header);

    let intensity = records
        .iter()
        .enumerate()
        .skip(skip)
        .map(|(row_no, rec)| parse_float(rec.get(column).unwrap_or(""), row_no, column))
        .collect::<Result<Vec<f64>>>()?;
    if intensity.is_empty() {
        bail!("CSV has no samples");
    }
    Ok(Spectrum::new(intensity))
}

fn parse_float(tok: &str, row: usize, col: usize) -> Result<f64> {
    tok.parse::<f64>()
        .with_context(|| format!("Row {row}, column {col}: '{tok}' is not a number"))
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn load_image_parquet(path: &Path) -> Result<SpectralImage> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        if let Ok(idx) = schema.index_of("row") {
            let col = batch.column(idx);
            for r in 0..batch.num_rows() {
                let row = extract_f64_list(col, r)
                    .with_context(|| format!("Row {}: failed to read 'row'", rows.len()))?;
                rows.push(row);
            }
        } else {
            let columns: Vec<&Arc<dyn Array>> = batch.columns().iter().collect();
            for r in 0..batch.num_rows() {
                let row = columns
                    .iter()
                    .enumerate()
                    .map(|(c, col)| {
                        scalar_f64(col, r).with_context(|| {
                            format!("column '{}' is not numeric", schema.field(c).name())
                        })
                    })
                    .collect::<Result<Vec<f64>>>()?;
                rows.push(row);
            }
        }
    }
    SpectralImage::from_rows(rows)
}

fn load_spectrum_parquet(path: &Path) -> Result<Spectrum> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut intensity = Vec::new();
    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let idx = batch
            .schema()
            .index_of("intensity")
            .map_err(|_| anyhow::anyhow!("Parquet file missing 'intensity' column"))?;
        let col = batch.column(idx);
        for r in 0..batch.num_rows() {
            intensity.push(scalar_f64(col, r).context("'intensity' is not numeric")?);
        }
    }
    if intensity.is_empty() {
        bail!("spectrum is empty");
    }
    Ok(Spectrum::new(intensity))
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
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

    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(f32::NAN) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}

/// A numeric cell as `f64`; nulls become NaN, other types are `None`.
fn scalar_f64(col: &Arc<dyn Array>, row: usize) -> Option<f64> {
    if col.is_null(row) {
        return Some(f64::NAN);
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Float64 => any.downcast_ref::<Float64Array>().map(|a| a.value(row)),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map(|a| a.value(row) as f64),
        DataType::Int64 => any.downcast_ref::<Int64Array>().map(|a| a.value(row) as f64),
        DataType::Int32 => any.downcast_ref::<Int32Array>().map(|a| a.value(row) as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use arrow::array::{Float64Builder, ListBuilder};
    use arrow::datatypes::{Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("spectral-lab-{}-{name}", std::process::id()))
    }

    #[test]
    fn image_from_json_and_csv() {
        let json = scratch("frame.json");
        std::fs::write(&json, "[[1, 2, 3], [4, 5, 6]]").unwrap();
        let img = load_image(&json).unwrap();
        assert_eq!(img.shape(), (2, 3));
        assert_eq!(img.get(1, 2), 6.0);

        let csv = scratch("frame.csv");
        std::fs::write(&csv, "1.5, 2\n3, 4\n").unwrap();
        let img = load_image(&csv).unwrap();
        assert_eq!(img.row(1), &[3.0, 4.0]);

        std::fs::write(&csv, "1,2\n3\n").unwrap();
        assert!(load_image(&csv).is_err());
    }

    #[test]
    fn spectrum_csv_with_and_without_header() {
        let path = scratch("arc.csv");
        std::fs::write(&path, "pixel,intensity\n0,10\n1,12\n2,9\n").unwrap();
        assert_eq!(load_spectrum(&path).unwrap().intensity, vec![10.0, 12.0, 9.0]);

        std::fs::write(&path, "7\n8\n").unwrap();
        assert_eq!(load_spectrum(&path).unwrap().intensity, vec![7.0, 8.0]);
    }

    #[test]
    fn spectrum_json_shapes() {
        let path = scratch("arc.json");
        std::fs::write(&path, "[1.0, 2.0]").unwrap();
        assert_eq!(load_spectrum(&path).unwrap().len(), 2);
        std::fs::write(&path, r#"{"intensity": [3.0, 4.0, 5.0]}"#).unwrap();
        assert_eq!(load_spectrum(&path).unwrap().len(), 3);
    }

    #[test]
    fn line_list_csv_with_optional_labels() {
        let path = scratch("lines.csv");
        std::fs::write(&path, "pixel,wavelength,label\n120.5,4046.56,Hg\n800,5460.74,\n").unwrap();
        let list = load_line_list(&path).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.lines[0].label.as_deref(), Some("Hg"));
        assert_eq!(list.lines[1].label, None);
        assert_eq!(list.labels()[1], "5460.74");
    }

    #[test]
    fn image_from_parquet_row_lists() {
        let path = scratch("frame.parquet");
        let mut builder = ListBuilder::new(Float64Builder::new());
        for r in 0..3 {
            for c in 0..4 {
                builder.values().append_value((r * 4 + c) as f64);
            }
            builder.append(true);
        }
        let schema = Arc::new(Schema::new(vec![Field::new(
            "row",
            DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
            false,
        )]));
        let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(builder.finish())]).unwrap();
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = ArrowWriter::try_new(file, schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let img = load_image(&path).unwrap();
        assert_eq!(img.shape(), (3, 4));
        assert_eq!(img.get(2, 3), 11.0);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(load_image(Path::new("frame.fits")).is_err());
        assert!(load_line_list(Path::new("lines.parquet")).is_err());
    }
}
