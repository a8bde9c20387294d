use std::sync::Arc;

use arrow::array::{Float64Builder, ListBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

const ROWS: usize = 136;
const COLS: usize = 1024;

/// Pixel → wavelength (Å) of the synthetic spectrograph.
const DISPERSION: [f64; 4] = [3650.0, 2.1, 4.0e-4, -6.0e-8];

/// Hg / Cd / Ne lines falling on the detector.
const ARC_LINES: [(f64, f64, &str); 9] = [
    (4046.56, 0.6, "Hg I"),
    (4358.33, 1.0, "Hg I"),
    (4678.15, 0.35, "Cd I"),
    (4799.91, 0.4, "Cd I"),
    (5085.82, 0.5, "Cd I"),
    (5460.74, 0.9, "Hg I"),
    (5769.60, 0.45, "Hg I"),
    (5790.66, 0.45, "Hg I"),
    (6096.16, 0.3, "Ne I"),
];

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

fn wavelength(pixel: f64) -> f64 {
    DISPERSION.iter().rev().fold(0.0, |acc, &c| acc * pixel + c)
}

/// Invert the dispersion relation by Newton iteration.
fn pixel_of(lambda: f64) -> f64 {
    let mut p = (lambda - DISPERSION[0]) / DISPERSION[1];
    for _ in 0..20 {
        let slope = DISPERSION[1] + 2.0 * DISPERSION[2] * p + 3.0 * DISPERSION[3] * p * p;
        p -= (wavelength(p) - lambda) / slope;
    }
    p
}

fn write_frame(path: &str, rows: &[Vec<f64>]) -> Result<(), Box<dyn std::error::Error>> {
    let mut row_builder = ListBuilder::new(Float64Builder::new());
    for row in rows {
        let values = row_builder.values();
        for &v in row {
            values.append_value(v);
        }
        row_builder.append(true);
    }

    let schema = Arc::new(Schema::new(vec![Field::new(
        "row",
        DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
        false,
    )]));
    let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(row_builder.finish())])?;

    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(42);
    let read_noise = Normal::new(0.0, 4.0)?;

    // ---- 2D arc frame: curved sky + arc trace centred on row 68 ----
    let centres: Vec<f64> = ARC_LINES.iter().map(|&(l, _, _)| pixel_of(l)).collect();
    let frame: Vec<Vec<f64>> = (0..ROWS)
        .map(|r| {
            let y = r as f64;
            let slit = gaussian(y, 68.0, 1.2, 1.0);
            (0..COLS)
                .map(|c| {
                    let x = c as f64;
                    let sky = 120.0 + 0.35 * y - 0.0024 * y * y + 0.01 * x;
                    let arc: f64 = ARC_LINES
                        .iter()
                        .zip(&centres)
                        .map(|(&(_, strength, _), &mu)| gaussian(x, mu, 1.7, 40000.0 * strength))
                        .sum();
                    sky + slit * arc + read_noise.sample(&mut rng)
                })
                .collect()
        })
        .collect();
    write_frame("arc_frame.parquet", &frame)?;

    // ---- approximate line positions, as read off a plot by eye ----
    let mut writer = csv::Writer::from_path("arc_lines.csv")?;
    writer.write_record(["pixel", "wavelength", "label"])?;
    for (&(lambda, _, name), &mu) in ARC_LINES.iter().zip(&centres) {
        writer.write_record([
            format!("{:.0}", mu.round()),
            format!("{lambda:.2}"),
            format!("{name} {lambda:.2}"),
        ])?;
    }
    writer.flush()?;

    // ---- star field for the image viewers ----
    let stars = Normal::new(0.0, 1.0)?;
    let field_size = 256;
    let star_list: Vec<(f64, f64, f64)> = (0..25)
        .map(|i| {
            let x = 20.0 + (i % 5) as f64 * 50.0 + 5.0 * stars.sample(&mut rng);
            let y = 20.0 + (i / 5) as f64 * 50.0 + 5.0 * stars.sample(&mut rng);
            (x, y, 2000.0 + 800.0 * i as f64)
        })
        .collect();
    let field: Vec<Vec<f64>> = (0..field_size)
        .map(|r| {
            (0..field_size)
                .map(|c| {
                    let (x, y) = (c as f64 + 0.5, r as f64 + 0.5);
                    let flux: f64 = star_list
                        .iter()
                        .map(|&(sx, sy, a)| gaussian(x, sx, 2.2, 1.0) * gaussian(y, sy, 2.2, a))
                        .sum();
                    3000.0 + flux + 15.0 * read_noise.sample(&mut rng)
                })
                .collect()
        })
        .collect();
    write_frame("star_field.parquet", &field)?;

    println!(
        "Wrote arc_frame.parquet ({ROWS}x{COLS}), arc_lines.csv ({} lines) and star_field.parquet ({field_size}x{field_size})",
        ARC_LINES.len()
    );
    Ok(())
}
