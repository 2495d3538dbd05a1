use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::collect::point_cloud::{PointCloud, PointRecord};

/// Input formats understood by [`load_point_cloud`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Las,
    Csv,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "las" | "laz" => Some(InputFormat::Las),
            "csv" | "txt" | "xyz" => Some(InputFormat::Csv),
            _ => None,
        }
    }
}

/// Load a point cloud, picking the reader from the file extension.
pub fn load_point_cloud(path: &Path) -> Result<PointCloud> {
    match InputFormat::from_path(path) {
        Some(InputFormat::Las) => read_las(path),
        Some(InputFormat::Csv) => read_csv(path),
        None => bail!("Unsupported point cloud format: {:?}", path),
    }
}

/// Read x, y, z, intensity and classification from a LAS/LAZ file.
pub fn read_las(path: &Path) -> Result<PointCloud> {
    let mut reader = las::Reader::from_path(path)
        .with_context(|| format!("Failed to create LAS reader for {:?}", path))?;

    let point_count = reader.header().number_of_points() as usize;
    let mut raw_points: Vec<las::Point> = Vec::with_capacity(point_count);
    for point in reader.points() {
        raw_points.push(point.with_context(|| format!("Failed to read point from {:?}", path))?);
    }

    #[cfg(feature = "rayon")]
    let points: PointCloud = raw_points.par_iter().map(to_record).collect();

    #[cfg(not(feature = "rayon"))]
    let points: PointCloud = raw_points.iter().map(to_record).collect();

    log::debug!("Loaded {} points from {:?}", points.len(), path);
    Ok(points)
}

#[inline]
fn to_record(point: &las::Point) -> PointRecord {
    PointRecord {
        x: point.x,
        y: point.y,
        z: point.z,
        intensity: point.intensity,
        classification: i32::from(u8::from(point.classification)),
    }
}

const CSV_FIELDS: [&str; 5] = ["x", "y", "z", "intensity", "classification"];

/// Read a delimited text file with a header row naming
/// `x, y, z, intensity, classification` (any order, any case).
pub fn read_csv(path: &Path) -> Result<PointCloud> {
    let mut first_line = String::new();
    BufReader::new(File::open(path).with_context(|| format!("Failed to open {:?}", path))?)
        .read_line(&mut first_line)
        .with_context(|| format!("Failed to read header of {:?}", path))?;
    let delimiter = if first_line.contains(';') { b';' } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let columns: HashMap<String, usize> = reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .enumerate()
        .map(|(i, name)| (name.to_ascii_lowercase(), i))
        .collect();

    let mut index = [0usize; 5];
    for (slot, field) in index.iter_mut().zip(CSV_FIELDS) {
        *slot = *columns
            .get(field)
            .with_context(|| format!("Missing '{}' column in {:?}", field, path))?;
    }

    let mut points = PointCloud::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed record {} in {:?}", line + 1, path))?;
        let number = |i: usize| parse_field(&record, index[i], CSV_FIELDS[i], line + 1);

        points.push(PointRecord {
            x: number(0)?,
            y: number(1)?,
            z: number(2)?,
            intensity: integer_field(number(3)?, CSV_FIELDS[3], line + 1)?,
            classification: integer_field(number(4)?, CSV_FIELDS[4], line + 1)?,
        });
    }

    log::debug!("Loaded {} points from {:?}", points.len(), path);
    Ok(points)
}

/// Parse a numeric field; `nan` and `inf` are rejected.
fn parse_field(record: &csv::StringRecord, column: usize, name: &str, line: usize) -> Result<f64> {
    let value = record
        .get(column)
        .with_context(|| format!("Record {} has no '{}' field", line, name))?;
    let number = value
        .parse::<f64>()
        .with_context(|| format!("Failed to parse '{}' on record {}", name, line))?;
    if !number.is_finite() {
        bail!("Non-finite '{}' value {:?} on record {}", name, value, line);
    }
    Ok(number)
}

/// Narrow a whole-valued field (`300` or `300.0`) to its integer type.
fn integer_field<T: TryFrom<i64>>(value: f64, name: &str, line: usize) -> Result<T> {
    if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
        bail!("'{}' must be a whole number on record {}, got {}", name, line, value);
    }
    T::try_from(value as i64)
        .map_err(|_| anyhow::anyhow!("'{}' out of range on record {}, got {}", name, line, value))
}
