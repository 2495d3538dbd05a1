use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::geometric::extraction::Extraction;

/// Coordinate resolution of the written records (1 mm)
pub const COORDINATE_SCALE: f64 = 0.001;

/// 8-bit classification field value for a (possibly negative) code.
///
/// Negative markers are stored as their two's-complement byte, so the
/// ground marker -1 lands on 255.
pub fn classification_byte(code: i32) -> Result<u8> {
    match u8::try_from(code) {
        Ok(byte) => Ok(byte),
        Err(_) if (i32::from(i8::MIN)..0).contains(&code) => Ok(code as i8 as u8),
        Err(_) => bail!("Classification {} does not fit in a LAS record", code),
    }
}

/// Write an extraction as a LAS 1.4 point artifact.
///
/// The header offset is the extraction's snapped minimum, so the stored
/// integer coordinates are the rebased values; readers applying the header
/// transform get the original coordinates back.
pub fn write_point_artifact(extraction: &Extraction, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create output directory: {:?}", parent))?;
    }

    let [ox, oy, oz] = extraction.bounds().min;
    let transform = |offset: f64| las::Transform {
        scale: COORDINATE_SCALE,
        offset,
    };

    let mut builder = las::Builder::from((1, 4));
    builder.point_format = las::point::Format::new(6).context("Invalid LAS point format")?;
    builder.transforms = las::Vector {
        x: transform(ox),
        y: transform(oy),
        z: transform(oz),
    };
    builder.generating_software = "rscrown".to_string();
    let header = builder.into_header().context("Failed to build LAS header")?;

    let mut writer = las::Writer::from_path(path, header)
        .context(format!("Failed to create LAS writer for {:?}", path))?;

    for record in extraction.points() {
        let classification = las::point::Classification::new(classification_byte(record.classification)?)
            .context(format!("Invalid classification {}", record.classification))?;
        let point = las::Point {
            x: record.x + ox,
            y: record.y + oy,
            z: record.z + oz,
            intensity: record.intensity,
            classification,
            gps_time: Some(0.0),
            ..Default::default()
        };
        writer
            .write_point(point)
            .context(format!("Failed to write point to {:?}", path))?;
    }
    writer
        .close()
        .context(format!("Failed to finalize {:?}", path))?;

    log::debug!(
        "{} points ({}) saved to {:?}",
        extraction.len(),
        extraction.selector(),
        path
    );
    Ok(path.to_path_buf())
}
