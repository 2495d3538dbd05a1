use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::{colortype, TiffEncoder};

use crate::geometric::surface::ElevationRaster;

/// Write `raster` as a single-band 32-bit float TIFF.
///
/// Image width is the column count and height the row count; no
/// geotransform is attached, cells stay in the rebased frame.
pub fn write_raster(raster: &ElevationRaster, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create output directory: {:?}", parent))?;
    }

    let file = File::create(path).context(format!("Failed to create {:?}", path))?;
    let mut encoder =
        TiffEncoder::new(BufWriter::new(file)).context("Failed to create TIFF encoder")?;

    let data: Vec<f32> = raster.values().iter().map(|&v| v as f32).collect();
    encoder
        .write_image::<colortype::Gray32Float>(raster.columns() as u32, raster.rows() as u32, &data)
        .context(format!("Failed to write raster to {:?}", path))?;

    log::debug!("Raster {}x{} saved to {:?}", raster.rows(), raster.columns(), path);
    Ok(path.to_path_buf())
}

/// Read back a single-band float TIFF written by [`write_raster`].
pub fn read_raster(path: &Path) -> Result<ElevationRaster> {
    let file = File::open(path).context(format!("Failed to open {:?}", path))?;
    let mut decoder = Decoder::new(BufReader::new(file)).context("Failed to decode TIFF")?;

    let (width, height) = decoder.dimensions().context("Failed to read TIFF dimensions")?;
    let values: Vec<f64> = match decoder.read_image().context("Failed to read TIFF image")? {
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
        _ => bail!("Unsupported pixel type in {:?}", path),
    };

    ElevationRaster::from_vec(height as usize, width as usize, values)
        .context(format!("{:?} is not a single-band raster", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_roundtrip_keeps_orientation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("CHM.tif");

        // 2 rows, 3 columns
        let raster = ElevationRaster::from_vec(2, 3, vec![0.0, 1.5, 3.0, 4.5, 6.0, 7.25]).unwrap();
        let written = write_raster(&raster, &path).unwrap();
        assert_eq!(written, path);

        let back = read_raster(&path).unwrap();
        assert_eq!(back.shape(), (2, 3));
        assert_eq!(back.get(0, 2), Some(3.0));
        assert_eq!(back.get(1, 0), Some(4.5));
        assert_eq!(back, raster);
    }
}
