use crate::error::SurfaceError;
use crate::geometric::surface::ElevationRaster;

/// Canopy height model: `dsm - dtm` cell by cell.
///
/// Shapes must agree exactly. Negative heights are kept as computed.
pub fn combine(dsm: &ElevationRaster, dtm: &ElevationRaster) -> Result<ElevationRaster, SurfaceError> {
    if dsm.shape() != dtm.shape() {
        return Err(SurfaceError::ShapeMismatch {
            dsm: dsm.shape(),
            dtm: dtm.shape(),
        });
    }

    let (rows, columns) = dsm.shape();
    let values: Vec<f64> = dsm
        .values()
        .iter()
        .zip(dtm.values())
        .map(|(surface, terrain)| surface - terrain)
        .collect();

    Ok(ElevationRaster {
        rows,
        columns,
        values,
    })
}
