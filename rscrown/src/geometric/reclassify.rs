use crate::geometric::extraction::Extraction;

/// Classification given to ground points handed to the crown delineation
/// engine, which looks for this value to tell ground from vegetation.
pub const GROUND_MARKER: i32 = -1;

/// Rewrite the classification of every point of a ground extraction to
/// [`GROUND_MARKER`]. Coordinates and intensity are left untouched.
pub fn mark_ground(extraction: &mut Extraction) {
    for point in extraction.points_mut() {
        point.classification = GROUND_MARKER;
    }
    log::debug!("Marked {} ground points", extraction.len());
}
