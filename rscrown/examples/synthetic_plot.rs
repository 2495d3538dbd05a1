use anyhow::Result;
use std::path::Path;

use rscrown::collect::point_cloud::PointRecord;
use rscrown::{FileOutcome, Lidar, ProcessingConfig};

/// Example: canopy height model of a synthetic 20 m x 20 m plot
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Terrain sloping along x, a single 15 m crown in the middle
    let mut points = Vec::new();
    for i in 0..80 {
        for j in 0..80 {
            let x = 1000.0 + i as f64 * 0.25;
            let y = 2000.0 + j as f64 * 0.25;
            let ground = 50.0 + 0.1 * (x - 1000.0);
            points.push(PointRecord::new(x + 0.1, y + 0.1, ground, 20, 2));

            let r = ((x - 1010.0).powi(2) + (y - 2010.0).powi(2)).sqrt();
            if r < 5.0 {
                let top = ground + 15.0 - r;
                points.push(PointRecord::new(x, y, top, 120, 1));
            }
        }
    }
    println!("Synthetic plot: {} points", points.len());

    let config = ProcessingConfig {
        cell_size: 0.5,
        work_dir: "./output/data".into(),
        output_dir: "./output/result".into(),
        ..ProcessingConfig::default()
    };
    let lidar = Lidar::new(config)?;

    match lidar.process_points(&points, Path::new("synthetic_plot"), 0) {
        FileOutcome::Processed(summary) => {
            println!("Rasters: {} rows x {} columns", summary.shape.0, summary.shape.1);
            println!(
                "Canopy height: {:.2} to {:.2} m",
                summary.chm_range.0, summary.chm_range.1
            );
            println!("Hand-off manifest: {:?}", summary.manifest);
        }
        FileOutcome::Skipped(reason) => println!("Skipped: {}", reason),
        FileOutcome::Failed(error) => return Err(error),
    }

    Ok(())
}
