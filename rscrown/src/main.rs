use anyhow::{bail, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use std::io::Write;
use std::path::PathBuf;

use rscrown::batch::{BatchCursor, BatchRunner};
use rscrown::export::handoff::ExternalCommand;
use rscrown::{FileOutcome, Lidar, ProcessingConfig};

#[derive(Parser, Debug)]
#[command(
    name = "rscrown",
    about = "Build DSM, DTM and CHM rasters from classified LiDAR point clouds",
    version
)]
struct Cli {
    /// Batch root laid out as <ROOT>/<folder>/<file>
    #[arg(short, long, value_name = "ROOT", conflicts_with = "file")]
    input: Option<PathBuf>,

    /// Process a single point cloud file
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, value_name = "JSON")]
    config: Option<PathBuf>,

    /// Raster cell size
    #[arg(long)]
    cell_size: Option<f64>,

    /// Scratch directory for rasters and point artifacts
    #[arg(long, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// Output directory handed to the crown delineation engine
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Batch position of the first file to process
    #[arg(long)]
    resume_from: Option<u64>,

    /// Crown delineation program, called with the manifest path
    #[arg(long, value_name = "PROGRAM")]
    collaborator: Option<PathBuf>,

    /// Extra argument for the crown delineation program (repeatable)
    #[arg(long = "collaborator-arg", value_name = "ARG", allow_hyphen_values = true)]
    collaborator_args: Vec<String>,
}

impl Cli {
    fn into_config(self) -> Result<(ProcessingConfig, Option<PathBuf>, Option<PathBuf>)> {
        let mut config = match &self.config {
            Some(path) => ProcessingConfig::from_path(path)?,
            None => ProcessingConfig::default(),
        };
        if let Some(cell_size) = self.cell_size {
            config.cell_size = cell_size;
        }
        if let Some(work_dir) = self.work_dir {
            config.work_dir = work_dir;
        }
        if let Some(output_dir) = self.output_dir {
            config.output_dir = output_dir;
        }
        if let Some(resume_from) = self.resume_from {
            config.resume_from = resume_from;
        }
        if let Some(program) = self.collaborator {
            config.collaborator = Some(ExternalCommand::new(program, self.collaborator_args));
        }
        config.validate()?;
        Ok((config, self.input, self.file))
    }
}

fn main() -> Result<()> {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    let (config, input, file) = Cli::parse().into_config()?;
    log::info!("cell size: {}", config.cell_size);
    log::info!("work directory: {:?}", config.work_dir);
    log::info!("output directory: {:?}", config.output_dir);

    let resume_from = config.resume_from;
    let lidar = Lidar::new(config)?;

    match (input, file) {
        (Some(root), None) => {
            let report = BatchRunner::new(lidar).run(&root, BatchCursor::new(resume_from))?;
            log::info!(
                "{} processed, {} skipped, {} failed, {} passed over; next position {}",
                report.processed,
                report.skipped,
                report.failed,
                report.passed_over,
                report.cursor.next
            );
        }
        (None, Some(path)) => match lidar.process_file(&path, resume_from) {
            FileOutcome::Processed(summary) => {
                log::info!("Hand-off manifest: {:?}", summary.manifest);
            }
            FileOutcome::Skipped(reason) => log::warn!("Skipped {:?}: {}", path, reason),
            FileOutcome::Failed(error) => return Err(error),
        },
        _ => bail!("Pass either --input <ROOT> or --file <FILE>"),
    }

    Ok(())
}
