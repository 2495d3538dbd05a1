use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};

#[cfg(feature = "indicatif")]
use indicatif::{ProgressBar, ProgressStyle};

use crate::collect::reader::InputFormat;
use crate::geometric::lidar::{FileOutcome, Lidar};

#[cfg(feature = "indicatif")]
fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {percent} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Position in a batch traversal.
///
/// Every visited file takes the next position, whether it is processed or
/// not. Positions below `resume_from` are passed over, so an interrupted run
/// restarts where it stopped by passing its last position back in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchCursor {
    pub next: u64,
    pub resume_from: u64,
}

impl BatchCursor {
    pub fn new(resume_from: u64) -> Self {
        BatchCursor {
            next: 0,
            resume_from,
        }
    }

    /// Claim the position of the next file
    pub fn advance(&mut self) -> u64 {
        let position = self.next;
        self.next += 1;
        position
    }

    pub fn should_process(&self, position: u64) -> bool {
        position >= self.resume_from
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Files before the resume position
    pub passed_over: usize,
    /// Files whose extension no reader understands
    pub ignored: usize,
    pub cursor: BatchCursor,
}

/// Input files under `root`: `root/<folder>/<file>`, both levels sorted.
pub fn list_batch_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for folder in sorted_entries(root)? {
        if folder.is_dir() {
            files.extend(sorted_entries(&folder)?.into_iter().filter(|p| p.is_file()));
        }
    }
    Ok(files)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(dir)
        .context(format!("Failed to read directory: {:?}", dir))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .context(format!("Failed to list directory: {:?}", dir))?;
    entries.sort();
    Ok(entries)
}

/// Runs the per-file pipeline over a directory tree, one file at a time.
pub struct BatchRunner {
    lidar: Lidar,
}

impl BatchRunner {
    pub fn new(lidar: Lidar) -> Self {
        BatchRunner { lidar }
    }

    /// Process every file under `root` starting from `cursor`.
    ///
    /// Per-file problems are logged with their folder, file and position and
    /// never stop the batch. Only an unreadable `root` is an error.
    pub fn run(&self, root: &Path, mut cursor: BatchCursor) -> Result<BatchReport> {
        let started = Local::now();
        log::info!("Batch started at {}", started.format("%Y-%m-%d %H:%M:%S"));

        let files = list_batch_files(root)?;
        log::info!("Found {} file(s) under {:?}", files.len(), root);

        #[cfg(feature = "indicatif")]
        let pb = {
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(progress_style());
            pb.set_message("Files");
            pb
        };

        let mut report = BatchReport::default();
        for path in &files {
            let position = cursor.advance();

            #[cfg(feature = "indicatif")]
            pb.inc(1);

            if !cursor.should_process(position) {
                report.passed_over += 1;
                continue;
            }
            if InputFormat::from_path(path).is_none() {
                log::debug!("Ignoring {:?}: unsupported format", path);
                report.ignored += 1;
                continue;
            }

            let folder = path
                .parent()
                .and_then(Path::file_name)
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();

            match self.lidar.process_file(path, position) {
                FileOutcome::Processed(summary) => {
                    report.processed += 1;
                    log::info!(
                        "[{}] {}/{}: {}x{} rasters handed off",
                        position,
                        folder,
                        file,
                        summary.shape.0,
                        summary.shape.1
                    );
                }
                FileOutcome::Skipped(reason) => {
                    report.skipped += 1;
                    log::warn!("[{}] {}/{}: skipped, {}", position, folder, file, reason);
                }
                FileOutcome::Failed(error) => {
                    report.failed += 1;
                    log::error!("[{}] {}/{}: {:#}", position, folder, file, error);
                }
            }
        }

        #[cfg(feature = "indicatif")]
        pb.finish_with_message("All files processed");

        report.cursor = cursor;
        let finished = Local::now();
        log::info!(
            "Batch finished at {} ({} processed, {} skipped, {} failed) in {}s",
            finished.format("%Y-%m-%d %H:%M:%S"),
            report.processed,
            report.skipped,
            report.failed,
            (finished - started).num_seconds()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProcessingConfig;

    #[test]
    fn test_cursor_resume() {
        let mut cursor = BatchCursor::new(2);
        let visited: Vec<(u64, bool)> = (0..4)
            .map(|_| {
                let position = cursor.advance();
                (position, cursor.should_process(position))
            })
            .collect();
        assert_eq!(visited, vec![(0, false), (1, false), (2, true), (3, true)]);
        assert_eq!(cursor.next, 4);
    }

    #[test]
    fn test_list_batch_files_two_levels_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for (folder, file) in [("b", "2.las"), ("a", "z.csv"), ("a", "m.las"), ("b", "1.las")] {
            std::fs::create_dir_all(dir.path().join(folder)).unwrap();
            std::fs::write(dir.path().join(folder).join(file), b"").unwrap();
        }
        std::fs::write(dir.path().join("stray.las"), b"").unwrap();
        std::fs::create_dir_all(dir.path().join("a").join("deeper")).unwrap();

        let files = list_batch_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a/m.las", "a/z.csv", "b/1.las", "b/2.las"]);
    }

    #[test]
    fn test_run_keeps_going_after_failures() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("input");
        std::fs::create_dir_all(root.join("plot")).unwrap();
        // Unparseable, too small, notes file
        std::fs::write(root.join("plot").join("a.csv"), "x,y\n1,2\n").unwrap();
        std::fs::write(
            root.join("plot").join("b.csv"),
            "x,y,z,intensity,classification\n1,2,3,4,2\n",
        )
        .unwrap();
        std::fs::write(root.join("plot").join("c.txt.md"), "notes").unwrap();

        let config = ProcessingConfig {
            work_dir: dir.path().join("data"),
            output_dir: dir.path().join("result"),
            ..ProcessingConfig::default()
        };
        let runner = BatchRunner::new(Lidar::new(config).unwrap());
        let report = runner.run(&root, BatchCursor::new(0)).unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.ignored, 1);
        assert_eq!(report.processed, 0);
        assert_eq!(report.cursor.next, 3);

        let report = runner.run(&root, BatchCursor::new(2)).unwrap();
        assert_eq!(report.passed_over, 2);
        assert_eq!(report.ignored, 1);
    }

    #[test]
    fn test_run_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let runner = BatchRunner::new(Lidar::new(ProcessingConfig::default()).unwrap());
        assert!(runner.run(&dir.path().join("nope"), BatchCursor::default()).is_err());
    }
}
