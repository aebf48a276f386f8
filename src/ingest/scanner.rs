use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use anyhow::{Result, Context, bail, ensure};
use crossbeam::channel::{bounded, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{error, info, trace, warn};
use walkdir::WalkDir;
use crate::ingest::extractor::{Container, TagExtractor};
use crate::ingest::loader::{BatchLoader, FlushSummary};
use crate::utils::config::{Settings, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_WORKERS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub max_workers: usize,
    pub buffer_size: usize,
    pub progress: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            buffer_size: DEFAULT_BUFFER_SIZE,
            progress: false,
        }
    }
}

impl From<&Settings> for ScanOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            max_workers: settings.max_workers,
            buffer_size: settings.buffer_size,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub files_found: usize,
    pub recognized: usize,
    pub extracted: usize,
    pub failed: usize,
    pub flushes: usize,
    pub loaded: FlushSummary,
}

/// Walks a library directory and feeds every recognized audio file through
/// a fixed pool of extraction workers into the batch loader.
pub struct Scanner {
    extractor: Arc<dyn TagExtractor>,
    loader: Arc<BatchLoader>,
    options: ScanOptions,
}

impl Scanner {
    pub fn new(extractor: Arc<dyn TagExtractor>, loader: Arc<BatchLoader>, options: ScanOptions) -> Self {
        Self { extractor, loader, options }
    }

    pub fn scan(&self, root: &Path) -> Result<ScanSummary> {
        ensure!(root.is_dir(), "Library path {:?} is not a directory", root);
        ensure!(self.options.max_workers >= 1, "Scanner needs at least one worker");

        let workers = self.options.max_workers;
        info!("Scanning {:?} with up to {} extraction workers", root, workers);

        // A full channel blocks the walker, so no more than `workers`
        // extractions ever run at once.
        let (path_tx, path_rx) = bounded::<PathBuf>(workers);
        let extracted = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = path_rx.clone();
            let extractor = Arc::clone(&self.extractor);
            let loader = Arc::clone(&self.loader);
            let extracted = Arc::clone(&extracted);
            let failed = Arc::clone(&failed);

            handles.push(thread::spawn(move || {
                for path in rx {
                    // A panic inside a tag parser costs this file only; the
                    // worker keeps draining the channel.
                    match panic::catch_unwind(AssertUnwindSafe(|| extractor.extract(&path))) {
                        Ok(Ok(track)) => {
                            loader.enqueue(track);
                            extracted.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(Err(e)) => {
                            warn!("Failed to read tags from {:?}: {}", path, e);
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(cause) => {
                            warn!("Tag reader panicked on {:?}: {}", path, panic_message(&*cause));
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            }));
        }
        drop(path_rx);

        let progress = self.progress_bar()?;
        let mut summary = ScanSummary::default();
        let walked = self.walk(root, &path_tx, &mut summary, &progress);

        // Closing the channel lets the workers drain what is left and exit.
        drop(path_tx);
        for handle in handles {
            if handle.join().is_err() {
                error!("Extraction worker panicked");
            }
        }
        walked?;

        let flushed = self
            .loader
            .flush()
            .context("Fatal integrity error while loading catalog")?;
        summary.flushes += 1;
        summary.loaded.absorb(&flushed);

        summary.extracted = extracted.load(Ordering::Relaxed);
        summary.failed = failed.load(Ordering::Relaxed);
        progress.finish_and_clear();

        info!(
            "Scan finished: {} files, {} audio, {} tagged, {} failed, {} new songs",
            summary.files_found, summary.recognized, summary.extracted, summary.failed, summary.loaded.inserted
        );
        Ok(summary)
    }

    fn walk(
        &self,
        root: &Path,
        tx: &Sender<PathBuf>,
        summary: &mut ScanSummary,
        progress: &ProgressBar,
    ) -> Result<()> {
        for entry in WalkDir::new(root) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            summary.files_found += 1;
            if Container::from_path(entry.path()).is_none() {
                trace!("Ignoring {:?}", entry.path());
                continue;
            }

            summary.recognized += 1;
            progress.inc(1);

            if tx.send(entry.into_path()).is_err() {
                bail!("Extraction workers stopped before the scan finished");
            }

            if self.loader.pending() >= self.options.buffer_size {
                let flushed = self
                    .loader
                    .flush()
                    .context("Fatal integrity error while loading catalog")?;
                summary.flushes += 1;
                summary.loaded.absorb(&flushed);
                progress.set_message(format!("{} songs loaded", summary.loaded.inserted));
            }
        }

        Ok(())
    }

    fn progress_bar(&self) -> Result<ProgressBar> {
        if !self.options.progress {
            return Ok(ProgressBar::hidden());
        }

        let progress = ProgressBar::new_spinner();
        progress.set_style(ProgressStyle::with_template("{spinner} {pos} audio files found {msg}")?);
        progress.enable_steady_tick(Duration::from_millis(120));
        Ok(progress)
    }
}

fn panic_message(cause: &(dyn Any + Send)) -> &str {
    if let Some(message) = cause.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown cause"
    }
}
