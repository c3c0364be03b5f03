#![forbid(unsafe_code)]

//! Download orchestration: walks the channel listing, skips entries the
//! ledger already proves valid, and drives the fetcher with bounded retries
//! and linear backoff. One bad video never aborts the run; only broken
//! local storage does.

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::fetch::AudioFetcher;
use crate::ledger::{DownloadRecord, Ledger};
use crate::listing::Video;
use crate::publish::Publisher;

pub const MAX_ATTEMPTS: u32 = 3;
pub const BACKOFF_BASE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    /// Public URL prefix recorded in the ledger's `filePath` field.
    pub file_base_url: String,
}

impl SyncOptions {
    pub fn new(file_base_url: impl Into<String>) -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            backoff_base: BACKOFF_BASE,
            file_base_url: file_base_url.into(),
        }
    }
}

/// Per-run tallies, printed at the end of the run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

fn display_title(video: &Video) -> &str {
    if video.title.is_empty() {
        &video.id
    } else {
        &video.title
    }
}

fn remove_partial(path: &Path) {
    if path.exists()
        && let Err(err) = fs::remove_file(path)
    {
        eprintln!(
            "  Warning: could not remove partial file {}: {}",
            path.display(),
            err
        );
    }
}

/// Processes every listed video sequentially. The `sleep` closure is the
/// backoff delay; production passes `std::thread::sleep`, tests inject a
/// recorder.
///
/// Fetch failures are retried up to `options.max_attempts` with a delay of
/// `backoff_base × attempt` between attempts (never after the last one).
/// Publish failures are logged and do not demote a successful download.
/// Ledger persistence failures abort the run: local storage is broken and
/// every further item would hit the same wall.
#[allow(clippy::too_many_arguments)]
pub fn sync_videos<F, P>(
    videos: &[Video],
    ledger: &mut Ledger,
    ledger_path: &Path,
    audio_dir: &Path,
    fetcher: &F,
    publisher: &P,
    options: &SyncOptions,
    mut sleep: impl FnMut(Duration),
) -> Result<RunSummary>
where
    F: AudioFetcher + ?Sized,
    P: Publisher + ?Sized,
{
    let total = videos.len();
    let mut summary = RunSummary::default();

    for (index, video) in videos.iter().enumerate() {
        let current = index + 1;
        let file_name = format!("{}.mp3", video.id);
        let audio_path = audio_dir.join(&file_name);

        if ledger.has_valid_download(&video.id, &audio_path) {
            println!(
                "[{current}/{total}] Skipping {}, already downloaded and valid.",
                display_title(video)
            );
            summary.skipped += 1;
            continue;
        }

        println!(
            "[{current}/{total}] Downloading {} ({})",
            display_title(video),
            video.id
        );

        let mut succeeded = false;
        for attempt in 1..=options.max_attempts {
            match fetcher.fetch(&video.id, &audio_path) {
                Ok(size) => {
                    ledger.insert(DownloadRecord {
                        id: video.id.clone(),
                        title: video.title.clone(),
                        file_path: format!("{}{}", options.file_base_url, file_name),
                        size,
                        downloaded_at: Some(Utc::now().to_rfc3339()),
                    });
                    ledger
                        .save(ledger_path)
                        .with_context(|| format!("persisting ledger after {}", video.id))?;
                    println!("  Downloaded {} ({} bytes)", audio_path.display(), size);

                    if let Err(err) = publisher.publish(&audio_path, ledger_path, &video.id) {
                        eprintln!("  Warning: publish failed for {}: {}", video.id, err);
                    }

                    succeeded = true;
                    break;
                }
                Err(err) => {
                    eprintln!(
                        "  Warning: attempt {attempt}/{} failed for {}: {}",
                        options.max_attempts, video.id, err
                    );
                    // A stale partial must never be mistaken for a finished
                    // download by a later run.
                    remove_partial(&audio_path);
                    if attempt < options.max_attempts {
                        sleep(options.backoff_base * attempt);
                    }
                }
            }
        }

        if succeeded {
            summary.downloaded += 1;
        } else {
            eprintln!(
                "  Giving up on {} after {} attempts.",
                video.id, options.max_attempts
            );
            summary.failed += 1;
        }
    }

    Ok(summary)
}
