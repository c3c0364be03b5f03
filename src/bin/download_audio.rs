#![forbid(unsafe_code)]

//! Command-line tool that mirrors a channel's audio tracks.
//!
//! One run does the whole pipeline: list the channel, download every video's
//! audio that the ledger does not already prove valid, record each download
//! in the JSON ledger, and commit the new files to the surrounding git
//! checkout. Designed to be re-run from cron or CI; finished items are
//! skipped, so interrupted runs simply resume.

use anyhow::{Context, Result, bail};
use audiotube_tools::config::{self, RuntimeSettings, SettingsOverrides, resolve_runtime_settings};
use audiotube_tools::fetch::CobaltFetcher;
use audiotube_tools::ledger::Ledger;
use audiotube_tools::listing::ChannelLister;
use audiotube_tools::preflight::{ensure_not_root, ensure_program_available};
use audiotube_tools::publish::{GitPublisher, NoopPublisher, Publisher};
use audiotube_tools::sync::{SyncOptions, sync_videos};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

const AUDIO_SUBDIR: &str = "audio";
const LEDGER_FILE: &str = "downloads.json";

/// Filesystem locations this binary touches, all rooted in `DATA_ROOT`,
/// which is expected to be (inside) the git checkout used for publishing.
struct Paths {
    base: PathBuf,
    audio: PathBuf,
    ledger: PathBuf,
}

impl Paths {
    fn with_root(data_root: &Path) -> Self {
        let base = data_root.to_path_buf();
        let audio = base.join(AUDIO_SUBDIR);
        let ledger = base.join(LEDGER_FILE);
        Self {
            base,
            audio,
            ledger,
        }
    }

    /// Creates the audio directory so the downloader can assume it exists.
    fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.audio)
            .with_context(|| format!("creating {}", self.audio.display()))?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct DownloaderArgs {
    settings: RuntimeSettings,
    via_proxy: bool,
    no_publish: bool,
}

impl DownloaderArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(env::args().skip(1))
    }

    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut data_root: Option<PathBuf> = None;
        let mut channel_api: Option<String> = None;
        let mut cobalt_api: Option<String> = None;
        let mut channel_id: Option<String> = None;
        let mut file_base_url: Option<String> = None;
        let mut via_proxy = false;
        let mut no_publish = false;
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--data-root=") {
                data_root = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--channel-api=") {
                channel_api = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--cobalt-api=") {
                cobalt_api = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--channel-id=") {
                channel_id = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--file-base-url=") {
                file_base_url = Some(value.to_string());
                continue;
            }

            match arg.as_str() {
                "--data-root" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--data-root requires a value"))?;
                    data_root = Some(PathBuf::from(value));
                }
                "--channel-api" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--channel-api requires a value"))?;
                    channel_api = Some(value);
                }
                "--cobalt-api" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--cobalt-api requires a value"))?;
                    cobalt_api = Some(value);
                }
                "--channel-id" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--channel-id requires a value"))?;
                    channel_id = Some(value);
                }
                "--file-base-url" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--file-base-url requires a value"))?;
                    file_base_url = Some(value);
                }
                "--via-proxy" => {
                    via_proxy = true;
                }
                "--no-publish" => {
                    no_publish = true;
                }
                _ => {
                    bail!(
                        "unknown argument: {arg}\nUsage: download_audio [--data-root <path>] [--channel-id <id>] [--channel-api <url>] [--cobalt-api <url>] [--file-base-url <url>] [--via-proxy] [--no-publish]"
                    );
                }
            }
        }

        let settings = resolve_runtime_settings(SettingsOverrides {
            data_root,
            channel_api,
            cobalt_api,
            channel_id,
            file_base_url,
            ..SettingsOverrides::default()
        })?;

        Ok(Self {
            settings,
            via_proxy,
            no_publish,
        })
    }
}

fn main() -> Result<()> {
    ensure_not_root("download_audio")?;

    let DownloaderArgs {
        settings,
        via_proxy,
        no_publish,
    } = DownloaderArgs::parse()?;

    if !no_publish {
        ensure_program_available("git")?;
    }

    let paths = Paths::with_root(&settings.data_root);
    paths.prepare()?;
    let mut ledger = Ledger::load(&paths.ledger);

    println!("===================================");
    println!("Channel Audio Downloader");
    println!("===================================");
    println!("Channel: {}", settings.channel_id);
    println!("Base directory: {}", paths.base.display());
    println!("Ledger: {} ({} entries)", paths.ledger.display(), ledger.len());
    println!();

    println!("Fetching videos for channel {}...", settings.channel_id);
    let lister = ChannelLister::new(settings.channel_api.clone());
    let videos = lister
        .list(&settings.channel_id)
        .context("fetching channel listing")?;
    println!("Found {} videos. Checking for new downloads...", videos.len());
    println!();

    let conversion_base = config::conversion_api_base(&settings.cobalt_api, via_proxy);
    let fetcher = CobaltFetcher::new(conversion_base);
    let publisher: Box<dyn Publisher> = if no_publish {
        Box::new(NoopPublisher)
    } else {
        Box::new(GitPublisher::new(&paths.base))
    };
    let options = SyncOptions::new(settings.file_base_url.clone());

    let summary = sync_videos(
        &videos,
        &mut ledger,
        &paths.ledger,
        &paths.audio,
        &fetcher,
        publisher.as_ref(),
        &options,
        thread::sleep,
    )?;

    println!();
    println!("===================================");
    println!("Run complete");
    println!("===================================");
    println!("Downloaded: {}", summary.downloaded);
    println!("Skipped:    {}", summary.skipped);
    println!("Failed:     {}", summary.failed);
    println!("Audio directory: {}", paths.audio.display());
    println!("Ledger: {}", paths.ledger.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env_file(vars: &[(&str, &str)], f: impl FnOnce()) {
        let _lock = ENV_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut contents = String::new();
        for (key, value) in vars {
            contents.push_str(&format!("{key}=\"{value}\"\n"));
        }
        fs::write(dir.path().join(".env"), contents).unwrap();
        let cwd = env::current_dir().unwrap();
        env::set_current_dir(dir.path()).unwrap();
        f();
        env::set_current_dir(cwd).unwrap();
    }

    #[test]
    fn downloader_args_use_env_file() {
        let mut parsed = None;
        with_env_file(&[("DATA_ROOT", "/data"), ("CHANNEL_ID", "chan42")], || {
            parsed = Some(DownloaderArgs::from_slice(&[]).unwrap());
        });
        let args = parsed.unwrap();
        assert_eq!(args.settings.data_root, PathBuf::from("/data"));
        assert_eq!(args.settings.channel_id, "chan42");
        assert!(!args.via_proxy);
        assert!(!args.no_publish);
    }

    #[test]
    fn downloader_args_flags_override_env() {
        let mut parsed = None;
        with_env_file(&[("DATA_ROOT", "/data"), ("CHANNEL_ID", "chan42")], || {
            parsed = Some(
                DownloaderArgs::from_slice(&[
                    "--data-root",
                    "/other",
                    "--channel-id=chan7",
                    "--via-proxy",
                    "--no-publish",
                ])
                .unwrap(),
            );
        });
        let args = parsed.unwrap();
        assert_eq!(args.settings.data_root, PathBuf::from("/other"));
        assert_eq!(args.settings.channel_id, "chan7");
        assert!(args.via_proxy);
        assert!(args.no_publish);
    }

    #[test]
    fn downloader_args_reject_unknown_flags() {
        let mut outcome = None;
        with_env_file(&[("DATA_ROOT", "/data")], || {
            outcome = Some(DownloaderArgs::from_slice(&["--bogus"]));
        });
        let err = outcome.unwrap().unwrap_err();
        assert!(err.to_string().contains("unknown argument"));
    }

    #[test]
    fn downloader_args_require_data_root() {
        let mut outcome = None;
        with_env_file(&[], || {
            outcome = Some(DownloaderArgs::from_slice(&["--channel-id", "c"]));
        });
        let err = outcome.unwrap().unwrap_err();
        assert!(err.to_string().contains("DATA_ROOT"));
    }

    #[test]
    fn paths_prepare_creates_audio_directory() {
        let temp = tempfile::tempdir().unwrap();
        let paths = Paths::with_root(temp.path());
        paths.prepare().unwrap();
        assert!(paths.audio.is_dir());
        assert_eq!(paths.ledger, temp.path().join(LEDGER_FILE));
        assert_eq!(paths.base, temp.path());
    }
}
