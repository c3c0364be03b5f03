#![forbid(unsafe_code)]

//! Publishing side effect: stage the new audio file plus the ledger, commit,
//! and push. Publishing is deliberately non-fatal to a download — the file
//! and ledger entry are already durable by the time it runs, and an unpushed
//! commit rides along with the next successful push.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
#[cfg(test)]
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

pub const DEFAULT_AUTHOR_NAME: &str = "github-actions";
pub const DEFAULT_AUTHOR_EMAIL: &str = "github-actions@github.com";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not run git {step}: {source}")]
    Io {
        step: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("git {step} exited with {status}: {stderr}")]
    Command {
        step: &'static str,
        status: ExitStatus,
        stderr: String,
    },
}

/// Seam for the orchestrator; lets tests observe publishes without a git
/// repository.
pub trait Publisher {
    fn publish(
        &self,
        audio_path: &Path,
        ledger_path: &Path,
        video_id: &str,
    ) -> Result<(), PublishError>;
}

#[cfg(test)]
static GIT_STUB: Mutex<Option<PathBuf>> = Mutex::new(None);
#[cfg(test)]
static STUB_USE_LOCK: Mutex<()> = Mutex::new(());

fn git_command() -> Command {
    #[cfg(test)]
    {
        if let Some(path) = GIT_STUB.lock().unwrap().clone() {
            return Command::new(path);
        }
    }
    Command::new("git")
}

#[cfg(test)]
fn set_git_stub_path(path: PathBuf) -> GitStubGuard {
    let guard = STUB_USE_LOCK.lock().unwrap();
    {
        let mut lock = GIT_STUB.lock().unwrap();
        *lock = Some(path);
    }
    GitStubGuard { lock: Some(guard) }
}

#[cfg(test)]
struct GitStubGuard {
    lock: Option<MutexGuard<'static, ()>>,
}

#[cfg(test)]
impl Drop for GitStubGuard {
    fn drop(&mut self) {
        *GIT_STUB.lock().unwrap() = None;
        self.lock.take();
    }
}

/// Publishes downloads by committing them to the git repository at
/// `work_dir` and pushing to its configured remote.
pub struct GitPublisher {
    work_dir: PathBuf,
    author_name: String,
    author_email: String,
}

impl GitPublisher {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            author_name: DEFAULT_AUTHOR_NAME.to_string(),
            author_email: DEFAULT_AUTHOR_EMAIL.to_string(),
        }
    }

    pub fn with_identity(
        work_dir: impl Into<PathBuf>,
        author_name: impl Into<String>,
        author_email: impl Into<String>,
    ) -> Self {
        Self {
            work_dir: work_dir.into(),
            author_name: author_name.into(),
            author_email: author_email.into(),
        }
    }

    fn run_git(
        &self,
        step: &'static str,
        args: impl IntoIterator<Item = impl AsRef<OsStr>>,
    ) -> Result<(), PublishError> {
        let output = git_command()
            .current_dir(&self.work_dir)
            .args(args)
            .output()
            .map_err(|source| PublishError::Io { step, source })?;

        if !output.status.success() {
            return Err(PublishError::Command {
                step,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl Publisher for GitPublisher {
    fn publish(
        &self,
        audio_path: &Path,
        ledger_path: &Path,
        video_id: &str,
    ) -> Result<(), PublishError> {
        // Identity is configured locally (not --global) so the tool never
        // rewrites the invoking user's git configuration.
        self.run_git(
            "config",
            [
                OsStr::new("config"),
                OsStr::new("user.name"),
                OsStr::new(&self.author_name),
            ],
        )?;
        self.run_git(
            "config",
            [
                OsStr::new("config"),
                OsStr::new("user.email"),
                OsStr::new(&self.author_email),
            ],
        )?;
        self.run_git(
            "add",
            [
                OsStr::new("add"),
                audio_path.as_os_str(),
                ledger_path.as_os_str(),
            ],
        )?;
        let message = format!("Add downloaded audio for {video_id}");
        self.run_git(
            "commit",
            [OsStr::new("commit"), OsStr::new("-m"), OsStr::new(&message)],
        )?;
        self.run_git("push", [OsStr::new("push")])?;
        println!("  Committed and pushed {}", audio_path.display());
        Ok(())
    }
}

/// Used for `--no-publish` runs: downloads land on disk and in the ledger
/// but nothing touches git.
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    fn publish(
        &self,
        _audio_path: &Path,
        _ledger_path: &Path,
        _video_id: &str,
    ) -> Result<(), PublishError> {
        Ok(())
    }
}
