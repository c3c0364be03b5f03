#![forbid(unsafe_code)]

//! The download ledger: a flat JSON object mapping video ids to download
//! records, persisted pretty-printed so the published repository stays
//! diffable.
//!
//! The ledger is advisory. An entry only proves a download happened at some
//! point; callers must re-check the file on disk before trusting it (see
//! [`Ledger::has_valid_download`]).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One successfully downloaded audio track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRecord {
    pub id: String,
    pub title: String,
    /// Publicly reachable URL of the stored file, not the local path.
    pub file_path: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_at: Option<String>,
}

/// In-memory view of the ledger file, keyed by video id. `BTreeMap` keeps
/// the serialized output stable across runs.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ledger {
    entries: BTreeMap<String, DownloadRecord>,
}

impl Ledger {
    /// Loads the ledger, resetting to empty when the file is missing or
    /// unreadable. A corrupt ledger must never block a run; the validity
    /// checks on individual entries catch anything that was lost.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => Self { entries },
                Err(err) => {
                    eprintln!(
                        "Warning: could not parse {}, starting with an empty ledger: {}",
                        path.display(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                eprintln!(
                    "Warning: could not read {}, starting with an empty ledger: {}",
                    path.display(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Writes the ledger atomically (tmp file + rename) so a crash mid-save
    /// never leaves a truncated file behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let payload = serde_json::to_vec_pretty(&self.entries)
            .context("serializing download ledger")?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, payload)
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("finalizing {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&DownloadRecord> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, record: DownloadRecord) {
        self.entries.insert(record.id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True only when the record exists, claims a non-zero size, and the
    /// audio file is actually present on disk.
    pub fn has_valid_download(&self, id: &str, audio_path: &Path) -> bool {
        self.entries
            .get(id)
            .is_some_and(|record| record.size > 0 && audio_path.exists())
    }
}
