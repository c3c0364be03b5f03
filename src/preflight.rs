#![forbid(unsafe_code)]

//! Startup preconditions shared by the binaries.

use anyhow::{Result, bail};
use nix::unistd::Uid;
use std::process::{Command, Stdio};

/// Refuses to run as root. The tool writes into a git checkout owned by a
/// regular user; running it privileged only produces root-owned files that
/// break later unprivileged runs.
pub fn ensure_not_root(process: &str) -> Result<()> {
    ensure_not_root_for(Uid::current(), process)
}

fn ensure_not_root_for(uid: Uid, process: &str) -> Result<()> {
    if uid.is_root() {
        bail!("{process} must not be run as root; use a regular user account");
    }
    Ok(())
}

/// Runs `<name> --version` so a missing external tool (git) fails loudly
/// before any download work starts.
pub fn ensure_program_available(name: &str) -> Result<()> {
    let status = Command::new(name)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => bail!("{} is installed but returned a failure status", name),
        Err(err) => bail!("{} is not installed or not in PATH: {}", name, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_not_root_allows_unprivileged_uid() {
        let uid = Uid::from_raw(1000);
        assert!(ensure_not_root_for(uid, "tester").is_ok());
    }

    #[test]
    fn ensure_not_root_rejects_root_uid() {
        let uid = Uid::from_raw(0);
        let err = ensure_not_root_for(uid, "tester").unwrap_err();
        assert!(err.to_string().contains("must not be run as root"));
    }

    #[test]
    fn ensure_program_available_reports_missing_binary() {
        let err = ensure_program_available("definitely-not-a-real-tool").unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }
}
