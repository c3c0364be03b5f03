#![forbid(unsafe_code)]

//! Library backing the `download_audio` binary: mirrors a channel's audio
//! tracks into a git-published directory, keeping a JSON ledger of what has
//! already been fetched.

pub mod config;
pub mod fetch;
pub mod ledger;
pub mod listing;
pub mod preflight;
pub mod publish;
pub mod sync;
