//! SDK error type.

use std::path::PathBuf;

use eth_stake::{LedgerError, StakeError};

/// All errors returned by the ETH-Stake SDK.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Engine ───────────────────────────────────────────────────────────────
    #[error(transparent)]
    Stake(#[from] StakeError),

    /// A custody transfer made by the client itself (not by the pool) failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // ── Persistence ──────────────────────────────────────────────────────────
    #[error("No pool state at {0} — run `eth-stake init` first")]
    StateNotFound(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    // ── Validation ───────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience alias so every module can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;
