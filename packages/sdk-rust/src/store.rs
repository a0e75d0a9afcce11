//! JSON state file: the pool snapshot plus the local ledger and price it runs
//! against.

use std::{fs, path::Path};

use eth_stake::{PoolSnapshot, PriceQuote};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Error, Result},
    local::LedgerSnapshot,
};

pub const DEFAULT_STATE_PATH: &str = "./eth-stake-state.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateFile {
    pub pool: PoolSnapshot,
    #[serde(default)]
    pub ledger: LedgerSnapshot,
    #[serde(default)]
    pub price: Option<PriceQuote>,
}

pub fn load(path: &Path) -> Result<StateFile> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::StateNotFound(path.to_path_buf()))
        }
        Err(source) => return Err(Error::Io { path: path.to_path_buf(), source }),
    };
    let state = serde_json::from_str(&raw)?;
    debug!(path = %path.display(), "Loaded state");
    Ok(state)
}

/// Write pretty JSON next to `path`, then rename over it, so a crash never
/// leaves a truncated file behind.
pub fn save(path: &Path, state: &StateFile) -> Result<()> {
    let json = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|source| Error::Io { path: tmp.clone(), source })?;
    fs::rename(&tmp, path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    debug!(path = %path.display(), "Saved state");
    Ok(())
}
