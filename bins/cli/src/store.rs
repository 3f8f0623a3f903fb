//! JSON file persistence for ledger snapshots.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tally_core::LedgerSnapshot;
use tally_shared::{AppError, AppResult};

/// Read the snapshot at `path`; a missing file is an empty ledger.
pub fn load(path: &Path) -> AppResult<LedgerSnapshot> {
    match fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw)
            .map_err(|e| AppError::Storage(format!("{}: {e}", path.display()))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(LedgerSnapshot::new()),
        Err(e) => Err(AppError::Storage(format!("{}: {e}", path.display()))),
    }
}

/// Write the snapshot to `path`, replacing the old file only once the new one
/// is fully written.
pub fn save(path: &Path, snapshot: &LedgerSnapshot) -> AppResult<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, json)?;
    fs::rename(&staging, path)?;
    Ok(())
}
