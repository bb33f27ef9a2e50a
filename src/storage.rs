use crate::errors::LedgerError;
use crate::models::LedgerData;
use std::path::Path;
use tokio::fs;
use tracing::error;

pub const DEFAULT_DATA_PATH: &str = "data/ledger.json";

/// Reads the data file. Only a missing file starts an empty store; a file that
/// cannot be read or parsed is an error so it is never overwritten.
pub async fn load_data(path: &Path) -> Result<LedgerData, LedgerError> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|err| {
            error!("failed to parse data file {}: {err}", path.display());
            LedgerError::storage(format!(
                "data file {} is not valid ledger data: {err}",
                path.display()
            ))
        }),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(LedgerData::default()),
        Err(err) => {
            error!("failed to read data file {}: {err}", path.display());
            Err(LedgerError::storage(format!(
                "failed to read data file {}: {err}",
                path.display()
            )))
        }
    }
}

/// Writes the whole snapshot to a sibling temp file and renames it over the
/// data file, so readers never observe a half-written file.
pub async fn persist_data(path: &Path, data: &LedgerData) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|err| LedgerError::storage(format!("failed to prepare data directory: {err}")))?;
    }

    let payload = serde_json::to_vec_pretty(data)
        .map_err(|err| LedgerError::storage(format!("failed to encode ledger data: {err}")))?;

    let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
    replace_file(&temp_path, path, &payload).await
}

// The temp file is removed on either failure so no partial snapshot lingers.
async fn replace_file(temp_path: &Path, path: &Path, payload: &[u8]) -> Result<(), LedgerError> {
    if let Err(err) = fs::write(temp_path, payload).await {
        let _ = fs::remove_file(temp_path).await;
        return Err(LedgerError::storage(format!(
            "failed to write ledger data: {err}"
        )));
    }

    if let Err(err) = fs::rename(temp_path, path).await {
        let _ = fs::remove_file(temp_path).await;
        return Err(LedgerError::storage(format!(
            "failed to finalize ledger data: {err}"
        )));
    }

    Ok(())
}
