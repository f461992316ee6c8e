use std::path::Path;

use tally_core::Transaction;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::error::StorageError;

/// Appends `tx` as a journal entry, separated from what precedes it by a blank line.
pub async fn append_transaction(journal: &Path, tx: &Transaction) -> Result<(), StorageError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(journal)
        .await?;

    file.write_all(format!("\n\n{tx}\n").as_bytes()).await?;
    file.flush().await?;

    tracing::info!(journal = %journal.display(), payee = %tx.payee, "transaction appended");
    Ok(())
}
