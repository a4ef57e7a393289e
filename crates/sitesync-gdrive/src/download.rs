//! Ranged download of a remote file
//!
//! The content is fetched in [`CHUNK_SIZE`] ranges and appended to the local
//! target, checking for a pause before each range.

use std::path::Path;

use sitesync_core::ports::{fraction, ProgressThrottle};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::client::GDriveClient;
use crate::{GDriveError, CHUNK_SIZE};

/// Writes the `size` bytes of file `file_id` to `target`
///
/// `target` is truncated first. On error the partially written file is left
/// for the caller to remove.
pub async fn download_ranged(
    client: &GDriveClient,
    file_id: &str,
    size: u64,
    target: &Path,
    throttle: &mut ProgressThrottle<'_>,
) -> Result<(), GDriveError> {
    info!("Starting download: {} ({} bytes) -> {}", file_id, size, target.display());

    let mut out = tokio::fs::File::create(target).await?;
    let mut offset: u64 = 0;

    loop {
        throttle.check_paused().map_err(|_| GDriveError::Paused)?;
        throttle.tick(fraction(offset, size));
        if offset >= size {
            break;
        }

        let end = (offset + CHUNK_SIZE as u64).min(size) - 1;
        let bytes = client.download_range(file_id, offset, end).await?;
        if bytes.is_empty() {
            return Err(GDriveError::InvalidResponse(format!(
                "empty range {}-{} for {}",
                offset, end, file_id
            )));
        }
        out.write_all(&bytes).await?;
        offset += bytes.len() as u64;
    }

    out.flush().await?;
    throttle.finish();
    info!("Download completed: {}", target.display());
    Ok(())
}
