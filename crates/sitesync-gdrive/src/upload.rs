//! Resumable upload of a local file
//!
//! The file is sent in [`CHUNK_SIZE`] chunks through a resumable session.
//! Before each chunk the observer is asked whether to stop, and progress is
//! reported through a [`ProgressThrottle`].
//!
//! ## Drive API References
//!
//! - [Resumable upload](https://developers.google.com/drive/api/guides/manage-uploads#resumable)

use std::io::SeekFrom;
use std::path::Path;

use sitesync_core::ports::{fraction, ProgressThrottle};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info};

use crate::client::{ChunkStatus, GDriveClient};
use crate::{GDriveError, CHUNK_SIZE};

/// Reads until `buf` is full or the reader is exhausted
pub(crate) async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut R,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Uploads `source` into an already opened session, returns the file id
pub async fn upload_resumable(
    client: &GDriveClient,
    session_url: &str,
    source: &Path,
    size: u64,
    throttle: &mut ProgressThrottle<'_>,
) -> Result<String, GDriveError> {
    info!(
        "Starting upload: {} ({} bytes, {} chunks)",
        source.display(),
        size,
        size.div_ceil(CHUNK_SIZE as u64)
    );

    let mut file = tokio::fs::File::open(source).await?;
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut offset: u64 = 0;

    loop {
        throttle.check_paused().map_err(|_| GDriveError::Paused)?;
        throttle.tick(fraction(offset, size));

        let n = read_chunk(&mut file, &mut buf).await?;
        let status = client
            .upload_chunk(session_url, buf[..n].to_vec(), offset, size)
            .await?;

        match status {
            ChunkStatus::Complete(id) => {
                throttle.finish();
                info!("Upload completed: {} -> {}", source.display(), id);
                return Ok(id);
            }
            ChunkStatus::Incomplete { next_offset } => {
                if n == 0 {
                    return Err(GDriveError::InvalidResponse(
                        "upload session did not complete after the last chunk".into(),
                    ));
                }
                let expected = offset + n as u64;
                if next_offset != expected {
                    debug!(next_offset, expected, "Server asked to resend from offset");
                    file.seek(SeekFrom::Start(next_offset)).await?;
                }
                offset = next_offset;
            }
        }
    }
}
