//! 7-zip archive handling for extractors that download compressed bundles

use std::path::Path;
use tracing::{debug, warn};

use crate::error::{EtlError, Result};

/// Unpack a 7-zip archive into `dest`, then delete the archive
///
/// The archive is kept when unpacking fails so the download can be inspected.
pub fn extract_7z(archive: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;

    sevenz_rust::decompress_file(archive, dest).map_err(|e| {
        warn!(
            archive = %archive.display(),
            error = %e,
            "Failed to unpack archive"
        );
        EtlError::Archive(format!("{}: {}", archive.display(), e))
    })?;

    std::fs::remove_file(archive)?;
    debug!(archive = %archive.display(), dest = %dest.display(), "Unpacked and removed archive");
    Ok(())
}
