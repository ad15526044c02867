//! Crash-safe file writes.

use std::io::Write;
use std::path::Path;

use tracing::trace;

/// Write `data` to `path` through a temporary sibling file and a rename.
///
/// A crash mid-write leaves the previous file (or nothing) at `path`.
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;

    trace!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}
