use std::fs::{DirBuilder, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};

/// Create the database file, and any missing parent directories, readable by
/// the owner only.
///
/// Existing directories and files keep their permissions. SQLite gives the
/// `-wal` and `-shm` sidecars the mode of the main file.
pub(crate) fn prepare_db_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        let mut dirs = DirBuilder::new();
        dirs.recursive(true);
        #[cfg(unix)]
        std::os::unix::fs::DirBuilderExt::mode(&mut dirs, 0o700);
        dirs.create(parent)
            .with_context(|| format!("Failed to create store directory: {}", parent.display()))?;
    }

    let mut file = OpenOptions::new();
    file.create(true).truncate(false).read(true).write(true);
    #[cfg(unix)]
    std::os::unix::fs::OpenOptionsExt::mode(&mut file, 0o600);
    file.open(path)
        .with_context(|| format!("Failed to create store file: {}", path.display()))?;
    Ok(())
}
