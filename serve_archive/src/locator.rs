use std::path::{Component, Path, PathBuf};

use crate::error::ArchiveError;

/// Resolve `identifier` to an existing directory directly under `base_path`.
pub async fn locate(base_path: &Path, identifier: &str) -> Result<PathBuf, ArchiveError> {
    // Only a single plain component may be joined onto the root
    let mut components = Path::new(identifier).components();
    let name = match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => name,
        _ => return Err(ArchiveError::not_found(identifier)),
    };

    let path = base_path.join(name);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_dir() => Ok(path),
        _ => Err(ArchiveError::not_found(identifier)),
    }
}
