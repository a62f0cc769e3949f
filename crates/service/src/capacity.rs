//! Local staging-area collaborators: disk utilization probe and bundle
//! deletion on the management host's filesystem.

use async_trait::async_trait;

use crate::collaborators::{ArtifactStorage, CapacityProbe, StorageError};

/// [`CapacityProbe`] backed by `statvfs` on the staging path.
pub struct LocalDiskProbe;

#[async_trait]
impl CapacityProbe for LocalDiskProbe {
    async fn utilization_at(&self, path: &str) -> Result<f64, StorageError> {
        let owned = path.to_string();
        tokio::task::spawn_blocking(move || statvfs_utilization(&owned))
            .await
            .map_err(|e| StorageError {
                location: path.to_string(),
                reason: format!("disk probe task failed: {e}"),
            })?
    }
}

/// Used fraction of the filesystem holding `path`.
fn statvfs_utilization(path: &str) -> Result<f64, StorageError> {
    use std::ffi::CString;
    use std::mem::MaybeUninit;

    let c_path = CString::new(path).map_err(|_| StorageError {
        location: path.to_string(),
        reason: "path contains NUL byte".to_string(),
    })?;
    let mut stat = MaybeUninit::<libc::statvfs>::uninit();

    // Safety: c_path is a valid NUL-terminated string and stat points at
    // properly sized uninitialized memory.
    let ret = unsafe { libc::statvfs(c_path.as_ptr(), stat.as_mut_ptr()) };
    if ret != 0 {
        return Err(StorageError {
            location: path.to_string(),
            reason: format!("statvfs failed: {}", std::io::Error::last_os_error()),
        });
    }

    let stat = unsafe { stat.assume_init() };
    let block_size = stat.f_frsize as u64;
    let total = stat.f_blocks as u64 * block_size;
    let free = stat.f_bavail as u64 * block_size;
    if total == 0 {
        return Ok(0.0);
    }
    Ok(total.saturating_sub(free) as f64 / total as f64)
}

/// [`ArtifactStorage`] that removes staged bundles from the local filesystem.
pub struct LocalDiskStorage;

#[async_trait]
impl ArtifactStorage for LocalDiskStorage {
    async fn delete(&self, location: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(location).await {
            Ok(()) => Ok(()),
            // Already gone counts as deleted; GC retries must converge.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError {
                location: location.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
