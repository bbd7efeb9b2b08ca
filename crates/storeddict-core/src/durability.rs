//! Crash-safe replacement of the backing file
//!
//! A snapshot is written to a temporary sibling, synced, and renamed over the
//! target, so a failed or interrupted write leaves the previous snapshot in
//! place. The sync primitive is the strongest one each platform offers.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

/// Flush file data to persistent storage before returning.
///
/// Platform behaviors:
/// - Linux: fdatasync()
/// - macOS/iOS: fcntl(F_FULLFSYNC), plain fsync only reaches the drive cache
/// - Windows: FlushFileBuffers()
/// - Other: file.sync_data()
pub fn durable_sync(file: &File) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: fd comes from a live File borrowed for the duration of the call.
        let result = unsafe { libc::fdatasync(fd) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: fd comes from a live File borrowed for the duration of the call.
        let result = unsafe { libc::fcntl(fd, libc::F_FULLFSYNC) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::io::AsRawHandle;
        use winapi::um::fileapi::FlushFileBuffers;
        let handle = file.as_raw_handle();
        // SAFETY: handle comes from a live File borrowed for the duration of the call.
        let result = unsafe { FlushFileBuffers(handle as *mut _) };
        if result != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "ios", target_os = "windows")))]
    {
        file.sync_data()
    }
}

/// Persist a rename by syncing the directory that holds it.
///
/// Directories cannot be opened for syncing on Windows; there the rename
/// itself is the durability point.
fn sync_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let handle = File::open(dir)?;
        handle.sync_all()
    }

    #[cfg(not(unix))]
    {
        let _ = dir;
        Ok(())
    }
}

/// Temporary sibling used while replacing `target`: `.name.tmp` in the same directory.
pub fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "storeddict".to_string());
    target.with_file_name(format!(".{}.tmp", name))
}

/// Atomically replace `target` with `contents`.
///
/// Creates the parent directory if needed. With `durable` set, the temporary
/// file is synced before the rename and the directory after it.
pub fn replace_file(target: &Path, contents: &[u8], durable: bool) -> StoreResult<()> {
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| StoreError::write(&parent, e))?;

    let tmp = temp_path(target);
    let result = write_temp(&tmp, contents, durable)
        .and_then(|()| fs::rename(&tmp, target).map_err(|e| StoreError::write(target, e)));

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
        return result;
    }

    if durable {
        sync_dir(&parent).map_err(|e| StoreError::write(&parent, e))?;
    }
    Ok(())
}

fn write_temp(tmp: &Path, contents: &[u8], durable: bool) -> StoreResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp)
        .map_err(|e| StoreError::write(tmp, e))?;
    file.write_all(contents).map_err(|e| StoreError::write(tmp, e))?;
    if durable {
        durable_sync(&file).map_err(|e| StoreError::write(tmp, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_durable_sync_success() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"test data for durable sync").unwrap();

        let result = durable_sync(file.as_file());
        assert!(result.is_ok(), "durable_sync failed: {:?}", result.err());
    }

    #[test]
    fn test_temp_path_is_hidden_sibling() {
        let tmp = temp_path(Path::new("/data/md/.re_md_dict.yml"));
        assert_eq!(tmp, PathBuf::from("/data/md/..re_md_dict.yml.tmp"));

        let tmp = temp_path(Path::new("md.yml"));
        assert_eq!(tmp, PathBuf::from(".md.yml.tmp"));
    }

    #[test]
    fn test_replace_file_creates_parent_and_overwrites() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("md.yml");

        replace_file(&target, b"first", true).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"first");

        replace_file(&target, b"second", false).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"second");

        assert!(!temp_path(&target).exists(), "temporary file left behind");
    }

    #[test]
    fn test_failed_replace_keeps_previous_contents() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("md.yml");
        replace_file(&target, b"good", true).unwrap();

        // A directory squatting on the temp path makes the write fail.
        fs::create_dir(temp_path(&target)).unwrap();
        let err = replace_file(&target, b"bad", true).unwrap_err();
        assert!(matches!(err, StoreError::StorageWrite { .. }));

        assert_eq!(fs::read(&target).unwrap(), b"good");
    }
}
