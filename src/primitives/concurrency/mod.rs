#![allow(unsafe_code)]

use std::fs::File;
use std::io;

use tracing::warn;

use crate::types::Result;

/// Exclusive advisory lock over a whole open file.
///
/// The lock is cooperative: it only excludes other processes that take the
/// same lock before touching the file. It is released when the guard is
/// dropped or explicitly through [`FileLock::unlock`].
#[derive(Debug)]
pub struct FileLock<'a> {
    file: Option<&'a File>,
}

impl<'a> FileLock<'a> {
    /// Blocks until the exclusive lock on `file` is held.
    pub fn acquire(file: &'a File) -> Result<Self> {
        lock_range_inner(file, 0, WHOLE_FILE, true)?;
        Ok(Self { file: Some(file) })
    }

    /// Takes the lock when it is free, returning `None` otherwise.
    pub fn try_acquire(file: &'a File) -> Result<Option<Self>> {
        if lock_range_inner(file, 0, WHOLE_FILE, false)? {
            Ok(Some(Self { file: Some(file) }))
        } else {
            Ok(None)
        }
    }

    /// Releases the lock, reporting failures instead of logging them.
    pub fn unlock(mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => unlock_range(file, 0, WHOLE_FILE).map_err(Into::into),
            None => Ok(()),
        }
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(err) = unlock_range(file, 0, WHOLE_FILE) {
                warn!(error = %err, "file_lock.unlock_failed");
            }
        }
    }
}

/// Length covering the file regardless of its current size.
#[cfg(unix)]
const WHOLE_FILE: u64 = 0;
#[cfg(not(unix))]
const WHOLE_FILE: u64 = u64::MAX;

fn lock_range_inner(file: &File, start: u64, len: u64, blocking: bool) -> io::Result<bool> {
    #[cfg(unix)]
    {
        unix::lock_region(file, start, len, blocking)
    }
    #[cfg(windows)]
    {
        windows::lock_region(file, start, len, blocking)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (file, start, len, blocking);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file locking unsupported on this platform",
        ))
    }
}

fn unlock_range(file: &File, start: u64, len: u64) -> io::Result<()> {
    #[cfg(unix)]
    {
        unix::unlock_region(file, start, len)
    }
    #[cfg(windows)]
    {
        windows::unlock_region(file, start, len)
    }
    #[cfg(not(any(unix, windows)))]
    {
        let _ = (file, start, len);
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "file locking unsupported on this platform",
        ))
    }
}

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::io::AsRawFd;

    pub fn lock_region(file: &File, start: u64, len: u64, blocking: bool) -> io::Result<bool> {
        let fd = file.as_raw_fd();
        let mut flock = libc::flock {
            l_type: libc::F_WRLCK as _,
            l_whence: libc::SEEK_SET as _,
            l_start: start as libc::off_t,
            l_len: len as libc::off_t,
            l_pid: 0,
        };
        let cmd = if blocking {
            libc::F_SETLKW
        } else {
            libc::F_SETLK
        };
        loop {
            let res = unsafe { libc::fcntl(fd, cmd, &mut flock) };
            if res == 0 {
                return Ok(true);
            }
            let err = io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::EINTR) => continue,
                Some(libc::EAGAIN) | Some(libc::EACCES) if !blocking => return Ok(false),
                _ => return Err(err),
            }
        }
    }

    pub fn unlock_region(file: &File, start: u64, len: u64) -> io::Result<()> {
        let fd = file.as_raw_fd();
        let mut flock = libc::flock {
            l_type: libc::F_UNLCK as _,
            l_whence: libc::SEEK_SET as _,
            l_start: start as libc::off_t,
            l_len: len as libc::off_t,
            l_pid: 0,
        };
        let res = unsafe { libc::fcntl(fd, libc::F_SETLK, &mut flock) };
        if res == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

#[cfg(windows)]
mod windows {
    use super::*;
    use std::mem::zeroed;
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION;
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, UnlockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    pub fn lock_region(file: &File, start: u64, len: u64, blocking: bool) -> io::Result<bool> {
        unsafe {
            let handle = file.as_raw_handle();
            let mut overlapped: OVERLAPPED = zeroed();
            overlapped.Anonymous.Anonymous.Offset = start as u32;
            overlapped.Anonymous.Anonymous.OffsetHigh = (start >> 32) as u32;
            let mut flags = LOCKFILE_EXCLUSIVE_LOCK;
            if !blocking {
                flags |= LOCKFILE_FAIL_IMMEDIATELY;
            }
            let low = len as u32;
            let high = (len >> 32) as u32;
            let res = LockFileEx(handle as isize, flags, 0, low, high, &mut overlapped);
            if res != 0 {
                Ok(true)
            } else {
                let err = io::Error::last_os_error();
                if !blocking && err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
                    Ok(false)
                } else {
                    Err(err)
                }
            }
        }
    }

    pub fn unlock_region(file: &File, start: u64, len: u64) -> io::Result<()> {
        unsafe {
            let handle = file.as_raw_handle();
            let mut overlapped: OVERLAPPED = zeroed();
            overlapped.Anonymous.Anonymous.Offset = start as u32;
            overlapped.Anonymous.Anonymous.OffsetHigh = (start >> 32) as u32;
            let low = len as u32;
            let high = (len >> 32) as u32;
            let res = UnlockFileEx(handle as isize, 0, low, high, &mut overlapped);
            if res != 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        }
    }
}
