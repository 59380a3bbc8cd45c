// Shared memory backend over POSIX named shared memory objects
// Uses shm_open + ftruncate + mmap; the creating side unlinks the name on close

use crate::error::{MailboxError, Result};
use std::ffi::CString;
use std::fmt;
use std::io;
use std::mem::{align_of, size_of};
use std::ptr::NonNull;
use tracing::{debug, warn};

/// Platform-specific handle type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawHandle {
    /// Unix file descriptor
    Fd(i32),
}

/// Permission bits for newly created objects (owner and group read/write).
#[cfg(unix)]
const SHM_MODE: libc::mode_t = 0o660;

/// A named shared memory object mapped read-write into this process.
///
/// The handle owns the mapping and the descriptor. The side that created the
/// object (`create`) also owns the name and removes it from the shared memory
/// namespace on close, so it becomes reusable. The attaching side (`open`)
/// only drops its own mapping. Either way the release runs exactly once,
/// through `close()` or on drop.
///
/// The named object outlives a crashed creator: if the owning process exits
/// without closing, the name stays registered until someone unlinks it
/// (for instance by removing `/dev/shm/<name>` on Linux).
///
/// Raw memory is never handed out. All access goes through bounds-checked
/// views scoped to an explicit offset and length.
pub struct SharedRegion {
    name: String,
    c_name: CString,
    ptr: Option<NonNull<u8>>,
    size: usize,
    fd: i32,
    owner: bool,
}

// The mapping is plain shared memory; moving the handle between threads is fine.
// It is deliberately not Sync: mutable views require `&mut self`.
unsafe impl Send for SharedRegion {}

fn c_name(name: &str) -> Result<CString> {
    CString::new(name).map_err(|_| MailboxError::InvalidName {
        name: name.to_string(),
        reason: "contains a NUL byte",
    })
}

#[cfg(unix)]
impl SharedRegion {
    /// Exclusively create a new named object of exactly `size` bytes and map it.
    ///
    /// Fails with `OpenFailed` (errno `EEXIST`) if the name is already taken.
    /// The new region is zero-filled by the OS.
    pub fn create(name: &str, size: usize) -> Result<Self> {
        let c_name = c_name(name)?;

        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                SHM_MODE as libc::c_uint,
            )
        };
        if fd < 0 {
            return Err(MailboxError::OpenFailed {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        // Undo everything acquired so far; the name is ours since O_EXCL succeeded.
        let discard = |fd: i32| unsafe {
            libc::close(fd);
            libc::shm_unlink(c_name.as_ptr());
        };

        let len = match libc::off_t::try_from(size) {
            Ok(len) => len,
            Err(_) => {
                discard(fd);
                return Err(MailboxError::TruncateFailed {
                    name: name.to_string(),
                    size,
                    source: io::Error::new(io::ErrorKind::InvalidInput, "size exceeds off_t"),
                });
            }
        };

        if unsafe { libc::ftruncate(fd, len) } != 0 {
            let source = io::Error::last_os_error();
            discard(fd);
            return Err(MailboxError::TruncateFailed {
                name: name.to_string(),
                size,
                source,
            });
        }

        let ptr = match unsafe { map_region(fd, size) } {
            Ok(ptr) => ptr,
            Err(source) => {
                discard(fd);
                return Err(MailboxError::MapFailed {
                    name: name.to_string(),
                    size,
                    source,
                });
            }
        };

        debug!(name, size, fd, "created shared memory");

        Ok(Self {
            name: name.to_string(),
            c_name,
            ptr: Some(ptr),
            size,
            fd,
            owner: true,
        })
    }

    /// Open an existing named object, discover its size and map all of it.
    pub fn open(name: &str) -> Result<Self> {
        let c_name = c_name(name)?;

        let fd = unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0 as libc::c_uint) };
        if fd < 0 {
            return Err(MailboxError::OpenFailed {
                name: name.to_string(),
                source: io::Error::last_os_error(),
            });
        }

        let size = unsafe {
            let mut stat: libc::stat = std::mem::zeroed();
            if libc::fstat(fd, &mut stat) != 0 {
                let source = io::Error::last_os_error();
                libc::close(fd);
                return Err(MailboxError::StatFailed {
                    name: name.to_string(),
                    source,
                });
            }
            stat.st_size as usize
        };

        let ptr = match unsafe { map_region(fd, size) } {
            Ok(ptr) => ptr,
            Err(source) => {
                unsafe { libc::close(fd) };
                return Err(MailboxError::MapFailed {
                    name: name.to_string(),
                    size,
                    source,
                });
            }
        };

        debug!(name, size, fd, "attached shared memory");

        Ok(Self {
            name: name.to_string(),
            c_name,
            ptr: Some(ptr),
            size,
            fd,
            owner: false,
        })
    }

    fn release(&mut self, ptr: NonNull<u8>) {
        unsafe {
            if libc::munmap(ptr.as_ptr().cast(), self.size) != 0 {
                warn!(name = %self.name, error = %io::Error::last_os_error(), "munmap failed");
            }
            if libc::close(self.fd) != 0 {
                warn!(name = %self.name, error = %io::Error::last_os_error(), "close failed");
            }
            if self.owner && libc::shm_unlink(self.c_name.as_ptr()) != 0 {
                warn!(name = %self.name, error = %io::Error::last_os_error(), "shm_unlink failed");
            }
        }
        debug!(name = %self.name, owner = self.owner, "closed shared memory");
    }
}

/// Map `size` bytes of `fd` shared and read-write.
#[cfg(unix)]
unsafe fn map_region(fd: i32, size: usize) -> io::Result<NonNull<u8>> {
    let ptr = libc::mmap(
        std::ptr::null_mut(),
        size,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_SHARED,
        fd,
        0,
    );
    if ptr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    NonNull::new(ptr.cast::<u8>()).ok_or_else(|| io::Error::other("mmap returned a null mapping"))
}

#[cfg(not(unix))]
impl SharedRegion {
    pub fn create(name: &str, _size: usize) -> Result<Self> {
        Err(MailboxError::OpenFailed {
            name: name.to_string(),
            source: io::Error::new(
                io::ErrorKind::Unsupported,
                "Named shared memory only supported on Unix",
            ),
        })
    }

    pub fn open(name: &str) -> Result<Self> {
        Self::create(name, 0)
    }

    fn release(&mut self, _ptr: NonNull<u8>) {}
}

impl SharedRegion {
    /// Unmap the region; on the owning side also unlink the name.
    ///
    /// Idempotent. Mappings other processes already hold stay valid until
    /// they unmap themselves.
    pub fn close(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            self.release(ptr);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.ptr.is_none()
    }

    /// Size of the mapped region in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this handle created the object and will unlink it.
    pub fn is_owner(&self) -> bool {
        self.owner
    }

    pub fn raw_handle(&self) -> RawHandle {
        RawHandle::Fd(self.fd)
    }

    /// Resolve `[offset, offset + count)` to a pointer, checking state, bounds and alignment.
    fn region_ptr(&self, offset: usize, count: usize, align: usize) -> Result<*mut u8> {
        let base = self.ptr.ok_or(MailboxError::Closed)?;
        let out_of_bounds = MailboxError::OutOfBounds {
            offset,
            count,
            len: self.size,
        };

        match offset.checked_add(count) {
            Some(end) if end <= self.size => {}
            _ => return Err(out_of_bounds),
        }

        // SAFETY: offset + count <= size, so the result stays inside the mapping.
        let ptr = unsafe { base.as_ptr().add(offset) };
        if (ptr as usize) % align != 0 {
            return Err(out_of_bounds);
        }
        Ok(ptr)
    }

    /// Run `f` over a read-only view of `count` bytes at `offset`.
    pub fn with_bytes<R>(&self, offset: usize, count: usize, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
        let ptr = self.region_ptr(offset, count, 1)?;
        // SAFETY: the range is inside the live mapping and the borrow ends with `f`.
        let bytes = unsafe { std::slice::from_raw_parts(ptr, count) };
        Ok(f(bytes))
    }

    /// Run `f` over a mutable view of `count` bytes at `offset`.
    pub fn with_bytes_mut<R>(
        &mut self,
        offset: usize,
        count: usize,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R> {
        let ptr = self.region_ptr(offset, count, 1)?;
        // SAFETY: as above; `&mut self` keeps other local views out for the duration.
        let bytes = unsafe { std::slice::from_raw_parts_mut(ptr, count) };
        Ok(f(bytes))
    }

    /// Run `f` over a shared reference to a `T` stored at `offset`.
    ///
    /// # Safety
    /// `T` must be valid for every bit pattern the peer may leave at that
    /// offset (integers, atomics and `repr(C)` aggregates of them).
    pub(crate) unsafe fn with_value<T, R>(&self, offset: usize, f: impl FnOnce(&T) -> R) -> Result<R> {
        let ptr = self.region_ptr(offset, size_of::<T>(), align_of::<T>())?;
        Ok(f(&*ptr.cast::<T>()))
    }

    /// Run `f` over a mutable reference to a `T` stored at `offset`.
    ///
    /// # Safety
    /// Same contract as [`SharedRegion::with_value`].
    pub(crate) unsafe fn with_value_mut<T, R>(
        &mut self,
        offset: usize,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R> {
        let ptr = self.region_ptr(offset, size_of::<T>(), align_of::<T>())?;
        Ok(f(&mut *ptr.cast::<T>()))
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::Debug::StructDebug::debug_shared_region(self, f)
    }
}
