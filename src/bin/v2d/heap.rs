//! DMA-BUF heap allocator for the buffers a job points at.

use std::collections::{BTreeSet, HashMap};
use std::ffi::c_void;
use std::fs::OpenOptions;
use std::io;
use std::ops::{Deref, DerefMut};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

pub const DMA_HEAP_ROOT: &str = "/dev/dma_heap";
pub const SYSTEM_HEAP: &str = "system";
pub const SYSTEM_UNCACHED_HEAP: &str = "system-uncached";

/// `_IOWR('H', 0, struct dma_heap_allocation_data)`
const DMA_HEAP_IOCTL_ALLOC: u64 = 0xC018_4800;
/// `_IOW('b', 0, struct dma_buf_sync)`
const DMA_BUF_IOCTL_SYNC: u64 = 0x4008_6200;

const DMA_BUF_SYNC_RW: u64 = 3;
const DMA_BUF_SYNC_START: u64 = 0;
const DMA_BUF_SYNC_END: u64 = 4;

#[repr(C)]
#[derive(Default)]
struct HeapAllocationData {
    len: u64,
    fd: u32,
    fd_flags: u32,
    heap_flags: u64,
}

#[repr(C)]
struct BufSync {
    flags: u64,
}

/// Opens each heap once and hands out buffers from it.
#[derive(Debug)]
pub struct HeapAllocator {
    root: PathBuf,
    heaps: HashMap<String, OwnedFd>,
    uncached_supported: Option<bool>,
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new(DMA_HEAP_ROOT)
    }
}

impl HeapAllocator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            heaps: HashMap::new(),
            uncached_supported: None,
        }
    }

    /// Names of the heaps present under the heap root. Empty when the root is missing.
    pub fn heap_names(&self) -> BTreeSet<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return BTreeSet::new();
        };
        entries
            .filter_map(Result::ok)
            .filter_map(|e| e.file_name().into_string().ok())
            .collect()
    }

    fn heap_fd(&mut self, name: &str) -> io::Result<RawFd> {
        if let Some(fd) = self.heaps.get(name) {
            return Ok(fd.as_raw_fd());
        }
        let path = self.root.join(name);
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(&path)?;
        tracing::debug!(heap = name, path = %path.display(), "dma heap opened");
        let fd = OwnedFd::from(file);
        let raw = fd.as_raw_fd();
        self.heaps.insert(name.to_owned(), fd);
        Ok(raw)
    }

    /// Allocate `len` bytes from the heap called `name`.
    pub fn alloc(&mut self, name: &str, len: usize) -> io::Result<DmaBuf> {
        let heap = self.heap_fd(name)?;
        let mut data = HeapAllocationData {
            len: len as u64,
            fd_flags: (libc::O_RDWR | libc::O_CLOEXEC) as u32,
            ..Default::default()
        };
        loop {
            // SAFETY: `data` matches `struct dma_heap_allocation_data` and outlives the call.
            let ret = unsafe {
                libc::ioctl(
                    heap,
                    DMA_HEAP_IOCTL_ALLOC as _,
                    &mut data as *mut HeapAllocationData as *mut c_void,
                )
            };
            if ret >= 0 {
                break;
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
        // SAFETY: the kernel returned a fresh dma-buf fd that nothing else owns.
        let fd = unsafe { OwnedFd::from_raw_fd(data.fd as RawFd) };
        tracing::debug!(heap = name, len, fd = fd.as_raw_fd(), "dma-buf allocated");
        Ok(DmaBuf { fd, len })
    }

    /// Allocate from the system heap, using its uncached variant when the CPU never touches
    /// the buffer and the kernel provides one.
    pub fn alloc_system(&mut self, cpu_access: bool, len: usize) -> io::Result<DmaBuf> {
        if !cpu_access {
            let supported = match self.uncached_supported {
                Some(s) => s,
                None => {
                    let s = self.heap_names().contains(SYSTEM_UNCACHED_HEAP);
                    self.uncached_supported = Some(s);
                    s
                }
            };
            if supported {
                return self.alloc(SYSTEM_UNCACHED_HEAP, len);
            }
            tracing::info!("no {SYSTEM_UNCACHED_HEAP} heap, falling back to {SYSTEM_HEAP}");
        }
        self.alloc(SYSTEM_HEAP, len)
    }
}

/// Owned dma-buf.
#[derive(Debug)]
pub struct DmaBuf {
    fd: OwnedFd,
    len: usize,
}

impl DmaBuf {
    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Map the buffer for CPU access. Cache maintenance brackets the mapping's lifetime.
    pub fn map(&self) -> io::Result<Mapping<'_>> {
        // SAFETY: a shared read/write mapping of `len` bytes of an fd we own; the result is
        // checked against MAP_FAILED.
        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                self.len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                self.fd.as_raw_fd(),
                0,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        let ptr = NonNull::new(addr.cast::<u8>()).ok_or_else(|| io::Error::other("null mapping"))?;
        let mapping = Mapping { buf: self, ptr };
        mapping.sync(DMA_BUF_SYNC_START)?;
        Ok(mapping)
    }
}

/// CPU view of a [`DmaBuf`].
pub struct Mapping<'a> {
    buf: &'a DmaBuf,
    ptr: NonNull<u8>,
}

impl Mapping<'_> {
    fn sync(&self, phase: u64) -> io::Result<()> {
        let mut sync = BufSync {
            flags: phase | DMA_BUF_SYNC_RW,
        };
        // SAFETY: `sync` matches `struct dma_buf_sync` and outlives the call.
        let ret = unsafe {
            libc::ioctl(
                self.buf.raw_fd(),
                DMA_BUF_IOCTL_SYNC as _,
                &mut sync as *mut BufSync as *mut c_void,
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Copy `path` into the start of the buffer.
    pub fn load(&mut self, path: &Path) -> io::Result<usize> {
        let data = std::fs::read(path)?;
        let n = data.len().min(self.len());
        if n < data.len() {
            tracing::warn!(path = %path.display(), size = data.len(), cap = self.len(), "input truncated");
        }
        self[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }
}

impl Deref for Mapping<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: the mapping covers `buf.len` bytes and lives until `self` is dropped.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.buf.len) }
    }
}

impl DerefMut for Mapping<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: as in `deref`, and `&mut self` makes the borrow exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.buf.len) }
    }
}

impl Drop for Mapping<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.sync(DMA_BUF_SYNC_END) {
            tracing::warn!(%err, "dma-buf sync end failed");
        }
        // SAFETY: unmapping exactly the region returned by `mmap` in `DmaBuf::map`.
        unsafe {
            libc::munmap(self.ptr.as_ptr().cast::<c_void>(), self.buf.len);
        }
    }
}

/// Round `len` up to a whole number of pages.
pub fn page_align(len: usize) -> usize {
    const PAGE: usize = 4096;
    len.div_ceil(PAGE) * PAGE
}
