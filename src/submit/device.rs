use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::foundation::error::{V2dError, V2dResult};
use crate::task::abi::TaskRecord;

/// Device node exposed by the V2D kernel driver.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/v2d_dev";

/// Sink accepting task records, one write per task.
///
/// The implementation may fill the record's fence slots in place.
pub trait TaskDevice: Send + Sync {
    /// Hand one record to the hardware queue and return the number of bytes accepted.
    fn write_task(&self, record: &mut TaskRecord) -> io::Result<usize>;
}

/// Source of the device a job is submitted to.
pub trait DeviceProvider: Send + Sync {
    /// Return a ready device, opening it if needed.
    fn acquire(&self) -> V2dResult<Arc<dyn TaskDevice>>;
}

/// Open device node.
#[derive(Debug)]
pub struct DeviceNode {
    path: PathBuf,
    file: File,
}

impl DeviceNode {
    /// Open `path` read/write, non-blocking and close-on-exec.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> V2dResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(path)
            .map_err(|source| V2dError::DeviceUnavailable {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// Path the node was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsFd for DeviceNode {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl TaskDevice for DeviceNode {
    fn write_task(&self, record: &mut TaskRecord) -> io::Result<usize> {
        let bytes = record.as_bytes_mut();
        // SAFETY: the buffer is a live, exclusively borrowed `TaskRecord` of `bytes.len()` bytes.
        // The driver writes fence fds back into it, which the `&mut` borrow permits.
        let ret = unsafe {
            libc::write(
                self.file.as_raw_fd(),
                bytes.as_mut_ptr().cast::<libc::c_void>(),
                bytes.len(),
            )
        };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(ret as usize)
    }
}

static SHARED_NODES: Mutex<BTreeMap<PathBuf, Arc<DeviceNode>>> = Mutex::new(BTreeMap::new());

fn shared_nodes() -> MutexGuard<'static, BTreeMap<PathBuf, Arc<DeviceNode>>> {
    SHARED_NODES.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Return the process-wide node for `path`, opening it on first use.
///
/// The open runs under the registry lock, so racing callers see exactly one open and never a
/// half-initialized node. A failed open is not cached: the next call tries again.
pub fn open_shared(path: &Path) -> V2dResult<Arc<DeviceNode>> {
    let mut nodes = shared_nodes();
    if let Some(node) = nodes.get(path) {
        return Ok(Arc::clone(node));
    }

    let node = Arc::new(DeviceNode::open(path)?);
    tracing::info!(path = %path.display(), "device node opened");
    nodes.insert(path.to_path_buf(), Arc::clone(&node));
    Ok(node)
}

/// Drop the cached node for `path`. Returns `true` if one was cached.
///
/// The fd closes once in-flight submissions holding the node finish.
pub fn close_shared(path: &Path) -> bool {
    let closed = shared_nodes().remove(path).is_some();
    if closed {
        tracing::info!(path = %path.display(), "device node released");
    }
    closed
}

/// Drop every cached node. Returns how many were released.
pub fn shutdown_shared_devices() -> usize {
    let mut nodes = shared_nodes();
    let n = nodes.len();
    nodes.clear();
    tracing::info!(released = n, "shared device nodes released");
    n
}

/// [`DeviceProvider`] backed by the process-wide node registry.
#[derive(Clone, Debug)]
pub struct SharedDevice {
    path: PathBuf,
}

impl SharedDevice {
    /// Provider for the node at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Device node path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for SharedDevice {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_PATH)
    }
}

impl DeviceProvider for SharedDevice {
    fn acquire(&self) -> V2dResult<Arc<dyn TaskDevice>> {
        let node: Arc<dyn TaskDevice> = open_shared(&self.path)?;
        Ok(node)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/submit/device.rs"]
mod tests;
