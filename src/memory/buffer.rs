//! Host/device buffers and the views kernels use to reach them.

use super::allocator::AllocationLease;
use crate::error::{Error, Result};
use crate::index::{Extent, Index2D};
use crossbeam_utils::atomic::AtomicCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Types that can live in a [`Buffer`].
pub trait Element: Copy + Default + Send + Sync + 'static {}

impl<T: Copy + Default + Send + Sync + 'static> Element for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        BufferId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

// Each element is its own atomic cell: concurrent work-items touching distinct
// slots never interfere, and the group barrier's lock orders the phases.
struct DeviceMemory<T> {
    id: BufferId,
    extent: Extent,
    cells: Box<[AtomicCell<T>]>,
    released: AtomicBool,
}

impl<T: Element> DeviceMemory<T> {
    fn zeroed(extent: Extent) -> Self {
        Self {
            id: BufferId::next(),
            extent,
            cells: (0..extent.len()).map(|_| AtomicCell::new(T::default())).collect(),
            released: AtomicBool::new(false),
        }
    }

    fn cell(&self, index: usize, op: &str) -> Result<&AtomicCell<T>> {
        if self.released.load(Ordering::Acquire) {
            return Err(Error::fault(
                None,
                format!("{} on {} after it was released", op, self.id),
            ));
        }
        self.cells.get(index).ok_or_else(|| {
            Error::fault(
                None,
                format!(
                    "{} of element {} out of bounds for {} of length {}",
                    op,
                    index,
                    self.id,
                    self.cells.len()
                ),
            )
        })
    }

    fn linear(&self, index: Index2D, op: &str) -> Result<usize> {
        self.extent.linearize(index).ok_or_else(|| {
            Error::fault(
                None,
                format!(
                    "{} of element {} out of bounds for {} with extent {}",
                    op, index, self.id, self.extent
                ),
            )
        })
    }

    fn write_all(&self, data: &[T]) {
        for (cell, value) in self.cells.iter().zip(data) {
            cell.store(*value);
        }
    }

    fn read_all(&self, out: &mut [T]) {
        for (cell, slot) in self.cells.iter().zip(out.iter_mut()) {
            *slot = cell.load();
        }
    }
}

/// A fixed-size buffer with a host copy and a device copy.
///
/// The copies are independent: [`upload`](Buffer::upload) and
/// [`sync_to_device`](Buffer::sync_to_device) push host data to the device,
/// [`download`](Buffer::download) and [`copy_to_host`](Buffer::copy_to_host)
/// pull device data back. Kernels only ever see the device copy through an
/// [`ArrayView`]. Dropping the buffer releases both copies and invalidates
/// every view handed out.
pub struct Buffer<T: Element> {
    host: Vec<T>,
    device: Arc<DeviceMemory<T>>,
    _lease: AllocationLease,
}

impl<T: Element> Buffer<T> {
    pub(crate) fn new(extent: Extent, lease: AllocationLease) -> Self {
        Self {
            host: vec![T::default(); extent.len()],
            device: Arc::new(DeviceMemory::zeroed(extent)),
            _lease: lease,
        }
    }

    pub fn id(&self) -> BufferId {
        self.device.id
    }

    pub fn len(&self) -> usize {
        self.host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }

    pub fn extent(&self) -> Extent {
        self.device.extent
    }

    /// Copy `data` into the host copy and on to the device.
    pub fn upload(&mut self, data: &[T]) -> Result<()> {
        self.check_len("upload", data.len())?;
        self.host.copy_from_slice(data);
        self.sync_to_device();
        tracing::trace!(buffer = %self.id(), elements = data.len(), "upload");
        Ok(())
    }

    /// Upload a 2D image given as rows, each `width` long.
    pub fn upload_rows(&mut self, rows: &[Vec<T>]) -> Result<()> {
        let (width, height) = match self.extent() {
            Extent::D2 { width, height } => (width, height),
            Extent::D1(_) => {
                return Err(Error::index_space(format!(
                    "upload_rows needs a 2D buffer, {} is {}",
                    self.id(),
                    self.extent()
                )))
            }
        };
        if rows.len() != height || rows.iter().any(|row| row.len() != width) {
            return Err(Error::index_space(format!(
                "upload_rows: rows do not match extent {}",
                self.extent()
            )));
        }
        let flat: Vec<T> = rows.iter().flatten().copied().collect();
        self.upload(&flat)
    }

    /// Refresh the host copy from the device and return it.
    pub fn download(&mut self) -> Vec<T> {
        self.sync_to_host();
        tracing::trace!(buffer = %self.id(), elements = self.len(), "download");
        self.host.clone()
    }

    /// Copy the device contents into caller-owned memory.
    pub fn copy_to_host(&self, out: &mut [T]) -> Result<()> {
        self.check_len("copy_to_host", out.len())?;
        self.device.read_all(out);
        Ok(())
    }

    /// Download the device copy as rows of a 2D buffer.
    pub fn download_rows(&mut self) -> Result<Vec<Vec<T>>> {
        match self.extent() {
            Extent::D2 { width, .. } => {
                let flat = self.download();
                Ok(flat.chunks(width).map(|row| row.to_vec()).collect())
            }
            Extent::D1(_) => Err(Error::index_space(format!(
                "download_rows needs a 2D buffer, {} is {}",
                self.id(),
                self.extent()
            ))),
        }
    }

    pub fn host(&self) -> &[T] {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut [T] {
        &mut self.host
    }

    pub fn sync_to_device(&self) {
        self.device.write_all(&self.host);
    }

    pub fn sync_to_host(&mut self) {
        self.device.read_all(&mut self.host);
    }

    /// A shareable handle on the device copy for use inside kernels.
    pub fn view(&self) -> ArrayView<T> {
        ArrayView {
            memory: self.device.clone(),
        }
    }

    fn check_len(&self, op: &str, len: usize) -> Result<()> {
        if len != self.len() {
            return Err(Error::index_space(format!(
                "{}: {} has {} elements, host data has {}",
                op,
                self.id(),
                self.len(),
                len
            )));
        }
        Ok(())
    }
}

impl<T: Element> Drop for Buffer<T> {
    fn drop(&mut self) {
        self.device.released.store(true, Ordering::Release);
    }
}

impl<T: Element> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id())
            .field("extent", &self.extent())
            .finish()
    }
}

/// Device-side view of a [`Buffer`], cheap to clone into kernels.
///
/// Every access is bounds checked. Out-of-range accesses and accesses after
/// the owning buffer was dropped return a `KernelFault`.
pub struct ArrayView<T: Element> {
    memory: Arc<DeviceMemory<T>>,
}

impl<T: Element> Clone for ArrayView<T> {
    fn clone(&self) -> Self {
        Self {
            memory: self.memory.clone(),
        }
    }
}

impl<T: Element> ArrayView<T> {
    pub fn buffer_id(&self) -> BufferId {
        self.memory.id
    }

    pub fn len(&self) -> usize {
        self.memory.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.cells.is_empty()
    }

    pub fn extent(&self) -> Extent {
        self.memory.extent
    }

    pub fn get(&self, index: usize) -> Result<T> {
        Ok(self.memory.cell(index, "read")?.load())
    }

    pub fn set(&self, index: usize, value: T) -> Result<()> {
        self.memory.cell(index, "write")?.store(value);
        Ok(())
    }

    /// Read-modify-write of one element. Not atomic with respect to other
    /// work-items writing the same slot in the same phase.
    pub fn update<F>(&self, index: usize, f: F) -> Result<()>
    where
        F: FnOnce(T) -> T,
    {
        let cell = self.memory.cell(index, "update")?;
        cell.store(f(cell.load()));
        Ok(())
    }

    pub fn get_2d(&self, index: Index2D) -> Result<T> {
        let linear = self.memory.linear(index, "read")?;
        self.get(linear)
    }

    pub fn set_2d(&self, index: Index2D, value: T) -> Result<()> {
        let linear = self.memory.linear(index, "write")?;
        self.set(linear, value)
    }

    pub fn update_2d<F>(&self, index: Index2D, f: F) -> Result<()>
    where
        F: FnOnce(T) -> T,
    {
        let linear = self.memory.linear(index, "update")?;
        self.update(linear, f)
    }
}

impl<T: Element> fmt::Debug for ArrayView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayView")
            .field("buffer", &self.memory.id)
            .field("extent", &self.memory.extent)
            .finish()
    }
}
