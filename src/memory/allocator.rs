//! Capacity accounting for device memory.

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Hands out leases against a fixed byte budget. Every [`Buffer`] holds one
/// lease and gives its bytes back when dropped.
///
/// [`Buffer`]: super::Buffer
#[derive(Debug, Clone)]
pub struct DeviceAllocator {
    capacity: usize,
    used: Arc<AtomicUsize>,
}

impl DeviceAllocator {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            used: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn used(&self) -> usize {
        self.used.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.used())
    }

    /// Reserve room for `len` elements of `elem_size` bytes.
    pub fn reserve(&self, len: usize, elem_size: usize) -> Result<AllocationLease> {
        if len == 0 {
            return Err(Error::allocation("buffer length must be > 0"));
        }

        // zero-sized elements still count one byte each so capacity stays meaningful
        let bytes = len
            .checked_mul(elem_size.max(1))
            .ok_or_else(|| Error::allocation(format!("{} elements overflow usize", len)))?;

        let capacity = self.capacity;
        self.used
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|total| *total <= capacity)
            })
            .map_err(|used| {
                Error::allocation(format!(
                    "capacity exhausted: requested {} bytes, {} of {} in use",
                    bytes, used, capacity
                ))
            })?;

        Ok(AllocationLease {
            bytes,
            used: self.used.clone(),
        })
    }
}

#[derive(Debug)]
pub struct AllocationLease {
    bytes: usize,
    used: Arc<AtomicUsize>,
}

impl AllocationLease {
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl Drop for AllocationLease {
    fn drop(&mut self) {
        self.used.fetch_sub(self.bytes, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_release() {
        let allocator = DeviceAllocator::new(64);

        let lease = allocator.reserve(4, 8).unwrap();
        assert_eq!(lease.bytes(), 32);
        assert_eq!(allocator.used(), 32);
        assert_eq!(allocator.available(), 32);

        drop(lease);
        assert_eq!(allocator.used(), 0);
    }

    #[test]
    fn test_zero_length_rejected() {
        let allocator = DeviceAllocator::new(64);
        assert!(matches!(
            allocator.reserve(0, 4),
            Err(Error::Allocation(_))
        ));
    }

    #[test]
    fn test_capacity_exhausted() {
        let allocator = DeviceAllocator::new(16);
        let _held = allocator.reserve(2, 8).unwrap();

        assert!(matches!(
            allocator.reserve(1, 1),
            Err(Error::Allocation(_))
        ));
        assert!(allocator.reserve(usize::MAX, 2).is_err());
    }
}
