//! Index spaces and their partitioning into work-item groups.

use crate::error::{Error, Result};
use std::fmt;

/// A 2D coordinate. `x` is the fastest-varying dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Index2D {
    pub x: usize,
    pub y: usize,
}

impl Index2D {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Index2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Shape of a buffer or an index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extent {
    D1(usize),
    D2 { width: usize, height: usize },
}

impl Extent {
    pub fn len(&self) -> usize {
        match *self {
            Extent::D1(n) => n,
            Extent::D2 { width, height } => width.saturating_mul(height),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dims(&self) -> usize {
        match self {
            Extent::D1(_) => 1,
            Extent::D2 { .. } => 2,
        }
    }

    /// Row-major linear offset of `index`, or `None` when out of range.
    pub fn linearize(&self, index: Index2D) -> Option<usize> {
        match *self {
            Extent::D1(n) => (index.y == 0 && index.x < n).then_some(index.x),
            Extent::D2 { width, height } => {
                (index.x < width && index.y < height).then(|| index.y * width + index.x)
            }
        }
    }

    /// Inverse of [`Extent::linearize`]. A 1D extent maps to `y == 0`.
    pub fn delinearize(&self, linear: usize) -> Index2D {
        match *self {
            Extent::D1(_) => Index2D::new(linear, 0),
            Extent::D2 { width, .. } => Index2D::new(linear % width, linear / width),
        }
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extent::D1(n) => write!(f, "[{}]", n),
            Extent::D2 { width, height } => write!(f, "[{} x {}]", width, height),
        }
    }
}

/// The shape a kernel is launched over. Immutable once built and never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexSpace {
    extent: Extent,
}

impl IndexSpace {
    pub fn d1(len: usize) -> Result<Self> {
        Self::from_extent(Extent::D1(len))
    }

    pub fn d2(width: usize, height: usize) -> Result<Self> {
        Self::from_extent(Extent::D2 { width, height })
    }

    pub fn from_extent(extent: Extent) -> Result<Self> {
        match extent {
            Extent::D1(0) => Err(Error::index_space("1D extent must be > 0")),
            Extent::D2 { width, height } if width == 0 || height == 0 => Err(
                Error::index_space(format!("2D extent {} has a zero dimension", extent)),
            ),
            Extent::D2 { width, height } if width.checked_mul(height).is_none() => Err(
                Error::index_space(format!("2D extent {} overflows usize", extent)),
            ),
            _ => Ok(Self { extent }),
        }
    }

    /// Build a space shared by several buffers. Every extent must be identical.
    pub fn matching(extents: &[Extent]) -> Result<Self> {
        let (first, rest) = extents
            .split_first()
            .ok_or_else(|| Error::index_space("no extents to match"))?;

        if let Some(other) = rest.iter().find(|e| *e != first) {
            return Err(Error::index_space(format!(
                "extent mismatch: {} vs {}",
                first, other
            )));
        }

        Self::from_extent(*first)
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn len(&self) -> usize {
        self.extent.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn dims(&self) -> usize {
        self.extent.dims()
    }

    pub fn index_2d(&self, linear: usize) -> Index2D {
        self.extent.delinearize(linear)
    }

    pub fn linear(&self, index: Index2D) -> Option<usize> {
        self.extent.linearize(index)
    }

    pub fn group_count(&self, group_size: usize) -> usize {
        if group_size == 0 {
            return 0;
        }
        self.len().div_ceil(group_size)
    }

    /// Split the linear range into contiguous groups of at most `group_size`.
    pub fn groups(&self, group_size: usize) -> Groups {
        Groups {
            total: self.len(),
            group_size,
            next: 0,
        }
    }
}

impl fmt::Display for IndexSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.extent.fmt(f)
    }
}

/// A contiguous slice of work-items sharing one barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRange {
    pub id: usize,
    pub start: usize,
    pub len: usize,
}

impl GroupRange {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

#[derive(Debug, Clone)]
pub struct Groups {
    total: usize,
    group_size: usize,
    next: usize,
}

impl Iterator for Groups {
    type Item = GroupRange;

    fn next(&mut self) -> Option<GroupRange> {
        if self.group_size == 0 {
            return None;
        }
        let start = self.next.checked_mul(self.group_size)?;
        if start >= self.total {
            return None;
        }
        let range = GroupRange {
            id: self.next,
            start,
            len: self.group_size.min(self.total - start),
        };
        self.next += 1;
        Some(range)
    }
}
