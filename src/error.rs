//! Error types for the allocator and its host memory primitive.

use thiserror::Error;

/// Failure reported by a [`crate::host::MemoryHost`] when it cannot grow the
/// backing region.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HostError {
  #[error("host refused to grow the backing region")]
  GrowthFailed,
}

/// Failure reported by the allocator's own public operations.
///
/// Kept distinct from [`HostError`] so the allocator's contract doesn't leak
/// details of whichever [`crate::host::MemoryHost`] backs it.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
  #[error("out of memory: host could not satisfy a heap extension request")]
  OutOfMemory,
}

impl From<HostError> for AllocError {
  fn from(_: HostError) -> Self {
    AllocError::OutOfMemory
  }
}
