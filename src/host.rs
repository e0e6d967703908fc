//! The host memory primitive: a brk-like capability the allocator grows into.
//!
//! `spec.md` treats this as a given, out-of-core collaborator. The full crate
//! expresses its contract as a trait so the allocator core is generic over
//! its backing store (production code uses [`SbrkHost`], tests use
//! [`MockHost`]).

use libc::{c_void, intptr_t, sbrk};

use crate::error::HostError;

/// A contiguous, monotonically growable byte region.
///
/// Implementations must append `bytes` new bytes immediately after the
/// current high-water mark and return the address of the first new byte, or
/// fail without mutating anything.
pub trait MemoryHost {
  /// Appends `bytes` new bytes to the region, returning the address of the
  /// first newly added byte.
  fn extend_region(&mut self, bytes: usize) -> Result<usize, HostError>;

  /// The lowest valid byte address in the region.
  fn region_low(&self) -> usize;

  /// The highest valid byte address currently in the region.
  fn region_high(&self) -> usize;
}

/// Production host: grows the process's data segment via `sbrk(2)`.
///
/// Mirrors the way the teacher crate obtains memory, generalized to track
/// the region's low and high water marks so `region_low`/`region_high` are
/// O(1) lookups rather than repeated `sbrk(0)` calls.
pub struct SbrkHost {
  low: Option<usize>,
  high: usize,
}

impl SbrkHost {
  pub fn new() -> Self {
    Self { low: None, high: 0 }
  }
}

impl Default for SbrkHost {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryHost for SbrkHost {
  fn extend_region(&mut self, bytes: usize) -> Result<usize, HostError> {
    let old_break = unsafe { sbrk(bytes as intptr_t) };
    if old_break == usize::MAX as *mut c_void {
      log::warn!("sbrk({bytes}) failed");
      return Err(HostError::GrowthFailed);
    }

    let addr = old_break as usize;
    if self.low.is_none() {
      self.low = Some(addr);
    }
    self.high = addr + bytes - 1;
    Ok(addr)
  }

  fn region_low(&self) -> usize {
    self.low.unwrap_or(0)
  }

  fn region_high(&self) -> usize {
    self.high
  }
}

/// Test host: a fixed-capacity boxed buffer standing in for the process
/// break. Growth just advances a cursor; the buffer itself never moves, so
/// addresses handed out stay valid for its lifetime, required since the
/// allocator encodes free-list links as offsets from the region's base.
pub struct MockHost {
  buffer: Box<[u8]>,
  used: usize,
}

impl MockHost {
  pub fn with_capacity(capacity: usize) -> Self {
    Self {
      buffer: vec![0u8; capacity].into_boxed_slice(),
      used: 0,
    }
  }
}

impl MemoryHost for MockHost {
  fn extend_region(&mut self, bytes: usize) -> Result<usize, HostError> {
    if self.used + bytes > self.buffer.len() {
      return Err(HostError::GrowthFailed);
    }

    let addr = self.buffer.as_ptr() as usize + self.used;
    self.used += bytes;
    Ok(addr)
  }

  fn region_low(&self) -> usize {
    self.buffer.as_ptr() as usize
  }

  fn region_high(&self) -> usize {
    self.buffer.as_ptr() as usize + self.used.saturating_sub(1)
  }
}
