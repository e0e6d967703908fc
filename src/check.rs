//! The heap consistency checker: an optional invariant scan used by tests
//! and, with the `debug-checks` feature, by `debug_assert!`s on every public
//! call.
//!
//! Walks the physical block chain once and each of the ten free-list chains
//! once, checking the universal invariants from `spec.md` §8.

use std::collections::HashSet;

use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CheckError {
  #[error("header/footer tag mismatch at block {0:#x}")]
  TagMismatch(usize),
  #[error("block {0:#x} has a size that is not a positive multiple of 8")]
  BadSize(usize),
  #[error("adjacent free blocks at {0:#x} and {1:#x}")]
  AdjacentFree(usize, usize),
  #[error("payload {0:#x} is not 8-byte aligned")]
  Misaligned(usize),
  #[error("free block {0:#x} is not reachable from its size class's chain")]
  MissingFromClass(usize),
  #[error("chain node {0:#x} belongs to class {1} but sits in class {2}'s chain")]
  WrongClass(usize, usize, usize),
  #[error("chain node {0:#x} is marked allocated")]
  AllocatedInChain(usize),
  #[error("sum of block sizes ({0}) does not match the blocks region's length ({1})")]
  SizeMismatch(usize, usize),
}

/// Everything the checker needs from a live heap, without depending on
/// `Heap<H>`'s generic host type.
///
/// `first_block` and `epilogue` are header addresses, not payload addresses
/// (the epilogue in particular has no payload to speak of). Each block's
/// payload is its header address plus `block::WORD`.
pub(crate) struct View {
  pub(crate) base: usize,
  pub(crate) first_block: usize,
  pub(crate) epilogue: usize,
}

pub(crate) fn run(view: &View) -> Result<(), CheckError> {
  check_physical_chain(view)?;
  check_free_chains(view)?;
  Ok(())
}

fn check_physical_chain(view: &View) -> Result<(), CheckError> {
  use crate::block;

  let mut addr = view.first_block;
  let mut total = 0usize;
  let mut prev_free: Option<usize> = None;

  while addr != view.epilogue {
    let payload = (addr + block::WORD) as *mut u8;
    if (payload as usize) % 8 != 0 {
      return Err(CheckError::Misaligned(addr));
    }
    unsafe {
      if !block::tags_consistent(payload) {
        return Err(CheckError::TagMismatch(addr));
      }
    }
    let size = unsafe { block::size(payload) };
    if size == 0 || size % 8 != 0 {
      return Err(CheckError::BadSize(addr));
    }
    let allocated = unsafe { block::is_allocated(payload) };
    if !allocated {
      if let Some(prev_addr) = prev_free {
        return Err(CheckError::AdjacentFree(prev_addr, addr));
      }
      prev_free = Some(addr);
    } else {
      prev_free = None;
    }

    total += size;
    addr += size;
  }

  if total != view.epilogue - view.first_block {
    return Err(CheckError::SizeMismatch(total, view.epilogue - view.first_block));
  }
  Ok(())
}

fn check_free_chains(view: &View) -> Result<(), CheckError> {
  use crate::block;
  use crate::freelist::{Directory, read_next};
  use crate::size_class::{NUM_CLASSES, of};

  // First collect every free block reachable by walking the physical chain,
  // keyed by payload address so membership can be checked against the class
  // chains (which are keyed by payload address too) in both directions.
  let mut physically_free: HashSet<usize> = HashSet::new();
  let mut addr = view.first_block;
  while addr != view.epilogue {
    let payload = (addr + block::WORD) as *mut u8;
    let size = unsafe { block::size(payload) };
    if !unsafe { block::is_allocated(payload) } {
      physically_free.insert(payload as usize);
    }
    addr += size;
  }

  let dir = Directory::new(view.base);
  let mut seen: HashSet<usize> = HashSet::new();
  for class in 0..NUM_CLASSES {
    let mut node = unsafe { dir.head(class) };
    while !node.is_null() {
      let addr = node as usize;
      if unsafe { block::is_allocated(node) } {
        return Err(CheckError::AllocatedInChain(addr));
      }
      let actual_class = of(unsafe { block::size(node) });
      if actual_class != class {
        return Err(CheckError::WrongClass(addr, actual_class, class));
      }
      seen.insert(addr);
      node = unsafe { read_next(view.base, node) };
    }
  }

  for &addr in &physically_free {
    if !seen.contains(&addr) {
      return Err(CheckError::MissingFromClass(addr));
    }
  }
  Ok(())
}
