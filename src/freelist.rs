//! Free-list node primitives and the segregated directory of ten class heads.
//!
//! A free block's payload is unused by its owner, so the first eight bytes
//! are repurposed as two link words threading the block into its size
//! class's list. Per the resolution of spec.md's pointer-width open
//! question (see `SPEC_FULL.md` §3), link words hold 32-bit offsets from the
//! heap's base address rather than raw pointers, so they fit the same
//! 4-byte slots the boundary tags use. `u32::MAX` is the null sentinel.

use crate::block;

const NULL_LINK: u32 = u32::MAX;

fn encode(base: usize, payload: *mut u8) -> u32 {
  if payload.is_null() {
    NULL_LINK
  } else {
    (payload as usize - base) as u32
  }
}

fn decode(base: usize, link: u32) -> *mut u8 {
  if link == NULL_LINK {
    std::ptr::null_mut()
  } else {
    (base + link as usize) as *mut u8
  }
}

/// Reads a free block's predecessor link.
///
/// # Safety
/// `payload` must point at a free block's payload (i.e. at least 8 bytes,
/// not currently allocated).
pub(crate) unsafe fn read_prev(base: usize, payload: *mut u8) -> *mut u8 {
  unsafe { decode(base, block::read_word(payload)) }
}

/// Reads a free block's successor link.
///
/// # Safety
/// Same as [`read_prev`].
pub(crate) unsafe fn read_next(base: usize, payload: *mut u8) -> *mut u8 {
  unsafe { decode(base, block::read_word(payload.add(4))) }
}

/// Writes a free block's predecessor link.
///
/// # Safety
/// Same as [`read_prev`], with write access.
unsafe fn write_prev(base: usize, payload: *mut u8, prev: *mut u8) {
  unsafe { block::write_word(payload, encode(base, prev)) }
}

/// Writes a free block's successor link.
///
/// # Safety
/// Same as [`write_prev`].
unsafe fn write_next(base: usize, payload: *mut u8, next: *mut u8) {
  unsafe { block::write_word(payload.add(4), encode(base, next)) }
}

/// The segregated free-list directory: ten class heads stored as the first
/// 40 bytes of the heap region, addressed through `base`.
pub(crate) struct Directory {
  base: usize,
}

impl Directory {
  pub(crate) fn new(base: usize) -> Self {
    Self { base }
  }

  fn head_slot(&self, class: usize) -> *mut u8 {
    (self.base + class * block::WORD) as *mut u8
  }

  /// Clears every class head to null. Must be called once, over the
  /// directory's freshly-extended bytes, before any insert/unlink.
  ///
  /// # Safety
  /// The 40 bytes starting at `base` must be writable.
  pub(crate) unsafe fn clear(&mut self) {
    for class in 0..crate::size_class::NUM_CLASSES {
      unsafe { block::write_word(self.head_slot(class), NULL_LINK) };
    }
  }

  /// The first block in `class`'s chain, or null.
  ///
  /// # Safety
  /// The directory must have been initialized with [`Directory::clear`].
  pub(crate) unsafe fn head(&self, class: usize) -> *mut u8 {
    unsafe { decode(self.base, block::read_word(self.head_slot(class))) }
  }

  fn set_head(&mut self, class: usize, block: *mut u8) {
    unsafe { block::write_word(self.head_slot(class), encode(self.base, block)) };
  }

  /// Inserts `block` at the head of its size class's chain (LIFO).
  ///
  /// # Safety
  /// `block` must be a free block not already in any chain, with its header
  /// already reflecting its final size.
  pub(crate) unsafe fn insert(&mut self, block: *mut u8) {
    unsafe {
      let class = crate::size_class::of(crate::block::size(block));
      let old_head = self.head(class);
      write_prev(self.base, block, std::ptr::null_mut());
      write_next(self.base, block, old_head);
      if !old_head.is_null() {
        write_prev(self.base, old_head, block);
      }
      self.set_head(class, block);
    }
  }

  /// Removes `block` from its size class's chain.
  ///
  /// # Safety
  /// `block` must currently be a member of the chain for
  /// `size_class::of(block::size(block))`.
  pub(crate) unsafe fn unlink(&mut self, block: *mut u8) {
    unsafe {
      let class = crate::size_class::of(crate::block::size(block));
      let prev = read_prev(self.base, block);
      let next = read_next(self.base, block);
      if prev.is_null() {
        self.set_head(class, next);
      } else {
        write_next(self.base, prev, next);
      }
      if !next.is_null() {
        write_prev(self.base, next, prev);
      }
    }
  }
}
