//! The allocator aggregate: heap extension, coalescing, placement, and the
//! first-fit finder, tied together behind `init`/`allocate`/`free`/
//! `reallocate`.
//!
//! Global state (the directory, the heap base, and the frontier) lives
//! entirely inside the byte region the [`MemoryHost`] provides; `Heap` only
//! remembers the two addresses it needs to find that region again.

use std::ptr;

use crate::align_to;
use crate::block;
use crate::check::{self, CheckError, View};
use crate::error::AllocError;
use crate::freelist::Directory;
use crate::host::MemoryHost;
use crate::size_class;

/// Bytes reserved for the ten free-list class heads.
const DIRECTORY_BYTES: usize = size_class::NUM_CLASSES * block::WORD;

/// Bytes reserved for the alignment pad, prologue header+footer, and
/// epilogue header that precede the first real block.
const PREFIX_BYTES: usize = 16;

/// Minimum growth requested from the host when the finder misses.
const CHUNK_SIZE: usize = 4096;

/// A single-threaded segregated free-list allocator over a host-supplied,
/// monotonically growable byte region.
///
/// ```text
///   Directory (40B) │ pad+prologue+epilogue (16B) │ blocks ... │ epilogue
///                    ▲                                          ▲
///                   base                                    self.epilogue
/// ```
pub struct Heap<H: MemoryHost> {
  host: H,
  /// Address of the directory's first byte, also the reference point every
  /// free-list link word's offset is computed from.
  base: usize,
  /// Header address of the first real block (right after the prologue).
  first_block: usize,
  /// Address of the current epilogue header (the frontier).
  epilogue: usize,
}

impl<H: MemoryHost> Heap<H> {
  /// Creates an allocator over `host`. The heap is unusable until
  /// [`Heap::init`] succeeds.
  pub fn new(host: H) -> Self {
    Self {
      host,
      base: 0,
      first_block: 0,
      epilogue: 0,
    }
  }

  /// Lays out the directory and sentinels, then grows the heap once by
  /// [`CHUNK_SIZE`] bytes so the first allocation doesn't have to.
  pub fn init(&mut self) -> Result<(), AllocError> {
    let dir_addr = self.host.extend_region(DIRECTORY_BYTES)?;
    self.base = dir_addr;
    let mut dir = Directory::new(self.base);
    unsafe { dir.clear() };

    let prefix = self.host.extend_region(PREFIX_BYTES)?;
    // prefix: [pad(4)][prologue header(4)][prologue footer(4)][epilogue header(4)]
    let prologue_header = prefix + block::WORD;
    unsafe {
      block::write_word(prologue_header as *mut u8, block::pack(8, true));
      block::write_word((prologue_header + block::WORD) as *mut u8, block::pack(8, true));
    }
    let epilogue = prologue_header + 8;
    unsafe { block::write_word(epilogue as *mut u8, block::pack(0, true)) };
    self.first_block = epilogue;
    self.epilogue = epilogue;

    self.extend(CHUNK_SIZE)?;
    Ok(())
  }

  /// Allocates a block able to hold `size` bytes, or returns null on a
  /// zero-size request or host exhaustion.
  pub fn allocate(&mut self, size: usize) -> *mut u8 {
    if size == 0 {
      return ptr::null_mut();
    }
    let asize = Self::adjusted_size(size);

    unsafe {
      if let Some(fit) = self.find_fit(asize) {
        let result = self.place(fit, asize, true);
        self.maybe_check();
        return result;
      }
    }

    let grow = asize.max(CHUNK_SIZE);
    match self.extend(grow) {
      Ok(block) => {
        let result = unsafe { self.place(block, asize, true) };
        self.maybe_check();
        result
      }
      Err(_) => ptr::null_mut(),
    }
  }

  /// Frees a previously allocated block. Silently ignores null, out-of-range,
  /// already-free, or tag-inconsistent pointers (see `spec.md` §7).
  pub fn free(&mut self, p: *mut u8) {
    if p.is_null() {
      return;
    }
    if !unsafe { self.is_valid_allocated(p) } {
      return;
    }
    unsafe {
      let size = block::size(p);
      block::write_tags(p, size, false);
      self.coalesce(p);
    }
    self.maybe_check();
  }

  /// Reallocates `p` to hold `size` bytes. See `spec.md` §4.9 for the exact
  /// forwarding rules this implements (null/zero-size shortcuts, in-place
  /// shrink, copying grow).
  pub fn reallocate(&mut self, p: *mut u8, size: usize) -> *mut u8 {
    if p.is_null() {
      return self.allocate(size);
    }
    if size == 0 {
      self.free(p);
      return ptr::null_mut();
    }
    if !unsafe { self.is_valid_allocated(p) } {
      return self.allocate(size);
    }

    let asize = Self::adjusted_size(size);
    let current = unsafe { block::size(p) };
    if asize <= current {
      let result = unsafe { self.place(p, asize, false) };
      self.maybe_check();
      return result;
    }

    let new_ptr = self.allocate(size);
    if new_ptr.is_null() {
      // Standard realloc contract: leave the original block intact on
      // failure rather than freeing it out from under the caller.
      return ptr::null_mut();
    }
    unsafe {
      let copy_len = current - 2 * block::WORD;
      ptr::copy_nonoverlapping(p, new_ptr, copy_len);
    }
    self.free(p);
    new_ptr
  }

  /// Runs the heap consistency checker. Exposed for tests; also used
  /// internally when the `debug-checks` feature is enabled.
  pub fn check(&self) -> Result<(), CheckError> {
    check::run(&View {
      base: self.base,
      first_block: self.first_block,
      epilogue: self.epilogue,
    })
  }

  #[cfg(feature = "debug-checks")]
  fn maybe_check(&self) {
    debug_assert!(self.check().is_ok(), "heap consistency check failed");
  }

  #[cfg(not(feature = "debug-checks"))]
  fn maybe_check(&self) {}

  /// `asize = max(16, 8 * ceil((size + 8) / 8))`, spec.md §4.9's request
  /// sizing: room for one tag pair, rounded to 8 bytes, clamped to the
  /// minimum block size.
  fn adjusted_size(size: usize) -> usize {
    align_to!(size + 2 * block::WORD, 8).max(block::MIN_BLOCK)
  }

  /// Checks that `p` is a pointer this allocator could plausibly have
  /// handed out and that currently looks allocated: in-range, tag-consistent,
  /// and marked allocated. Shared by `free` and `reallocate`.
  unsafe fn is_valid_allocated(&self, p: *mut u8) -> bool {
    let addr = p as usize;
    if addr < self.host.region_low() || addr > self.host.region_high() {
      return false;
    }
    if !unsafe { block::tags_consistent(p) } {
      return false;
    }
    unsafe { block::is_allocated(p) }
  }

  /// Grows the heap by at least `min_bytes`, rounded to an 8-byte multiple,
  /// folds the new block into the coalescer, and returns the (possibly
  /// merged) payload pointer.
  fn extend(&mut self, min_bytes: usize) -> Result<*mut u8, AllocError> {
    let size = align_to!(min_bytes, 8).max(block::MIN_BLOCK);
    let header_addr = self.epilogue;
    let new_addr = self.host.extend_region(size)?;
    debug_assert_eq!(new_addr, header_addr + block::WORD);

    let payload = (header_addr + block::WORD) as *mut u8;
    unsafe { block::write_tags(payload, size, false) };
    let new_epilogue = header_addr + size;
    unsafe { block::write_word(new_epilogue as *mut u8, block::pack(0, true)) };
    self.epilogue = new_epilogue;

    log::trace!("heap extended by {size} bytes, new frontier {new_epilogue:#x}");
    Ok(unsafe { self.coalesce(payload) })
  }

  /// The four-case boundary-tag coalescer. `b` must be a free block (tags
  /// already read `(size, 0)`) not yet linked into any class.
  ///
  /// Unlinks absorbed neighbors before rewriting tags (so their own class
  /// lookup, were it attempted, wouldn't see a stale size), and writes the
  /// merged tags before inserting (so the class lookup on insert sees the
  /// final size), the ordering spec.md §5 requires.
  unsafe fn coalesce(&mut self, b: *mut u8) -> *mut u8 {
    unsafe {
      let size = block::size(b);
      let prev = block::prev_payload(b);
      let next = block::next_payload(b, size);
      let prev_alloc = block::is_allocated(prev);
      let next_alloc = block::is_allocated(next);

      let mut dir = Directory::new(self.base);
      match (prev_alloc, next_alloc) {
        (true, true) => {
          log::trace!("coalesce {:#x}: no free neighbors", b as usize);
          dir.insert(b);
          b
        }
        (true, false) => {
          log::trace!("coalesce {:#x}: merging with next", b as usize);
          dir.unlink(next);
          let merged = size + block::size(next);
          block::write_tags(b, merged, false);
          dir.insert(b);
          b
        }
        (false, true) => {
          log::trace!("coalesce {:#x}: merging with prev", b as usize);
          dir.unlink(prev);
          let merged = block::size(prev) + size;
          block::write_tags(prev, merged, false);
          dir.insert(prev);
          prev
        }
        (false, false) => {
          log::trace!("coalesce {:#x}: merging with both neighbors", b as usize);
          dir.unlink(prev);
          dir.unlink(next);
          let merged = block::size(prev) + size + block::size(next);
          block::write_tags(prev, merged, false);
          dir.insert(prev);
          prev
        }
      }
    }
  }

  /// Marks `b` allocated at `asize`, splitting off and recycling a free tail
  /// if the remainder meets the minimum block size.
  ///
  /// `currently_free` distinguishes the two callers: the finder hands place
  /// a block already linked into a class (must be unlinked first), while
  /// reallocate's in-place shrink hands it an already-allocated block (never
  /// linked, nothing to unlink). Either way the split tail is run through
  /// the coalescer rather than inserted directly. A block fresh out of the
  /// finder is guaranteed an allocated physical successor (coalescing-
  /// maximality), but a block that was previously allocated (the realloc
  /// case) carries no such guarantee, and skipping the merge would leave
  /// two adjacent free blocks.
  unsafe fn place(&mut self, b: *mut u8, asize: usize, currently_free: bool) -> *mut u8 {
    unsafe {
      if currently_free {
        Directory::new(self.base).unlink(b);
      }
      let bsize = block::size(b);
      let remainder = bsize - asize;
      if remainder >= block::MIN_BLOCK {
        block::write_tags(b, asize, true);
        let tail = block::next_payload(b, asize);
        block::write_tags(tail, remainder, false);
        self.coalesce(tail);
      } else {
        block::write_tags(b, bsize, true);
      }
      b
    }
  }

  /// First-fit search starting at `size_class::of(asize)`, escalating to
  /// larger classes until a fit is found or the directory is exhausted.
  unsafe fn find_fit(&self, asize: usize) -> Option<*mut u8> {
    unsafe {
      let dir = Directory::new(self.base);
      for class in size_class::of(asize)..size_class::NUM_CLASSES {
        let mut node = dir.head(class);
        while !node.is_null() {
          if block::size(node) >= asize {
            return Some(node);
          }
          node = crate::freelist::read_next(self.base, node);
        }
      }
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::host::MockHost;

  fn fresh_heap(capacity: usize) -> Heap<MockHost> {
    let mut heap = Heap::new(MockHost::with_capacity(capacity));
    heap.init().expect("init should succeed with ample capacity");
    heap
  }

  #[test]
  fn init_then_single_allocate() {
    let mut heap = fresh_heap(1 << 20);
    let p = heap.allocate(24);
    assert!(!p.is_null());
    assert_eq!((p as usize) % 8, 0);
    assert_eq!(unsafe { block::size(p) }, 32);
    heap.check().unwrap();
  }

  #[test]
  fn allocating_one_byte_yields_minimum_block() {
    let mut heap = fresh_heap(1 << 20);
    let p = heap.allocate(1);
    assert_eq!(unsafe { block::size(p) }, 16);
  }

  #[test]
  fn allocating_eight_bytes_yields_minimum_block() {
    let mut heap = fresh_heap(1 << 20);
    let p = heap.allocate(8);
    assert_eq!(unsafe { block::size(p) }, 16);
  }

  #[test]
  fn allocating_nine_bytes_yields_24_byte_block() {
    let mut heap = fresh_heap(1 << 20);
    let p = heap.allocate(9);
    assert_eq!(unsafe { block::size(p) }, 24);
  }

  #[test]
  fn zero_size_allocate_returns_null() {
    let mut heap = fresh_heap(1 << 20);
    assert!(heap.allocate(0).is_null());
  }

  #[test]
  fn coalesce_forward() {
    let mut heap = fresh_heap(1 << 20);
    let p1 = heap.allocate(32);
    let p2 = heap.allocate(32);
    let p3 = heap.allocate(32);
    assert!(!p1.is_null() && !p2.is_null() && !p3.is_null());

    heap.free(p2);
    heap.free(p3);
    heap.check().unwrap();

    // p2's block should now have absorbed p3's block and whatever free tail
    // followed it; no adjacent frees should remain anywhere in the heap.
    let merged_size = unsafe { block::size(p2) };
    assert!(merged_size >= unsafe { block::size(p1) } * 2);
  }

  #[test]
  fn coalesce_backward_and_bidirectional() {
    let mut heap = fresh_heap(1 << 20);
    let p1 = heap.allocate(32);
    let p2 = heap.allocate(32);
    let p3 = heap.allocate(32);
    let p4 = heap.allocate(32);

    heap.free(p1);
    heap.free(p3);
    heap.free(p2);
    heap.check().unwrap();

    assert!(unsafe { block::is_allocated(p4) });
    // p1, p2, p3's extents should all now be one free block reachable from p1.
    assert!(!unsafe { block::is_allocated(p1) });
    let merged = unsafe { block::size(p1) };
    assert!(merged >= 3 * 32);
  }

  #[test]
  fn reallocate_in_place_shrink() {
    let mut heap = fresh_heap(1 << 20);
    let p = heap.allocate(128);
    let q = heap.reallocate(p, 32);
    assert_eq!(p, q);
    assert_eq!(unsafe { block::size(q) }, 40);
    heap.check().unwrap();
  }

  #[test]
  fn reallocate_growth_copies_payload() {
    let mut heap = fresh_heap(1 << 20);
    let p = heap.allocate(16) as *mut u8;
    unsafe {
      for i in 0..8u8 {
        p.add(i as usize).write(i);
      }
    }
    let q = heap.reallocate(p, 200);
    assert_ne!(p, q);
    unsafe {
      for i in 0..8u8 {
        assert_eq!(q.add(i as usize).read(), i);
      }
    }
    heap.check().unwrap();
  }

  #[test]
  fn reallocate_null_is_allocate() {
    let mut heap = fresh_heap(1 << 20);
    let p = heap.reallocate(ptr::null_mut(), 64);
    assert!(!p.is_null());
  }

  #[test]
  fn reallocate_zero_size_frees_and_returns_null() {
    let mut heap = fresh_heap(1 << 20);
    let p = heap.allocate(64);
    let q = heap.reallocate(p, 0);
    assert!(q.is_null());
  }

  #[test]
  fn free_null_is_noop() {
    let mut heap = fresh_heap(1 << 20);
    heap.free(ptr::null_mut());
    heap.check().unwrap();
  }

  #[test]
  fn extension_path_on_large_allocation() {
    let mut heap = fresh_heap(1 << 20);
    let p = heap.allocate(8000);
    assert!(!p.is_null());
    assert!(unsafe { block::size(p) } >= 8008);
    heap.check().unwrap();
  }

  #[test]
  fn defensive_free_of_interior_pointer_is_ignored() {
    let mut heap = fresh_heap(1 << 20);
    let p = heap.allocate(64);
    let interior = unsafe { p.add(8) };
    heap.free(interior);
    assert!(unsafe { block::is_allocated(p) });
    heap.check().unwrap();
  }

  #[test]
  fn double_free_is_ignored() {
    let mut heap = fresh_heap(1 << 20);
    let p = heap.allocate(64);
    heap.free(p);
    heap.check().unwrap();
    // p's block is now free and part of a list; freeing again must not
    // corrupt that list.
    heap.free(p);
    heap.check().unwrap();
  }

  #[test]
  fn out_of_memory_returns_null() {
    let mut heap = fresh_heap(8192);
    // Exhaust the small mock region.
    let mut last = ptr::null_mut();
    for _ in 0..64 {
      let p = heap.allocate(64);
      if p.is_null() {
        break;
      }
      last = p;
    }
    assert!(!last.is_null());
    assert!(heap.allocate(usize::MAX / 2).is_null());
  }
}
