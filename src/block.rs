//! Block layout primitives: pack/unpack of the `(size, alloc)` tag word and
//! header/footer/neighbor addressing.
//!
//! Every block, allocated or free, is flanked by a 4-byte header and a
//! 4-byte footer carrying the same word: the block's total size (including
//! both tags) in the upper bits, the allocation flag in bit 0. Sizes are
//! always multiples of 8, so bits 1-2 of the word are unused.
//!
//! A block is addressed by its *payload* pointer, the address handed to
//! callers, immediately after the header. All functions here take and
//! return payload pointers; the header is always `payload - 4` and the
//! footer `payload + size - 8`.

/// Size of a single boundary-tag word, in bytes.
pub(crate) const WORD: usize = 4;

/// Smallest legal block size: 4-byte header + 4-byte footer + two 4-byte
/// free-list link words.
pub(crate) const MIN_BLOCK: usize = 16;

const ALLOC_BIT: u32 = 0x1;

/// Packs a block size and allocation flag into a single tag word.
pub(crate) fn pack(size: usize, alloc: bool) -> u32 {
  debug_assert_eq!(size & 0x7, 0, "block size must be a multiple of 8");
  size as u32 | (alloc as u32)
}

/// Unpacks a tag word into `(size, alloc)`.
pub(crate) fn unpack(word: u32) -> (usize, bool) {
  ((word & !0x7) as usize, word & ALLOC_BIT != 0)
}

/// Reads the 32-bit word at `addr`.
///
/// # Safety
/// `addr` must be 4-byte aligned and point to readable memory.
pub(crate) unsafe fn read_word(addr: *mut u8) -> u32 {
  unsafe { (addr as *mut u32).read() }
}

/// Writes `word` at `addr`.
///
/// # Safety
/// `addr` must be 4-byte aligned and point to writable memory.
pub(crate) unsafe fn write_word(addr: *mut u8, word: u32) {
  unsafe { (addr as *mut u32).write(word) }
}

/// The address of `payload`'s header.
pub(crate) unsafe fn header_ptr(payload: *mut u8) -> *mut u8 {
  unsafe { payload.sub(WORD) }
}

/// The address of `payload`'s footer, given the block's total `size`.
pub(crate) unsafe fn footer_ptr(payload: *mut u8, size: usize) -> *mut u8 {
  unsafe { payload.add(size - 2 * WORD) }
}

/// The block's current size, read from its header.
///
/// # Safety
/// `payload` must point at a valid block's payload.
pub(crate) unsafe fn size(payload: *mut u8) -> usize {
  unsafe { unpack(read_word(header_ptr(payload))).0 }
}

/// Whether the block is currently marked allocated.
///
/// # Safety
/// `payload` must point at a valid block's payload.
pub(crate) unsafe fn is_allocated(payload: *mut u8) -> bool {
  unsafe { unpack(read_word(header_ptr(payload))).1 }
}

/// Writes matching header and footer tags for a block of the given `size`
/// and allocation state.
///
/// # Safety
/// `payload` must point at memory at least `size` bytes long, starting 4
/// bytes before `payload`.
pub(crate) unsafe fn write_tags(payload: *mut u8, size: usize, alloc: bool) {
  unsafe {
    let word = pack(size, alloc);
    write_word(header_ptr(payload), word);
    write_word(footer_ptr(payload, size), word);
  }
}

/// The payload pointer of the block physically following this one.
///
/// # Safety
/// `payload` must point at a valid block of the given `size`, and that
/// block must not be the heap's epilogue.
pub(crate) unsafe fn next_payload(payload: *mut u8, size: usize) -> *mut u8 {
  unsafe { payload.add(size) }
}

/// The payload pointer of the block physically preceding this one, found by
/// reading that neighbor's footer.
///
/// # Safety
/// `payload` must not be the heap's first real block (its physical
/// predecessor must be a valid block or the prologue).
pub(crate) unsafe fn prev_payload(payload: *mut u8) -> *mut u8 {
  unsafe {
    let prev_footer = payload.sub(2 * WORD);
    let (prev_size, _) = unpack(read_word(prev_footer));
    payload.sub(prev_size)
  }
}

/// Whether `payload`'s header and footer agree, and its header-reported size
/// is a plausible (non-degenerate) block size.
///
/// This is the cheap corruption heuristic `free`/`reallocate` use to reject
/// bad pointers; it is not a security boundary.
///
/// # Safety
/// `payload - WORD` and `payload + size - 2*WORD` must be readable, for
/// whatever `size` the header claims.
pub(crate) unsafe fn tags_consistent(payload: *mut u8) -> bool {
  unsafe {
    let (hsize, halloc) = unpack(read_word(header_ptr(payload)));
    if hsize < MIN_BLOCK || hsize & 0x7 != 0 {
      return false;
    }
    let (fsize, falloc) = unpack(read_word(footer_ptr(payload, hsize)));
    hsize == fsize && halloc == falloc
  }
}
