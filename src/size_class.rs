//! Size-class index: a pure function mapping a block size to one of ten
//! free-list classes.
//!
//! Boundaries sit at powers of two from 64 up to 16 384; anything larger
//! falls into the tenth, unbounded class. No ordering is maintained within a
//! class. Classes are buckets, not sorted lists.

/// Number of segregated free-list classes.
pub(crate) const NUM_CLASSES: usize = 10;

const BOUNDARIES: [usize; NUM_CLASSES - 1] = [64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384];

/// The class index for a block of the given size.
pub(crate) fn of(size: usize) -> usize {
  for (class, &boundary) in BOUNDARIES.iter().enumerate() {
    if size <= boundary {
      return class;
    }
  }
  NUM_CLASSES - 1
}
