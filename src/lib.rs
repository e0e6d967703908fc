//! # segalloc - A Segregated Free-List Memory Allocator
//!
//! This crate provides a **segregated free-list allocator**: a boundary-tag
//! allocator that buckets free blocks into ten size classes and grows its
//! backing region on demand through a pluggable host primitive.
//!
//! ## Overview
//!
//! Every block, free or allocated, carries a 4-byte header and a matching
//! 4-byte footer, each packing the block's total size and an allocation bit.
//! Free blocks additionally store two 4-byte free-list links in their
//! payload, threading them into one of ten per-size-class chains kept at the
//! front of the heap:
//!
//! ```text
//!   ┌────────────┬──────────────────┬─────────────────────────────────┐
//!   │ Directory  │ pad + sentinels  │  blocks ...                     │
//!   │  (40 B)    │     (16 B)       │  header│payload/links│footer    │
//!   └────────────┴──────────────────┴─────────────────────────────────┘
//! ```
//!
//! Allocation is first-fit within a block's size class, escalating to larger
//! classes on a miss. Freeing immediately coalesces with any free physical
//! neighbor, in all four header/footer combinations, keeping the heap free
//! of adjacent free blocks at all times.
//!
//! ## Crate Structure
//!
//! ```text
//!   segalloc
//!   ├── align       - align_to! rounding macro
//!   ├── error       - HostError, AllocError
//!   ├── host        - MemoryHost trait, SbrkHost, MockHost
//!   ├── block       - boundary-tag primitives
//!   ├── size_class  - size -> class mapping
//!   ├── freelist    - free-list links and the class directory
//!   ├── check       - heap consistency checker
//!   └── heap        - Heap<H>: init/allocate/free/reallocate
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use segalloc::{Heap, SbrkHost};
//!
//! # fn main() -> Result<(), segalloc::AllocError> {
//! let mut heap = Heap::new(SbrkHost::new());
//! heap.init()?;
//!
//! let p = heap.allocate(64);
//! assert!(!p.is_null());
//! heap.free(p);
//! # Ok(())
//! # }
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: `Heap` is neither `Sync` nor `Send`-safe to
//!   share; callers needing concurrent access must add their own
//!   synchronization around it.
//! - **No `GlobalAlloc` impl**: wiring one up would require exactly the
//!   locking above, which the design deliberately leaves out.
//! - **Unix-only by default host**: [`SbrkHost`] requires `sbrk(2)`; bring
//!   your own [`host::MemoryHost`] on other targets.
//!
//! ## Safety
//!
//! This crate manages raw memory directly. Its public API (`allocate`,
//! `free`, `reallocate`) is safe to call, but every pointer it hands back is
//! only as valid as the caller's use of it. Writing past an allocation's
//! size, or using a pointer after freeing it, is undefined behavior exactly
//! as it would be with the system allocator.

pub mod align;
mod block;
pub mod check;
pub mod error;
mod freelist;
pub mod heap;
pub mod host;
mod size_class;

pub use check::CheckError;
pub use error::{AllocError, HostError};
pub use heap::Heap;
pub use host::{MemoryHost, MockHost, SbrkHost};
