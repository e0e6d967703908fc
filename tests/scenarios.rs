//! Black-box scenario tests against the public API, using `MockHost` in
//! place of a live `sbrk` region.

use segalloc::{Heap, MockHost};

fn heap(capacity: usize) -> Heap<MockHost> {
  let mut heap = Heap::new(MockHost::with_capacity(capacity));
  heap.init().expect("mock host has ample capacity");
  heap
}

#[test]
fn init_then_single_allocate_leaves_one_free_tail() {
  let mut h = heap(1 << 20);
  let p = h.allocate(24);
  assert!(!p.is_null());
  assert_eq!((p as usize) % 8, 0);
  h.check().unwrap();
}

#[test]
fn coalesce_forward_merges_freed_neighbors() {
  let mut h = heap(1 << 20);
  let p1 = h.allocate(32);
  let p2 = h.allocate(32);
  let p3 = h.allocate(32);
  h.free(p2);
  h.free(p3);
  h.check().unwrap();
  let _ = p1;
}

#[test]
fn coalesce_backward_and_bidirectional() {
  let mut h = heap(1 << 20);
  let p1 = h.allocate(32);
  let p2 = h.allocate(32);
  let p3 = h.allocate(32);
  let p4 = h.allocate(32);
  h.free(p1);
  h.free(p3);
  h.free(p2);
  h.check().unwrap();
  let _ = p4;
}

#[test]
fn in_place_reallocate_shrink_keeps_address() {
  let mut h = heap(1 << 20);
  let p = h.allocate(128);
  let q = h.reallocate(p, 32);
  assert_eq!(p, q);
  h.check().unwrap();
}

#[test]
fn reallocate_growth_copies_and_moves() {
  let mut h = heap(1 << 20);
  let p = h.allocate(16);
  unsafe {
    for i in 0..8u8 {
      p.add(i as usize).write(i);
    }
  }
  let q = h.reallocate(p, 200);
  assert_ne!(p, q);
  unsafe {
    for i in 0..8u8 {
      assert_eq!(q.add(i as usize).read(), i);
    }
  }
  h.check().unwrap();
}

#[test]
fn extension_path_grows_and_splits() {
  let mut h = heap(1 << 20);
  let p = h.allocate(8000);
  assert!(!p.is_null());
  h.check().unwrap();
}

#[test]
fn defensive_free_on_interior_pointer_is_ignored() {
  let mut h = heap(1 << 20);
  let p = h.allocate(64);
  let interior = unsafe { p.add(8) };
  h.free(interior);
  h.check().unwrap();
  // A genuine free of the real payload pointer must still work afterward.
  h.free(p);
  h.check().unwrap();
}

#[test]
fn round_trip_allocate_then_free_restores_invariants() {
  let mut h = heap(1 << 20);
  let p = h.allocate(48);
  h.check().unwrap();
  h.free(p);
  h.check().unwrap();
}

#[test]
fn free_null_is_noop() {
  let mut h = heap(1 << 20);
  h.free(std::ptr::null_mut());
  h.check().unwrap();
}

#[test]
fn reallocate_null_forwards_to_allocate() {
  let mut h = heap(1 << 20);
  let p = h.reallocate(std::ptr::null_mut(), 40);
  assert!(!p.is_null());
  h.check().unwrap();
}

#[test]
fn reallocate_zero_size_forwards_to_free() {
  let mut h = heap(1 << 20);
  let p = h.allocate(40);
  let q = h.reallocate(p, 0);
  assert!(q.is_null());
  h.check().unwrap();
}

#[test]
fn shrink_preserves_leading_bytes() {
  let mut h = heap(1 << 20);
  let p = h.allocate(64);
  unsafe {
    for i in 0..16u8 {
      p.add(i as usize).write(i);
    }
  }
  let q = h.reallocate(p, 16);
  assert_eq!(p, q);
  unsafe {
    for i in 0..16u8 {
      assert_eq!(q.add(i as usize).read(), i);
    }
  }
}

#[test]
fn boundary_sizes_round_up_as_specified() {
  let mut h = heap(1 << 20);
  let one = h.allocate(1);
  let eight = h.allocate(8);
  let nine = h.allocate(9);
  assert!(!one.is_null() && !eight.is_null() && !nine.is_null());
  // Exact block sizes are covered at the unit level in heap.rs; here we
  // only confirm distinct, validly-tagged allocations coexist.
  h.check().unwrap();
}

#[test]
fn many_allocate_free_cycles_stay_consistent() {
  let mut h = heap(1 << 20);
  let mut live = Vec::new();
  for i in 0..200 {
    let size = 8 + (i % 37) * 4;
    live.push(h.allocate(size));
  }
  for (i, &p) in live.iter().enumerate() {
    if i % 2 == 0 {
      h.free(p);
    }
  }
  h.check().unwrap();
  for (i, &p) in live.iter().enumerate() {
    if i % 2 != 0 {
      h.free(p);
    }
  }
  h.check().unwrap();
}

#[test]
fn out_of_memory_on_tiny_host_returns_null_without_panicking() {
  let mut h = heap(4096);
  let mut last_ok = false;
  for _ in 0..8 {
    let p = h.allocate(256);
    last_ok = last_ok || !p.is_null();
  }
  assert!(last_ok);
  assert!(h.allocate(usize::MAX / 2).is_null());
}
