//! Synthetic id allocation.

use std::sync::atomic::{AtomicI32, Ordering};

use crate::channel::PhantomId;

/// First id handed out. Host entity ids are small positive integers, so the
/// lower half of the negative range never collides with them.
pub const FIRST_PHANTOM_ID: i32 = i32::MIN / 2;

/// Hands out phantom ids from `[i32::MIN / 2, -1]`, wrapping back to the
/// start once the range is exhausted.
#[derive(Debug)]
pub struct PhantomIdAllocator {
    next: AtomicI32,
}

impl Default for PhantomIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PhantomIdAllocator {
    /// Creates an allocator at [`FIRST_PHANTOM_ID`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicI32::new(FIRST_PHANTOM_ID),
        }
    }

    /// Returns the next unused id.
    pub fn allocate(&self) -> PhantomId {
        let previous = self
            .next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(if n >= -1 { FIRST_PHANTOM_ID } else { n + 1 })
            })
            .unwrap_or(FIRST_PHANTOM_ID);
        PhantomId(previous)
    }
}
