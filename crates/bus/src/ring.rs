// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock-free single-producer/single-consumer ring queue
//!
//! Capacity is a power of two, so a sequence maps to its slot with a mask.
//! The producer fills a slot, then publishes the new write sequence with a
//! release store. The consumer acquires that sequence before touching any
//! slot at or below it, and after emptying slots publishes its read sequence
//! with a release store, which the producer acquires before reusing them.
//!
//! Each side keeps a cached copy of the other side's sequence and only goes
//! back to the shared atomic when the cache says the ring is full (producer)
//! or empty (consumer).
//!
//! [`Producer`] and [`Consumer`] are not `Clone`, so one ring has exactly one
//! of each. Callers that need several producers put the [`Producer`] behind
//! a mutex, as [`crate::Mailbox`] does.

#![allow(unsafe_code)]

use crate::error::RingError;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Smallest accepted capacity
pub const MIN_CAPACITY: usize = 2;

/// Spins before a full producer starts yielding its time slice
const SPINS_BEFORE_YIELD: u32 = 64;

/// Keeps the two sequences on separate cache lines
#[repr(align(64))]
struct CachePadded<T>(T);

struct Ring<T> {
    slots: Box<[UnsafeCell<Option<T>>]>,
    mask: usize,
    /// One past the last published sequence; written only by the producer
    write: CachePadded<AtomicUsize>,
    /// Next sequence to consume; written only by the consumer
    read: CachePadded<AtomicUsize>,
}

// SAFETY: slots are only reached through `Producer` and `Consumer`. The
// producer touches slot `s` only while `s - read < capacity` and `s >= write`
// (unpublished, already consumed), the consumer only while `read <= s < write`
// (published, not yet consumed). The acquire/release pairs on `write` and
// `read` order those accesses, so no slot is accessed from both sides at once.
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn len(&self) -> usize {
        // Read first: `write` only grows and never trails `read`
        let read = self.read.0.load(Ordering::Acquire);
        let write = self.write.0.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }
}

/// Create a ring with `capacity` slots and return its two ends
pub fn channel<T>(capacity: usize) -> Result<(Producer<T>, Consumer<T>), RingError> {
    if capacity < MIN_CAPACITY {
        return Err(RingError::CapacityTooSmall {
            capacity,
            minimum: MIN_CAPACITY,
        });
    }
    if !capacity.is_power_of_two() {
        return Err(RingError::CapacityNotPowerOfTwo(capacity));
    }

    let slots = (0..capacity)
        .map(|_| UnsafeCell::new(None))
        .collect::<Vec<_>>()
        .into_boxed_slice();
    let ring = Arc::new(Ring {
        slots,
        mask: capacity - 1,
        write: CachePadded(AtomicUsize::new(0)),
        read: CachePadded(AtomicUsize::new(0)),
    });

    let producer = Producer {
        ring: Arc::clone(&ring),
        write: 0,
        cached_read: 0,
    };
    let consumer = Consumer {
        ring,
        read: 0,
        cached_write: 0,
    };
    Ok((producer, consumer))
}

/// The enqueueing end of a ring
pub struct Producer<T> {
    ring: Arc<Ring<T>>,
    write: usize,
    cached_read: usize,
}

impl<T> Producer<T> {
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Items currently in the ring
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Handle for observing the ring's length from other threads
    pub fn depth(&self) -> Depth<T> {
        Depth {
            ring: Arc::clone(&self.ring),
        }
    }

    /// Enqueue `item`, handing it back if the ring is full
    pub fn try_enqueue(&mut self, item: T) -> Result<(), T> {
        let capacity = self.ring.capacity();
        if self.write.wrapping_sub(self.cached_read) >= capacity {
            self.cached_read = self.ring.read.0.load(Ordering::Acquire);
            if self.write.wrapping_sub(self.cached_read) >= capacity {
                return Err(item);
            }
        }

        let slot = &self.ring.slots[self.write & self.ring.mask];
        // SAFETY: `write` is unpublished and `write - read < capacity`, so the
        // consumer has emptied this slot and will not look at it until the
        // release store below.
        unsafe {
            *slot.get() = Some(item);
        }

        self.write = self.write.wrapping_add(1);
        self.ring.write.0.store(self.write, Ordering::Release);
        Ok(())
    }

    /// Enqueue `item`, spinning until the consumer frees a slot
    pub fn enqueue(&mut self, item: T) {
        let mut item = item;
        let mut spins = 0u32;
        loop {
            match self.try_enqueue(item) {
                Ok(()) => return,
                Err(returned) => {
                    item = returned;
                    if spins < SPINS_BEFORE_YIELD {
                        spins += 1;
                        std::hint::spin_loop();
                    } else {
                        std::thread::yield_now();
                    }
                }
            }
        }
    }
}

/// The dequeueing end of a ring
pub struct Consumer<T> {
    ring: Arc<Ring<T>>,
    read: usize,
    cached_write: usize,
}

impl<T> Consumer<T> {
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Items published but not yet consumed
    pub fn backlog(&self) -> usize {
        self.ring
            .write
            .0
            .load(Ordering::Acquire)
            .wrapping_sub(self.read)
    }

    pub fn is_empty(&self) -> bool {
        self.backlog() == 0
    }

    /// Take the oldest item, if any
    pub fn try_dequeue(&mut self) -> Option<T> {
        if self.read == self.cached_write {
            self.cached_write = self.ring.write.0.load(Ordering::Acquire);
            if self.read == self.cached_write {
                return None;
            }
        }

        let item = self.take_slot(self.read);
        self.read = self.read.wrapping_add(1);
        self.ring.read.0.store(self.read, Ordering::Release);
        item
    }

    /// Move up to `max` of the oldest items onto `buffer`, in order.
    ///
    /// Returns how many were moved; zero means the ring was empty.
    pub fn try_dequeue_batch(&mut self, buffer: &mut Vec<T>, max: usize) -> usize {
        let mut available = self.cached_write.wrapping_sub(self.read);
        if available < max {
            self.cached_write = self.ring.write.0.load(Ordering::Acquire);
            available = self.cached_write.wrapping_sub(self.read);
        }

        let count = available.min(max);
        if count == 0 {
            return 0;
        }

        buffer.reserve(count);
        for offset in 0..count {
            if let Some(item) = self.take_slot(self.read.wrapping_add(offset)) {
                buffer.push(item);
            }
        }
        self.read = self.read.wrapping_add(count);
        self.ring.read.0.store(self.read, Ordering::Release);
        count
    }

    fn take_slot(&mut self, sequence: usize) -> Option<T> {
        let slot = &self.ring.slots[sequence & self.ring.mask];
        // SAFETY: `sequence < cached_write`, which was acquired from the
        // producer's release store, so the slot is fully written; the producer
        // will not reuse it until `read` moves past it.
        let item = unsafe { (*slot.get()).take() };
        debug_assert!(item.is_some(), "published slot was empty");
        item
    }
}

/// Read-only view of a ring's length, safe to share between threads
pub struct Depth<T> {
    ring: Arc<Ring<T>>,
}

impl<T> Depth<T> {
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for Depth<T> {
    fn clone(&self) -> Self {
        Self {
            ring: Arc::clone(&self.ring),
        }
    }
}

#[cfg(test)]
#[path = "ring_tests.rs"]
mod tests;
