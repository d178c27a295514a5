//! Double Buffer for Published Filter State
//!
//! ## Overview
//!
//! The estimator keeps two copies of its state. Readers only ever see the
//! *front* slot; each filter step reads the front, writes the *back*, and then
//! publishes the result with [`DoubleBuffer::flip`].
//!
//! ```text
//!           front        back
//!         ┌───────┐   ┌───────┐
//! tick n  │ s(n)  │   │ s(n+1)│ ← propagate writes here
//!         └───────┘   └───────┘
//!              flip() swaps the index
//!         ┌───────┐   ┌───────┐
//!         │ s(n+1)│   │ s(n)  │ ← correct writes here
//!         └───────┘   └───────┘
//! ```
//!
//! ### Why Two Slots?
//!
//! A step that fails part-way never calls `flip()`, so the previously published
//! state is still the front slot: there is nothing to roll back. Publishing is
//! a single index write, which keeps the tick bounded in time.
//!
//! ### Borrowing
//!
//! [`DoubleBuffer::split_mut`] hands out the front as `&T` and the back as
//! `&mut T` at the same time. Both borrows come from one `&mut self`, so the
//! borrow checker guarantees the writer cannot alias what it reads.
//!
//! ## Usage Example
//!
//! ```rust
//! use strapfuse_core::buffer::DoubleBuffer;
//!
//! let mut buf = DoubleBuffer::new(0u32);
//!
//! let (front, back) = buf.split_mut();
//! *back = *front + 1;
//! assert_eq!(*buf.front(), 0); // not yet published
//!
//! buf.flip();
//! assert_eq!(*buf.front(), 1);
//! ```

/// Two slots of `T` with one of them published
///
/// ## Internal Invariants
///
/// - `front < 2`
/// - `generation` counts flips and wraps on overflow
#[derive(Debug, Clone)]
pub struct DoubleBuffer<T> {
    slots: [T; 2],
    front: usize,
    generation: u32,
}

impl<T: Clone> DoubleBuffer<T> {
    /// Create a buffer with both slots holding `initial`
    pub fn new(initial: T) -> Self {
        Self {
            slots: [initial.clone(), initial],
            front: 0,
            generation: 0,
        }
    }

    /// Overwrite both slots and publish `value`
    pub fn reset(&mut self, value: T) {
        self.slots = [value.clone(), value];
        self.front = 0;
        self.generation = self.generation.wrapping_add(1);
    }
}

impl<T> DoubleBuffer<T> {
    /// Published slot
    #[inline]
    pub fn front(&self) -> &T {
        &self.slots[self.front]
    }

    /// Published slot for reading, back slot for writing
    #[inline]
    pub fn split_mut(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.slots;
        if self.front == 0 {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Publish the back slot
    #[inline]
    pub fn flip(&mut self) {
        self.front ^= 1;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Number of publishes since creation (wrapping)
    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}
