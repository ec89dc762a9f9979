//! Block-growing storage with separate capacity and live count.

use std::{fmt, mem::size_of, slice, sync::Arc};

use pico_host::Allocator;

use crate::{Error, Result};

pub const GROW_SHADERS: usize = 16;
pub const GROW_SURFACES: usize = 16;
pub const GROW_VERTEXES: usize = 16;
pub const GROW_INDEXES: usize = 16;
pub const GROW_FACES: usize = 16;
pub const GROW_ARRAYS: usize = 16;

/// Storage whose capacity grows in multiples of a fixed block and never shrinks.
///
/// Every slot up to the capacity is initialized with `T::default()` when it is
/// reserved, so slots past the live count always hold either a default value
/// or a value from before the count was lowered.
pub struct GrowArray<T> {
    items: Vec<T>,
    count: usize,
    block: usize,
    allocator: Arc<dyn Allocator>,
}

impl<T: Default> GrowArray<T> {
    /// # Panics
    ///
    /// Panics if `block` is zero.
    #[must_use]
    pub fn new(block: usize, allocator: Arc<dyn Allocator>) -> Self {
        assert!(block > 0, "growth block must not be zero");

        Self {
            items: Vec::new(),
            count: 0,
            block,
            allocator,
        }
    }

    /// Makes room for at least `count` items, rounding up to the growth block.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the allocator refuses the growth or the allocation fails.
    /// The array is unchanged in that case.
    pub fn reserve(&mut self, count: usize) -> Result<()> {
        let current = self.capacity();
        if count <= current {
            return Ok(());
        }

        let capacity = count
            .checked_add(self.block - 1)
            .ok_or(Error::OutOfMemory)?
            / self.block
            * self.block;
        let additional = capacity - current;
        let size = additional
            .checked_mul(size_of::<T>())
            .ok_or(Error::OutOfMemory)?;

        if !self.allocator.alloc(size) {
            return Err(Error::OutOfMemory);
        }

        if self.items.try_reserve_exact(additional).is_err() {
            self.allocator.free(size);
            return Err(Error::OutOfMemory);
        }

        self.items.resize_with(capacity, T::default);
        Ok(())
    }

    /// Sets the live count.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `count` exceeds the reserved capacity.
    pub fn set_count(&mut self, count: usize) -> Result<()> {
        if count > self.capacity() {
            return Err(Error::InvalidModel("count exceeds the reserved capacity"));
        }
        self.count = count;
        Ok(())
    }

    /// Reserves and sets the live count.
    ///
    /// # Errors
    ///
    /// Returns `Err` if reserving fails, leaving the count unchanged.
    pub fn resize(&mut self, count: usize) -> Result<()> {
        self.reserve(count)?;
        self.set_count(count)
    }

    /// Frees the storage, zeroing both capacity and count.
    pub fn release(&mut self) {
        let size = self.capacity() * size_of::<T>();
        self.items = Vec::new();
        self.count = 0;

        if size > 0 {
            self.allocator.free(size);
        }
    }
}

impl<T> GrowArray<T> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn block(&self) -> usize {
        self.block
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items[..self.count]
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items[..self.count]
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_slice().get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.as_mut_slice().get_mut(index)
    }

    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.as_mut_slice().iter_mut()
    }

    /// All reserved slots, including the ones past the live count.
    pub(crate) fn slots_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

impl<T> Drop for GrowArray<T> {
    fn drop(&mut self) {
        let size = self.items.len() * size_of::<T>();
        if size > 0 {
            self.allocator.free(size);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for GrowArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrowArray")
            .field("count", &self.count)
            .field("capacity", &self.capacity())
            .field("items", &self.as_slice())
            .finish()
    }
}

impl<'a, T> IntoIterator for &'a GrowArray<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pico_host::SystemAllocator;

    use super::*;

    #[derive(Default)]
    struct Budget {
        remaining: AtomicUsize,
        freed: AtomicUsize,
    }

    impl Allocator for Budget {
        fn alloc(&self, size: usize) -> bool {
            self.remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |r| r.checked_sub(size))
                .is_ok()
        }

        fn free(&self, size: usize) {
            self.freed.fetch_add(size, Ordering::SeqCst);
        }
    }

    fn array<T: Default>() -> GrowArray<T> {
        GrowArray::new(GROW_VERTEXES, Arc::new(SystemAllocator))
    }

    #[test]
    fn reserve_rounds_up_to_block() {
        let mut a = array::<u32>();
        assert_eq!(a.capacity(), 0);

        a.reserve(1).unwrap();
        assert_eq!(a.capacity(), 16);
        a.reserve(16).unwrap();
        assert_eq!(a.capacity(), 16);
        a.reserve(17).unwrap();
        assert_eq!(a.capacity(), 32);
        assert!(a.is_empty());
    }

    #[test]
    fn reserve_never_shrinks() {
        let mut a = array::<u32>();
        a.resize(40).unwrap();
        a.resize(3).unwrap();
        assert_eq!(a.capacity(), 48);
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn grown_slots_are_default() {
        let mut a = array::<u32>();
        a.resize(4).unwrap();
        for v in a.iter_mut() {
            *v = 7;
        }
        a.set_count(0).unwrap();
        a.resize(20).unwrap();

        assert_eq!(&a.as_slice()[..4], &[7, 7, 7, 7]);
        assert!(a.as_slice()[4..].iter().all(|&v| v == 0));
    }

    #[test]
    fn set_count_past_capacity_fails() {
        let mut a = array::<u32>();
        a.reserve(5).unwrap();
        assert!(a.set_count(17).is_err());
        assert_eq!(a.len(), 0);
    }

    #[test]
    fn refused_growth_leaves_array_unchanged() {
        let budget = Arc::new(Budget {
            remaining: AtomicUsize::new(16 * size_of::<u32>()),
            ..Budget::default()
        });

        let mut a = GrowArray::<u32>::new(GROW_INDEXES, budget.clone());
        a.resize(10).unwrap();
        assert_eq!(a.resize(17), Err(Error::OutOfMemory));
        assert_eq!(a.len(), 10);
        assert_eq!(a.capacity(), 16);

        drop(a);
        assert_eq!(budget.freed.load(Ordering::SeqCst), 16 * size_of::<u32>());
    }

    #[test]
    fn release_zeroes_both_numbers() {
        let mut a = array::<u32>();
        a.resize(9).unwrap();
        a.release();
        assert_eq!(a.len(), 0);
        assert_eq!(a.capacity(), 0);
        assert!(a.get(0).is_none());
    }
}
