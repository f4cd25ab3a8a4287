// sw_pool.rs — Growable per-frame pools for edges, surfaces and alias verts
//
// A pool is rebuilt from scratch every frame. Running out of slots is not an
// error: the item is dropped, the shortfall is counted, and `reserve` grows
// the pool before the next frame.

use crate::sw_local::RefError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolGrowth {
    Unchanged,
    Grown(usize),
    /// Allocation failed; the previous storage is still in place.
    Failed(RefError),
}

#[derive(Debug, Clone)]
pub struct Pool<T> {
    kind: &'static str,
    builtin_min: usize,
    /// Leading slots owned by the rasterizer (sentinels), never handed out.
    reserved: usize,
    items: Vec<T>,
    allocated: usize,
    cursor: usize,
    overflow: usize,
}

impl<T: Clone + Default> Pool<T> {
    pub fn new(kind: &'static str, builtin_min: usize, reserved: usize) -> Self {
        Self {
            kind,
            builtin_min,
            reserved,
            items: Vec::new(),
            allocated: 0,
            cursor: reserved,
            overflow: 0,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Usable capacity, not counting reserved slots.
    pub fn allocated(&self) -> usize {
        self.allocated
    }

    pub fn overflow(&self) -> usize {
        self.overflow
    }

    /// Grow the pool if it was never allocated or ran short last frame.
    /// The new size is twice the old on overflow, and never below the
    /// built-in minimum or `floor_override`.
    pub fn reserve(&mut self, floor_override: usize) -> PoolGrowth {
        if self.allocated != 0 && self.overflow == 0 {
            return PoolGrowth::Unchanged;
        }

        let mut count = self.allocated;
        if self.overflow > 0 {
            count = count.saturating_mul(2);
        }
        count = count.max(self.builtin_min).max(floor_override);

        let total = count.saturating_add(self.reserved);
        let mut storage: Vec<T> = Vec::new();
        if storage.try_reserve_exact(total).is_err() {
            return PoolGrowth::Failed(RefError::OutOfMemory {
                what: "R_ReallocateMapBuffers",
                bytes: total.saturating_mul(std::mem::size_of::<T>()),
            });
        }
        storage.resize(total, T::default());

        self.items = storage;
        self.allocated = count;
        self.cursor = self.reserved;
        self.overflow = 0;
        PoolGrowth::Grown(count)
    }

    /// Hand back every non-reserved slot for the next frame.
    pub fn reset(&mut self) {
        self.cursor = self.reserved;
    }

    pub fn available(&self) -> usize {
        self.items.len().saturating_sub(self.cursor)
    }

    /// Number of slots handed out since the last `reset`.
    pub fn used(&self) -> usize {
        self.cursor.saturating_sub(self.reserved)
    }

    /// Next free slot, or `None` (and one more overflow) when full.
    pub fn alloc(&mut self) -> Option<u32> {
        if self.cursor < self.items.len() {
            let idx = self.cursor;
            self.cursor += 1;
            Some(idx as u32)
        } else {
            self.overflow += 1;
            None
        }
    }

    /// Claim `count` consecutive slots, or count them all as overflow.
    pub fn alloc_run(&mut self, count: usize) -> Option<u32> {
        if self.available() >= count {
            let idx = self.cursor;
            self.cursor += count;
            Some(idx as u32)
        } else {
            self.overflow += count;
            None
        }
    }

    /// Record a shortfall without attempting an allocation.
    pub fn note_overflow(&mut self, count: usize) {
        self.overflow += count;
    }

    /// Index one past the last slot handed out.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    pub fn get(&self, idx: u32) -> Option<&T> {
        self.items.get(idx as usize)
    }

    pub fn get_mut(&mut self, idx: u32) -> Option<&mut T> {
        self.items.get_mut(idx as usize)
    }
}

impl<T> std::ops::Index<u32> for Pool<T> {
    type Output = T;
    #[inline]
    fn index(&self, idx: u32) -> &T {
        &self.items[idx as usize]
    }
}

impl<T> std::ops::IndexMut<u32> for Pool<T> {
    #[inline]
    fn index_mut(&mut self, idx: u32) -> &mut T {
        &mut self.items[idx as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reserve_uses_builtin_minimum() {
        let mut pool: Pool<u32> = Pool::new("edges", 2048, 4);
        assert_eq!(pool.reserve(0), PoolGrowth::Grown(2048));
        assert_eq!(pool.allocated(), 2048);
        assert_eq!(pool.available(), 2048);
        assert_eq!(pool.reserve(0), PoolGrowth::Unchanged);
    }

    #[test]
    fn test_override_raises_floor() {
        let mut pool: Pool<u32> = Pool::new("surfaces", 1024, 2);
        assert_eq!(pool.reserve(5000), PoolGrowth::Grown(5000));
    }

    #[test]
    fn test_overflow_doubles_capacity() {
        let mut pool: Pool<u8> = Pool::new("verts", 16, 0);
        pool.reserve(0);
        while pool.alloc().is_some() {}
        assert_eq!(pool.overflow(), 1);
        let n = pool.allocated();
        match pool.reserve(20) {
            PoolGrowth::Grown(count) => {
                assert!(count >= 2 * n);
                assert!(count >= 20);
            }
            other => panic!("expected growth, got {:?}", other),
        }
        assert_eq!(pool.overflow(), 0);
        assert_eq!(pool.used(), 0);
    }

    #[test]
    fn test_reserved_slots_never_handed_out() {
        let mut pool: Pool<u8> = Pool::new("edges", 8, 4);
        pool.reserve(0);
        assert_eq!(pool.alloc(), Some(4));
        pool.reset();
        assert_eq!(pool.alloc(), Some(4));
    }

    #[test]
    fn test_alloc_run_counts_whole_shortfall() {
        let mut pool: Pool<u8> = Pool::new("verts", 4, 0);
        pool.reserve(0);
        assert_eq!(pool.alloc_run(3), Some(0));
        assert_eq!(pool.alloc_run(3), None);
        assert_eq!(pool.overflow(), 3);
    }

    #[test]
    fn test_failed_growth_keeps_old_storage() {
        let mut pool: Pool<u64> = Pool::new("edges", 4, 0);
        pool.reserve(0);
        pool.note_overflow(1);
        let result = pool.reserve(usize::MAX / 2);
        assert!(matches!(result, PoolGrowth::Failed(RefError::OutOfMemory { .. })));
        assert_eq!(pool.allocated(), 4);
        assert_eq!(pool.as_slice().len(), 4);
    }
}
