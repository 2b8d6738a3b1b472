use std::ops::{Index, IndexMut};

/// Proof of the most recent borrow from a [`SlavePool`].
///
/// Must be handed back to [`SlavePool::recycle`] to reject the borrowed slot, or simply
/// dropped to keep it for the rest of the frame.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct BorrowToken {
    slot: usize,
}

impl BorrowToken {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

/// Frame scoped pool with stack discipline.
///
/// Backing storage only ever grows; [`SlavePool::clear`] forgets the in-use count but keeps
/// every element, so steady state frames never allocate. Only the most recent borrow may be
/// recycled.
#[derive(Debug)]
pub struct SlavePool<T> {
    data: Vec<T>,
    in_use: usize,
}

impl<T> Default for SlavePool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlavePool<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            in_use: 0,
        }
    }

    /// Borrows the next slot, constructing it with `create` if storage has to grow.
    ///
    /// A reused slot still holds whatever its last user left in it.
    pub fn next(&mut self, create: impl FnOnce() -> T) -> BorrowToken {
        let slot = self.in_use;
        if slot == self.data.len() {
            self.data.push(create());
        }
        self.in_use += 1;
        BorrowToken { slot }
    }

    /// Returns the most recently borrowed slot to the pool.
    pub fn recycle(&mut self, token: BorrowToken) {
        debug_assert_eq!(
            token.slot + 1,
            self.in_use,
            "slave recycled out of order, only the most recent borrow may be recycled"
        );
        self.in_use -= 1;
    }

    /// Logically empties the pool.
    pub fn clear(&mut self) {
        self.in_use = 0;
    }

    pub fn in_use(&self) -> usize {
        self.in_use
    }

    /// Number of elements ever constructed.
    pub fn allocated(&self) -> usize {
        self.data.len()
    }

    /// The slots borrowed and not recycled since the last clear.
    pub fn active(&self) -> &[T] {
        &self.data[..self.in_use]
    }

    pub fn active_mut(&mut self) -> &mut [T] {
        &mut self.data[..self.in_use]
    }
}

impl<T> Index<&BorrowToken> for SlavePool<T> {
    type Output = T;

    fn index(&self, token: &BorrowToken) -> &Self::Output {
        &self.data[token.slot]
    }
}

impl<T> IndexMut<&BorrowToken> for SlavePool<T> {
    fn index_mut(&mut self, token: &BorrowToken) -> &mut Self::Output {
        &mut self.data[token.slot]
    }
}

#[cfg(test)]
mod tests {
    use super::SlavePool;

    #[test]
    fn grows_then_reuses() {
        let mut pool = SlavePool::new();
        let mut created = 0;

        let a = pool.next(|| {
            created += 1;
            10
        });
        let b = pool.next(|| {
            created += 1;
            20
        });
        assert_eq!((pool[&a], pool[&b]), (10, 20));
        assert_eq!(pool.in_use(), 2);
        assert_eq!(created, 2);

        pool.clear();
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.allocated(), 2);

        let c = pool.next(|| {
            created += 1;
            30
        });
        // Reused slot keeps its stale value.
        assert_eq!(pool[&c], 10);
        assert_eq!(created, 2);
    }

    #[test]
    fn recycle_pops_most_recent() {
        let mut pool = SlavePool::new();
        let _keep = pool.next(|| 1);
        let reject = pool.next(|| 2);
        pool[&reject] = 5;
        pool.recycle(reject);

        assert_eq!(pool.in_use(), 1);
        assert_eq!(pool.active(), &[1]);

        // The recycled slot is handed out again without constructing.
        let again = pool.next(|| unreachable!());
        assert_eq!(again.slot(), 1);
        assert_eq!(pool[&again], 5);
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn out_of_order_recycle_is_caught_in_debug() {
        let mut pool = SlavePool::new();
        let first = pool.next(|| 1);
        let _second = pool.next(|| 2);
        pool.recycle(first);
    }
}
