//! Object pool for batches

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tsbench_interfaces::{Batch, BatchFactory};

/// Idle objects kept by default before extra returns are dropped
const DEFAULT_MAX_IDLE: usize = 1024;

/// Thread-safe pool of reusable objects
///
/// `get` hands out an idle object when one is available and builds a fresh
/// one otherwise. Objects are returned with `put`; callers clear them first.
pub struct Pool<T> {
    idle: Mutex<Vec<T>>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    max_idle: usize,
    created: AtomicUsize,
    reused: AtomicUsize,
}

/// Allocation counters of a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub created: usize,
    pub reused: usize,
    pub idle: usize,
}

impl<T> Pool<T> {
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            factory: Box::new(factory),
            max_idle: DEFAULT_MAX_IDLE,
            created: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
        }
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn get(&self) -> T {
        if let Some(item) = self.idle.lock().pop() {
            self.reused.fetch_add(1, Ordering::Relaxed);
            return item;
        }
        self.created.fetch_add(1, Ordering::Relaxed);
        (self.factory)()
    }

    pub fn put(&self, item: T) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(item);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            idle: self.idle.lock().len(),
        }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("max_idle", &self.max_idle)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Batch factory backed by a [`Pool`]; recycled batches are reset first
pub struct PooledBatchFactory<B> {
    pool: Arc<Pool<B>>,
}

impl<B: Batch> PooledBatchFactory<B> {
    pub fn new(factory: impl Fn() -> B + Send + Sync + 'static) -> Self {
        Self {
            pool: Arc::new(Pool::new(factory)),
        }
    }

    pub fn pool(&self) -> &Arc<Pool<B>> {
        &self.pool
    }
}

impl<B> Clone for PooledBatchFactory<B> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
        }
    }
}

impl<B: Batch> BatchFactory for PooledBatchFactory<B> {
    type Batch = B;

    fn new_batch(&self) -> B {
        self.pool.get()
    }

    fn recycle(&self, mut batch: B) {
        batch.reset();
        self.pool.put(batch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsbench_interfaces::LoadResult;

    #[derive(Debug, Default)]
    struct CountingBatch {
        points: Vec<u64>,
    }

    impl Batch for CountingBatch {
        type Point = u64;

        fn len(&self) -> usize {
            self.points.len()
        }

        fn metric_count(&self) -> u64 {
            self.points.iter().sum()
        }

        fn append(&mut self, point: u64) -> LoadResult<()> {
            self.points.push(point);
            Ok(())
        }

        fn reset(&mut self) {
            self.points.clear();
        }
    }

    #[test]
    fn test_pool_reuses_returned_items() {
        let pool = Pool::new(|| Vec::<u8>::with_capacity(64));
        let mut buf = pool.get();
        buf.extend_from_slice(b"cpu");
        buf.clear();
        pool.put(buf);

        let buf = pool.get();
        assert!(buf.capacity() >= 64);
        assert_eq!(pool.stats(), PoolStats { created: 1, reused: 1, idle: 0 });
    }

    #[test]
    fn test_max_idle_drops_extra() {
        let pool = Pool::new(Vec::<u8>::new).with_max_idle(1);
        pool.put(Vec::new());
        pool.put(Vec::new());
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn test_recycled_batch_comes_back_empty() {
        let factory = PooledBatchFactory::new(CountingBatch::default);

        let mut batch = factory.new_batch();
        batch.append(3).unwrap();
        batch.append(4).unwrap();
        assert_eq!(batch.counts().rows, 2);
        assert_eq!(batch.counts().metrics, 7);
        let capacity = batch.points.capacity();
        factory.recycle(batch);

        let batch = factory.new_batch();
        assert!(batch.is_empty());
        assert_eq!(batch.metric_count(), 0);
        assert_eq!(batch.points.capacity(), capacity);
        assert_eq!(factory.pool().stats().reused, 1);
    }

    #[test]
    fn test_pool_is_shared_across_threads() {
        let factory = PooledBatchFactory::new(CountingBatch::default);
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let factory = factory.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let mut batch = factory.new_batch();
                        assert!(batch.is_empty());
                        batch.append(i).unwrap();
                        factory.recycle(batch);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = factory.pool().stats();
        assert_eq!(stats.created + stats.reused, 400);
        assert!(stats.created <= 4);
    }
}
