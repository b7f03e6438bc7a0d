//! Free list of reusable [`Context`]s.
//!
//! Acquiring hands out a [`PooledContext`] guard. Dropping the guard resets
//! the context and puts it back, on every exit path including unwinding, so
//! the transport never has to remember to release.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::context::Context;

/// Thread-safe, unbounded pool of contexts.
#[derive(Debug, Default)]
pub struct ContextPool {
    free: Mutex<Vec<Box<Context>>>,
    max_params: AtomicUsize,
    created: AtomicUsize,
}

impl ContextPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes an idle context, or builds one whose parameter storage fits the
    /// largest route registered so far.
    pub fn acquire(&self) -> PooledContext<'_> {
        let max_params = self.max_params.load(Ordering::Relaxed);
        let ctx = match self.free.lock().pop() {
            Some(mut ctx) => {
                ctx.params.reserve_total(max_params);
                ctx
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                Box::new(Context::new(max_params))
            }
        };
        PooledContext { pool: self, ctx: Some(ctx) }
    }

    fn release(&self, mut ctx: Box<Context>) {
        ctx.reset();
        self.free.lock().push(ctx);
    }

    /// Raises the parameter capacity of contexts built or handed out from now on.
    pub(crate) fn reserve_params(&self, count: usize) {
        self.max_params.fetch_max(count, Ordering::Relaxed);
    }

    pub fn max_params(&self) -> usize {
        self.max_params.load(Ordering::Relaxed)
    }

    /// Contexts currently waiting in the pool.
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }

    /// Contexts ever built by this pool.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }
}

/// Exclusive use of one pooled [`Context`]; returns it to the pool on drop.
pub struct PooledContext<'a> {
    pool: &'a ContextPool,
    ctx: Option<Box<Context>>,
}

impl Deref for PooledContext<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        // Only `Drop` takes the context out.
        self.ctx.as_deref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        self.ctx.as_deref_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn reuses_released_contexts() {
        let pool = ContextPool::new();
        {
            let _a = pool.acquire();
            let _b = pool.acquire();
        }
        assert_eq!(pool.created(), 2);
        assert_eq!(pool.idle(), 2);

        let _c = pool.acquire();
        assert_eq!(pool.created(), 2);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn params_do_not_leak_across_reuse() {
        let pool = ContextPool::new();
        pool.reserve_params(2);
        {
            let mut ctx = pool.acquire();
            ctx.params.push("name".into(), "alice".into());
            ctx.params.push("provider".into(), "github".into());
        }
        let ctx = pool.acquire();
        assert!(ctx.params().is_empty());
        assert!(ctx.params().capacity() >= 2);
        assert_eq!(pool.created(), 1);
    }

    #[test]
    fn grows_capacity_of_idle_contexts() {
        let pool = ContextPool::new();
        drop(pool.acquire());
        pool.reserve_params(5);
        assert!(pool.acquire().params().capacity() >= 5);
    }

    #[test]
    fn released_on_unwind() {
        let pool = ContextPool::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ctx = pool.acquire();
            panic!("handler blew up");
        }));
        assert!(result.is_err());
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn concurrent_acquire_release() {
        let pool = Arc::new(ContextPool::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let mut ctx = pool.acquire();
                        assert!(ctx.params().is_empty());
                        ctx.params.push("k".into(), "v".into());
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert!(pool.created() <= 8);
        assert_eq!(pool.idle(), pool.created());
    }
}
