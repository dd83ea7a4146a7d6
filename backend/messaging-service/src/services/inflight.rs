use crate::error::{AppError, AppResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

type SharedResult<V> = Shared<BoxFuture<'static, AppResult<V>>>;

/// Collapses concurrent identical reads into one pending future.
///
/// The first caller for a key spawns the work; later callers await the same
/// shared result. The spawned task is bounded by `ttl` and removes its own
/// entry when it finishes, whether or not anyone is still awaiting it.
pub struct InflightRequests<K, V> {
    pending: Arc<DashMap<K, SharedResult<V>>>,
    ttl: Duration,
}

impl<K, V> InflightRequests<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub async fn run<F, Fut>(&self, key: K, make: F) -> AppResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<V>> + Send + 'static,
    {
        let shared = match self.pending.entry(key.clone()) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => {
                let pending = Arc::clone(&self.pending);
                let ttl = self.ttl;
                let work = make();
                let task = tokio::spawn(async move {
                    let result = match tokio::time::timeout(ttl, work).await {
                        Ok(result) => result,
                        Err(_) => Err(AppError::Unavailable(format!(
                            "in-flight request exceeded {} ms",
                            ttl.as_millis()
                        ))),
                    };
                    pending.remove(&key);
                    result
                });
                let fut = async move {
                    match task.await {
                        Ok(result) => result,
                        Err(e) => Err(AppError::Internal(format!("in-flight task failed: {e}"))),
                    }
                }
                .boxed()
                .shared();
                entry.insert(fut.clone());
                fut
            }
        };

        shared.await
    }

    /// Keys with work currently pending
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
