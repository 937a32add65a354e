use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use anyhow::anyhow;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::{CancellationToken, FrameworkError};

/// Worker pool used by algorithms to spread independent items (typically
/// spectra) across threads.
///
/// Items run concurrently; the first error or panic raised by any item is
/// returned once every started item has finished. Every item begins with an
/// interruption point, so a cancelled run stops picking up new work.
pub struct ParallelRegion {
    pool: ThreadPool,
}

impl ParallelRegion {
    pub fn new(workers: usize) -> Result<Self, FrameworkError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|index| format!("tessera-worker-{index}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn for_each_index<F>(
        &self,
        len: usize,
        token: &CancellationToken,
        body: F,
    ) -> anyhow::Result<()>
    where
        F: Fn(usize) -> anyhow::Result<()> + Send + Sync,
    {
        self.pool.install(|| {
            (0..len)
                .into_par_iter()
                .try_for_each(|index| run_item(token, || body(index)))
        })
    }

    pub fn for_each_mut<T, F>(
        &self,
        items: &mut [T],
        token: &CancellationToken,
        body: F,
    ) -> anyhow::Result<()>
    where
        T: Send,
        F: Fn(usize, &mut T) -> anyhow::Result<()> + Send + Sync,
    {
        self.pool.install(|| {
            items
                .par_iter_mut()
                .enumerate()
                .try_for_each(|(index, item)| run_item(token, || body(index, item)))
        })
    }

    /// Computes one value per index, preserving index order.
    pub fn map_collect<T, F>(
        &self,
        len: usize,
        token: &CancellationToken,
        body: F,
    ) -> anyhow::Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> anyhow::Result<T> + Send + Sync,
    {
        self.pool.install(|| {
            (0..len)
                .into_par_iter()
                .map(|index| run_item(token, || body(index)))
                .collect()
        })
    }
}

impl std::fmt::Debug for ParallelRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelRegion")
            .field("workers", &self.workers())
            .finish()
    }
}

fn run_item<T>(
    token: &CancellationToken,
    body: impl FnOnce() -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    token.interruption_point()?;
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => Err(anyhow!("worker panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
