use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::{AlgorithmError, AlgorithmInstance, CancellationToken, FrameworkContext};

/// Handle to a managed algorithm instance.
pub type SharedAlgorithm = Arc<Mutex<AlgorithmInstance>>;

/// Identifier assigned by the [`AlgorithmManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AlgorithmId(pub u64);

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("{failed} of {total} algorithms failed to finalize: {}", join_messages(.messages))]
    Cleanup {
        failed: usize,
        total: usize,
        messages: Vec<String>,
    },
    #[error("no managed algorithm with id {0}")]
    NotFound(AlgorithmId),
}

fn join_messages(messages: &[String]) -> String {
    messages.join("; ")
}

struct ManagedAlgorithm {
    id: AlgorithmId,
    token: CancellationToken,
    algorithm: SharedAlgorithm,
}

/// Owns the algorithm instances created on behalf of callers.
///
/// Instances are kept in creation order. When more than the configured
/// number are held, the oldest ones not currently locked (running or
/// otherwise in use) are dropped.
pub struct AlgorithmManager {
    context: Arc<FrameworkContext>,
    next_id: AtomicU64,
    max_retained: usize,
    instances: Mutex<VecDeque<ManagedAlgorithm>>,
}

impl AlgorithmManager {
    pub fn new(context: Arc<FrameworkContext>) -> Self {
        let max_retained = context.config().max_retained_algorithms.max(1);
        Self {
            context,
            next_id: AtomicU64::new(1),
            max_retained,
            instances: Mutex::new(VecDeque::new()),
        }
    }

    /// Builds and initializes an instance without retaining it.
    pub fn create_unmanaged(
        &self,
        name: &str,
        version: Option<u32>,
    ) -> Result<AlgorithmInstance, AlgorithmError> {
        let algorithm = self.context.factory().create(name, version)?;
        let mut instance = AlgorithmInstance::new(algorithm, Arc::clone(&self.context));
        instance.initialize()?;
        Ok(instance)
    }

    /// Builds, initializes and retains an instance. An instance that fails
    /// to initialize is discarded.
    pub fn create(
        &self,
        name: &str,
        version: Option<u32>,
    ) -> Result<(AlgorithmId, SharedAlgorithm), AlgorithmError> {
        let instance = self.create_unmanaged(name, version)?;
        let id = AlgorithmId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let token = instance.cancellation_token();
        let algorithm = Arc::new(Mutex::new(instance));
        let mut instances = self.instances.lock();
        instances.push_back(ManagedAlgorithm {
            id,
            token,
            algorithm: Arc::clone(&algorithm),
        });
        self.evict(&mut instances);
        tracing::debug!(%id, algorithm = name, "algorithm created");
        Ok((id, algorithm))
    }

    fn evict(&self, instances: &mut VecDeque<ManagedAlgorithm>) {
        while instances.len() > self.max_retained {
            let Some(position) = instances
                .iter()
                .position(|managed| !managed.algorithm.is_locked())
            else {
                break;
            };
            if let Some(evicted) = instances.remove(position) {
                tracing::debug!(id = %evicted.id, "dropping oldest idle algorithm");
            }
        }
    }

    pub fn get(&self, id: AlgorithmId) -> Option<SharedAlgorithm> {
        self.instances
            .lock()
            .iter()
            .find(|managed| managed.id == id)
            .map(|managed| Arc::clone(&managed.algorithm))
    }

    pub fn remove(&self, id: AlgorithmId) -> Result<SharedAlgorithm, ManagerError> {
        let mut instances = self.instances.lock();
        let position = instances
            .iter()
            .position(|managed| managed.id == id)
            .ok_or(ManagerError::NotFound(id))?;
        instances
            .remove(position)
            .map(|managed| managed.algorithm)
            .ok_or(ManagerError::NotFound(id))
    }

    pub fn ids(&self) -> Vec<AlgorithmId> {
        self.instances.lock().iter().map(|managed| managed.id).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }

    /// Instances currently locked, typically because they are executing.
    pub fn running(&self) -> Vec<AlgorithmId> {
        self.instances
            .lock()
            .iter()
            .filter(|managed| managed.algorithm.is_locked())
            .map(|managed| managed.id)
            .collect()
    }

    /// Requests cancellation of every managed instance, running or not. An
    /// idle instance stops at the start of its next run.
    pub fn cancel_all(&self) {
        for managed in self.instances.lock().iter() {
            managed.token.cancel();
        }
    }

    /// Finalizes and drops every managed instance. Every instance is
    /// attempted; failures are reported together afterwards.
    pub fn clear(&self) -> Result<(), ManagerError> {
        let drained: Vec<ManagedAlgorithm> = self.instances.lock().drain(..).collect();
        let total = drained.len();
        let mut messages = Vec::new();
        for managed in drained {
            if managed.algorithm.is_locked() {
                managed.token.cancel();
            }
            let mut instance = managed.algorithm.lock();
            if let Err(err) = instance.finalize() {
                tracing::warn!(
                    id = %managed.id,
                    algorithm = instance.name(),
                    "failed to finalize algorithm: {err:#}"
                );
                messages.push(format!("{}: {err:#}", instance.name()));
            }
        }
        if messages.is_empty() {
            tracing::debug!(total, "algorithm manager cleared");
            Ok(())
        } else {
            Err(ManagerError::Cleanup {
                failed: messages.len(),
                total,
                messages,
            })
        }
    }
}

impl fmt::Debug for AlgorithmManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmManager")
            .field("max_retained", &self.max_retained)
            .field("ids", &self.ids())
            .finish()
    }
}
