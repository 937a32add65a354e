use std::collections::BTreeMap;
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tessera_kernel::{downcast_workspace, Workspace, WorkspaceHandle};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataServiceError {
    #[error("a workspace named `{0}` already exists")]
    AlreadyExists(String),
    #[error("workspace `{0}` does not exist")]
    NotFound(String),
    #[error("`{0}` is not a valid workspace name")]
    InvalidName(String),
    #[error("workspace `{name}` is a {actual}, not a {expected}")]
    WrongType {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
}

/// Change notifications published by the [`AnalysisDataService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataServiceEvent {
    Added(String),
    Replaced(String),
    Removed(String),
    Renamed { from: String, to: String },
    Cleared,
}

/// Process-wide store of named workspaces.
///
/// Reads may run concurrently. Every mutation and the notification it
/// produces happen under one lock, so observers see changes in the order
/// they were applied.
#[derive(Debug, Default)]
pub struct AnalysisDataService {
    workspaces: RwLock<BTreeMap<String, WorkspaceHandle>>,
    mutation: Mutex<()>,
    subscribers: Mutex<Vec<Sender<DataServiceEvent>>>,
}

/// Names must be non-empty and carry no surrounding whitespace.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.trim() == name
}

fn check_name(name: &str) -> Result<(), DataServiceError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(DataServiceError::InvalidName(name.to_string()))
    }
}

impl AnalysisDataService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<DataServiceEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Stores a new workspace. Fails if the name is taken.
    pub fn add(&self, name: &str, workspace: WorkspaceHandle) -> Result<(), DataServiceError> {
        check_name(name)?;
        let _guard = self.mutation.lock();
        {
            let mut workspaces = self.workspaces.write();
            if workspaces.contains_key(name) {
                return Err(DataServiceError::AlreadyExists(name.to_string()));
            }
            workspaces.insert(name.to_string(), workspace);
        }
        tracing::debug!(workspace = name, "workspace added");
        self.notify(DataServiceEvent::Added(name.to_string()));
        Ok(())
    }

    /// Stores a workspace, replacing any existing one of the same name.
    pub fn add_or_replace(
        &self,
        name: &str,
        workspace: WorkspaceHandle,
    ) -> Result<(), DataServiceError> {
        check_name(name)?;
        let _guard = self.mutation.lock();
        let replaced = self
            .workspaces
            .write()
            .insert(name.to_string(), workspace)
            .is_some();
        let event = if replaced {
            DataServiceEvent::Replaced(name.to_string())
        } else {
            DataServiceEvent::Added(name.to_string())
        };
        tracing::debug!(workspace = name, replaced, "workspace stored");
        self.notify(event);
        Ok(())
    }

    pub fn retrieve(&self, name: &str) -> Result<WorkspaceHandle, DataServiceError> {
        self.workspaces
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DataServiceError::NotFound(name.to_string()))
    }

    /// Retrieves a workspace and downcasts it to its concrete type.
    pub fn retrieve_as<T: Workspace>(&self, name: &str) -> Result<Arc<T>, DataServiceError> {
        let handle = self.retrieve(name)?;
        downcast_workspace::<T>(&handle).ok_or_else(|| DataServiceError::WrongType {
            name: name.to_string(),
            expected: std::any::type_name::<T>(),
            actual: handle.id(),
        })
    }

    pub fn remove(&self, name: &str) -> Result<WorkspaceHandle, DataServiceError> {
        let _guard = self.mutation.lock();
        let removed = self
            .workspaces
            .write()
            .remove(name)
            .ok_or_else(|| DataServiceError::NotFound(name.to_string()))?;
        tracing::debug!(workspace = name, "workspace removed");
        self.notify(DataServiceEvent::Removed(name.to_string()));
        Ok(removed)
    }

    /// Moves a workspace to a new, unused name.
    pub fn rename(&self, from: &str, to: &str) -> Result<(), DataServiceError> {
        check_name(to)?;
        let _guard = self.mutation.lock();
        {
            let mut workspaces = self.workspaces.write();
            if !workspaces.contains_key(from) {
                return Err(DataServiceError::NotFound(from.to_string()));
            }
            if from == to {
                return Ok(());
            }
            if workspaces.contains_key(to) {
                return Err(DataServiceError::AlreadyExists(to.to_string()));
            }
            if let Some(workspace) = workspaces.remove(from) {
                workspaces.insert(to.to_string(), workspace);
            }
        }
        self.notify(DataServiceEvent::Renamed {
            from: from.to_string(),
            to: to.to_string(),
        });
        Ok(())
    }

    pub fn clear(&self) {
        let _guard = self.mutation.lock();
        let count = {
            let mut workspaces = self.workspaces.write();
            let count = workspaces.len();
            workspaces.clear();
            count
        };
        tracing::debug!(count, "data service cleared");
        self.notify(DataServiceEvent::Cleared);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.workspaces.read().contains_key(name)
    }

    /// Stored names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.workspaces.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.workspaces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.read().is_empty()
    }

    /// Sum of the reported footprints of every stored workspace.
    pub fn total_memory(&self) -> usize {
        self.workspaces
            .read()
            .values()
            .map(|workspace| workspace.memory_size())
            .sum()
    }

    fn notify(&self, event: DataServiceEvent) {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        let dropped = before - subscribers.len();
        if dropped > 0 {
            tracing::debug!(dropped, "removed disconnected data service observers");
        }
    }
}
