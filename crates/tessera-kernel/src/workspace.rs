use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque data container moved between algorithms by name or handle.
///
/// The framework never looks inside a workspace; algorithms downcast to the
/// concrete payload they understand with [`downcast_workspace`].
pub trait Workspace: Any + fmt::Debug + Send + Sync {
    /// Type identifier of the payload, e.g. `"Workspace2D"`.
    fn id(&self) -> &'static str;

    /// Approximate heap footprint in bytes.
    fn memory_size(&self) -> usize {
        0
    }

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Shared-ownership handle to a workspace.
pub type WorkspaceHandle = Arc<dyn Workspace>;

/// Recovers the concrete payload type behind a handle.
pub fn downcast_workspace<T: Workspace>(handle: &WorkspaceHandle) -> Option<Arc<T>> {
    Arc::clone(handle).into_any().downcast::<T>().ok()
}
