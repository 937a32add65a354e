//! Algorithm contract and the state machine that runs it.

mod context;
mod instance;

pub use context::ExecutionContext;
pub use instance::AlgorithmInstance;

use serde::Serialize;
use tessera_kernel::{PropertyError, PropertyManager};

/// A named, versioned unit of work with declared properties.
///
/// Implementors are created fresh by the factory for every instance, declare
/// their properties in [`Algorithm::init`] and do their work in
/// [`Algorithm::exec`]. Everything else (validation, workspace resolution,
/// publishing, history, progress and error policy) is handled by
/// [`AlgorithmInstance`].
pub trait Algorithm: Send {
    fn name(&self) -> &str;

    fn version(&self) -> u32 {
        1
    }

    fn category(&self) -> &str {
        "General"
    }

    fn summary(&self) -> &str {
        ""
    }

    /// Declares every property the algorithm accepts.
    fn init(&mut self, properties: &mut PropertyManager) -> Result<(), PropertyError>;

    /// Cross-property checks run after the per-property validators. Returns
    /// `(property, reason)` pairs for every problem found.
    fn validate_inputs(&self, _properties: &PropertyManager) -> Vec<(String, String)> {
        Vec::new()
    }

    fn exec(&mut self, ctx: &mut ExecutionContext<'_>) -> anyhow::Result<()>;

    /// Releases resources when the owning manager is cleared.
    fn finalize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Lifecycle of an [`AlgorithmInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExecutionState {
    Uninitialized,
    Initialized,
    Executed,
}
