//! Tessera Engine
//! ==============
//! Execution framework for self-describing algorithms. The engine owns the
//! algorithm registry, the named workspace store, and the machinery that
//! validates properties, runs algorithms (optionally nesting children with
//! scaled progress and shared cancellation) and records their provenance.
//!
//! Everything hangs off an explicit [`Framework`] value created at startup;
//! there are no process-wide singletons.

pub mod algorithm;
pub mod cancel;
pub mod config;
pub mod data_service;
pub mod error;
pub mod factory;
pub mod framework;
pub mod history;
pub mod logging;
pub mod manager;
pub mod parallel;
pub mod progress;

pub use algorithm::{Algorithm, AlgorithmInstance, ExecutionContext, ExecutionState};
pub use cancel::{is_cancellation, CancellationToken, Cancelled};
pub use config::{ConfigError, FrameworkConfig};
pub use data_service::{AnalysisDataService, DataServiceError, DataServiceEvent};
pub use error::{AlgorithmError, ErrorKind, FrameworkError};
pub use factory::{AlgorithmDescriptor, AlgorithmFactory, FactoryError, SubscribeAction};
pub use framework::{Framework, FrameworkContext};
pub use history::{AlgorithmHistory, HistoryLog, PropertyHistory};
pub use logging::AlgorithmLogger;
pub use manager::{AlgorithmId, AlgorithmManager, ManagerError, SharedAlgorithm};
pub use parallel::ParallelRegion;
pub use progress::{AlgorithmEvent, EventNotifier, Progress, ProgressRange};

pub use tessera_kernel as kernel;

/// Common imports for algorithm authors.
pub mod prelude {
    pub use crate::{
        Algorithm, AlgorithmError, AlgorithmInstance, Cancelled, ExecutionContext, Progress,
    };
    pub use tessera_kernel::prelude::*;
}
