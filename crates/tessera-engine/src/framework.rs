use std::sync::Arc;

use crate::{
    AlgorithmError, AlgorithmFactory, AlgorithmId, AlgorithmInstance, AlgorithmManager,
    AnalysisDataService, FrameworkConfig, FrameworkError, HistoryLog, ManagerError,
    ParallelRegion, SharedAlgorithm,
};

/// Services shared by every algorithm instance of one framework.
#[derive(Debug)]
pub struct FrameworkContext {
    config: FrameworkConfig,
    factory: AlgorithmFactory,
    data_service: AnalysisDataService,
    history: HistoryLog,
    parallel: ParallelRegion,
}

impl FrameworkContext {
    pub fn new(config: FrameworkConfig) -> Result<Self, FrameworkError> {
        let parallel = ParallelRegion::new(config.worker_count())?;
        Ok(Self {
            config,
            factory: AlgorithmFactory::new(),
            data_service: AnalysisDataService::new(),
            history: HistoryLog::new(),
            parallel,
        })
    }

    pub fn config(&self) -> &FrameworkConfig {
        &self.config
    }

    pub fn factory(&self) -> &AlgorithmFactory {
        &self.factory
    }

    pub fn data_service(&self) -> &AnalysisDataService {
        &self.data_service
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn parallel(&self) -> &ParallelRegion {
        &self.parallel
    }
}

/// Entry point owning the shared context and the algorithm manager.
#[derive(Debug)]
pub struct Framework {
    context: Arc<FrameworkContext>,
    manager: AlgorithmManager,
}

impl Framework {
    pub fn new(config: FrameworkConfig) -> Result<Self, FrameworkError> {
        let context = Arc::new(FrameworkContext::new(config)?);
        tracing::info!(
            workers = context.parallel().workers(),
            "framework started"
        );
        let manager = AlgorithmManager::new(Arc::clone(&context));
        Ok(Self { context, manager })
    }

    pub fn context(&self) -> &Arc<FrameworkContext> {
        &self.context
    }

    pub fn config(&self) -> &FrameworkConfig {
        self.context.config()
    }

    pub fn factory(&self) -> &AlgorithmFactory {
        self.context.factory()
    }

    pub fn data_service(&self) -> &AnalysisDataService {
        self.context.data_service()
    }

    pub fn history(&self) -> &HistoryLog {
        self.context.history()
    }

    pub fn algorithm_manager(&self) -> &AlgorithmManager {
        &self.manager
    }

    /// Creates and initializes a managed instance.
    pub fn create_algorithm(
        &self,
        name: &str,
        version: Option<u32>,
    ) -> Result<(AlgorithmId, SharedAlgorithm), AlgorithmError> {
        self.manager.create(name, version)
    }

    /// Creates and initializes an instance the caller owns outright.
    pub fn create_unmanaged(
        &self,
        name: &str,
        version: Option<u32>,
    ) -> Result<AlgorithmInstance, AlgorithmError> {
        self.manager.create_unmanaged(name, version)
    }

    /// Finalizes every managed algorithm, then empties the data service.
    /// The data service is cleared even when finalization failed.
    pub fn shutdown(&self) -> Result<(), ManagerError> {
        let cleared = self.manager.clear();
        self.context.data_service().clear();
        tracing::info!("framework shut down");
        cleared
    }
}
