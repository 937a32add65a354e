use std::sync::Arc;

use anyhow::anyhow;
use parking_lot::Mutex;
use tessera_kernel::{
    downcast_workspace, FromPropertyValue, PropertyError, PropertyKind, PropertyManager,
    PropertyValue, Workspace, WorkspaceHandle,
};

use super::instance::ChildLink;
use crate::progress::ProgressScope;
use crate::{
    AlgorithmError, AlgorithmHistory, AlgorithmInstance, AlgorithmLogger, AnalysisDataService,
    CancellationToken, Cancelled, FrameworkConfig, FrameworkContext, ParallelRegion, Progress,
};

/// Everything an algorithm body may touch while it runs: its properties,
/// the shared services, progress reporting and child creation.
pub struct ExecutionContext<'a> {
    properties: &'a mut PropertyManager,
    framework: &'a Arc<FrameworkContext>,
    logger: &'a AlgorithmLogger,
    scope: ProgressScope,
    rethrow: bool,
    child_histories: &'a Arc<Mutex<Vec<AlgorithmHistory>>>,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(
        properties: &'a mut PropertyManager,
        framework: &'a Arc<FrameworkContext>,
        logger: &'a AlgorithmLogger,
        scope: ProgressScope,
        rethrow: bool,
        child_histories: &'a Arc<Mutex<Vec<AlgorithmHistory>>>,
    ) -> Self {
        Self {
            properties,
            framework,
            logger,
            scope,
            rethrow,
            child_histories,
        }
    }

    pub fn properties(&self) -> &PropertyManager {
        self.properties
    }

    pub fn get<T: FromPropertyValue>(&self, name: &str) -> Result<T, PropertyError> {
        self.properties.get(name)
    }

    pub fn get_optional<T: FromPropertyValue>(
        &self,
        name: &str,
    ) -> Result<Option<T>, PropertyError> {
        self.properties.get_optional(name)
    }

    pub fn property_value(&self, name: &str) -> Result<String, PropertyError> {
        self.properties.property_value(name)
    }

    /// Assigns an output value, e.g. a computed scalar result.
    pub fn set_property(
        &mut self,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), PropertyError> {
        self.properties.set_property(name, value)
    }

    /// The workspace behind an input property, resolved before execution.
    pub fn input_workspace(&self, name: &str) -> anyhow::Result<WorkspaceHandle> {
        self.optional_workspace(name)?
            .ok_or_else(|| anyhow!("no workspace is bound to property {name}"))
    }

    pub fn optional_workspace(&self, name: &str) -> Result<Option<WorkspaceHandle>, PropertyError> {
        Ok(self.properties.property(name)?.workspace_handle().cloned())
    }

    /// Input workspace downcast to its concrete type.
    pub fn input_as<T: Workspace>(&self, name: &str) -> anyhow::Result<Arc<T>> {
        let handle = self.input_workspace(name)?;
        downcast_workspace::<T>(&handle).ok_or_else(|| {
            anyhow!(
                "property {name} holds a {}, expected {}",
                handle.id(),
                std::any::type_name::<T>()
            )
        })
    }

    /// Binds the result for an output workspace property. Top-level
    /// instances publish it under the property's name once `exec` succeeds.
    pub fn set_output_workspace(
        &mut self,
        name: &str,
        workspace: WorkspaceHandle,
    ) -> Result<(), PropertyError> {
        let property = self.properties.property_mut(name)?;
        if property.kind() != PropertyKind::Workspace || !property.direction().publishes() {
            return Err(PropertyError::WrongType {
                name: property.name().to_string(),
                expected: "output workspace",
                actual: property.kind().type_name(),
            });
        }
        property.bind_workspace(workspace);
        Ok(())
    }

    pub fn set_output<T: Workspace>(&mut self, name: &str, workspace: T) -> Result<(), PropertyError> {
        self.set_output_workspace(name, Arc::new(workspace))
    }

    /// Whether `input` and `output` name the same workspace, i.e. the
    /// result will replace the input in the data service.
    pub fn is_in_place(&self, input: &str, output: &str) -> bool {
        match (
            self.properties.property_value(input),
            self.properties.property_value(output),
        ) {
            (Ok(input), Ok(output)) => !input.is_empty() && input == output,
            _ => false,
        }
    }

    pub fn framework(&self) -> &FrameworkContext {
        self.framework
    }

    pub fn config(&self) -> &FrameworkConfig {
        self.framework.config()
    }

    pub fn data_service(&self) -> &AnalysisDataService {
        self.framework.data_service()
    }

    pub fn parallel(&self) -> &ParallelRegion {
        self.framework.parallel()
    }

    pub fn logger(&self) -> &AlgorithmLogger {
        self.logger
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.scope.token
    }

    pub fn interruption_point(&self) -> Result<(), Cancelled> {
        self.scope.token.interruption_point()
    }

    /// Step counter over `[start, end]` of this algorithm's progress range.
    pub fn progress(&self, start: f64, end: f64, steps: usize) -> Progress {
        Progress::new(self, start, end, steps)
    }

    /// Reports an absolute position within this algorithm's own range.
    pub fn report_progress(&self, fraction: f64, message: Option<&str>) -> Result<(), Cancelled> {
        self.scope.report(fraction, message);
        self.scope.token.interruption_point()
    }

    pub(crate) fn progress_scope(&self) -> &ProgressScope {
        &self.scope
    }

    /// Creates and initializes the highest registered version of `name` as
    /// a child running in `[start, end]` of this algorithm's progress.
    pub fn create_child_algorithm(
        &self,
        name: &str,
        start: f64,
        end: f64,
    ) -> Result<AlgorithmInstance, AlgorithmError> {
        self.create_child_algorithm_version(name, None, start, end)
    }

    pub fn create_child_algorithm_version(
        &self,
        name: &str,
        version: Option<u32>,
        start: f64,
        end: f64,
    ) -> Result<AlgorithmInstance, AlgorithmError> {
        let algorithm = self.framework.factory().create(name, version)?;
        let link = ChildLink {
            logger: self.logger.child(algorithm.name()),
            notifier: self.scope.notifier.clone(),
            range: self.scope.range.sub(start, end),
            token: self.scope.token.clone(),
            rethrow: self.rethrow,
            history_sink: Arc::clone(self.child_histories),
        };
        let mut child = AlgorithmInstance::new_child(algorithm, Arc::clone(self.framework), link);
        child.initialize()?;
        Ok(child)
    }
}
