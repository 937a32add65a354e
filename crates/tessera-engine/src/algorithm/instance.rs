use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tessera_kernel::{
    downcast_workspace, Direction, FromPropertyValue, PropertyKind, PropertyManager,
    PropertyValue, Workspace, WorkspaceHandle,
};

use super::{Algorithm, ExecutionContext, ExecutionState};
use crate::data_service::is_valid_name;
use crate::progress::ProgressScope;
use crate::{
    is_cancellation, AlgorithmError, AlgorithmEvent, AlgorithmHistory, AlgorithmLogger,
    CancellationToken, DataServiceError, EventNotifier, FrameworkContext, ProgressRange,
};

/// What a child inherits from the algorithm that created it.
pub(crate) struct ChildLink {
    pub(crate) logger: AlgorithmLogger,
    pub(crate) notifier: EventNotifier,
    pub(crate) range: ProgressRange,
    pub(crate) token: CancellationToken,
    pub(crate) rethrow: bool,
    pub(crate) history_sink: Arc<Mutex<Vec<AlgorithmHistory>>>,
}

/// An algorithm together with its properties, flags and lifecycle state.
pub struct AlgorithmInstance {
    algorithm: Box<dyn Algorithm>,
    properties: PropertyManager,
    state: ExecutionState,
    framework: Arc<FrameworkContext>,
    logger: AlgorithmLogger,
    notifier: EventNotifier,
    range: ProgressRange,
    token: CancellationToken,
    child: bool,
    rethrow: bool,
    always_store_in_ads: bool,
    history_sink: Option<Arc<Mutex<Vec<AlgorithmHistory>>>>,
    child_histories: Arc<Mutex<Vec<AlgorithmHistory>>>,
    last_history: Option<AlgorithmHistory>,
    failure: Option<AlgorithmError>,
}

impl AlgorithmInstance {
    /// Wraps a freshly created algorithm as a top-level instance.
    pub fn new(algorithm: Box<dyn Algorithm>, framework: Arc<FrameworkContext>) -> Self {
        let logger = AlgorithmLogger::new(algorithm.name());
        let rethrow = framework.config().rethrow_by_default;
        Self {
            algorithm,
            properties: PropertyManager::new(),
            state: ExecutionState::Uninitialized,
            framework,
            logger,
            notifier: EventNotifier::new(),
            range: ProgressRange::FULL,
            token: CancellationToken::new(),
            child: false,
            rethrow,
            always_store_in_ads: false,
            history_sink: None,
            child_histories: Arc::default(),
            last_history: None,
            failure: None,
        }
    }

    pub(crate) fn new_child(
        algorithm: Box<dyn Algorithm>,
        framework: Arc<FrameworkContext>,
        link: ChildLink,
    ) -> Self {
        Self {
            logger: link.logger,
            notifier: link.notifier,
            range: link.range,
            token: link.token,
            child: true,
            rethrow: link.rethrow,
            history_sink: Some(link.history_sink),
            ..Self::new(algorithm, framework)
        }
    }

    pub fn name(&self) -> &str {
        self.algorithm.name()
    }

    pub fn version(&self) -> u32 {
        self.algorithm.version()
    }

    pub fn category(&self) -> &str {
        self.algorithm.category()
    }

    pub fn summary(&self) -> &str {
        self.algorithm.summary()
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state != ExecutionState::Uninitialized
    }

    pub fn is_executed(&self) -> bool {
        self.state == ExecutionState::Executed
    }

    pub fn is_child(&self) -> bool {
        self.child
    }

    /// Marks the instance as a child: it may leave outputs unnamed and does
    /// not publish them unless [`Self::set_always_store_in_ads`] is set.
    pub fn set_child(&mut self, child: bool) {
        self.child = child;
    }

    pub fn rethrows(&self) -> bool {
        self.rethrow
    }

    pub fn set_rethrows(&mut self, rethrow: bool) {
        self.rethrow = rethrow;
    }

    pub fn set_always_store_in_ads(&mut self, always: bool) {
        self.always_store_in_ads = always;
    }

    pub fn set_logging(&mut self, enabled: bool) {
        self.logger.set_enabled(enabled);
    }

    pub fn logger(&self) -> &AlgorithmLogger {
        &self.logger
    }

    pub fn subscribe(&self) -> Receiver<AlgorithmEvent> {
        self.notifier.subscribe()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Provenance of the last successful execution.
    pub fn history(&self) -> Option<&AlgorithmHistory> {
        self.last_history.as_ref()
    }

    pub fn properties(&self) -> &PropertyManager {
        &self.properties
    }

    /// Declares the algorithm's properties. Calling it again is a no-op.
    pub fn initialize(&mut self) -> Result<(), AlgorithmError> {
        if self.is_initialized() {
            return Ok(());
        }
        let mut properties = PropertyManager::new();
        self.algorithm
            .init(&mut properties)
            .map_err(|source| AlgorithmError::Declaration {
                algorithm: self.algorithm.name().to_string(),
                source,
            })?;
        self.properties = properties;
        self.state = ExecutionState::Initialized;
        Ok(())
    }

    pub fn set_property_value(&mut self, name: &str, text: &str) -> Result<(), AlgorithmError> {
        Ok(self.properties.set_property_value(name, text)?)
    }

    pub fn set_property(
        &mut self,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), AlgorithmError> {
        Ok(self.properties.set_property(name, value)?)
    }

    pub fn set_properties_json(&mut self, values: &serde_json::Value) -> Result<(), AlgorithmError> {
        Ok(self.properties.set_properties_json(values)?)
    }

    /// Binds a workspace handle to a workspace property, bypassing the
    /// data service.
    pub fn set_workspace(
        &mut self,
        name: &str,
        workspace: WorkspaceHandle,
    ) -> Result<(), AlgorithmError> {
        let property = self.properties.property_mut(name)?;
        if property.kind() != PropertyKind::Workspace {
            return Err(tessera_kernel::PropertyError::WrongType {
                name: property.name().to_string(),
                expected: PropertyKind::Workspace.type_name(),
                actual: property.kind().type_name(),
            }
            .into());
        }
        property.bind_workspace(workspace);
        Ok(())
    }

    pub fn property_value(&self, name: &str) -> Result<String, AlgorithmError> {
        Ok(self.properties.property_value(name)?)
    }

    pub fn get<T: FromPropertyValue>(&self, name: &str) -> Result<T, AlgorithmError> {
        Ok(self.properties.get(name)?)
    }

    /// The result behind an output workspace property: the handle still
    /// bound to it, or the published workspace of the same name.
    pub fn output_workspace(&self, name: &str) -> Result<WorkspaceHandle, AlgorithmError> {
        let property = self.properties.property(name)?;
        if let Some(handle) = property.workspace_handle() {
            return Ok(Arc::clone(handle));
        }
        let workspace = property.value();
        Ok(self.framework.data_service().retrieve(&workspace)?)
    }

    pub fn output_as<T: Workspace>(&self, name: &str) -> Result<Arc<T>, AlgorithmError> {
        let handle = self.output_workspace(name)?;
        downcast_workspace::<T>(&handle).ok_or_else(|| {
            AlgorithmError::DataService(DataServiceError::WrongType {
                name: self.properties.property_value(name).unwrap_or_default(),
                expected: std::any::type_name::<T>(),
                actual: handle.id(),
            })
        })
    }

    /// Validates, resolves inputs, runs the algorithm and publishes its
    /// outputs.
    ///
    /// Returns `Ok(true)` on success. A failing or cancelled body yields
    /// `Ok(false)` unless the instance rethrows (cancellation also unwinds
    /// children). Precondition, validation and resolution problems are
    /// always errors. A cancellation requested before the call stops the run
    /// before `exec`; a top-level run clears the request when it ends.
    pub fn execute(&mut self) -> Result<bool, AlgorithmError> {
        if !self.is_initialized() {
            return Err(AlgorithmError::NotInitialized {
                algorithm: self.name().to_string(),
            });
        }
        self.state = ExecutionState::Initialized;
        self.last_history = None;
        self.child_histories.lock().clear();
        self.failure = None;

        self.validate()?;

        let caller_bound: HashSet<String> = self
            .properties
            .properties()
            .filter(|property| property.workspace_handle().is_some())
            .map(|property| property.name().to_string())
            .collect();
        if let Err(err) = self.resolve_inputs() {
            self.release_workspaces(&caller_bound);
            return Err(err);
        }

        if self.child {
            self.logger.debug("Execution started");
        } else {
            self.logger.info("Execution started");
            self.notifier.emit(AlgorithmEvent::Started {
                algorithm: self.name().to_string(),
            });
        }

        let executed_at = Utc::now();
        let started = Instant::now();
        let outcome = {
            let scope = ProgressScope {
                notifier: self.notifier.clone(),
                range: self.range,
                token: self.token.clone(),
                source: Arc::from(self.logger.name()),
                notify_step: self.framework.config().progress_notify_step,
            };
            let mut ctx = ExecutionContext::new(
                &mut self.properties,
                &self.framework,
                &self.logger,
                scope,
                self.rethrow,
                &self.child_histories,
            );
            match ctx.interruption_point() {
                Ok(()) => self.algorithm.exec(&mut ctx),
                Err(cancelled) => Err(cancelled.into()),
            }
        };

        let result = match outcome {
            Ok(()) => self.complete(executed_at, started.elapsed()),
            Err(err) => self.fail(err),
        };
        self.release_workspaces(&caller_bound);
        // A request made while idle is honoured by the next run; one that
        // reached this run is consumed by it.
        if !self.child {
            self.token.reset();
        }
        result
    }

    /// Like [`Self::execute`], but an unsuccessful run is an error carrying
    /// the original cause even when the instance does not rethrow.
    pub fn run(&mut self) -> Result<(), AlgorithmError> {
        if self.execute()? {
            return Ok(());
        }
        Err(self.failure.take().unwrap_or_else(|| {
            let algorithm = self.name().to_string();
            AlgorithmError::Execution {
                cause: anyhow!("algorithm {algorithm} did not complete successfully"),
                algorithm,
            }
        }))
    }

    /// Lets the algorithm release its resources.
    pub fn finalize(&mut self) -> anyhow::Result<()> {
        self.algorithm.finalize()
    }

    fn validate(&self) -> Result<(), AlgorithmError> {
        let mut failures = self.properties.validate(self.child);
        let publishes = !self.child || self.always_store_in_ads;
        for property in self.properties.properties() {
            if property.kind() != PropertyKind::Workspace {
                continue;
            }
            let name = property.value();
            let checked = property.direction().consumes() || publishes;
            if checked && !name.is_empty() && !is_valid_name(&name) {
                failures.push((
                    property.name().to_string(),
                    format!("`{name}` is not a valid workspace name"),
                ));
            }
        }
        if failures.is_empty() {
            failures = self.algorithm.validate_inputs(&self.properties);
        }
        if failures.is_empty() {
            return Ok(());
        }
        for (name, reason) in &failures {
            self.logger
                .error(format_args!("Invalid value for {name}: {reason}"));
        }
        Err(AlgorithmError::Validation {
            algorithm: self.name().to_string(),
            failures,
        })
    }

    fn resolve_inputs(&mut self) -> Result<(), AlgorithmError> {
        let algorithm = self.algorithm.name().to_string();
        let service = self.framework.data_service();
        for property in self.properties.properties_mut() {
            if property.kind() != PropertyKind::Workspace || !property.direction().consumes() {
                continue;
            }
            let handle = match property.workspace_handle() {
                Some(handle) => Arc::clone(handle),
                None => {
                    let workspace = property.value();
                    if workspace.is_empty() {
                        continue;
                    }
                    let handle = service.retrieve(&workspace).map_err(|_| {
                        AlgorithmError::MissingWorkspace {
                            algorithm: algorithm.clone(),
                            property: property.name().to_string(),
                            workspace: workspace.clone(),
                        }
                    })?;
                    property.bind_workspace(Arc::clone(&handle));
                    handle
                }
            };
            if let Some(expected) = property.workspace_type() {
                if handle.id() != expected {
                    return Err(AlgorithmError::Validation {
                        algorithm,
                        failures: vec![(
                            property.name().to_string(),
                            format!("Workspace must be a {expected}, found a {}", handle.id()),
                        )],
                    });
                }
            }
        }
        Ok(())
    }

    fn complete(
        &mut self,
        executed_at: DateTime<Utc>,
        duration: Duration,
    ) -> Result<bool, AlgorithmError> {
        if let Err(err) = self.publish_outputs() {
            self.logger.error(&err);
            if !self.child {
                self.notifier.emit(AlgorithmEvent::Error {
                    algorithm: self.name().to_string(),
                    message: err.to_string(),
                });
            }
            return Err(err);
        }
        self.record_history(executed_at, duration);
        self.state = ExecutionState::Executed;
        let message = format!(
            "Execution completed successfully in {:.3} seconds",
            duration.as_secs_f64()
        );
        if self.child {
            self.logger.debug(message);
        } else {
            self.logger.info(message);
            self.notifier.emit(AlgorithmEvent::Finished {
                algorithm: self.name().to_string(),
                success: true,
            });
        }
        Ok(true)
    }

    fn fail(&mut self, err: anyhow::Error) -> Result<bool, AlgorithmError> {
        let algorithm = self.name().to_string();
        if is_cancellation(&err) {
            self.logger.warn("Execution cancelled");
            if !self.child {
                self.notifier.emit(AlgorithmEvent::Finished {
                    algorithm: algorithm.clone(),
                    success: false,
                });
            }
            let error = AlgorithmError::Cancelled { algorithm };
            return if self.rethrow || self.child {
                Err(error)
            } else {
                self.failure = Some(error);
                Ok(false)
            };
        }

        let error = AlgorithmError::Execution {
            algorithm: algorithm.clone(),
            cause: err,
        };
        self.logger.error(&error);
        if !self.child {
            self.notifier.emit(AlgorithmEvent::Error {
                algorithm: algorithm.clone(),
                message: error.to_string(),
            });
            self.notifier.emit(AlgorithmEvent::Finished {
                algorithm,
                success: false,
            });
        }
        if self.rethrow {
            Err(error)
        } else {
            self.failure = Some(error);
            Ok(false)
        }
    }

    fn publish_outputs(&mut self) -> Result<(), AlgorithmError> {
        if self.child && !self.always_store_in_ads {
            return Ok(());
        }
        let service = self.framework.data_service();
        for property in self.properties.properties() {
            if property.kind() != PropertyKind::Workspace || !property.direction().publishes() {
                continue;
            }
            let workspace = property.value();
            let Some(handle) = property.workspace_handle() else {
                if property.direction() == Direction::Output && !workspace.is_empty() {
                    self.logger.warn(format_args!(
                        "Output workspace property {} was not set",
                        property.name()
                    ));
                }
                continue;
            };
            if workspace.is_empty() {
                continue;
            }
            let unchanged = service
                .retrieve(&workspace)
                .map(|existing| Arc::ptr_eq(&existing, handle))
                .unwrap_or(false);
            if !unchanged {
                service.add_or_replace(&workspace, Arc::clone(handle))?;
            }
        }
        Ok(())
    }

    fn record_history(&mut self, executed_at: DateTime<Utc>, duration: Duration) {
        let children = std::mem::take(&mut *self.child_histories.lock());
        let entry = AlgorithmHistory::new(
            self.algorithm.name(),
            self.algorithm.version(),
            executed_at,
            duration,
            &self.properties,
        )
        .with_children(children);
        match &self.history_sink {
            Some(sink) => sink.lock().push(entry.clone()),
            None if self.framework.config().record_history => {
                self.framework.history().append(entry.clone())
            }
            None => {}
        }
        self.last_history = Some(entry);
    }

    /// Top-level instances keep only the handles their caller bound; every
    /// other handle was either resolved from or published to the data
    /// service.
    fn release_workspaces(&mut self, caller_bound: &HashSet<String>) {
        if self.child {
            return;
        }
        for property in self.properties.properties_mut() {
            if property.kind() == PropertyKind::Workspace && !caller_bound.contains(property.name())
            {
                property.take_workspace();
            }
        }
    }
}

impl fmt::Debug for AlgorithmInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmInstance")
            .field("name", &self.name())
            .field("version", &self.version())
            .field("state", &self.state)
            .field("child", &self.child)
            .field("rethrow", &self.rethrow)
            .finish()
    }
}
