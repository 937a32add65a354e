//! Built-in Tessera algorithms and the [`Workspace2D`] data type they work on.

pub mod create;
pub mod integration;
pub mod normalise;
pub mod scale;
pub mod workspace;
pub mod workspace_ops;

pub use create::CreateWorkspace;
pub use integration::Integration;
pub use normalise::NormaliseToTotal;
pub use scale::{Operation, Scale};
pub use workspace::{ShapeError, Spectrum, Workspace2D, WORKSPACE_2D};
pub use workspace_ops::{CloneWorkspace, DeleteWorkspace, RenameWorkspace};

use tessera_engine::{Algorithm, AlgorithmFactory, FactoryError};

/// Registers every built-in algorithm with `factory`.
pub fn register_builtin_algorithms(factory: &AlgorithmFactory) -> Result<(), FactoryError> {
    factory.subscribe_type::<CreateWorkspace>()?;
    factory.subscribe("Scale", 1, || Box::new(Scale::v1()) as Box<dyn Algorithm>)?;
    factory.subscribe("Scale", 2, || Box::new(Scale::v2()) as Box<dyn Algorithm>)?;
    factory.subscribe_type::<Integration>()?;
    factory.subscribe_type::<NormaliseToTotal>()?;
    factory.subscribe_type::<CloneWorkspace>()?;
    factory.subscribe_type::<DeleteWorkspace>()?;
    factory.subscribe_type::<RenameWorkspace>()?;
    tracing::debug!(count = factory.names().len(), "registered built-in algorithms");
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use tessera_engine::{Framework, FrameworkConfig};

    use crate::workspace::{Spectrum, Workspace2D};

    pub fn framework() -> Framework {
        let framework = Framework::new(FrameworkConfig {
            workers: 2,
            progress_notify_step: 0.0,
            ..FrameworkConfig::default()
        })
        .expect("framework");
        super::register_builtin_algorithms(framework.factory()).expect("register");
        framework
    }

    /// Adds a single-spectrum histogram with bin edges `0, 1, ..., y.len()`.
    pub fn add_workspace(framework: &Framework, name: &str, y: &[f64], e: &[f64]) {
        let x = (0..=y.len()).map(|edge| edge as f64).collect();
        let spectrum = Spectrum::new(x, y.to_vec(), e.to_vec()).expect("spectrum");
        framework
            .data_service()
            .add(name, Arc::new(Workspace2D::new(vec![spectrum])))
            .expect("add");
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tessera_engine::{AlgorithmFactory, FactoryError};

    use super::register_builtin_algorithms;

    #[test]
    fn registers_every_algorithm_once() {
        let factory = AlgorithmFactory::new();
        register_builtin_algorithms(&factory).unwrap();
        assert_eq!(
            factory.names(),
            [
                "CloneWorkspace",
                "CreateWorkspace",
                "DeleteWorkspace",
                "Integration",
                "NormaliseToTotal",
                "RenameWorkspace",
                "Scale",
            ]
        );
        assert_eq!(factory.versions("Scale"), [1, 2]);
        assert!(matches!(
            register_builtin_algorithms(&factory),
            Err(FactoryError::AlreadyRegistered { .. })
        ));
    }
}
