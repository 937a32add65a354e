use tessera_kernel::PropertyError;
use thiserror::Error;

use crate::{DataServiceError, FactoryError, ManagerError};

/// Coarse classification of an [`AlgorithmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Declaration or lifecycle misuse.
    Configuration,
    /// Property values rejected by their validators or by parsing.
    Validation,
    /// Unknown algorithm, property or workspace.
    NotFound,
    /// The algorithm body failed.
    Execution,
    Cancellation,
}

#[derive(Debug, Error)]
pub enum AlgorithmError {
    #[error("{algorithm} could not declare its properties: {source}")]
    Declaration {
        algorithm: String,
        #[source]
        source: PropertyError,
    },
    #[error("{algorithm} is not initialized")]
    NotInitialized { algorithm: String },
    #[error("{algorithm} has invalid properties: {}", describe_failures(.failures))]
    Validation {
        algorithm: String,
        failures: Vec<(String, String)>,
    },
    #[error("{algorithm}: workspace `{workspace}` for property {property} does not exist")]
    MissingWorkspace {
        algorithm: String,
        property: String,
        workspace: String,
    },
    #[error(transparent)]
    Property(#[from] PropertyError),
    #[error(transparent)]
    Factory(#[from] FactoryError),
    #[error(transparent)]
    DataService(#[from] DataServiceError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error("error in execution of algorithm {algorithm}: {cause:#}")]
    Execution {
        algorithm: String,
        cause: anyhow::Error,
    },
    #[error("execution of algorithm {algorithm} was cancelled")]
    Cancelled { algorithm: String },
}

impl AlgorithmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Declaration { .. } | Self::NotInitialized { .. } => ErrorKind::Configuration,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::MissingWorkspace { .. } => ErrorKind::NotFound,
            Self::Property(err) => match err {
                PropertyError::NotFound(_) => ErrorKind::NotFound,
                PropertyError::Duplicate(_) => ErrorKind::Configuration,
                PropertyError::Parse { .. }
                | PropertyError::WrongType { .. }
                | PropertyError::Unset(_) => ErrorKind::Validation,
            },
            Self::Factory(err) => match err {
                FactoryError::NotFound { .. } => ErrorKind::NotFound,
                FactoryError::AlreadyRegistered { .. } => ErrorKind::Configuration,
            },
            Self::DataService(err) => match err {
                DataServiceError::NotFound(_) => ErrorKind::NotFound,
                DataServiceError::AlreadyExists(_)
                | DataServiceError::InvalidName(_)
                | DataServiceError::WrongType { .. } => ErrorKind::Validation,
            },
            Self::Manager(err) => match err {
                ManagerError::NotFound(_) => ErrorKind::NotFound,
                ManagerError::Cleanup { .. } => ErrorKind::Execution,
            },
            Self::Execution { .. } => ErrorKind::Execution,
            Self::Cancelled { .. } => ErrorKind::Cancellation,
        }
    }

    /// Per-property reasons of a validation failure.
    pub fn failures(&self) -> &[(String, String)] {
        match self {
            Self::Validation { failures, .. } => failures,
            _ => &[],
        }
    }
}

fn describe_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(name, reason)| format!("{name}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum FrameworkError {
    #[error("failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_property() {
        let err = AlgorithmError::Validation {
            algorithm: "Foo".into(),
            failures: vec![
                ("EFixed".into(), "Selected value -1 is < the lower bound of 0".into()),
                ("InputWorkspace".into(), "Enter a name for the Input workspace".into()),
            ],
        };
        let message = err.to_string();
        assert!(message.starts_with("Foo has invalid properties"));
        assert!(message.contains("EFixed: Selected value -1"));
        assert!(message.contains("InputWorkspace: Enter a name"));
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.failures().len(), 2);
    }

    #[test]
    fn execution_message_keeps_the_root_cause() {
        let cause = anyhow::anyhow!("division by zero").context("normalising spectrum 3");
        let err = AlgorithmError::Execution {
            algorithm: "NormaliseToTotal".into(),
            cause,
        };
        let message = err.to_string();
        assert!(message.contains("NormaliseToTotal"));
        assert!(message.contains("division by zero"));
        assert_eq!(err.kind(), ErrorKind::Execution);
    }

    #[test]
    fn wrapped_errors_keep_their_kind() {
        let err = AlgorithmError::from(FactoryError::NotFound {
            name: "Nope".into(),
            version: None,
        });
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let err = AlgorithmError::from(PropertyError::Parse {
            name: "Factor".into(),
            value: "x".into(),
            reason: "invalid float literal".into(),
        });
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
