use std::fmt;
use std::sync::Arc;

/// Named logger handed to every algorithm instance. Child algorithms log
/// under `Parent.Child` and may be silenced without touching their parent.
#[derive(Debug, Clone)]
pub struct AlgorithmLogger {
    name: Arc<str>,
    enabled: bool,
}

impl AlgorithmLogger {
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            enabled: true,
        }
    }

    /// Logger for a child algorithm nested under this one.
    pub fn child(&self, name: &str) -> Self {
        Self {
            name: Arc::from(format!("{}.{name}", self.name)),
            enabled: self.enabled,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn debug(&self, message: impl fmt::Display) {
        if self.enabled {
            tracing::debug!(algorithm = %self.name, "{message}");
        }
    }

    pub fn info(&self, message: impl fmt::Display) {
        if self.enabled {
            tracing::info!(algorithm = %self.name, "{message}");
        }
    }

    pub fn warn(&self, message: impl fmt::Display) {
        if self.enabled {
            tracing::warn!(algorithm = %self.name, "{message}");
        }
    }

    pub fn error(&self, message: impl fmt::Display) {
        if self.enabled {
            tracing::error!(algorithm = %self.name, "{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_are_prefixed_and_inherit_the_switch() {
        let mut parent = AlgorithmLogger::new("NormaliseToTotal");
        let child = parent.child("Integration");
        assert_eq!(child.name(), "NormaliseToTotal.Integration");
        assert_eq!(child.child("Scale").name(), "NormaliseToTotal.Integration.Scale");

        parent.set_enabled(false);
        assert!(!parent.child("Scale").is_enabled());
        assert!(child.is_enabled());
    }
}
