use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;

use crate::Algorithm;

type Creator = Arc<dyn Fn() -> Box<dyn Algorithm> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    #[error("algorithm {name}{} is not registered", describe_version(.version))]
    NotFound { name: String, version: Option<u32> },
    #[error("algorithm {name} v{version} is already registered")]
    AlreadyRegistered { name: String, version: u32 },
}

fn describe_version(version: &Option<u32>) -> String {
    version.map(|v| format!(" v{v}")).unwrap_or_default()
}

/// Behaviour when registering a (name, version) pair that already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubscribeAction {
    #[default]
    ErrorIfExists,
    Overwrite,
}

/// Summary of a registered algorithm version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlgorithmDescriptor {
    pub name: String,
    pub version: u32,
    pub category: String,
    pub summary: String,
}

impl fmt::Display for AlgorithmDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{} [{}]", self.name, self.version, self.category)
    }
}

/// Registry of algorithm constructors keyed by name and version.
#[derive(Default)]
pub struct AlgorithmFactory {
    creators: RwLock<BTreeMap<String, BTreeMap<u32, Creator>>>,
}

impl AlgorithmFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, name: &str, version: u32, creator: F) -> Result<(), FactoryError>
    where
        F: Fn() -> Box<dyn Algorithm> + Send + Sync + 'static,
    {
        self.subscribe_with(name, version, creator, SubscribeAction::ErrorIfExists)
    }

    pub fn subscribe_with<F>(
        &self,
        name: &str,
        version: u32,
        creator: F,
        action: SubscribeAction,
    ) -> Result<(), FactoryError>
    where
        F: Fn() -> Box<dyn Algorithm> + Send + Sync + 'static,
    {
        let mut creators = self.creators.write();
        let versions = creators.entry(name.to_string()).or_default();
        if versions.contains_key(&version) && action == SubscribeAction::ErrorIfExists {
            return Err(FactoryError::AlreadyRegistered {
                name: name.to_string(),
                version,
            });
        }
        versions.insert(version, Arc::new(creator));
        tracing::debug!(algorithm = name, version, "algorithm registered");
        Ok(())
    }

    /// Registers `T` under the name and version reported by its default
    /// instance.
    pub fn subscribe_type<T>(&self) -> Result<(), FactoryError>
    where
        T: Algorithm + Default + 'static,
    {
        let sample = T::default();
        self.subscribe(sample.name(), sample.version(), || {
            Box::new(T::default()) as Box<dyn Algorithm>
        })
    }

    pub fn unsubscribe(&self, name: &str, version: u32) -> Result<(), FactoryError> {
        let mut creators = self.creators.write();
        let not_found = || FactoryError::NotFound {
            name: name.to_string(),
            version: Some(version),
        };
        let versions = creators.get_mut(name).ok_or_else(not_found)?;
        versions.remove(&version).ok_or_else(not_found)?;
        if versions.is_empty() {
            creators.remove(name);
        }
        Ok(())
    }

    /// Builds a fresh, uninitialized algorithm. `None` selects the highest
    /// registered version.
    pub fn create(
        &self,
        name: &str,
        version: Option<u32>,
    ) -> Result<Box<dyn Algorithm>, FactoryError> {
        let creator = {
            let creators = self.creators.read();
            let versions = creators.get(name);
            let creator = match version {
                Some(version) => versions.and_then(|versions| versions.get(&version)),
                None => versions.and_then(|versions| versions.values().next_back()),
            };
            creator.cloned().ok_or_else(|| FactoryError::NotFound {
                name: name.to_string(),
                version,
            })?
        };
        Ok(creator())
    }

    pub fn contains(&self, name: &str, version: Option<u32>) -> bool {
        let creators = self.creators.read();
        match (creators.get(name), version) {
            (Some(versions), Some(version)) => versions.contains_key(&version),
            (Some(versions), None) => !versions.is_empty(),
            (None, _) => false,
        }
    }

    pub fn highest_version(&self, name: &str) -> Option<u32> {
        self.creators
            .read()
            .get(name)
            .and_then(|versions| versions.keys().next_back().copied())
    }

    /// Registered versions of `name`, ascending.
    pub fn versions(&self, name: &str) -> Vec<u32> {
        self.creators
            .read()
            .get(name)
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.creators.read().keys().cloned().collect()
    }

    /// One descriptor per registered (name, version), sorted by name then
    /// version.
    pub fn descriptors(&self) -> Vec<AlgorithmDescriptor> {
        let creators: Vec<(u32, Creator)> = self
            .creators
            .read()
            .values()
            .flat_map(|versions| {
                versions
                    .iter()
                    .map(|(version, creator)| (*version, Arc::clone(creator)))
            })
            .collect();
        creators
            .into_iter()
            .map(|(version, creator)| {
                let algorithm = creator();
                AlgorithmDescriptor {
                    name: algorithm.name().to_string(),
                    version,
                    category: algorithm.category().to_string(),
                    summary: algorithm.summary().to_string(),
                }
            })
            .collect()
    }
}

impl fmt::Debug for AlgorithmFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let creators = self.creators.read();
        let mut map = f.debug_map();
        for (name, versions) in creators.iter() {
            map.entry(name, &versions.keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}
