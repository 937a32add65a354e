use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tessera_kernel::{Direction, PropertyKind, PropertyManager};

/// Recorded value of one property at the end of an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyHistory {
    pub name: String,
    pub value: String,
    pub is_default: bool,
    pub direction: Direction,
    pub kind: PropertyKind,
}

/// Provenance of one successful execution, including the children it ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmHistory {
    pub name: String,
    pub version: u32,
    pub executed_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub properties: Vec<PropertyHistory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AlgorithmHistory>,
}

impl AlgorithmHistory {
    pub fn new(
        name: &str,
        version: u32,
        executed_at: DateTime<Utc>,
        duration: Duration,
        properties: &PropertyManager,
    ) -> Self {
        Self {
            name: name.to_string(),
            version,
            executed_at,
            duration_secs: duration.as_secs_f64(),
            properties: properties
                .properties()
                .map(|property| PropertyHistory {
                    name: property.name().to_string(),
                    value: property.value(),
                    is_default: property.is_default(),
                    direction: property.direction(),
                    kind: property.kind(),
                })
                .collect(),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<AlgorithmHistory>) -> Self {
        self.children = children;
        self
    }

    /// Script-style rendering, e.g. `Scale(InputWorkspace='raw', Factor='2')`.
    /// Defaults are omitted.
    pub fn to_command_line(&self) -> String {
        let arguments = self
            .properties
            .iter()
            .filter(|property| !property.is_default && !property.value.is_empty())
            .map(|property| format!("{}='{}'", property.name, property.value))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({arguments})", self.name)
    }

    /// Property values of this entry as a JSON object, the shape accepted by
    /// `PropertyManager::set_properties_json`.
    pub fn property_map(&self) -> serde_json::Value {
        let object = self
            .properties
            .iter()
            .filter(|property| !property.is_default)
            .map(|property| {
                (
                    property.name.clone(),
                    serde_json::Value::String(property.value.clone()),
                )
            })
            .collect();
        serde_json::Value::Object(object)
    }
}

/// Session-wide, append-only record of top-level executions.
#[derive(Debug, Default)]
pub struct HistoryLog {
    entries: RwLock<Vec<AlgorithmHistory>>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, entry: AlgorithmHistory) {
        self.entries.write().push(entry);
    }

    pub fn entries(&self) -> Vec<AlgorithmHistory> {
        self.entries.read().clone()
    }

    pub fn last(&self) -> Option<AlgorithmHistory> {
        self.entries.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.entries.read())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tessera_kernel::Property;

    use super::*;

    fn scale_properties() -> PropertyManager {
        let mut props = PropertyManager::new();
        props
            .declare(Property::workspace("InputWorkspace", Direction::Input))
            .unwrap();
        props.declare(Property::double("Factor", 1.0)).unwrap();
        props
            .declare(Property::string("Operation", "Multiply"))
            .unwrap();
        props.set_property_value("InputWorkspace", "raw").unwrap();
        props.set_property_value("Factor", "2.0").unwrap();
        props
    }

    #[test]
    fn command_line_skips_defaults() {
        let history = AlgorithmHistory::new(
            "Scale",
            1,
            Utc::now(),
            Duration::from_millis(5),
            &scale_properties(),
        );
        assert_eq!(
            history.to_command_line(),
            "Scale(InputWorkspace='raw', Factor='2')"
        );
        assert_eq!(history.property_map()["Factor"], "2");
        assert!(history.property_map().get("Operation").is_none());
    }

    #[test]
    fn log_serializes_nested_children() {
        let log = HistoryLog::new();
        let child = AlgorithmHistory::new(
            "Integration",
            1,
            Utc::now(),
            Duration::ZERO,
            &PropertyManager::new(),
        );
        let parent = AlgorithmHistory::new(
            "NormaliseToTotal",
            1,
            Utc::now(),
            Duration::from_secs(1),
            &scale_properties(),
        )
        .with_children(vec![child]);
        log.append(parent.clone());

        let json = log.to_json().unwrap();
        let decoded: Vec<AlgorithmHistory> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, vec![parent]);
        assert_eq!(log.last().unwrap().children[0].name, "Integration");
    }
}
