use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::property::{Property, PropertyValue};
use crate::PropertyError;

/// Native types that can be read out of a [`PropertyValue`].
pub trait FromPropertyValue: Sized {
    const TYPE_NAME: &'static str;

    fn from_property_value(value: &PropertyValue) -> Option<Self>;
}

macro_rules! impl_from_property_value {
    ($ty:ty, $name:expr, |$value:ident| $body:expr) => {
        impl FromPropertyValue for $ty {
            const TYPE_NAME: &'static str = $name;

            fn from_property_value($value: &PropertyValue) -> Option<Self> {
                $body
            }
        }
    };
}

impl_from_property_value!(bool, "boolean", |value| value.as_bool());
impl_from_property_value!(i64, "integer", |value| value.as_int());
impl_from_property_value!(f64, "double", |value| value.as_double());
impl_from_property_value!(usize, "non-negative integer", |value| value
    .as_int()
    .and_then(|v| usize::try_from(v).ok()));
impl_from_property_value!(String, "string", |value| value.as_str().map(str::to_string));
impl_from_property_value!(Vec<i64>, "integer list", |value| match value {
    PropertyValue::IntArray(values) => Some(values.clone()),
    _ => None,
});
impl_from_property_value!(Vec<f64>, "double list", |value| match value {
    PropertyValue::DoubleArray(values) => Some(values.clone()),
    PropertyValue::IntArray(values) => Some(values.iter().map(|v| *v as f64).collect()),
    _ => None,
});
impl_from_property_value!(Vec<String>, "string list", |value| match value {
    PropertyValue::StrArray(values) => Some(values.clone()),
    _ => None,
});

/// Ordered collection of uniquely named properties. Lookup ignores case;
/// enumeration follows declaration order.
#[derive(Debug, Clone, Default)]
pub struct PropertyManager {
    properties: Vec<Property>,
    index: HashMap<String, usize>,
}

fn key(name: &str) -> String {
    name.to_lowercase()
}

impl PropertyManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, mut property: Property) -> Result<(), PropertyError> {
        let key = key(property.name());
        if self.index.contains_key(&key) {
            return Err(PropertyError::Duplicate(property.name().to_string()));
        }
        property.normalise_declaration()?;
        self.index.insert(key, self.properties.len());
        self.properties.push(property);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(&key(name))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn property(&self, name: &str) -> Result<&Property, PropertyError> {
        self.index
            .get(&key(name))
            .map(|&position| &self.properties[position])
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))
    }

    pub fn property_mut(&mut self, name: &str) -> Result<&mut Property, PropertyError> {
        match self.index.get(&key(name)) {
            Some(&position) => Ok(&mut self.properties[position]),
            None => Err(PropertyError::NotFound(name.to_string())),
        }
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    pub fn properties_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.properties.iter_mut()
    }

    /// Stores the parsed value. Validators run later, see [`Self::validate`].
    pub fn set_property_value(&mut self, name: &str, text: &str) -> Result<(), PropertyError> {
        self.property_mut(name)?.set_value(text)
    }

    pub fn set_property(
        &mut self,
        name: &str,
        value: impl Into<PropertyValue>,
    ) -> Result<(), PropertyError> {
        self.property_mut(name)?.set_typed(value.into())
    }

    pub fn property_value(&self, name: &str) -> Result<String, PropertyError> {
        Ok(self.property(name)?.value())
    }

    /// Reads a set property as a native value.
    pub fn get<T: FromPropertyValue>(&self, name: &str) -> Result<T, PropertyError> {
        self.get_optional(name)?
            .ok_or_else(|| PropertyError::Unset(name.to_string()))
    }

    /// Like [`Self::get`] but maps an unset property to `None`.
    pub fn get_optional<T: FromPropertyValue>(
        &self,
        name: &str,
    ) -> Result<Option<T>, PropertyError> {
        let property = self.property(name)?;
        match property.typed_value() {
            None => Ok(None),
            Some(value) => T::from_property_value(value).map(Some).ok_or_else(|| {
                PropertyError::WrongType {
                    name: property.name().to_string(),
                    expected: T::TYPE_NAME,
                    actual: property.kind().type_name(),
                }
            }),
        }
    }

    pub fn reset(&mut self, name: &str) -> Result<(), PropertyError> {
        self.property_mut(name)?.reset();
        Ok(())
    }

    pub fn reset_all(&mut self) {
        self.properties.iter_mut().for_each(Property::reset);
    }

    pub fn remove(&mut self, name: &str) -> Result<Property, PropertyError> {
        let position = self
            .index
            .remove(&key(name))
            .ok_or_else(|| PropertyError::NotFound(name.to_string()))?;
        let removed = self.properties.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Ok(removed)
    }

    /// Every failing property with its reason, in declaration order.
    pub fn validate(&self, unnamed_outputs_allowed: bool) -> Vec<(String, String)> {
        self.properties
            .iter()
            .filter_map(|property| {
                property
                    .check(unnamed_outputs_allowed)
                    .err()
                    .map(|reason| (property.name().to_string(), reason))
            })
            .collect()
    }

    /// Assigns properties from a JSON object. Lists are joined with the
    /// canonical delimiter; `null` clears a value.
    pub fn set_properties_json(&mut self, values: &Value) -> Result<(), PropertyError> {
        let object = values.as_object().ok_or_else(|| PropertyError::Parse {
            name: "<properties>".to_string(),
            value: values.to_string(),
            reason: "expected a JSON object".to_string(),
        })?;
        for (name, value) in object {
            let text = json_to_text(value);
            self.set_property_value(name, &text)?;
        }
        Ok(())
    }

    /// Current canonical values as a JSON object.
    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for property in &self.properties {
            object.insert(property.name().to_string(), Value::String(property.value()));
        }
        Value::Object(object)
    }
}

fn json_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(json_to_text)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}
