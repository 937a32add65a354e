use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::validator::{CompositeValidator, MandatoryValidator, Validator};
use crate::workspace::WorkspaceHandle;
use crate::PropertyError;

const ARRAY_DELIMITER: char = ',';

/// Data-flow role of a property relative to the data service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Input,
    Output,
    InOut,
}

impl Direction {
    /// Whether the property reads an existing workspace.
    pub fn consumes(self) -> bool {
        matches!(self, Direction::Input | Direction::InOut)
    }

    /// Whether the property publishes a workspace after execution.
    pub fn publishes(self) -> bool {
        matches!(self, Direction::Output | Direction::InOut)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Input => "Input",
            Direction::Output => "Output",
            Direction::InOut => "InOut",
        })
    }
}

/// Type tag of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    Bool,
    Int,
    Double,
    String,
    IntArray,
    DoubleArray,
    StringArray,
    Workspace,
}

impl PropertyKind {
    pub fn type_name(self) -> &'static str {
        match self {
            PropertyKind::Bool => "boolean",
            PropertyKind::Int => "integer",
            PropertyKind::Double => "double",
            PropertyKind::String => "string",
            PropertyKind::IntArray => "integer list",
            PropertyKind::DoubleArray => "double list",
            PropertyKind::StringArray => "string list",
            PropertyKind::Workspace => "workspace",
        }
    }

    pub fn is_array(self) -> bool {
        matches!(
            self,
            PropertyKind::IntArray | PropertyKind::DoubleArray | PropertyKind::StringArray
        )
    }

    /// Parses the canonical string form of a value of this kind.
    ///
    /// An empty string unsets scalar numbers, booleans and workspace names,
    /// and yields an empty string or empty list for the remaining kinds.
    pub fn parse(self, text: &str) -> Result<Option<PropertyValue>, String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(match self {
                PropertyKind::Bool
                | PropertyKind::Int
                | PropertyKind::Double
                | PropertyKind::Workspace => None,
                PropertyKind::String => Some(PropertyValue::Str(text.to_string())),
                PropertyKind::IntArray => Some(PropertyValue::IntArray(Vec::new())),
                PropertyKind::DoubleArray => Some(PropertyValue::DoubleArray(Vec::new())),
                PropertyKind::StringArray => Some(PropertyValue::StrArray(Vec::new())),
            });
        }

        let value = match self {
            PropertyKind::Bool => PropertyValue::Bool(parse_bool(trimmed)?),
            PropertyKind::Int => PropertyValue::Int(parse_int(trimmed)?),
            PropertyKind::Double => PropertyValue::Double(parse_double(trimmed)?),
            PropertyKind::String => PropertyValue::Str(text.to_string()),
            PropertyKind::IntArray => {
                let mut values = Vec::new();
                for token in trimmed.split(ARRAY_DELIMITER) {
                    expand_int_token(token.trim(), &mut values)?;
                }
                PropertyValue::IntArray(values)
            }
            PropertyKind::DoubleArray => PropertyValue::DoubleArray(
                trimmed
                    .split(ARRAY_DELIMITER)
                    .map(|token| parse_double(token.trim()))
                    .collect::<Result<_, _>>()?,
            ),
            PropertyKind::StringArray => PropertyValue::StrArray(
                trimmed
                    .split(ARRAY_DELIMITER)
                    .map(|token| token.trim().to_string())
                    .collect(),
            ),
            PropertyKind::Workspace => PropertyValue::Workspace(trimmed.to_string()),
        };
        Ok(Some(value))
    }

    /// Converts `value` to this kind when a lossless conversion exists.
    fn coerce(self, value: PropertyValue) -> Result<PropertyValue, PropertyValue> {
        match (self, value) {
            (kind, value) if value.kind() == kind => Ok(value),
            (PropertyKind::Double, PropertyValue::Int(v)) => Ok(PropertyValue::Double(v as f64)),
            (PropertyKind::DoubleArray, PropertyValue::IntArray(values)) => Ok(
                PropertyValue::DoubleArray(values.into_iter().map(|v| v as f64).collect()),
            ),
            (PropertyKind::Workspace, PropertyValue::Str(name)) => {
                Ok(PropertyValue::Workspace(name))
            }
            (_, value) => Err(value),
        }
    }
}

fn parse_bool(text: &str) -> Result<bool, String> {
    match text.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("`{text}` is not a boolean")),
    }
}

fn parse_int(text: &str) -> Result<i64, String> {
    text.parse::<i64>()
        .map_err(|err| format!("`{text}` is not an integer ({err})"))
}

fn parse_double(text: &str) -> Result<f64, String> {
    text.parse::<f64>()
        .map_err(|err| format!("`{text}` is not a number ({err})"))
}

/// Expands `7`, `1-3` or `1:3` into `values`. A leading minus sign belongs
/// to the first bound, so `-3--1` is the range from -3 to -1.
fn expand_int_token(token: &str, values: &mut Vec<i64>) -> Result<(), String> {
    if let Ok(single) = token.parse::<i64>() {
        values.push(single);
        return Ok(());
    }

    let split = token
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '-' || *c == ':')
        .map(|(index, _)| index)
        .ok_or_else(|| format!("`{token}` is not an integer or range"))?;
    let start = parse_int(token[..split].trim())?;
    let end = parse_int(token[split + 1..].trim())?;
    if start > end {
        return Err(format!("range `{token}` is descending"));
    }
    values.extend(start..=end);
    Ok(())
}

/// Native value held by a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    IntArray(Vec<i64>),
    DoubleArray(Vec<f64>),
    StrArray(Vec<String>),
    Workspace(String),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Int(_) => PropertyKind::Int,
            PropertyValue::Double(_) => PropertyKind::Double,
            PropertyValue::Str(_) => PropertyKind::String,
            PropertyValue::IntArray(_) => PropertyKind::IntArray,
            PropertyValue::DoubleArray(_) => PropertyKind::DoubleArray,
            PropertyValue::StrArray(_) => PropertyKind::StringArray,
            PropertyValue::Workspace(_) => PropertyKind::Workspace,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// String payload of string values and workspace names.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(v) | PropertyValue::Workspace(v) => Some(v),
            _ => None,
        }
    }

    /// Whether the value counts as "nothing entered".
    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::Bool(_) | PropertyValue::Int(_) | PropertyValue::Double(_) => false,
            PropertyValue::Str(v) | PropertyValue::Workspace(v) => v.trim().is_empty(),
            PropertyValue::IntArray(v) => v.is_empty(),
            PropertyValue::DoubleArray(v) => v.is_empty(),
            PropertyValue::StrArray(v) => v.is_empty(),
        }
    }
}

fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    for (index, value) in values.iter().enumerate() {
        if index > 0 {
            write!(f, "{ARRAY_DELIMITER}")?;
        }
        write!(f, "{value}")?;
    }
    Ok(())
}

/// Canonical string form.
impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => f.write_str(if *v { "1" } else { "0" }),
            PropertyValue::Int(v) => write!(f, "{v}"),
            PropertyValue::Double(v) => write!(f, "{v}"),
            PropertyValue::Str(v) | PropertyValue::Workspace(v) => f.write_str(v),
            PropertyValue::IntArray(v) => join(f, v),
            PropertyValue::DoubleArray(v) => join(f, v),
            PropertyValue::StrArray(v) => join(f, v),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Str(value)
    }
}

impl From<Vec<i64>> for PropertyValue {
    fn from(value: Vec<i64>) -> Self {
        PropertyValue::IntArray(value)
    }
}

impl From<Vec<f64>> for PropertyValue {
    fn from(value: Vec<f64>) -> Self {
        PropertyValue::DoubleArray(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::StrArray(value)
    }
}

/// A named, typed, validated algorithm parameter.
#[derive(Debug, Clone)]
pub struct Property {
    name: String,
    kind: PropertyKind,
    direction: Direction,
    value: Option<PropertyValue>,
    default: Option<PropertyValue>,
    validator: CompositeValidator,
    documentation: String,
    is_default: bool,
    optional: bool,
    workspace: Option<WorkspaceHandle>,
    workspace_type: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        let default = match kind {
            PropertyKind::IntArray => Some(PropertyValue::IntArray(Vec::new())),
            PropertyKind::DoubleArray => Some(PropertyValue::DoubleArray(Vec::new())),
            PropertyKind::StringArray => Some(PropertyValue::StrArray(Vec::new())),
            PropertyKind::String => Some(PropertyValue::Str(String::new())),
            _ => None,
        };
        Self {
            name: name.into(),
            kind,
            direction: Direction::Input,
            value: default.clone(),
            default,
            validator: CompositeValidator::default(),
            documentation: String::new(),
            is_default: true,
            optional: false,
            workspace: None,
            workspace_type: None,
        }
    }

    pub fn bool(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, PropertyKind::Bool).with_default(default)
    }

    pub fn int(name: impl Into<String>, default: i64) -> Self {
        Self::new(name, PropertyKind::Int).with_default(default)
    }

    pub fn double(name: impl Into<String>, default: f64) -> Self {
        Self::new(name, PropertyKind::Double).with_default(default)
    }

    pub fn string(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::String).with_default(default.into())
    }

    pub fn int_array(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::IntArray)
    }

    pub fn double_array(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::DoubleArray)
    }

    pub fn string_array(name: impl Into<String>) -> Self {
        Self::new(name, PropertyKind::StringArray)
    }

    /// Workspace property; mandatory unless marked [`Property::optional`].
    pub fn workspace(name: impl Into<String>, direction: Direction) -> Self {
        Self::new(name, PropertyKind::Workspace).with_direction(direction)
    }

    pub fn with_default(mut self, value: impl Into<PropertyValue>) -> Self {
        let value = value.into();
        self.default = Some(value.clone());
        self.value = Some(value);
        self.is_default = true;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_validator(mut self, validator: impl Validator + 'static) -> Self {
        self.validator.push(Arc::new(validator));
        self
    }

    /// Shorthand for adding a [`MandatoryValidator`].
    pub fn mandatory(self) -> Self {
        self.with_validator(MandatoryValidator)
    }

    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = documentation.into();
        self
    }

    /// Allows a workspace property to be left without a name.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Restricts a workspace property to payloads reporting `type_id`.
    pub fn with_workspace_type(mut self, type_id: impl Into<String>) -> Self {
        self.workspace_type = Some(type_id.into());
        self
    }

    /// Checks that the declared default matches the declared kind, coercing
    /// integers to doubles where needed.
    pub(crate) fn normalise_declaration(&mut self) -> Result<(), PropertyError> {
        if let Some(default) = self.default.take() {
            let coerced = self
                .kind
                .coerce(default)
                .map_err(|value| PropertyError::WrongType {
                    name: self.name.clone(),
                    expected: self.kind.type_name(),
                    actual: value.kind().type_name(),
                })?;
            self.default = Some(coerced.clone());
            self.value = Some(coerced);
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn documentation(&self) -> &str {
        &self.documentation
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn workspace_type(&self) -> Option<&str> {
        self.workspace_type.as_deref()
    }

    /// Canonical string of the current value; empty when unset.
    pub fn value(&self) -> String {
        self.value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub fn default_value(&self) -> String {
        self.default
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub fn typed_value(&self) -> Option<&PropertyValue> {
        self.value.as_ref()
    }

    /// Parses and applies `text`. The previous value is kept on failure.
    pub fn set_value(&mut self, text: &str) -> Result<(), PropertyError> {
        let parsed = self
            .kind
            .parse(text)
            .map_err(|reason| PropertyError::Parse {
                name: self.name.clone(),
                value: text.to_string(),
                reason,
            })?;
        self.assign(parsed);
        Ok(())
    }

    /// Assigns a native value of a compatible kind.
    pub fn set_typed(&mut self, value: PropertyValue) -> Result<(), PropertyError> {
        let coerced = self
            .kind
            .coerce(value)
            .map_err(|value| PropertyError::WrongType {
                name: self.name.clone(),
                expected: self.kind.type_name(),
                actual: value.kind().type_name(),
            })?;
        self.assign(Some(coerced));
        Ok(())
    }

    fn assign(&mut self, value: Option<PropertyValue>) {
        if self.kind == PropertyKind::Workspace {
            self.workspace = None;
        }
        self.value = value;
        self.is_default = false;
    }

    /// Restores the declared default and drops any bound workspace.
    pub fn reset(&mut self) {
        self.value = self.default.clone();
        self.workspace = None;
        self.is_default = true;
    }

    /// Binds a workspace handle directly, bypassing the data service. The
    /// workspace name, if any, is left untouched.
    pub fn bind_workspace(&mut self, workspace: WorkspaceHandle) {
        self.workspace = Some(workspace);
        self.is_default = false;
    }

    pub fn workspace_handle(&self) -> Option<&WorkspaceHandle> {
        self.workspace.as_ref()
    }

    pub fn take_workspace(&mut self) -> Option<WorkspaceHandle> {
        self.workspace.take()
    }

    /// Validates the current value with the strict rules used for top-level
    /// execution.
    pub fn is_valid(&self) -> Result<(), String> {
        self.check(false)
    }

    /// Validates the current value. `unnamed_outputs_allowed` lets pure
    /// output workspaces stay nameless, which is how child algorithms hand
    /// results back to their parent.
    pub fn check(&self, unnamed_outputs_allowed: bool) -> Result<(), String> {
        if self.kind == PropertyKind::Workspace && !self.optional && self.workspace.is_none() {
            let unnamed = self.value.as_ref().map_or(true, PropertyValue::is_empty);
            let exempt = unnamed_outputs_allowed && self.direction == Direction::Output;
            if unnamed && !exempt {
                return Err(format!("Enter a name for the {} workspace", self.direction));
            }
        }
        self.validator.check(self.value.as_ref())
    }

    /// Values accepted by a list validator, for help text.
    pub fn allowed_values(&self) -> Vec<String> {
        self.validator.allowed_values()
    }
}
