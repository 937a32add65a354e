use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::property::PropertyValue;

/// Rule accepting or rejecting a candidate property value.
///
/// `check` receives `None` when the property is unset and returns a
/// human-readable reason on rejection.
pub trait Validator: fmt::Debug + Send + Sync {
    fn check(&self, value: Option<&PropertyValue>) -> Result<(), String>;

    /// Exhaustive list of accepted values, when the rule has one.
    fn allowed_values(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Inclusive or exclusive numeric bounds, applied element-wise to lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundedValidator {
    lower: Option<f64>,
    upper: Option<f64>,
    exclusive: bool,
}

impl BoundedValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_least(lower: f64) -> Self {
        Self::new().with_lower(lower)
    }

    pub fn between(lower: f64, upper: f64) -> Self {
        Self::new().with_lower(lower).with_upper(upper)
    }

    pub fn with_lower(mut self, lower: f64) -> Self {
        self.lower = Some(lower);
        self
    }

    pub fn with_upper(mut self, upper: f64) -> Self {
        self.upper = Some(upper);
        self
    }

    /// Makes both bounds exclusive.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    fn check_number(&self, value: f64) -> Result<(), String> {
        if value.is_nan() && (self.lower.is_some() || self.upper.is_some()) {
            return Err("Selected value is not a number".to_string());
        }
        self.check_ordering(value, |bound| {
            value.partial_cmp(&bound).unwrap_or(Ordering::Equal)
        })
    }

    /// Integers are compared exactly; converting them to `f64` would round
    /// values beyond 2^53 onto their bounds.
    fn check_int(&self, value: i64) -> Result<(), String> {
        self.check_ordering(value, |bound| compare_int(value, bound))
    }

    fn check_ordering(
        &self,
        value: impl fmt::Display,
        against: impl Fn(f64) -> Ordering,
    ) -> Result<(), String> {
        if let Some(lower) = self.lower {
            match against(lower) {
                Ordering::Less => {
                    return Err(format!("Selected value {value} is < the lower bound of {lower}"))
                }
                Ordering::Equal if self.exclusive => {
                    return Err(format!(
                        "Selected value {value} is <= the lower bound of {lower}"
                    ))
                }
                _ => {}
            }
        }
        if let Some(upper) = self.upper {
            match against(upper) {
                Ordering::Greater => {
                    return Err(format!("Selected value {value} is > the upper bound of {upper}"))
                }
                Ordering::Equal if self.exclusive => {
                    return Err(format!(
                        "Selected value {value} is >= the upper bound of {upper}"
                    ))
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn compare_int(value: i64, bound: f64) -> Ordering {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0; // 2^63
    if bound.is_nan() {
        return Ordering::Equal;
    }
    if bound >= LIMIT {
        return Ordering::Less;
    }
    if bound < -LIMIT {
        return Ordering::Greater;
    }
    let floor = bound.floor();
    match value.cmp(&(floor as i64)) {
        Ordering::Equal if bound > floor => Ordering::Less,
        ordering => ordering,
    }
}

impl Validator for BoundedValidator {
    fn check(&self, value: Option<&PropertyValue>) -> Result<(), String> {
        match value {
            None => Ok(()),
            Some(PropertyValue::Int(v)) => self.check_int(*v),
            Some(PropertyValue::Double(v)) => self.check_number(*v),
            Some(PropertyValue::IntArray(values)) => values
                .iter()
                .try_for_each(|v| self.check_int(*v)),
            Some(PropertyValue::DoubleArray(values)) => {
                values.iter().try_for_each(|v| self.check_number(*v))
            }
            Some(other) => Err(format!(
                "bounds cannot be applied to a {} value",
                other.kind().type_name()
            )),
        }
    }
}

/// Accepts only string values from a fixed list.
#[derive(Debug, Clone, PartialEq)]
pub struct ListValidator {
    allowed: Vec<String>,
}

impl ListValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for ListValidator {
    fn check(&self, value: Option<&PropertyValue>) -> Result<(), String> {
        let candidate = value.and_then(PropertyValue::as_str).unwrap_or_default();
        if candidate.is_empty() {
            return Err("Select a value".to_string());
        }
        if self.allowed.iter().any(|allowed| allowed == candidate) {
            Ok(())
        } else {
            Err(format!(
                "The value \"{candidate}\" is not in the list of allowed values"
            ))
        }
    }

    fn allowed_values(&self) -> Vec<String> {
        self.allowed.clone()
    }
}

/// Rejects unset and empty values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MandatoryValidator;

impl Validator for MandatoryValidator {
    fn check(&self, value: Option<&PropertyValue>) -> Result<(), String> {
        match value {
            Some(value) if !value.is_empty() => Ok(()),
            _ => Err("A value must be entered for this parameter".to_string()),
        }
    }
}

/// Constrains the number of elements of a list property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayLengthValidator {
    min: usize,
    max: Option<usize>,
}

impl ArrayLengthValidator {
    pub fn exact(len: usize) -> Self {
        Self {
            min: len,
            max: Some(len),
        }
    }

    pub fn range(min: usize, max: Option<usize>) -> Self {
        Self { min, max }
    }
}

impl Validator for ArrayLengthValidator {
    fn check(&self, value: Option<&PropertyValue>) -> Result<(), String> {
        let len = match value {
            None => 0,
            Some(PropertyValue::IntArray(v)) => v.len(),
            Some(PropertyValue::DoubleArray(v)) => v.len(),
            Some(PropertyValue::StrArray(v)) => v.len(),
            Some(other) => {
                return Err(format!(
                    "a length constraint cannot be applied to a {} value",
                    other.kind().type_name()
                ))
            }
        };
        match self.max {
            Some(max) if self.min == max && len != max => {
                Err(format!("List must contain exactly {max} values, found {len}"))
            }
            Some(max) if len > max => Err(format!(
                "List must contain at most {max} values, found {len}"
            )),
            _ if len < self.min => Err(format!(
                "List must contain at least {} values, found {len}",
                self.min
            )),
            _ => Ok(()),
        }
    }
}

/// How the members of a [`CompositeValidator`] combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Relation {
    #[default]
    All,
    Any,
}

/// Combination of validators. An empty composite accepts everything.
#[derive(Debug, Clone, Default)]
pub struct CompositeValidator {
    relation: Relation,
    members: Vec<Arc<dyn Validator>>,
}

impl CompositeValidator {
    pub fn new(relation: Relation) -> Self {
        Self {
            relation,
            members: Vec::new(),
        }
    }

    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.members.push(Arc::new(validator));
        self
    }

    pub fn push(&mut self, validator: Arc<dyn Validator>) {
        self.members.push(validator);
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Validator for CompositeValidator {
    fn check(&self, value: Option<&PropertyValue>) -> Result<(), String> {
        if self.members.is_empty() {
            return Ok(());
        }
        let failures: Vec<String> = self
            .members
            .iter()
            .filter_map(|member| member.check(value).err())
            .collect();
        match self.relation {
            Relation::All if failures.is_empty() => Ok(()),
            Relation::All => Err(failures.join("; ")),
            Relation::Any if failures.len() < self.members.len() => Ok(()),
            Relation::Any => Err(failures.join(" or ")),
        }
    }

    fn allowed_values(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|member| member.allowed_values())
            .find(|values| !values.is_empty())
            .unwrap_or_default()
    }
}
