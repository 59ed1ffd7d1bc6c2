//! Parameter Values and Types

use dynparam_rtmem::{Capability, RtArray, RtMemory, RtString};

use crate::error::{EngineError, EngineResult};

/// A single parameter value as carried by change messages
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Boolean(bool),
    Float(f32),
    Integer(i32),
    /// Index into the parameter's value list
    Enumeration(u32),
}

impl Value {
    pub fn kind(&self) -> ParameterKind {
        match self {
            Value::Boolean(_) => ParameterKind::Boolean,
            Value::Float(_) => ParameterKind::Float,
            Value::Integer(_) => ParameterKind::Integer,
            Value::Enumeration(_) => ParameterKind::Enumeration,
        }
    }
}

/// Type tag of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Boolean,
    Float,
    Integer,
    Enumeration,
}

/// Parameter description supplied by the producer when adding a parameter
///
/// Borrowed data is copied into instance storage; the caller may drop it as
/// soon as the call returns.
#[derive(Debug, Clone, Copy)]
pub enum ParameterSpec<'a> {
    Boolean {
        value: bool,
    },
    Float {
        value: f32,
        min: f32,
        max: f32,
    },
    Integer {
        value: i32,
        min: i32,
        max: i32,
    },
    Enumeration {
        selected: u32,
        values: &'a [&'a str],
    },
    /// A type this engine does not mirror; the parameter is skipped
    Unsupported {
        kind: &'a str,
    },
}

/// Current value and range of a parameter, owned by the tree
#[derive(Debug, PartialEq)]
pub enum ParamValue {
    Boolean(bool),
    Float {
        value: f32,
        min: f32,
        max: f32,
    },
    Integer {
        value: i32,
        min: i32,
        max: i32,
    },
    Enumeration {
        selected: u32,
        /// Duplicated from the producer's list so it outlives the caller's storage
        values: RtArray<RtString>,
    },
}

impl ParamValue {
    /// Build from a spec; `Ok(None)` for unsupported kinds
    pub(crate) fn from_spec(
        memory: &RtMemory,
        capability: Capability,
        spec: &ParameterSpec<'_>,
    ) -> EngineResult<Option<Self>> {
        let value = match *spec {
            ParameterSpec::Boolean { value } => ParamValue::Boolean(value),
            ParameterSpec::Float { value, min, max } => {
                if min.is_nan() || max.is_nan() || min > max {
                    return Err(EngineError::InvalidRange("float min above max"));
                }
                let value = if value.is_nan() { min } else { value.clamp(min, max) };
                ParamValue::Float { value, min, max }
            }
            ParameterSpec::Integer { value, min, max } => {
                if min > max {
                    return Err(EngineError::InvalidRange("integer min above max"));
                }
                ParamValue::Integer {
                    value: value.clamp(min, max),
                    min,
                    max,
                }
            }
            ParameterSpec::Enumeration { selected, values } => {
                if values.is_empty() {
                    return Err(EngineError::InvalidRange("enumeration without values"));
                }
                if selected as usize >= values.len() {
                    return Err(EngineError::ValueOutOfRange);
                }
                let values = RtArray::try_new_with(memory, capability, values.len(), |index| {
                    RtString::from_str_with(memory, capability, values[index])
                })
                .map_err(|_| EngineError::OutOfMemory {
                    what: "enumeration values",
                })?;
                ParamValue::Enumeration { selected, values }
            }
            ParameterSpec::Unsupported { .. } => return Ok(None),
        };
        Ok(Some(value))
    }

    pub fn kind(&self) -> ParameterKind {
        match self {
            ParamValue::Boolean(_) => ParameterKind::Boolean,
            ParamValue::Float { .. } => ParameterKind::Float,
            ParamValue::Integer { .. } => ParameterKind::Integer,
            ParamValue::Enumeration { .. } => ParameterKind::Enumeration,
        }
    }

    pub fn current(&self) -> Value {
        match self {
            ParamValue::Boolean(value) => Value::Boolean(*value),
            ParamValue::Float { value, .. } => Value::Float(*value),
            ParamValue::Integer { value, .. } => Value::Integer(*value),
            ParamValue::Enumeration { selected, .. } => Value::Enumeration(*selected),
        }
    }

    /// Validate `value` against type and range
    ///
    /// Floats and integers are clamped into range; an enumeration index past
    /// the end is rejected.
    pub fn check(&self, value: Value) -> EngineResult<Value> {
        match (self, value) {
            (ParamValue::Boolean(_), Value::Boolean(_)) => Ok(value),
            (ParamValue::Float { min, max, .. }, Value::Float(v)) => {
                if v.is_nan() {
                    Err(EngineError::ValueOutOfRange)
                } else {
                    Ok(Value::Float(v.clamp(*min, *max)))
                }
            }
            (ParamValue::Integer { min, max, .. }, Value::Integer(v)) => {
                Ok(Value::Integer(v.clamp(*min, *max)))
            }
            (ParamValue::Enumeration { values, .. }, Value::Enumeration(index)) => {
                if (index as usize) < values.len() {
                    Ok(value)
                } else {
                    Err(EngineError::ValueOutOfRange)
                }
            }
            _ => Err(EngineError::TypeMismatch),
        }
    }

    /// Validate and store; returns the value actually stored
    pub(crate) fn set(&mut self, value: Value) -> EngineResult<Value> {
        let checked = self.check(value)?;
        match (self, checked) {
            (ParamValue::Boolean(slot), Value::Boolean(v)) => *slot = v,
            (ParamValue::Float { value: slot, .. }, Value::Float(v)) => *slot = v,
            (ParamValue::Integer { value: slot, .. }, Value::Integer(v)) => *slot = v,
            (ParamValue::Enumeration { selected, .. }, Value::Enumeration(v)) => *selected = v,
            _ => return Err(EngineError::TypeMismatch),
        }
        Ok(checked)
    }

    /// Admissible strings of an enumeration, empty for other kinds
    pub fn enum_values(&self) -> impl Iterator<Item = &str> {
        let values: &[RtString] = match self {
            ParamValue::Enumeration { values, .. } => values.as_slice(),
            _ => &[],
        };
        values.iter().map(|value| value.as_str())
    }

    /// Human-readable current value
    pub fn format_current(&self) -> String {
        match self {
            ParamValue::Boolean(value) => value.to_string(),
            ParamValue::Float { value, .. } => value.to_string(),
            ParamValue::Integer { value, .. } => value.to_string(),
            ParamValue::Enumeration { selected, values } => values
                .get(*selected as usize)
                .map(|value| value.to_string())
                .unwrap_or_default(),
        }
    }
}
