//! Argument values passed into Octave and result values read back out.

use crate::marshal::normalize_text;
use crate::MarshalError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A dense numeric array stored flattened in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericArray {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl NumericArray {
    pub fn new(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, MarshalError> {
        let expected: usize = shape.iter().product();
        if shape.is_empty() || expected != data.len() {
            return Err(MarshalError::Shape {
                shape,
                len: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Build a two-dimensional array from equally sized rows.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self, MarshalError> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(MarshalError::Ragged);
            }
            data.extend_from_slice(row);
        }
        Self::new(vec![rows.len(), cols], data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Row-major flattened values.
    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

/// One positional argument of an invocation.
///
/// Every variant lowers to exactly one Octave literal; see [`crate::marshal`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentValue {
    Number(f64),
    Text(String),
    Boolean(bool),
    Absent,
    NumericList(Vec<f64>),
    TextList(Vec<String>),
    NumericArray(NumericArray),
}

impl ArgumentValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::Text(_) => "text",
            Self::Boolean(_) => "boolean",
            Self::Absent => "absent",
            Self::NumericList(_) => "numeric list",
            Self::TextList(_) => "text list",
            Self::NumericArray(_) => "numeric array",
        }
    }

    /// One-line description used in verbose invocation logs.
    pub fn summary(&self) -> String {
        match self {
            Self::Number(n) => format!("num: {n}"),
            Self::Text(s) => format!("str: {}", normalize_text(s)),
            Self::Boolean(b) => format!("bool: {b}"),
            Self::Absent => "absent: []".to_owned(),
            Self::NumericList(v) => format!("array: {} elements", v.len()),
            Self::TextList(v) => format!("list: {} items", v.len()),
            Self::NumericArray(a) => format!("ndarray: shape {:?}", a.shape()),
        }
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(impl From<$t> for ArgumentValue {
            fn from(n: $t) -> Self {
                Self::Number(f64::from(n))
            }
        })*
    };
}

number_from!(f64, f32, i32, u32, i16, u16, i8, u8);

impl From<i64> for ArgumentValue {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<usize> for ArgumentValue {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

impl From<bool> for ArgumentValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for ArgumentValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for ArgumentValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&std::path::Path> for ArgumentValue {
    fn from(p: &std::path::Path) -> Self {
        Self::Text(p.to_string_lossy().into_owned())
    }
}

impl From<Vec<f64>> for ArgumentValue {
    fn from(v: Vec<f64>) -> Self {
        Self::NumericList(v)
    }
}

impl From<&[f64]> for ArgumentValue {
    fn from(v: &[f64]) -> Self {
        Self::NumericList(v.to_vec())
    }
}

impl From<Vec<String>> for ArgumentValue {
    fn from(v: Vec<String>) -> Self {
        Self::TextList(v)
    }
}

impl From<Vec<&str>> for ArgumentValue {
    fn from(v: Vec<&str>) -> Self {
        Self::TextList(v.into_iter().map(str::to_owned).collect())
    }
}

impl From<NumericArray> for ArgumentValue {
    fn from(a: NumericArray) -> Self {
        Self::NumericArray(a)
    }
}

impl<T: Into<ArgumentValue>> From<Option<T>> for ArgumentValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Absent, Into::into)
    }
}

impl TryFrom<&serde_json::Value> for ArgumentValue {
    type Error = MarshalError;

    fn try_from(value: &serde_json::Value) -> Result<Self, MarshalError> {
        use serde_json::Value as J;
        match value {
            J::Null => Ok(Self::Absent),
            J::Bool(b) => Ok(Self::Boolean(*b)),
            J::Number(n) => n.as_f64().map(Self::Number).ok_or(MarshalError::Unsupported {
                type_name: "non-finite number".to_owned(),
            }),
            J::String(s) => Ok(Self::Text(s.clone())),
            J::Object(_) => Err(MarshalError::Unsupported {
                type_name: "object".to_owned(),
            }),
            J::Array(items) => array_from_json(items),
        }
    }
}

impl TryFrom<serde_json::Value> for ArgumentValue {
    type Error = MarshalError;

    fn try_from(value: serde_json::Value) -> Result<Self, MarshalError> {
        Self::try_from(&value)
    }
}

fn array_from_json(items: &[serde_json::Value]) -> Result<ArgumentValue, MarshalError> {
    use serde_json::Value as J;
    if items.is_empty() {
        return Ok(ArgumentValue::NumericList(Vec::new()));
    }
    if items.iter().all(J::is_string) {
        return Ok(ArgumentValue::TextList(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
        ));
    }
    if items.iter().all(J::is_number) {
        return Ok(ArgumentValue::NumericList(
            items.iter().filter_map(J::as_f64).collect(),
        ));
    }
    if items.iter().all(J::is_array) {
        let mut shape = vec![items.len()];
        let mut data = Vec::new();
        flatten_nested(items, 1, &mut shape, &mut data)?;
        return NumericArray::new(shape, data).map(ArgumentValue::NumericArray);
    }
    let kind = if items.iter().any(J::is_object) {
        "array of objects"
    } else if items.iter().all(J::is_boolean) {
        "array of booleans"
    } else {
        "mixed array"
    };
    Err(MarshalError::Unsupported {
        type_name: kind.to_owned(),
    })
}

fn flatten_nested(
    items: &[serde_json::Value],
    depth: usize,
    shape: &mut Vec<usize>,
    data: &mut Vec<f64>,
) -> Result<(), MarshalError> {
    for item in items {
        match item {
            serde_json::Value::Number(n) => {
                if shape.len() != depth {
                    return Err(MarshalError::Ragged);
                }
                data.push(n.as_f64().ok_or(MarshalError::Unsupported {
                    type_name: "non-finite number".to_owned(),
                })?);
            }
            serde_json::Value::Array(inner) => {
                if shape.len() == depth {
                    if data.is_empty() {
                        shape.push(inner.len());
                    } else {
                        return Err(MarshalError::Ragged);
                    }
                } else if shape.get(depth) != Some(&inner.len()) {
                    return Err(MarshalError::Ragged);
                }
                flatten_nested(inner, depth + 1, shape, data)?;
            }
            other => {
                return Err(MarshalError::Unsupported {
                    type_name: format!("nested {}", json_type_name(other)),
                })
            }
        }
    }
    Ok(())
}

fn json_type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// A value decoded from the exchange file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Octave logicals come back as JSON booleans, while `0`/`1` numerals
    /// marshaled from host booleans come back as numbers. Both are accepted.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Number(n) if *n == 0.0 => Some(false),
            Self::Number(n) if *n == 1.0 => Some(true),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Struct(m) => m.get(name),
            _ => None,
        }
    }

    /// Flatten nested numeric lists into one row-major vector.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        let mut out = Vec::new();
        collect_numbers(self, &mut out).then_some(out)
    }
}

fn collect_numbers(v: &Value, out: &mut Vec<f64>) -> bool {
    match v {
        Value::Number(n) => {
            out.push(*n);
            true
        }
        Value::List(items) => items.iter().all(|i| collect_numbers(i, out)),
        _ => false,
    }
}

/// The value Octave hands back when an argument is echoed unchanged.
impl From<&ArgumentValue> for Value {
    fn from(arg: &ArgumentValue) -> Self {
        match arg {
            ArgumentValue::Number(n) => Self::Number(*n),
            ArgumentValue::Text(s) => Self::Text(normalize_text(s)),
            ArgumentValue::Boolean(b) => Self::Number(if *b { 1.0 } else { 0.0 }),
            ArgumentValue::Absent => Self::List(Vec::new()),
            ArgumentValue::NumericList(v) => Self::List(v.iter().copied().map(Self::Number).collect()),
            ArgumentValue::TextList(v) => Self::List(v.iter().cloned().map(Self::Text).collect()),
            ArgumentValue::NumericArray(a) => {
                Self::List(a.data().iter().copied().map(Self::Number).collect())
            }
        }
    }
}
