use crate::types::{FunctionName, VarName};
use crate::value::{ArgumentValue, Value};
use crate::MarshalError;

/// A single function call to run inside the interpreter.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub function: FunctionName,
    pub arguments: Vec<ArgumentValue>,
    pub output_arity: usize,
    pub explicit_result_name: Option<VarName>,
    pub verbose_override: Option<bool>,
}

impl InvocationRequest {
    pub fn new(function: &str) -> Result<Self, MarshalError> {
        Ok(Self {
            function: FunctionName::parse(function)?,
            arguments: Vec::new(),
            output_arity: 1,
            explicit_result_name: None,
            verbose_override: None,
        })
    }

    #[must_use]
    pub fn arg(mut self, value: impl Into<ArgumentValue>) -> Self {
        self.arguments.push(value.into());
        self
    }

    #[must_use]
    pub fn args<I, T>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ArgumentValue>,
    {
        self.arguments.extend(values.into_iter().map(Into::into));
        self
    }

    /// Number of output variables to bind. Zero is treated as one.
    #[must_use]
    pub fn outputs(mut self, n: usize) -> Self {
        self.output_arity = n.max(1);
        self
    }

    /// Save only the named workspace variable instead of the call outputs.
    pub fn store_as(mut self, name: &str) -> Result<Self, MarshalError> {
        self.explicit_result_name = Some(VarName::parse(name)?);
        Ok(self)
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose_override = Some(verbose);
        self
    }

    /// Variables the call statement binds: `result` for a single output,
    /// `result0..resultN` otherwise.
    pub fn result_vars(&self) -> Vec<VarName> {
        if self.output_arity > 1 {
            (0..self.output_arity)
                .map(|i| VarName::trusted(format!("result{i}")))
                .collect()
        } else {
            vec![VarName::trusted("result")]
        }
    }

    /// Variables written to the exchange file.
    pub fn saved_vars(&self) -> Vec<VarName> {
        match &self.explicit_result_name {
            Some(name) => vec![name.clone()],
            None => self.result_vars(),
        }
    }

    pub fn returns_single(&self) -> bool {
        self.saved_vars().len() == 1
    }
}

/// Decoded outputs of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum InvocationResult {
    Single(Value),
    /// Outputs in declaration order.
    Named(Vec<(VarName, Value)>),
}

impl InvocationResult {
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Single(_) => None,
            Self::Named(pairs) => pairs.iter().find(|(n, _)| n == name).map(|(_, v)| v),
        }
    }

    pub fn into_single(self) -> Option<Value> {
        match self {
            Self::Single(v) => Some(v),
            Self::Named(_) => None,
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        match self {
            Self::Single(v) => vec![v],
            Self::Named(pairs) => pairs.into_iter().map(|(_, v)| v).collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Single(v) => serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
            Self::Named(pairs) => serde_json::Value::Object(
                pairs
                    .iter()
                    .map(|(n, v)| {
                        (
                            n.to_string(),
                            serde_json::to_value(v).unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect(),
            ),
        }
    }
}
