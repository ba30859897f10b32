use std::fmt::Debug;

use crate::core::types::Value;

/// Validation hook run on a field value before any write
///
/// `check` receives `None` for a missing value and returns a message
/// describing the violation.
pub trait Constraint: Debug + Send + Sync {
    fn name(&self) -> &str;

    fn check(&self, value: Option<&Value>) -> Result<(), String>;
}

/// Value must be present; strings must hold non-whitespace, lists an element.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotEmpty;

impl Constraint for NotEmpty {
    fn name(&self) -> &str {
        "not_empty"
    }

    fn check(&self, value: Option<&Value>) -> Result<(), String> {
        match value {
            None => Err("value is missing".to_string()),
            Some(Value::Str(s)) if s.trim().is_empty() => Err("value is empty".to_string()),
            Some(Value::List(items)) if items.is_empty() => Err("list is empty".to_string()),
            Some(_) => Ok(()),
        }
    }
}

/// Upper bound on string length (in chars) or list length
#[derive(Debug, Clone, Copy)]
pub struct MaxLength(pub usize);

impl Constraint for MaxLength {
    fn name(&self) -> &str {
        "max_length"
    }

    fn check(&self, value: Option<&Value>) -> Result<(), String> {
        let len = match value {
            Some(Value::Str(s)) => s.chars().count(),
            Some(Value::List(items)) => items.len(),
            _ => return Ok(()),
        };
        if len > self.0 {
            Err(format!("length {} exceeds {}", len, self.0))
        } else {
            Ok(())
        }
    }
}

/// Inclusive bounds for numeric values. Missing values pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn between(min: f64, max: f64) -> Self {
        NumericRange {
            min: Some(min),
            max: Some(max),
        }
    }
}

impl Constraint for NumericRange {
    fn name(&self) -> &str {
        "numeric_range"
    }

    fn check(&self, value: Option<&Value>) -> Result<(), String> {
        let Some(value) = value else {
            return Ok(());
        };
        let Some(n) = value.as_f64() else {
            return Err(format!("expected a number, got {}", value.type_name()));
        };
        if n.is_nan() {
            return Err("NaN is not in any range".to_string());
        }

        if let Some(min) = self.min {
            if n < min {
                return Err(format!("{} is below {}", n, min));
            }
        }
        if let Some(max) = self.max {
            if n > max {
                return Err(format!("{} is above {}", n, max));
            }
        }
        Ok(())
    }
}
