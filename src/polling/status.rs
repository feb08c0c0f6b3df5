//! Status extraction from fetch results.

use serde_json::Value;

/// A fetch result that may carry a status value.
///
/// Plain strings are their own status; structured results expose a
/// `status` field. An empty string is no status.
pub trait StatusField {
    fn status_field(&self) -> Option<String>;
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

impl StatusField for String {
    fn status_field(&self) -> Option<String> {
        non_empty(self)
    }
}

impl StatusField for &'static str {
    fn status_field(&self) -> Option<String> {
        non_empty(self)
    }
}

impl StatusField for Value {
    fn status_field(&self) -> Option<String> {
        match self {
            Value::String(s) => non_empty(s),
            Value::Object(map) => match map.get("status") {
                Some(Value::String(s)) => non_empty(s),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            },
            _ => None,
        }
    }
}

impl<T: StatusField> StatusField for Option<T> {
    fn status_field(&self) -> Option<String> {
        self.as_ref().and_then(StatusField::status_field)
    }
}
