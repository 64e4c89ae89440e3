use serde_json::Value;

use crate::protocol::types::FindOccurrenceResult;

/// Whether a predicate result ends a wait. Values that are not usable count
/// as "not yet" and the wait keeps polling.
pub trait Usable {
    fn is_usable(&self) -> bool;
}

impl Usable for bool {
    fn is_usable(&self) -> bool {
        *self
    }
}

impl Usable for () {
    fn is_usable(&self) -> bool {
        true
    }
}

impl<T> Usable for Option<T> {
    fn is_usable(&self) -> bool {
        self.is_some()
    }
}

impl<T> Usable for Vec<T> {
    fn is_usable(&self) -> bool {
        !self.is_empty()
    }
}

impl Usable for String {
    fn is_usable(&self) -> bool {
        !self.is_empty()
    }
}

impl Usable for Value {
    fn is_usable(&self) -> bool {
        match self {
            Value::Null | Value::Bool(false) => false,
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            _ => true,
        }
    }
}

impl Usable for FindOccurrenceResult {
    fn is_usable(&self) -> bool {
        !self.multiple.is_empty()
    }
}
