use std::cmp::Ordering;
use serde_json::Value;
use crate::document::{type_name, Document};
use crate::{Result, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// A single-field sort: `{"field": 1}` or `{"field": -1}`.
///
/// Only the first entry of a multi-field specification is honored; later
/// entries are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    /// Parses a sort mapping. An empty mapping means "no sort".
    pub fn parse(spec: &Value) -> Result<Option<Self>> {
        let map = spec.as_object().ok_or_else(|| {
            Error::Validation(format!("sort must be an object, got {}", type_name(spec)))
        })?;
        let Some((field, order)) = map.iter().next() else {
            return Ok(None);
        };
        let order = match order.as_f64() {
            Some(o) if o == 1.0 => SortOrder::Ascending,
            Some(o) if o == -1.0 => SortOrder::Descending,
            _ => {
                return Err(Error::Validation(format!(
                    "sort order for {:?} must be 1 or -1, got {}",
                    field, order
                )))
            }
        };
        Ok(Some(Self::new(field.clone(), order)))
    }

    /// Ordering of two documents on the sort field.
    ///
    /// Values of different types order by type rank (missing, null, boolean,
    /// number, string, array, object). Arrays and objects compare equal among
    /// themselves, so they keep their original relative position.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        let ord = compare_values(a.get(&self.field), b.get(&self.field));
        match self.order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    }

    /// Stable in-place sort of any items that carry a document.
    pub fn sort_by<T, F>(&self, items: &mut [T], doc: F)
    where
        F: Fn(&T) -> &Document,
    {
        items.sort_by(|a, b| self.compare(doc(a), doc(b)));
    }

    pub fn sort(&self, documents: &mut [Document]) {
        self.sort_by(documents, |d| d);
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

// Must stay a total order: `sort_by` may panic otherwise.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
