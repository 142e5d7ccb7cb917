//! In-memory filtering and multi-key sorting over homogeneous records.

mod criteria;

#[cfg(test)]
mod tests;

use crate::{
    entity::Entity,
    error::{Error, ErrorOrigin},
    value::{Value, canonical_cmp},
};
use std::cmp::Ordering;

// re-exports
pub use criteria::{Clause, Criteria, SEPARATOR, Suffix, parse_filter_key};

///
/// Record
///
/// Something with a type identity and named attributes. Attributes starting
/// with `_` are private and never take part in filtering.
///

pub trait Record {
    /// Type identity; all records in one filter must share it.
    fn record_type(&self) -> &str;

    /// Public attribute names, in declaration order.
    fn attributes(&self) -> Vec<&str>;

    fn attribute(&self, name: &str) -> Option<&Value>;

    /// Whether two records of the same type must also expose the same
    /// attribute set (true for free-form maps).
    fn keyed(&self) -> bool {
        false
    }
}

impl Record for Entity {
    fn record_type(&self) -> &str {
        self.entity_name()
    }

    fn attributes(&self) -> Vec<&str> {
        self.model()
            .field_names()
            .filter(|name| !name.starts_with('_'))
            .collect()
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.get(name)
    }
}

impl Record for Value {
    fn record_type(&self) -> &str {
        self.type_name()
    }

    fn attributes(&self) -> Vec<&str> {
        self.as_map()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(k, _)| k.as_text())
                    .filter(|name| !name.starts_with('_'))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn attribute(&self, name: &str) -> Option<&Value> {
        self.map_get(name)
    }

    fn keyed(&self) -> bool {
        self.is_map()
    }
}

///
/// RecordFilter
///
/// Holds a homogeneous record list and a current view over it. `filter`
/// always evaluates against the full list; `sort` reorders the current view.
///

#[derive(Debug)]
pub struct RecordFilter<R> {
    records: Vec<R>,
    attributes: Vec<String>,
    view: Vec<usize>,
}

impl<R: Record> RecordFilter<R> {
    /// Wrap a record list; mixed record types are rejected.
    pub fn new(records: Vec<R>) -> Result<Self, Error> {
        let attributes: Vec<String> = records
            .first()
            .map(|first| {
                let mut attrs: Vec<String> =
                    first.attributes().into_iter().map(str::to_string).collect();
                if first.keyed() {
                    attrs.sort();
                }
                attrs
            })
            .unwrap_or_default();

        if let Some(first) = records.first() {
            for (index, record) in records.iter().enumerate().skip(1) {
                if record.record_type() != first.record_type() {
                    return Err(heterogeneous(index, record.record_type(), first.record_type()));
                }
                if first.keyed() {
                    let mut keys = record.attributes();
                    keys.sort_unstable();
                    if keys != attributes {
                        return Err(heterogeneous(
                            index,
                            "map with different keys",
                            first.record_type(),
                        ));
                    }
                }
            }
        }

        let view = (0..records.len()).collect();

        Ok(Self {
            records,
            attributes,
            view,
        })
    }

    #[must_use]
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Keep the records satisfying every clause.
    ///
    /// Without records there is nothing to validate against, so any
    /// criteria yield an empty result.
    pub fn filter(&mut self, criteria: &Criteria) -> Result<&mut Self, Error> {
        if self.records.is_empty() {
            self.view.clear();
            return Ok(self);
        }

        let clauses = criteria.compile()?;
        for clause in &clauses {
            if !self.attributes.iter().any(|a| *a == clause.attr) {
                return Err(Error::invalid_query(format!(
                    "attribute '{}' not found in [{}]",
                    clause.attr,
                    self.attributes.join(", ")
                )));
            }
        }

        self.view = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| {
                clauses
                    .iter()
                    .all(|clause| clause.matches(record.attribute(&clause.attr).unwrap_or(&Value::Null)))
            })
            .map(|(index, _)| index)
            .collect();

        tracing::trace!(criteria = %criteria, matched = self.view.len(), "record filter");

        Ok(self)
    }

    /// Stable multi-key sort of the current view.
    ///
    /// `keys` is comma separated; each key is `attr` or `attr__asc` /
    /// `attr__desc`. The first key is the primary one.
    pub fn sort(&mut self, keys: &str) -> Result<&mut Self, Error> {
        let mut parsed = Vec::new();
        for key in keys.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            let (attr, order) = parse_filter_key(key)?;
            let descending = match order.map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => false,
                Some("desc") => true,
                Some(other) => {
                    return Err(Error::invalid_query(format!(
                        "sort order '__{other}' must be '__asc' or '__desc'"
                    )));
                }
            };
            parsed.push((attr, descending));
        }

        // least significant key first; each pass is stable
        for (attr, descending) in parsed.into_iter().rev() {
            let records = &self.records;
            self.view.sort_by(|&a, &b| {
                let ord = compare_attr(&records[a], &records[b], attr);
                if descending { ord.reverse() } else { ord }
            });
        }

        Ok(self)
    }

    /// Current view.
    #[must_use]
    pub fn results(&self) -> Vec<&R> {
        self.view.iter().map(|&i| &self.records[i]).collect()
    }

    /// Consume the filter, returning the current view by value.
    #[must_use]
    pub fn into_results(self) -> Vec<R> {
        let mut slots: Vec<Option<R>> = self.records.into_iter().map(Some).collect();

        self.view
            .iter()
            .filter_map(|&i| slots.get_mut(i).and_then(Option::take))
            .collect()
    }

    /// First `n` results.
    #[must_use]
    pub fn top(&self, n: usize) -> Vec<&R> {
        self.view
            .iter()
            .take(n)
            .map(|&i| &self.records[i])
            .collect()
    }

    /// Last `n` results.
    #[must_use]
    pub fn bottom(&self, n: usize) -> Vec<&R> {
        let skip = self.view.len().saturating_sub(n);

        self.view
            .iter()
            .skip(skip)
            .map(|&i| &self.records[i])
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.view.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }
}

// Missing attributes sort as null.
fn compare_attr<R: Record>(a: &R, b: &R, attr: &str) -> Ordering {
    let left = a.attribute(attr).unwrap_or(&Value::Null);
    let right = b.attribute(attr).unwrap_or(&Value::Null);

    canonical_cmp(left, right)
}

fn heterogeneous(index: usize, found: &str, expected: &str) -> Error {
    Error::malformed(
        ErrorOrigin::Filter,
        format!("record {index} is {found}; all records must be {expected}"),
    )
}
