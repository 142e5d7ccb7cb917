use crate::{
    error::{Error, ErrorOrigin},
    model::EntityModel,
    value::{Value, contains, loose_eq, strict_order_cmp},
};
use std::{cmp::Ordering, fmt, str::FromStr};

/// Separator between an attribute name and its operator suffix.
pub const SEPARATOR: &str = "__";

///
/// Suffix
/// Filter operator appended to an attribute name.
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Suffix {
    Contains,
    Gte,
    In,
    Lte,
    NContains,
    Neq,
    NotIn,
}

impl Suffix {
    pub const ALL: [Self; 7] = [
        Self::Gte,
        Self::Lte,
        Self::In,
        Self::NotIn,
        Self::Neq,
        Self::Contains,
        Self::NContains,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::Gte => "gte",
            Self::In => "in",
            Self::Lte => "lte",
            Self::NContains => "ncontains",
            Self::Neq => "neq",
            Self::NotIn => "notin",
        }
    }
}

impl FromStr for Suffix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();

        Self::ALL
            .into_iter()
            .find(|suffix| suffix.as_str() == lower)
            .ok_or_else(|| {
                let valid = Self::ALL
                    .iter()
                    .map(|s| format!("__{}", s.as_str()))
                    .collect::<Vec<_>>()
                    .join(", ");
                Error::invalid_query(format!(
                    "suffix '__{s}' not supported; valid suffixes: {valid}"
                ))
            })
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split `attr` / `attr__suffix`; more than one separator is an error.
pub fn parse_filter_key(key: &str) -> Result<(&str, Option<&str>), Error> {
    let mut parts = key.split(SEPARATOR);
    let attr = parts.next().unwrap_or_default();

    match (parts.next(), parts.next()) {
        (None, _) => Ok((attr, None)),
        (Some(suffix), None) => Ok((attr, Some(suffix))),
        (Some(_), Some(_)) => Err(Error::invalid_query(format!(
            "invalid filter key format: {key}"
        ))),
    }
}

///
/// Criteria
///
/// Ordered `key → value` filter clauses. Keys are `attr` or `attr__suffix`;
/// all clauses must hold for a record to match.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Criteria {
    clauses: Vec<(String, Value)>,
}

impl Criteria {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            clauses: Vec::new(),
        }
    }

    /// Append a clause (builder style).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.clauses.push((key.into(), value.into()));
    }

    /// Criteria from a text-keyed map value.
    pub fn from_map(map: &Value) -> Result<Self, Error> {
        let entries = map.as_map().ok_or_else(|| {
            Error::type_mismatch(
                ErrorOrigin::Filter,
                format!("criteria must be a map, got {}", map.type_name()),
            )
        })?;

        let clauses = entries
            .iter()
            .map(|(k, v)| match k {
                Value::Text(key) => Ok((key.clone(), v.clone())),
                other => Err(Error::invalid_query(format!(
                    "criteria keys must be text, got {other}"
                ))),
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { clauses })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.clauses.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Suffix-less clauses, i.e. the ones that describe field values.
    #[must_use]
    pub fn plain_fields(&self) -> Vec<(&str, &Value)> {
        self.iter()
            .filter(|(key, _)| !key.contains(SEPARATOR))
            .collect()
    }

    /// Parse every key and check operator/value shapes.
    pub fn compile(&self) -> Result<Vec<Clause>, Error> {
        self.iter()
            .map(|(key, value)| Clause::parse(key, value.clone()))
            .collect()
    }

    /// Compile and check every attribute against a model.
    pub fn compile_for(&self, model: &EntityModel) -> Result<Vec<Clause>, Error> {
        let clauses = self.compile()?;
        for clause in &clauses {
            if !model.has_field(&clause.attr) {
                let fields = model.field_names().collect::<Vec<_>>().join(", ");
                return Err(Error::invalid_query(format!(
                    "attribute '{}' not found in {} [{fields}]",
                    clause.attr, model.entity_name
                )));
            }
        }

        Ok(clauses)
    }
}

impl fmt::Display for Criteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.clauses.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        write!(f, "}}")
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Criteria {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            clauses: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

///
/// Clause
/// One parsed criterion.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Clause {
    pub attr: String,
    pub suffix: Option<Suffix>,
    pub value: Value,
}

impl Clause {
    pub fn parse(key: &str, value: Value) -> Result<Self, Error> {
        let (attr, suffix) = parse_filter_key(key)?;
        let suffix = suffix.map(str::parse::<Suffix>).transpose()?;

        if matches!(suffix, Some(Suffix::In | Suffix::NotIn))
            && !matches!(value, Value::List(_) | Value::Text(_))
        {
            return Err(Error::invalid_query(format!(
                "'{key}' requires a list, got {}",
                value.type_name()
            )));
        }

        Ok(Self {
            attr: attr.to_string(),
            suffix,
            value,
        })
    }

    /// Evaluate against an attribute value (`Null` when absent).
    #[must_use]
    pub fn matches(&self, attr: &Value) -> bool {
        let value = &self.value;

        match self.suffix {
            None => loose_eq(attr, value),
            Some(Suffix::Neq) => !loose_eq(attr, value),
            Some(Suffix::Gte) => {
                strict_order_cmp(attr, value).is_some_and(|ord| ord != Ordering::Less)
            }
            Some(Suffix::Lte) => {
                strict_order_cmp(attr, value).is_some_and(|ord| ord != Ordering::Greater)
            }
            Some(Suffix::In) => member_of(attr, value),
            Some(Suffix::NotIn) => !member_of(attr, value),
            Some(Suffix::Contains) => contains(attr, value).unwrap_or(false),
            Some(Suffix::NContains) => contains(attr, value).is_some_and(|found| !found),
        }
    }
}

// `in` operand: list membership, or substring of a text operand.
fn member_of(attr: &Value, operand: &Value) -> bool {
    match operand {
        Value::List(items) => items.iter().any(|item| loose_eq(item, attr)),
        Value::Text(text) => attr.as_text().is_some_and(|a| text.contains(a)),
        _ => false,
    }
}
