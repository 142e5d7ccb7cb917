use crate::{
    error::{Error, ErrorOrigin},
    value::Value,
};
use derive_more::{Deref, Display};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

///
/// UuidOptions
///
/// Normalization switches for [`normalize`].
/// The default passes absent and empty keys through and raises on anything
/// that is not a UUID.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UuidOptions {
    pub allow_none: bool,
    pub allow_empty: bool,
    pub raise_on_error: bool,
}

impl UuidOptions {
    pub const DEFAULT: Self = Self {
        allow_none: true,
        allow_empty: true,
        raise_on_error: true,
    };

    pub const STRICT: Self = Self {
        allow_none: false,
        allow_empty: false,
        raise_on_error: true,
    };

    pub const LENIENT: Self = Self {
        allow_none: true,
        allow_empty: true,
        raise_on_error: false,
    };
}

impl Default for UuidOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

///
/// normalize
///
/// Canonicalize a primary-key value.
///
/// - `Null` → `None` when `allow_none`
/// - `""` → `Some("")` when `allow_empty`
/// - UUID text (any case, braced, urn or simple form) → lowercase hyphenated
/// - UUID value → lowercase hyphenated
///
/// Malformed text is an `InvalidUuid` error, any other value kind a
/// `TypeMismatch`. With `raise_on_error` unset both yield `Ok(None)`.
///

pub fn normalize(value: &Value, opts: UuidOptions) -> Result<Option<String>, Error> {
    let failure = match value {
        Value::Null if opts.allow_none => return Ok(None),
        Value::Text(text) if text.is_empty() && opts.allow_empty => {
            return Ok(Some(String::new()));
        }
        Value::Text(text) => match Uuid::parse_str(text) {
            Ok(uuid) => return Ok(Some(format_uuid(&uuid))),
            Err(_) => Error::invalid_uuid(format!("invalid UUID string: {text}")),
        },
        Value::Uuid(uuid) => return Ok(Some(format_uuid(uuid))),
        other => Error::type_mismatch(
            ErrorOrigin::Uuid,
            format!(
                "id must be a UUID or a valid UUID string, got {other} ({})",
                other.type_name()
            ),
        ),
    };

    if opts.raise_on_error {
        Err(failure)
    } else {
        Ok(None)
    }
}

/// Canonical form of a UUID string, if it parses.
#[must_use]
pub fn canonical(text: &str) -> Option<String> {
    Uuid::parse_str(text).ok().map(|uuid| format_uuid(&uuid))
}

/// Fresh random key in canonical form.
#[must_use]
pub fn generate() -> String {
    format_uuid(&Uuid::new_v4())
}

fn format_uuid(uuid: &Uuid) -> String {
    uuid.hyphenated().to_string()
}

///
/// UuidStr
///
/// Text that is guaranteed to hold a canonical UUID.
/// The constructor is the validation used by the type matcher for
/// UUID-string fields.
///

#[derive(Clone, Debug, Deref, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct UuidStr(String);

impl UuidStr {
    pub fn new(value: &Value) -> Result<Self, Error> {
        let text = match value {
            Value::Text(text) => text.clone(),
            Value::Uuid(uuid) => uuid.to_string(),
            other => other.to_string(),
        };

        canonical(&text)
            .map(Self)
            .ok_or_else(|| Error::invalid_uuid(format!("{text} is not a valid UUID string")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UuidStr {
    type Error = Error;

    fn try_from(text: String) -> Result<Self, Self::Error> {
        Self::new(&Value::Text(text))
    }
}

impl From<UuidStr> for String {
    fn from(value: UuidStr) -> Self {
        value.0
    }
}

impl From<UuidStr> for Value {
    fn from(value: UuidStr) -> Self {
        Self::Text(value.0)
    }
}

///
/// TESTS
///
