use std::fmt;
use thiserror::Error as ThisError;

///
/// Error
///
/// Structured runtime error with a stable classification.
/// Every failure surfaced by the transformer, validator, filter and stores
/// is one of these; the message carries the identifying details
/// (field name, primary key, offending criteria).
///

#[derive(Debug, ThisError)]
#[error("{message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a type mismatch for a specific origin.
    pub fn type_mismatch(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::TypeMismatch, origin, message)
    }

    /// Construct a malformed-input error for a specific origin.
    pub fn malformed(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::MalformedInput, origin, message)
    }

    /// Construct a query-shape error (bad filter key, suffix, or sort token).
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidQuery, ErrorOrigin::Filter, message)
    }

    /// Construct the standard missing-record error for a primary key.
    pub fn not_found(entity: &str, pk: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::NotFound,
            ErrorOrigin::Store,
            format!("{entity} with primary key '{pk}' not found"),
        )
    }

    pub fn ambiguous(entity: &str, criteria: impl fmt::Display) -> Self {
        Self::new(
            ErrorClass::AmbiguousMatch,
            ErrorOrigin::Store,
            format!("multiple {entity} records match criteria {criteria}"),
        )
    }

    pub fn invalid_uuid(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidUuid, ErrorOrigin::Uuid, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::AccessDenied, ErrorOrigin::Access, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Backend, ErrorOrigin::Store, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Config, ErrorOrigin::Config, message)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub const fn is_type_mismatch(&self) -> bool {
        matches!(self.class, ErrorClass::TypeMismatch)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::backend(format!("sqlite: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed(ErrorOrigin::Transform, format!("invalid JSON: {err}"))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::config(format!("io: {err}"))
    }
}

///
/// ErrorClass
/// Error taxonomy shared by every layer.
///

#[remain::sorted]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    AccessDenied,
    AmbiguousMatch,
    Backend,
    Config,
    InvalidQuery,
    InvalidUuid,
    MalformedInput,
    NotFound,
    TypeMismatch,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::AccessDenied => "access_denied",
            Self::AmbiguousMatch => "ambiguous_match",
            Self::Backend => "backend",
            Self::Config => "config",
            Self::InvalidQuery => "invalid_query",
            Self::InvalidUuid => "invalid_uuid",
            Self::MalformedInput => "malformed_input",
            Self::NotFound => "not_found",
            Self::TypeMismatch => "type_mismatch",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Access,
    Config,
    Date,
    Filter,
    Store,
    Transform,
    Uuid,
    Validate,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Access => "access",
            Self::Config => "config",
            Self::Date => "date",
            Self::Filter => "filter",
            Self::Store => "store",
            Self::Transform => "transform",
            Self::Uuid => "uuid",
            Self::Validate => "validate",
        };
        write!(f, "{label}")
    }
}
