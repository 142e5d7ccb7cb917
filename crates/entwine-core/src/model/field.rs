use crate::{model::EntityModel, value::Value};
use std::fmt;

///
/// FieldModel
/// Runtime field metadata used by validation, transformation and storage.
///

#[derive(Debug)]
pub struct FieldModel {
    /// Field name as used in mappings, filters and columns.
    pub name: &'static str,
    /// Declared type shape.
    pub kind: FieldKind,
    /// Value used when a build omits the field.
    pub default: FieldDefault,
}

impl FieldModel {
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind, default: FieldDefault) -> Self {
        Self {
            name,
            kind,
            default,
        }
    }

    /// Field that must be supplied at construction.
    #[must_use]
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, FieldDefault::Required)
    }

    /// Field that defaults to `Null` when omitted.
    #[must_use]
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self::new(name, kind, FieldDefault::Null)
    }
}

///
/// FieldKind
///
/// Declared type of an entity field.
///
/// `Relation` marks a graph edge: a homogeneous collection of entities that
/// tooling (patching, relational cascade) treats differently from a plain
/// `List`. `Map` and `Any` are accepted without inspection.
///

#[derive(Clone, Copy, Debug)]
pub enum FieldKind {
    Any,
    Bool,
    Date,
    Entity(EntityRef),
    Float,
    Int,
    List(&'static Self),
    Map {
        key: &'static Self,
        value: &'static Self,
    },
    Optional(&'static Self),
    Relation(&'static Self),
    Text,
    Timestamp,
    Union(&'static [Self]),
    Uuid,
    UuidStr,
}

impl FieldKind {
    /// Strip any `Optional` wrappers.
    #[must_use]
    pub const fn unwrap_optional(&self) -> &Self {
        let mut kind = self;
        while let Self::Optional(inner) = kind {
            kind = *inner;
        }

        kind
    }

    #[must_use]
    pub const fn is_relation(&self) -> bool {
        matches!(self.unwrap_optional(), Self::Relation(_))
    }

    /// Target model of a relationship field (`Relation(Entity(T))`).
    #[must_use]
    pub fn relation_target(&self) -> Option<&'static EntityModel> {
        match self.unwrap_optional() {
            Self::Relation(inner) => inner.entity_target(),
            _ => None,
        }
    }

    /// Target model of a nested entity field (`Entity(T)` or `Optional(Entity(T))`).
    #[must_use]
    pub fn entity_target(&self) -> Option<&'static EntityModel> {
        match self.unwrap_optional() {
            Self::Entity(target) => Some(target.resolve()),
            _ => None,
        }
    }

    /// True for kinds stored as a single scalar column.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(
            self.unwrap_optional(),
            Self::Bool
                | Self::Date
                | Self::Float
                | Self::Int
                | Self::Text
                | Self::Timestamp
                | Self::Uuid
                | Self::UuidStr
        )
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Bool => write!(f, "bool"),
            Self::Date => write!(f, "date"),
            Self::Entity(target) => write!(f, "{}", target.name()),
            Self::Float => write!(f, "float"),
            Self::Int => write!(f, "int"),
            Self::List(inner) => write!(f, "list[{inner}]"),
            Self::Map { key, value } => write!(f, "map[{key}, {value}]"),
            Self::Optional(inner) => write!(f, "optional[{inner}]"),
            Self::Relation(inner) => write!(f, "relation[{inner}]"),
            Self::Text => write!(f, "text"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Union(kinds) => {
                write!(f, "union[")?;
                for (i, kind) in kinds.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{kind}")?;
                }
                write!(f, "]")
            }
            Self::Uuid => write!(f, "uuid"),
            Self::UuidStr => write!(f, "uuid_str"),
        }
    }
}

///
/// EntityRef
///
/// Lazy reference to another entity model.
/// Resolution is deferred to first use so models may reference each other
/// (including themselves) regardless of declaration order.
///

#[derive(Clone, Copy)]
pub struct EntityRef {
    resolve: fn() -> &'static EntityModel,
}

impl EntityRef {
    #[must_use]
    pub const fn new(resolve: fn() -> &'static EntityModel) -> Self {
        Self { resolve }
    }

    #[must_use]
    pub fn resolve(&self) -> &'static EntityModel {
        (self.resolve)()
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.resolve().entity_name
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityRef").field(&self.name()).finish()
    }
}

///
/// FieldDefault
/// Value taken by a field omitted from a build.
///

#[derive(Clone, Copy, Debug)]
pub enum FieldDefault {
    Bool(bool),
    EmptyList,
    EmptyMap,
    Float(f64),
    Int(i64),
    Null,
    Required,
    Text(&'static str),
}

impl FieldDefault {
    /// Materialize the default, or `None` when the field is required.
    #[must_use]
    pub fn to_value(self) -> Option<Value> {
        match self {
            Self::Bool(b) => Some(Value::Bool(b)),
            Self::EmptyList => Some(Value::List(Vec::new())),
            Self::EmptyMap => Some(Value::Map(Vec::new())),
            Self::Float(x) => Some(Value::Float(x)),
            Self::Int(i) => Some(Value::Int(i)),
            Self::Null => Some(Value::Null),
            Self::Required => None,
            Self::Text(s) => Some(Value::Text(s.to_string())),
        }
    }
}
