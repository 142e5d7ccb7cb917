use crate::{
    entity::{Entity, matcher::matches},
    error::{Error, ErrorOrigin},
    model::{EntityModel, FieldKind, FieldModel},
    obs::sink::{self, MetricsEvent},
    types::date,
    value::Value,
};

impl Entity {
    /// Check every field value against its declared kind.
    ///
    /// - `Null` always passes
    /// - date and timestamp text (and epoch seconds) are coerced in place
    /// - strict models reject unmarked entity lists and non-entity relations
    ///
    /// Fails on the first offending field.
    pub fn validate_types(&mut self) -> Result<(), Error> {
        let model = self.model();
        let pk_index = model.pk_index();

        for (index, field) in model.fields.iter().enumerate() {
            let value = self.value_mut(index);

            if value.is_null() {
                continue;
            }
            // empty primary key marks an unsaved record
            if Some(index) == pk_index && value.as_text() == Some("") {
                continue;
            }

            coerce_temporal(&field.kind, value);

            let result = check_markers(model, field).and_then(|()| {
                if matches(value, &field.kind) {
                    Ok(())
                } else {
                    Err(Error::type_mismatch(
                        ErrorOrigin::Validate,
                        format!(
                            "{}.{} = {value} does not match declared type {}",
                            model.entity_name, field.name, field.kind
                        ),
                    ))
                }
            });

            if let Err(err) = result {
                sink::record(MetricsEvent::ValidationFailure {
                    entity: model.entity_name,
                });
                tracing::debug!(entity = model.entity_name, field = field.name, %err, "validation failed");

                return Err(err);
            }
        }

        Ok(())
    }
}

// Run the date hook for temporal kinds, replacing the value when it converts.
fn coerce_temporal(kind: &FieldKind, value: &mut Value) {
    let coerced = match kind.unwrap_optional() {
        FieldKind::Date => date::coerce_date(value),
        FieldKind::Timestamp => date::coerce_timestamp(value),
        _ => None,
    };

    if let Some(coerced) = coerced {
        *value = coerced;
    }
}

// Entity collections must be tagged as relations, and relations must hold entities.
fn check_markers(model: &EntityModel, field: &FieldModel) -> Result<(), Error> {
    if !model.strict {
        return Ok(());
    }

    match field.kind.unwrap_optional() {
        FieldKind::List(inner) if matches!(inner.unwrap_optional(), FieldKind::Entity(_)) => {
            Err(Error::type_mismatch(
                ErrorOrigin::Validate,
                format!(
                    "{}.{}: declared as `list[{inner}]` but must use `relation[{inner}]` for entity relationships",
                    model.entity_name, field.name
                ),
            ))
        }
        FieldKind::Relation(inner) if !matches!(inner.unwrap_optional(), FieldKind::Entity(_)) => {
            Err(Error::type_mismatch(
                ErrorOrigin::Validate,
                format!(
                    "{}.{}: declared as `relation[{inner}]` but `{inner}` is not an entity; use plain `list[{inner}]` instead",
                    model.entity_name, field.name
                ),
            ))
        }
        _ => Ok(()),
    }
}
