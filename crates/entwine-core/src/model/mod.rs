pub mod entity;
pub mod field;


// re-exports
pub use entity::EntityModel;
pub use field::{EntityRef, FieldDefault, FieldKind, FieldModel};

///
/// entity_ref
///
/// Build a lazy [`EntityRef`] to a model static.
///
/// ```ignore
/// static ITEMS_KIND: FieldKind = FieldKind::Entity(entity_ref!(ITEM));
/// ```
///

#[macro_export]
macro_rules! entity_ref {
    ($model:path) => {{
        fn resolve() -> &'static $crate::model::EntityModel {
            &$model
        }
        $crate::model::EntityRef::new(resolve)
    }};
}
