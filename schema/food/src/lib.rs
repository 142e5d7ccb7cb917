//! Food catalogue models.
//!
//! A `Food` owns its ingredients and nutrient measurements as relationship
//! collections; label nutrients are embedded. Each measurement points at a
//! `Nutrient` and, optionally, at how the amount was derived.

use entwine::prelude::*;

static TEXT: FieldKind = FieldKind::Text;
static INT: FieldKind = FieldKind::Int;
static FLOAT: FieldKind = FieldKind::Float;
static BOOL: FieldKind = FieldKind::Bool;

const fn id() -> FieldModel {
    FieldModel::optional("id", FieldKind::UuidStr)
}

const fn text(name: &'static str) -> FieldModel {
    FieldModel::optional(name, FieldKind::Optional(&TEXT))
}

const fn int(name: &'static str) -> FieldModel {
    FieldModel::optional(name, FieldKind::Optional(&INT))
}

const fn float(name: &'static str) -> FieldModel {
    FieldModel::optional(name, FieldKind::Optional(&FLOAT))
}

///
/// Ingredient
///

pub static INGREDIENT: EntityModel = EntityModel::new("Ingredient", &INGREDIENT_FIELDS);

static INGREDIENT_FIELDS: [FieldModel; 3] = [
    id(),
    text("name"),
    FieldModel::optional("is_organic", FieldKind::Optional(&BOOL)),
];

static INGREDIENT_KIND: FieldKind = FieldKind::Entity(entity_ref!(INGREDIENT));

///
/// Nutrient
///

pub static NUTRIENT: EntityModel = EntityModel::new("Nutrient", &NUTRIENT_FIELDS);

static NUTRIENT_FIELDS: [FieldModel; 6] = [
    id(),
    int("remote_id"),
    text("number"),
    text("name"),
    int("rank"),
    text("unitname"),
];

///
/// FoodNutrientSource
///

pub static FOOD_NUTRIENT_SOURCE: EntityModel =
    EntityModel::new("FoodNutrientSource", &FOOD_NUTRIENT_SOURCE_FIELDS);

static FOOD_NUTRIENT_SOURCE_FIELDS: [FieldModel; 4] = [
    id(),
    int("remote_id"),
    text("code"),
    text("description"),
];

///
/// FoodNutrientDerivation
///

pub static FOOD_NUTRIENT_DERIVATION: EntityModel =
    EntityModel::new("FoodNutrientDerivation", &FOOD_NUTRIENT_DERIVATION_FIELDS);

static FOOD_NUTRIENT_DERIVATION_FIELDS: [FieldModel; 4] = [
    id(),
    text("code"),
    text("description"),
    FieldModel::optional("source", FieldKind::Entity(entity_ref!(FOOD_NUTRIENT_SOURCE))),
];

///
/// FoodNutrient
/// One measured amount of a nutrient in a food.
///

pub static FOOD_NUTRIENT: EntityModel = EntityModel::new("FoodNutrient", &FOOD_NUTRIENT_FIELDS);

static FOOD_NUTRIENT_FIELDS: [FieldModel; 5] = [
    id(),
    int("remote_id"),
    FieldModel::optional("nutrient", FieldKind::Entity(entity_ref!(NUTRIENT))),
    float("amount"),
    FieldModel::optional(
        "derivation",
        FieldKind::Entity(entity_ref!(FOOD_NUTRIENT_DERIVATION)),
    ),
];

static FOOD_NUTRIENT_KIND: FieldKind = FieldKind::Entity(entity_ref!(FOOD_NUTRIENT));

///
/// LabelNutrients
/// Per-serving values printed on the label.
///

pub static LABEL_NUTRIENTS: EntityModel =
    EntityModel::new("LabelNutrients", &LABEL_NUTRIENTS_FIELDS);

static LABEL_NUTRIENTS_FIELDS: [FieldModel; 13] = [
    id(),
    float("fat"),
    float("saturated_fat"),
    float("trans_fat"),
    float("cholesterol"),
    float("sodium"),
    float("carbohydrates"),
    float("fiber"),
    float("sugars"),
    float("protein"),
    float("calcium"),
    float("iron"),
    float("calories"),
];

///
/// Food
///

pub static FOOD: EntityModel = EntityModel::new("Food", &FOOD_FIELDS);

static FOOD_FIELDS: [FieldModel; 15] = [
    id(),
    int("remote_id"),
    text("description"),
    text("branded_food_category"),
    text("brand_owner"),
    text("gtin_upc"),
    float("serving_size"),
    text("serving_size_unit"),
    float("household_serving"),
    text("household_serving_unit"),
    FieldModel::optional("publication_date", FieldKind::Optional(&DATE)),
    FieldModel::new(
        "ingredients",
        FieldKind::Relation(&INGREDIENT_KIND),
        FieldDefault::EmptyList,
    ),
    FieldModel::new(
        "nutrients",
        FieldKind::Relation(&FOOD_NUTRIENT_KIND),
        FieldDefault::EmptyList,
    ),
    FieldModel::optional(
        "label_nutrients",
        FieldKind::Entity(entity_ref!(LABEL_NUTRIENTS)),
    ),
    FieldModel::new("tags", FieldKind::List(&TEXT), FieldDefault::EmptyList),
];

static DATE: FieldKind = FieldKind::Date;

/// Every model in this schema, leaves first.
pub static MODELS: [&EntityModel; 7] = [
    &INGREDIENT,
    &NUTRIENT,
    &FOOD_NUTRIENT_SOURCE,
    &FOOD_NUTRIENT_DERIVATION,
    &FOOD_NUTRIENT,
    &LABEL_NUTRIENTS,
    &FOOD,
];

///
/// PROFILES
/// FoodData Central records, keyed by their `fdcId`.
///

pub static NUTRIENT_PROFILE: Profile =
    Profile::new(&NUTRIENT).with_mapping(&[("id", "remote_id"), ("unitName", "unitname")]);

pub static FOOD_NUTRIENT_SOURCE_PROFILE: Profile =
    Profile::new(&FOOD_NUTRIENT_SOURCE).with_mapping(&[("id", "remote_id")]);

pub static FOOD_NUTRIENT_DERIVATION_PROFILE: Profile = Profile::new(&FOOD_NUTRIENT_DERIVATION)
    .with_mapping(&[("foodNutrientSource", "source")])
    .with_nested(&[("source", &FOOD_NUTRIENT_SOURCE_PROFILE)]);

pub static FOOD_NUTRIENT_PROFILE: Profile = Profile::new(&FOOD_NUTRIENT)
    .with_mapping(&[("id", "remote_id"), ("foodNutrientDerivation", "derivation")])
    .with_nested(&[
        ("nutrient", &NUTRIENT_PROFILE),
        ("derivation", &FOOD_NUTRIENT_DERIVATION_PROFILE),
    ]);

pub static LABEL_NUTRIENTS_PROFILE: Profile = Profile::new(&LABEL_NUTRIENTS).unwrapping("value");

// `ingredients` is the label's free text, not the ingredient records
pub static FOOD_PROFILE: Profile = Profile::new(&FOOD)
    .with_mapping(&[("fdcId", "remote_id"), ("foodNutrients", "nutrients")])
    .with_external_pk("fdcId")
    .skipping(&["ingredients"])
    .with_nested(&[
        ("nutrients", &FOOD_NUTRIENT_PROFILE),
        ("label_nutrients", &LABEL_NUTRIENTS_PROFILE),
    ]);
