//! Tags, ingredients and recipes owned by users.
mod repository;

pub use repository::*;

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;

use crate::user::User;

/// Account every query of a repository is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub i64);

impl Owner {
    pub fn id(&self) -> i64 {
        self.0
    }
}

impl From<&User> for Owner {
    fn from(user: &User) -> Self {
        Self(user.id)
    }
}

/// Named record owned by a user and attachable to recipes.
pub trait Attribute:
    for<'r> sqlx::FromRow<'r, PgRow>
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + Unpin
    + 'static
{
    /// Table holding the records.
    const TABLE: &'static str;
    /// Junction table linking records to recipes.
    const LINK_TABLE: &'static str;
    /// Column of [`Attribute::LINK_TABLE`] referencing the record.
    const LINK_COLUMN: &'static str;
    /// Route segment under `/recipe/`.
    const PATH: &'static str;
    /// Singular name used in messages.
    const LABEL: &'static str;
}

/// Tag attached to recipes, such as "Vegan".
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    #[serde(rename = "user")]
    #[sqlx(rename = "user_id")]
    pub owner: i64,
}

impl Attribute for Tag {
    const TABLE: &'static str = "tags";
    const LINK_TABLE: &'static str = "recipe_tags";
    const LINK_COLUMN: &'static str = "tag_id";
    const PATH: &'static str = "tags";
    const LABEL: &'static str = "Tag";
}

/// Ingredient used by recipes.
#[derive(
    Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow,
)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    #[serde(rename = "user")]
    #[sqlx(rename = "user_id")]
    pub owner: i64,
}

impl Attribute for Ingredient {
    const TABLE: &'static str = "ingredients";
    const LINK_TABLE: &'static str = "recipe_ingredients";
    const LINK_COLUMN: &'static str = "ingredient_id";
    const PATH: &'static str = "ingredients";
    const LABEL: &'static str = "Ingredient";
}

/// Recipe as listed, with IDs of its tags and ingredients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipe {
    pub id: i64,
    #[serde(rename = "user")]
    #[sqlx(rename = "user_id")]
    pub owner: i64,
    pub title: String,
    pub ingredients: Vec<i64>,
    pub tags: Vec<i64>,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
}

/// Recipe with expanded tags and ingredients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecipeDetail {
    pub id: i64,
    #[serde(rename = "user")]
    #[sqlx(rename = "user_id")]
    pub owner: i64,
    pub title: String,
    #[sqlx(json)]
    pub ingredients: Vec<Ingredient>,
    #[sqlx(json)]
    pub tags: Vec<Tag>,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub image: Option<String>,
}

/// Image path of a recipe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecipeImage {
    pub id: i64,
    pub image: Option<String>,
}

/// Values of a recipe to create, or to replace entirely.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: Option<String>,
    pub tags: Vec<i64>,
    pub ingredients: Vec<i64>,
}

/// Partial changes of a recipe. `None` keeps the current value.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<Option<String>>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

impl From<NewRecipe> for RecipeChanges {
    fn from(recipe: NewRecipe) -> Self {
        Self {
            title: Some(recipe.title),
            time_minutes: Some(recipe.time_minutes),
            price: Some(recipe.price),
            link: Some(recipe.link),
            tags: Some(recipe.tags),
            ingredients: Some(recipe.ingredients),
        }
    }
}

/// Filters of the recipe list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecipeFilter {
    /// Keep recipes attached to one of these tags.
    pub tags: Option<Vec<i64>>,
    /// Keep recipes using one of these ingredients.
    pub ingredients: Option<Vec<i64>>,
}
