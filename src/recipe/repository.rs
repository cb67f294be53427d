//! Handle database requests of owned records.
//!
//! Repositories are built per request for one [`Owner`]; every statement
//! binds it, so records of other users are neither readable nor writable.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use sqlx::{PgConnection, Pool, Postgres};
use validator::{ValidationError, ValidationErrors};

use crate::error::{Result, ServerError};
use crate::recipe::{
    Attribute, Ingredient, NewRecipe, Owner, Recipe, RecipeChanges,
    RecipeDetail, RecipeFilter, RecipeImage, Tag,
};

/// Owned collection of an [`Attribute`] (tags or ingredients).
pub struct OwnedRepository<E> {
    pool: Pool<Postgres>,
    owner: Owner,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Attribute> OwnedRepository<E> {
    /// Create a new [`OwnedRepository`] restricted to `owner`.
    pub fn new(pool: Pool<Postgres>, owner: Owner) -> Self {
        Self {
            pool,
            owner,
            _entity: PhantomData,
        }
    }

    /// List records by name, descending.
    ///
    /// With `assigned_only`, keep records used by at least one recipe.
    pub async fn list(&self, assigned_only: bool) -> Result<Vec<E>> {
        let query = format!(
            r#"SELECT a.id, a.name, a.user_id FROM {table} a
                WHERE a.user_id = $1
                AND (NOT $2 OR EXISTS (SELECT 1 FROM {link} l WHERE l.{column} = a.id))
                ORDER BY a.name DESC, a.id DESC"#,
            table = E::TABLE,
            link = E::LINK_TABLE,
            column = E::LINK_COLUMN,
        );

        Ok(sqlx::query_as::<_, E>(&query)
            .bind(self.owner.id())
            .bind(assigned_only)
            .fetch_all(&self.pool)
            .await?)
    }

    /// Insert a new record.
    pub async fn create(&self, name: &str) -> Result<E> {
        let query = format!(
            "INSERT INTO {} (name, user_id) VALUES ($1, $2) RETURNING id, name, user_id",
            E::TABLE
        );

        Ok(sqlx::query_as::<_, E>(&query)
            .bind(name)
            .bind(self.owner.id())
            .fetch_one(&self.pool)
            .await?)
    }

    /// Find a record using `id` field.
    pub async fn find(&self, id: i64) -> Result<E> {
        let query = format!(
            "SELECT id, name, user_id FROM {} WHERE id = $1 AND user_id = $2",
            E::TABLE
        );

        sqlx::query_as::<_, E>(&query)
            .bind(id)
            .bind(self.owner.id())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServerError::NotFound)
    }

    /// Update `name` of a record.
    pub async fn rename(&self, id: i64, name: &str) -> Result<E> {
        let query = format!(
            "UPDATE {} SET name = $1 WHERE id = $2 AND user_id = $3 RETURNING id, name, user_id",
            E::TABLE
        );

        sqlx::query_as::<_, E>(&query)
            .bind(name)
            .bind(id)
            .bind(self.owner.id())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServerError::NotFound)
    }

    /// Delete a record. Recipes using it are kept.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let query = format!("DELETE FROM {} WHERE id = $1 AND user_id = $2", E::TABLE);

        let result = sqlx::query(&query)
            .bind(id)
            .bind(self.owner.id())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound);
        }
        Ok(())
    }
}

const RECIPE_COLUMNS: &str = r#"r.id, r.user_id, r.title, r.time_minutes, r.price, r.link,
    ARRAY(SELECT l.ingredient_id FROM recipe_ingredients l WHERE l.recipe_id = r.id ORDER BY l.ingredient_id) AS ingredients,
    ARRAY(SELECT l.tag_id FROM recipe_tags l WHERE l.recipe_id = r.id ORDER BY l.tag_id) AS tags"#;

/// Recipes of one [`Owner`].
pub struct RecipeRepository {
    pool: Pool<Postgres>,
    owner: Owner,
}

impl RecipeRepository {
    /// Create a new [`RecipeRepository`] restricted to `owner`.
    pub fn new(pool: Pool<Postgres>, owner: Owner) -> Self {
        Self { pool, owner }
    }

    /// List recipes, newest first.
    pub async fn list(&self, filter: &RecipeFilter) -> Result<Vec<Recipe>> {
        let query = format!(
            r#"SELECT {RECIPE_COLUMNS} FROM recipes r
                WHERE r.user_id = $1
                AND ($2::BIGINT[] IS NULL OR EXISTS (
                    SELECT 1 FROM recipe_tags l WHERE l.recipe_id = r.id AND l.tag_id = ANY($2)
                ))
                AND ($3::BIGINT[] IS NULL OR EXISTS (
                    SELECT 1 FROM recipe_ingredients l WHERE l.recipe_id = r.id AND l.ingredient_id = ANY($3)
                ))
                ORDER BY r.id DESC"#
        );

        Ok(sqlx::query_as::<_, Recipe>(&query)
            .bind(self.owner.id())
            .bind(filter.tags.as_deref())
            .bind(filter.ingredients.as_deref())
            .fetch_all(&self.pool)
            .await?)
    }

    /// Find a recipe with its tags and ingredients expanded.
    pub async fn find(&self, id: i64) -> Result<RecipeDetail> {
        sqlx::query_as::<_, RecipeDetail>(
            r#"SELECT r.id, r.user_id, r.title, r.time_minutes, r.price, r.link, r.image,
                COALESCE((
                    SELECT JSONB_AGG(
                        JSONB_BUILD_OBJECT('id', i.id, 'name', i.name, 'user', i.user_id)
                        ORDER BY i.name DESC, i.id DESC
                    )
                    FROM ingredients i
                    INNER JOIN recipe_ingredients l ON l.ingredient_id = i.id
                    WHERE l.recipe_id = r.id
                ), '[]'::JSONB) AS ingredients,
                COALESCE((
                    SELECT JSONB_AGG(
                        JSONB_BUILD_OBJECT('id', t.id, 'name', t.name, 'user', t.user_id)
                        ORDER BY t.name DESC, t.id DESC
                    )
                    FROM tags t
                    INNER JOIN recipe_tags l ON l.tag_id = t.id
                    WHERE l.recipe_id = r.id
                ), '[]'::JSONB) AS tags
            FROM recipes r
            WHERE r.id = $1 AND r.user_id = $2"#,
        )
        .bind(id)
        .bind(self.owner.id())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServerError::NotFound)
    }

    /// Insert a recipe and attach its tags and ingredients.
    pub async fn create(&self, recipe: NewRecipe) -> Result<Recipe> {
        let mut tx = self.pool.begin().await?;
        let tags = unique(recipe.tags);
        let ingredients = unique(recipe.ingredients);

        check_links::<Tag>(&mut *tx, self.owner, &tags).await?;
        check_links::<Ingredient>(&mut *tx, self.owner, &ingredients).await?;

        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO recipes (title, time_minutes, price, link, user_id)
                VALUES ($1, $2, $3, $4, $5) RETURNING id"#,
        )
        .bind(&recipe.title)
        .bind(recipe.time_minutes)
        .bind(recipe.price)
        .bind(&recipe.link)
        .bind(self.owner.id())
        .fetch_one(&mut *tx)
        .await?;

        replace_links::<Tag>(&mut *tx, id, &tags).await?;
        replace_links::<Ingredient>(&mut *tx, id, &ingredients).await?;

        let recipe = get(&mut *tx, self.owner, id).await?;
        tx.commit().await?;

        tracing::debug!(recipe_id = id, user_id = self.owner.id(), "recipe created");
        Ok(recipe)
    }

    /// Apply changes on a recipe.
    ///
    /// Given tags or ingredients replace the current ones.
    pub async fn update(&self, id: i64, changes: RecipeChanges) -> Result<Recipe> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"UPDATE recipes SET
                title = COALESCE($1, title),
                time_minutes = COALESCE($2, time_minutes),
                price = COALESCE($3, price),
                link = CASE WHEN $4 THEN $5 ELSE link END
                WHERE id = $6 AND user_id = $7"#,
        )
        .bind(&changes.title)
        .bind(changes.time_minutes)
        .bind(changes.price)
        .bind(changes.link.is_some())
        .bind(changes.link.flatten())
        .bind(id)
        .bind(self.owner.id())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound);
        }

        if let Some(tags) = changes.tags {
            let tags = unique(tags);
            check_links::<Tag>(&mut *tx, self.owner, &tags).await?;
            replace_links::<Tag>(&mut *tx, id, &tags).await?;
        }

        if let Some(ingredients) = changes.ingredients {
            let ingredients = unique(ingredients);
            check_links::<Ingredient>(&mut *tx, self.owner, &ingredients).await?;
            replace_links::<Ingredient>(&mut *tx, id, &ingredients).await?;
        }

        let recipe = get(&mut *tx, self.owner, id).await?;
        tx.commit().await?;

        Ok(recipe)
    }

    /// Delete a recipe. Its tags and ingredients are kept.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(self.owner.id())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ServerError::NotFound);
        }
        Ok(())
    }

    /// Find image path of a recipe.
    pub async fn find_image(&self, id: i64) -> Result<RecipeImage> {
        sqlx::query_as::<_, RecipeImage>(
            "SELECT id, image FROM recipes WHERE id = $1 AND user_id = $2",
        )
        .bind(id)
        .bind(self.owner.id())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServerError::NotFound)
    }

    /// Update image path of a recipe.
    pub async fn set_image(&self, id: i64, image: &str) -> Result<RecipeImage> {
        sqlx::query_as::<_, RecipeImage>(
            "UPDATE recipes SET image = $1 WHERE id = $2 AND user_id = $3 RETURNING id, image",
        )
        .bind(image)
        .bind(id)
        .bind(self.owner.id())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(ServerError::NotFound)
    }
}

async fn get(conn: &mut PgConnection, owner: Owner, id: i64) -> Result<Recipe> {
    let query = format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1 AND r.user_id = $2"
    );

    sqlx::query_as::<_, Recipe>(&query)
        .bind(id)
        .bind(owner.id())
        .fetch_optional(conn)
        .await?
        .ok_or(ServerError::NotFound)
}

fn unique(ids: Vec<i64>) -> Vec<i64> {
    ids.into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Ensure every ID references a record of `owner`.
async fn check_links<E: Attribute>(
    conn: &mut PgConnection,
    owner: Owner,
    ids: &[i64],
) -> Result<()> {
    if ids.is_empty() {
        return Ok(());
    }

    let query = format!("SELECT id FROM {} WHERE user_id = $1 AND id = ANY($2)", E::TABLE);
    let found: Vec<i64> = sqlx::query_scalar(&query)
        .bind(owner.id())
        .bind(ids)
        .fetch_all(conn)
        .await?;

    let mut errors = ValidationErrors::new();
    for id in ids.iter().filter(|id| !found.contains(id)) {
        errors.add(
            E::TABLE,
            ValidationError::new("does_not_exist").with_message(
                format!("Invalid pk \"{id}\" - object does not exist.").into(),
            ),
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}

async fn replace_links<E: Attribute>(
    conn: &mut PgConnection,
    recipe_id: i64,
    ids: &[i64],
) -> Result<()> {
    let query = format!("DELETE FROM {} WHERE recipe_id = $1", E::LINK_TABLE);
    sqlx::query(&query).bind(recipe_id).execute(&mut *conn).await?;

    if !ids.is_empty() {
        let query = format!(
            "INSERT INTO {} (recipe_id, {}) SELECT $1, UNNEST($2::BIGINT[])",
            E::LINK_TABLE,
            E::LINK_COLUMN
        );
        sqlx::query(&query)
            .bind(recipe_id)
            .bind(ids)
            .execute(&mut *conn)
            .await?;
    }

    Ok(())
}
