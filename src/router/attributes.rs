//! Tags and ingredients HTTP API.
//!
//! Both resources share the same handlers, picked by their [`Attribute`].

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Router};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::recipe::{Attribute, OwnedRepository, Owner};
use crate::response::Envelope;
use crate::router::{Id, Params, Valid};
use crate::user::User;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListQuery {
    /// `1` keeps only records attached to at least one recipe.
    #[serde(default)]
    pub assigned_only: u8,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(
        length(min = 1, max = 255, message = "Name must be 1 to 255 characters long."),
        custom(function = "crate::router::not_blank")
    )]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PatchBody {
    #[validate(
        length(min = 1, max = 255, message = "Name must be 1 to 255 characters long."),
        custom(function = "crate::router::not_blank")
    )]
    pub name: Option<String>,
}

fn repository<E: Attribute>(state: &AppState, user: &User) -> OwnedRepository<E> {
    OwnedRepository::new(state.db.postgres.clone(), Owner::from(user))
}

pub fn router<E: Attribute>() -> Router<AppState> {
    Router::new()
        // `GET|POST /recipe/<path>/`.
        .route(&format!("/recipe/{}/", E::PATH), get(list::<E>).post(create::<E>))
        // `GET|PATCH|DELETE /recipe/<path>/{id}/`.
        .route(
            &format!("/recipe/{}/{{id}}/", E::PATH),
            get(retrieve::<E>).patch(update::<E>).delete(destroy::<E>),
        )
}

async fn list<E: Attribute>(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Params(query): Params<ListQuery>,
) -> Result<Envelope<Vec<E>>> {
    let records = repository::<E>(&state, &user)
        .list(query.assigned_only != 0)
        .await?;

    Ok(Envelope::ok(format!("{}s retrieved successfully", E::LABEL), records))
}

async fn create<E: Attribute>(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<Body>,
) -> Result<Envelope<E>> {
    let record = repository::<E>(&state, &user)
        .create(body.name.trim())
        .await?;

    Ok(Envelope::created(format!("{} created successfully", E::LABEL), record))
}

async fn retrieve<E: Attribute>(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Id(id): Id,
) -> Result<Envelope<E>> {
    let record = repository::<E>(&state, &user).find(id).await?;

    Ok(Envelope::ok(format!("{} retrieved successfully", E::LABEL), record))
}

async fn update<E: Attribute>(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Id(id): Id,
    Valid(body): Valid<PatchBody>,
) -> Result<Envelope<E>> {
    let repo = repository::<E>(&state, &user);
    let record = match body.name {
        Some(name) => repo.rename(id, name.trim()).await?,
        None => repo.find(id).await?,
    };

    Ok(Envelope::ok(format!("{} updated successfully", E::LABEL), record))
}

async fn destroy<E: Attribute>(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Id(id): Id,
) -> Result<Envelope<()>> {
    repository::<E>(&state, &user).delete(id).await?;

    Ok(Envelope::ok(format!("{} deleted successfully", E::LABEL), ()))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use sqlx::{Pool, Postgres};

    use super::*;
    use crate::recipe::{Ingredient, NewRecipe, RecipeRepository, Tag};
    use crate::*;

    #[sqlx::test]
    async fn test_retrieve_tags_limited_to_user(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let other = router::tests::create_user(&pool, "other@example.com").await;

        OwnedRepository::<Tag>::new(pool.clone(), Owner::from(&other))
            .create("Fruity")
            .await
            .unwrap();
        let mine = OwnedRepository::<Tag>::new(pool.clone(), Owner::from(&user));
        mine.create("Vegan").await.unwrap();
        mine.create("Dessert").await.unwrap();

        let response = make_request(
            Some(&token),
            app(state),
            Method::GET,
            "/recipe/tags/",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Envelope<Vec<Tag>> = read_body(response).await;
        let names: Vec<&str> = body.data.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Vegan", "Dessert"]);
        assert!(body.data.iter().all(|t| t.owner == user.id));
    }

    #[sqlx::test]
    async fn test_create_ingredient(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;

        let response = make_request(
            Some(&token),
            app(state),
            Method::POST,
            "/recipe/ingredients/",
            json!({ "name": " Cabbage " }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Envelope<Ingredient> = read_body(response).await;
        assert_eq!(body.message, "Ingredient created successfully");
        assert_eq!(body.data.name, "Cabbage");
        assert_eq!(body.data.owner, user.id);
    }

    #[sqlx::test]
    async fn test_create_tag_invalid(pool: Pool<Postgres>) {
        let state = router::tests::state(pool);
        let (_, token) = router::tests::login(&state, "user@example.com").await;

        let response = make_request(
            Some(&token),
            app(state),
            Method::POST,
            "/recipe/tags/",
            json!({ "name": "" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: Envelope<Value> = read_body(response).await;
        assert_eq!(body.data[0]["field"], "name");
    }

    #[sqlx::test]
    async fn test_update_and_delete_tag(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let repo = OwnedRepository::<Tag>::new(pool, Owner::from(&user));
        let tag = repo.create("After Dinner").await.unwrap();
        let path = format!("/recipe/tags/{}/", tag.id);

        let response = make_request(
            Some(&token),
            app(state.clone()),
            Method::PATCH,
            &path,
            json!({ "name": "Dessert" }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(repo.find(tag.id).await.unwrap().name, "Dessert");

        let response = make_request(
            Some(&token),
            app(state),
            Method::DELETE,
            &path,
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Envelope<Value> = read_body(response).await;
        assert!(body.data.is_null());
        assert!(repo.find(tag.id).await.is_err());
    }

    #[sqlx::test]
    async fn test_foreign_ingredient_not_found(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (_, token) = router::tests::login(&state, "user@example.com").await;
        let other = router::tests::create_user(&pool, "other@example.com").await;
        let ingredient = OwnedRepository::<Ingredient>::new(pool, Owner::from(&other))
            .create("Salt")
            .await
            .unwrap();
        let path = format!("/recipe/ingredients/{}/", ingredient.id);

        for method in [Method::GET, Method::PATCH, Method::DELETE] {
            let response = make_request(
                Some(&token),
                app(state.clone()),
                method,
                &path,
                json!({ "name": "Pepper" }).to_string(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }

    #[sqlx::test]
    async fn test_filter_ingredients_assigned_to_recipes(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let repo = OwnedRepository::<Ingredient>::new(pool.clone(), Owner::from(&user));
        let apples = repo.create("Apples").await.unwrap();
        repo.create("Turkey").await.unwrap();

        RecipeRepository::new(pool, Owner::from(&user))
            .create(NewRecipe {
                title: "Apple Crumble".into(),
                time_minutes: 5,
                price: Decimal::new(450, 2),
                ingredients: vec![apples.id],
                ..Default::default()
            })
            .await
            .unwrap();

        let response = make_request(
            Some(&token),
            app(state),
            Method::GET,
            "/recipe/ingredients/?assigned_only=1",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Envelope<Vec<Ingredient>> = read_body(response).await;
        assert_eq!(body.data, vec![apples]);
    }

    #[sqlx::test]
    async fn test_create_tag_ignores_user_field(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let other = router::tests::create_user(&pool, "other@example.com").await;

        let response = make_request(
            Some(&token),
            app(state),
            Method::POST,
            "/recipe/tags/",
            json!({ "name": "Breakfast", "user": other.id }).to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Envelope<Tag> = read_body(response).await;
        assert_eq!(body.data.owner, user.id);

        let theirs = OwnedRepository::<Tag>::new(pool, Owner::from(&other))
            .list(false)
            .await
            .unwrap();
        assert!(theirs.is_empty());
    }
}
