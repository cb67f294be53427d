//! Recipes HTTP API.
mod image;

use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Extension, Router, middleware};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::recipe::{
    Ingredient, NewRecipe, Owner, Recipe, RecipeChanges, RecipeDetail,
    RecipeFilter, RecipeRepository, Tag,
};
use crate::response::Envelope;
use crate::router::{Id, Params, Valid, attributes, auth, parse_ids};
use crate::user::User;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ListQuery {
    /// Comma separated tag IDs, such as `1,2`.
    pub tags: Option<String>,
    /// Comma separated ingredient IDs.
    pub ingredients: Option<String>,
}

/// Full recipe, used on creation and replacement.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(
        length(min = 1, max = 255, message = "Title must be 1 to 255 characters long."),
        custom(function = "crate::router::not_blank")
    )]
    pub title: String,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub time_minutes: i32,
    #[validate(custom(function = "crate::router::validate_price"))]
    pub price: Decimal,
    #[validate(length(max = 255, message = "Link must be at most 255 characters long."))]
    pub link: Option<String>,
    #[serde(default)]
    pub tags: Vec<i64>,
    #[serde(default)]
    pub ingredients: Vec<i64>,
}

/// Partial recipe. Missing fields are kept.
///
/// An empty `link` removes it.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct PatchBody {
    #[validate(
        length(min = 1, max = 255, message = "Title must be 1 to 255 characters long."),
        custom(function = "crate::router::not_blank")
    )]
    pub title: Option<String>,
    #[validate(range(min = 0, message = "Ensure this value is greater than or equal to 0."))]
    pub time_minutes: Option<i32>,
    #[validate(custom(function = "crate::router::validate_price"))]
    pub price: Option<Decimal>,
    #[validate(length(max = 255, message = "Link must be at most 255 characters long."))]
    pub link: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

/// Empty links are stored as no link.
fn link(link: String) -> Option<String> {
    let link = link.trim();
    (!link.is_empty()).then(|| link.to_owned())
}

impl From<Body> for NewRecipe {
    fn from(body: Body) -> Self {
        Self {
            title: body.title.trim().to_owned(),
            time_minutes: body.time_minutes,
            price: body.price,
            link: body.link.and_then(link),
            tags: body.tags,
            ingredients: body.ingredients,
        }
    }
}

impl From<PatchBody> for RecipeChanges {
    fn from(body: PatchBody) -> Self {
        Self {
            title: body.title.map(|title| title.trim().to_owned()),
            time_minutes: body.time_minutes,
            price: body.price,
            link: body.link.map(link),
            tags: body.tags,
            ingredients: body.ingredients,
        }
    }
}

fn repository(state: &AppState, user: &User) -> RecipeRepository {
    RecipeRepository::new(state.db.postgres.clone(), Owner::from(user))
}

/// Recipes, tags and ingredients routes. Authorization required.
pub fn router(state: AppState) -> Router<AppState> {
    let upload_limit = state.config.media.max_upload_size;

    Router::new()
        // `GET|POST /recipe/recipes/`.
        .route("/recipe/recipes/", get(list).post(create))
        // `GET|PUT|PATCH|DELETE /recipe/recipes/{id}/`.
        .route(
            "/recipe/recipes/{id}/",
            get(retrieve).put(replace).patch(update).delete(destroy),
        )
        // `POST /recipe/recipes/{id}/upload-image/` with a multipart body.
        .route(
            "/recipe/recipes/{id}/upload-image/",
            post(image::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .merge(attributes::router::<Tag>())
        .merge(attributes::router::<Ingredient>())
        .route_layer(middleware::from_fn_with_state(state, auth))
}

async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Params(query): Params<ListQuery>,
) -> Result<Envelope<Vec<Recipe>>> {
    let filter = RecipeFilter {
        tags: parse_ids("tags", query.tags.as_deref())?,
        ingredients: parse_ids("ingredients", query.ingredients.as_deref())?,
    };
    let recipes = repository(&state, &user).list(&filter).await?;

    Ok(Envelope::ok("Recipes retrieved successfully", recipes))
}

async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<Body>,
) -> Result<Envelope<Recipe>> {
    let recipe = repository(&state, &user).create(body.into()).await?;

    Ok(Envelope::created("Recipe created successfully", recipe))
}

async fn retrieve(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Id(id): Id,
) -> Result<Envelope<RecipeDetail>> {
    let recipe = repository(&state, &user).find(id).await?;

    Ok(Envelope::ok("Recipe retrieved successfully", recipe))
}

async fn replace(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Id(id): Id,
    Valid(body): Valid<Body>,
) -> Result<Envelope<Recipe>> {
    let changes = RecipeChanges::from(NewRecipe::from(body));
    let recipe = repository(&state, &user).update(id, changes).await?;

    Ok(Envelope::ok("Recipe updated successfully", recipe))
}

async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Id(id): Id,
    Valid(body): Valid<PatchBody>,
) -> Result<Envelope<Recipe>> {
    let recipe = repository(&state, &user).update(id, body.into()).await?;

    Ok(Envelope::ok("Recipe updated successfully", recipe))
}

async fn destroy(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Id(id): Id,
) -> Result<Envelope<()>> {
    repository(&state, &user).delete(id).await?;

    Ok(Envelope::ok("Recipe deleted successfully", ()))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};
    use sqlx::{Pool, Postgres};

    use super::*;
    use crate::recipe::OwnedRepository;
    use crate::*;

    async fn sample_recipe(pool: &Pool<Postgres>, user: &User, title: &str) -> Recipe {
        RecipeRepository::new(pool.clone(), Owner::from(user))
            .create(NewRecipe {
                title: title.into(),
                time_minutes: 22,
                price: Decimal::new(525, 2),
                link: Some("http://example.com/recipe.pdf".into()),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn test_retrieve_recipes_limited_to_user(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let other = router::tests::create_user(&pool, "other@example.com").await;

        sample_recipe(&pool, &other, "Other recipe").await;
        let first = sample_recipe(&pool, &user, "First").await;
        let second = sample_recipe(&pool, &user, "Second").await;

        let response = make_request(
            Some(&token),
            app(state),
            Method::GET,
            "/recipe/recipes/",
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Envelope<Vec<Recipe>> = read_body(response).await;
        assert_eq!(body.data, vec![second, first]);
    }

    #[sqlx::test]
    async fn test_get_recipe_detail(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let tag = OwnedRepository::<Tag>::new(pool.clone(), Owner::from(&user))
            .create("Vegan")
            .await
            .unwrap();
        let recipe = RecipeRepository::new(pool, Owner::from(&user))
            .create(NewRecipe {
                title: "Curry".into(),
                time_minutes: 30,
                price: Decimal::new(1000, 2),
                tags: vec![tag.id],
                ..Default::default()
            })
            .await
            .unwrap();

        let response = make_request(
            Some(&token),
            app(state),
            Method::GET,
            &format!("/recipe/recipes/{}/", recipe.id),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Envelope<RecipeDetail> = read_body(response).await;
        assert_eq!(body.data.title, "Curry");
        assert_eq!(body.data.tags, vec![tag]);
        assert!(body.data.ingredients.is_empty());
        assert!(body.data.image.is_none());
    }

    #[sqlx::test]
    async fn test_create_recipe_with_tags_and_ingredients(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let tags = OwnedRepository::<Tag>::new(pool.clone(), Owner::from(&user));
        let vegan = tags.create("Vegan").await.unwrap();
        let dessert = tags.create("Dessert").await.unwrap();
        let prawns = OwnedRepository::<Ingredient>::new(pool, Owner::from(&user))
            .create("Prawns")
            .await
            .unwrap();

        let body = json!({
            "title": "Avocado lime cheesecake",
            "time_minutes": 60,
            "price": "20.00",
            "tags": [vegan.id, dessert.id],
            "ingredients": [prawns.id],
        });
        let response = make_request(
            Some(&token),
            app(state),
            Method::POST,
            "/recipe/recipes/",
            body.to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Envelope<Recipe> = read_body(response).await;
        assert_eq!(body.data.owner, user.id);
        assert_eq!(body.data.tags, vec![vegan.id, dessert.id]);
        assert_eq!(body.data.ingredients, vec![prawns.id]);
        assert_eq!(body.data.price, Decimal::new(2000, 2));
        assert!(body.data.link.is_none());
    }

    #[sqlx::test]
    async fn test_create_recipe_invalid(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let other = router::tests::create_user(&pool, "other@example.com").await;
        let foreign = OwnedRepository::<Tag>::new(pool, Owner::from(&other))
            .create("Foreign")
            .await
            .unwrap();

        let cases = [
            (json!({ "title": "", "time_minutes": 5, "price": "5.00" }), "title"),
            (json!({ "title": "Soup", "time_minutes": -1, "price": "5.00" }), "time_minutes"),
            (json!({ "title": "Soup", "time_minutes": 5, "price": "5.555" }), "price"),
            (
                json!({ "title": "Soup", "time_minutes": 5, "price": "5.00", "tags": [foreign.id] }),
                "tags",
            ),
        ];

        for (body, field) in cases {
            let response = make_request(
                Some(&token),
                app(state.clone()),
                Method::POST,
                "/recipe/recipes/",
                body.to_string(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{field}");

            let body: Envelope<Value> = read_body(response).await;
            assert_eq!(body.data[0]["field"], field);
        }

        let recipes = RecipeRepository::new(state.db.postgres.clone(), Owner::from(&user))
            .list(&RecipeFilter::default())
            .await
            .unwrap();
        assert!(recipes.is_empty());
    }

    #[sqlx::test]
    async fn test_partial_update_recipe(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let recipe = sample_recipe(&pool, &user, "Chicken tikka").await;
        let tag = OwnedRepository::<Tag>::new(pool, Owner::from(&user))
            .create("Curry")
            .await
            .unwrap();

        let body = json!({ "title": "Chicken tikka masala", "tags": [tag.id] });
        let response = make_request(
            Some(&token),
            app(state),
            Method::PATCH,
            &format!("/recipe/recipes/{}/", recipe.id),
            body.to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Envelope<Recipe> = read_body(response).await;
        assert_eq!(body.data.title, "Chicken tikka masala");
        assert_eq!(body.data.tags, vec![tag.id]);
        assert_eq!(body.data.time_minutes, recipe.time_minutes);
        assert_eq!(body.data.price, recipe.price);
        assert_eq!(body.data.link, recipe.link);
    }

    #[sqlx::test]
    async fn test_full_update_recipe(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let tag = OwnedRepository::<Tag>::new(pool.clone(), Owner::from(&user))
            .create("Curry")
            .await
            .unwrap();
        let recipe = RecipeRepository::new(pool, Owner::from(&user))
            .create(NewRecipe {
                title: "Spaghetti carbonara".into(),
                time_minutes: 25,
                price: Decimal::new(500, 2),
                link: Some("https://example.com".into()),
                tags: vec![tag.id],
                ..Default::default()
            })
            .await
            .unwrap();

        let body = json!({ "title": "Spaghetti", "time_minutes": 15, "price": "3.50" });
        let response = make_request(
            Some(&token),
            app(state),
            Method::PUT,
            &format!("/recipe/recipes/{}/", recipe.id),
            body.to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Envelope<Recipe> = read_body(response).await;
        assert_eq!(body.data.title, "Spaghetti");
        assert_eq!(body.data.time_minutes, 15);
        assert_eq!(body.data.price, Decimal::new(350, 2));
        assert!(body.data.link.is_none());
        assert!(body.data.tags.is_empty());
    }

    #[sqlx::test]
    async fn test_other_user_recipe(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (_, token) = router::tests::login(&state, "user@example.com").await;
        let other = router::tests::create_user(&pool, "other@example.com").await;
        let recipe = sample_recipe(&pool, &other, "Secret").await;
        let path = format!("/recipe/recipes/{}/", recipe.id);

        for method in [Method::GET, Method::PATCH, Method::DELETE] {
            let response = make_request(
                Some(&token),
                app(state.clone()),
                method,
                &path,
                json!({ "title": "Stolen" }).to_string(),
            )
            .await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        let saved = RecipeRepository::new(pool, Owner::from(&other))
            .find(recipe.id)
            .await
            .unwrap();
        assert_eq!(saved.title, "Secret");
    }

    #[sqlx::test]
    async fn test_delete_recipe(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let recipe = sample_recipe(&pool, &user, "Soup").await;

        let response = make_request(
            Some(&token),
            app(state),
            Method::DELETE,
            &format!("/recipe/recipes/{}/", recipe.id),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let deleted = RecipeRepository::new(pool, Owner::from(&user))
            .find(recipe.id)
            .await;
        assert!(deleted.is_err());
    }

    #[sqlx::test]
    async fn test_filter_by_tags(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let tags = OwnedRepository::<Tag>::new(pool.clone(), Owner::from(&user));
        let vegan = tags.create("Vegan").await.unwrap();
        let vegetarian = tags.create("Vegetarian").await.unwrap();

        let repo = RecipeRepository::new(pool.clone(), Owner::from(&user));
        let mut recipes = Vec::new();
        for (title, tag) in [("Curry", Some(vegan.id)), ("Tahini", Some(vegetarian.id)), ("Fish", None)] {
            let recipe = repo
                .create(NewRecipe {
                    title: title.into(),
                    time_minutes: 10,
                    price: Decimal::new(300, 2),
                    tags: tag.into_iter().collect(),
                    ..Default::default()
                })
                .await
                .unwrap();
            recipes.push(recipe.id);
        }

        let response = make_request(
            Some(&token),
            app(state),
            Method::GET,
            &format!("/recipe/recipes/?tags={},{}", vegan.id, vegetarian.id),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: Envelope<Vec<Recipe>> = read_body(response).await;
        let ids: Vec<i64> = body.data.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![recipes[1], recipes[0]]);
    }

    #[sqlx::test]
    async fn test_create_recipe_ignores_user_field(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let other = router::tests::create_user(&pool, "other@example.com").await;

        let body = json!({
            "title": "Porridge",
            "time_minutes": 5,
            "price": "1.50",
            "user": other.id,
        });
        let response = make_request(
            Some(&token),
            app(state),
            Method::POST,
            "/recipe/recipes/",
            body.to_string(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let body: Envelope<Recipe> = read_body(response).await;
        assert_eq!(body.data.owner, user.id);

        let theirs = RecipeRepository::new(pool, Owner::from(&other))
            .list(&RecipeFilter::default())
            .await
            .unwrap();
        assert!(theirs.is_empty());
    }

    #[sqlx::test]
    async fn test_filter_by_ingredients(pool: Pool<Postgres>) {
        let state = router::tests::state(pool.clone());
        let (user, token) = router::tests::login(&state, "user@example.com").await;
        let ingredients = OwnedRepository::<Ingredient>::new(pool.clone(), Owner::from(&user));
        let cheese = ingredients.create("Feta cheese").await.unwrap();
        let chicken = ingredients.create("Chicken").await.unwrap();

        let repo = RecipeRepository::new(pool.clone(), Owner::from(&user));
        let mut recipes = Vec::new();
        for (title, linked) in [
            ("Posh beans", vec![cheese.id]),
            ("Chicken salad", vec![cheese.id, chicken.id]),
            ("Red lentil daal", vec![]),
        ] {
            let recipe = repo
                .create(NewRecipe {
                    title: title.into(),
                    time_minutes: 10,
                    price: Decimal::new(300, 2),
                    ingredients: linked,
                    ..Default::default()
                })
                .await
                .unwrap();
            recipes.push(recipe.id);
        }

        let response = make_request(
            Some(&token),
            app(state),
            Method::GET,
            &format!("/recipe/recipes/?ingredients={},{}", cheese.id, chicken.id),
            String::default(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        // Matching both ingredients still lists the recipe once.
        let body: Envelope<Vec<Recipe>> = read_body(response).await;
        let ids: Vec<i64> = body.data.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![recipes[1], recipes[0]]);
    }
}
