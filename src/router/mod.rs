//! HTTP API of the recipe service.
pub mod attributes;
pub mod recipes;
pub mod status;
pub mod users;

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::response::Response;
use axum::{Json, middleware};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::user::UserRepository;
use crate::{AppState, ServerError};

const BEARER: &str = "Bearer ";
const TOKEN: &str = "Token ";

/// Highest price a recipe can carry, excluded.
const MAX_PRICE: i64 = 1000;
const PRICE_SCALE: u32 = 2;

/// JSON body checked with [`Validate`] before reaching handlers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Valid<T>(pub T);

impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(Valid(value))
    }
}

/// Primary key taken from the `{id}` path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Id(pub i64);

impl<S> FromRequestParts<S> for Id
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|err: PathRejection| ServerError::from(err))?;
        Ok(Id(id))
    }
}

/// Query string parameters, rejected inside the response envelope.
#[derive(Debug, Clone, Default)]
pub struct Params<T>(pub T);

impl<T, S> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|err: QueryRejection| ServerError::from(err))?;
        Ok(Params(value))
    }
}

/// Custom middleware for authentification.
///
/// Resolves the `Authorization: Bearer <token>` header (or `Token <token>`)
/// to an active [`crate::user::User`] and stores it in request extensions.
pub async fn auth(
    State(state): State<AppState>,
    mut req: Request,
    next: middleware::Next,
) -> Result<Response, ServerError> {
    let digest = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| {
            header
                .strip_prefix(BEARER)
                .or_else(|| header.strip_prefix(TOKEN))
        })
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| state.crypto.hasher.digest(token))
        .ok_or(ServerError::Unauthorized)?;

    let user = UserRepository::new(state.db.postgres.clone())
        .find_by_token(&digest)
        .await?
        .ok_or(ServerError::Unauthorized)?;

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Reject values made of whitespace only.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank")
            .with_message("This field may not be blank.".into()));
    }

    Ok(())
}

/// Check a price fits `NUMERIC(5, 2)` and is not negative.
pub fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(ValidationError::new("min_value")
            .with_message("Ensure this value is greater than or equal to 0.".into()));
    }

    if price.normalize().scale() > PRICE_SCALE {
        return Err(ValidationError::new("max_decimal_places").with_message(
            "Ensure that there are no more than 2 decimal places.".into(),
        ));
    }

    if *price >= Decimal::from(MAX_PRICE) {
        return Err(ValidationError::new("max_digits").with_message(
            "Ensure that there are no more than 5 digits in total.".into(),
        ));
    }

    Ok(())
}

/// Parse a comma separated list of IDs, such as `1,2,3`.
///
/// Empty items are ignored, and a list without items is no filter.
pub fn parse_ids(
    field: &'static str,
    raw: Option<&str>,
) -> Result<Option<Vec<i64>>, ValidationErrors> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<i64>().map_err(|_| {
                let mut errors = ValidationErrors::new();
                errors.add(
                    field,
                    ValidationError::new("invalid").with_message(
                        format!("\"{id}\" is not a valid integer.").into(),
                    ),
                );
                errors
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(|ids| (!ids.is_empty()).then_some(ids))
}
