//! Users-related HTTP API.
pub mod create;
pub mod me;
pub mod token;

use axum::routing::{get, post};
use axum::{Router, middleware};

use crate::AppState;
use crate::router::auth;

pub fn router(state: AppState) -> Router<AppState> {
    let me = Router::new()
        // `GET /users/me/` goes to `me::get`. Authorization required.
        // `PATCH /users/me/` goes to `me::update`. Authorization required.
        .route("/users/me/", get(me::get).patch(me::update))
        .route_layer(middleware::from_fn_with_state(state, auth));

    Router::new()
        // `POST /users/` goes to `create`.
        .route("/users/", post(create::handler))
        // `POST /users/token/` goes to `token`.
        .route("/users/token/", post(token::handler))
        .merge(me)
}
