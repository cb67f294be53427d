//! Get and update the authenticated user.

use std::sync::Arc;

use axum::Extension;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::response::Envelope;
use crate::router::Valid;
use crate::user::{User, UserChanges, UserService};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 255, message = "Email must be at most 255 characters long.")
    )]
    pub email: Option<String>,
    #[validate(length(max = 128, message = "Name must be at most 128 characters long."))]
    pub name: Option<String>,
    #[validate(length(
        min = 5,
        max = 128,
        message = "Password must contain at least 5 characters."
    ))]
    pub password: Option<String>,
}

pub async fn get(Extension(user): Extension<User>) -> Envelope<User> {
    Envelope::ok("User retrieved successfully", user)
}

pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Valid(body): Valid<Body>,
) -> Result<Envelope<User>> {
    let user = UserService::new(user, state.db.postgres.clone(), Arc::clone(&state.crypto))
        .update(UserChanges {
            email: body.email,
            name: body.name,
            password: body.password,
        })
        .await?;

    Ok(Envelope::ok("User updated successfully", user.data))
}
