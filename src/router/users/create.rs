use std::sync::Arc;

use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::response::Envelope;
use crate::router::Valid;
use crate::user::{User, UserBuilder};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(
        email(message = "Enter a valid email address."),
        length(max = 255, message = "Email must be at most 255 characters long.")
    )]
    pub email: String,
    #[validate(length(
        min = 5,
        max = 128,
        message = "Password must contain at least 5 characters."
    ))]
    pub password: String,
    #[validate(length(max = 128, message = "Name must be at most 128 characters long."))]
    pub name: Option<String>,
}

/// Handler to create user.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Envelope<User>> {
    let user = UserBuilder::new()
        .email(body.email)
        .password(body.password)
        .name(body.name)
        .build(state.db.postgres.clone(), Arc::clone(&state.crypto))
        .create_user()
        .await?;

    Ok(Envelope::created("User created successfully", user.data))
}
