use std::sync::Arc;

use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::response::Envelope;
use crate::router::{Valid, not_blank};
use crate::user::UserBuilder;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(custom(function = "not_blank"))]
    pub email: String,
    #[validate(length(min = 1, message = "This field may not be blank."))]
    pub password: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub token: String,
}

/// Handler to exchange credentials for an opaque token.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Envelope<Response>> {
    let token = UserBuilder::new()
        .email(body.email)
        .build(state.db.postgres.clone(), Arc::clone(&state.crypto))
        .authenticate(&body.password)
        .await?;

    Ok(Envelope::ok("Token created successfully", Response { token }))
}
