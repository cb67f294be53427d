//! Public server status.

use std::sync::Arc;

use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::response::Envelope;

/// Structured configuration.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Status {
    version: String,
    name: String,
}

/// Public server status (configuration).
pub async fn status(State(config): State<Arc<Configuration>>) -> Envelope<Status> {
    Envelope::ok(
        "Server is running",
        Status {
            version: config.version().to_owned(),
            name: config.name.clone(),
        },
    )
}
